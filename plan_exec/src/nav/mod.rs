//! # Navigation
//!
//! This module finds and simplifies routes through an [`OccupancyGrid`]:
//! - [`PathPlanner`] - Runs an A* search over the 8-connected grid from a start node to a goal
//!   node, producing the raw cell-by-cell path and its cost.
//! - [`simplify_path`] - Removes redundant intermediate nodes from a raw path using collinearity and
//!   line of sight tests.
//!
//! [`OccupancyGrid`]: crate::map::OccupancyGrid

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// The fixed set of moves between grid cells
pub mod action;

/// A* search over the occupancy grid
pub mod path_planner;

/// Path simplification
pub mod prune;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use action::{valid_actions, Action};
pub use path_planner::{euclidean, find_path, PathPlanner, PathPlannerParams, SearchResult};
pub use prune::{
    collinear, has_line_of_sight, prune_pass, simplify_path, simplify_path_with_tolerance,
};

use crate::map::Node;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavError {
    #[error("{0} node {1:?} is outside the map")]
    PointOutsideMap(String, Node),

    #[error("{0} node {1:?} is on a blocked cell")]
    PointBlocked(String, Node),

    #[error("No path exists from {0:?} to {1:?}")]
    NoPathToTarget(Node, Node),

    #[error("Search stopped after expanding {0} nodes without reaching the goal")]
    ExpansionLimitReached(usize),

    #[error("Heuristic returned a NaN estimate for node {0:?}")]
    InvalidHeuristic(Node),
}
