//! # Mission planner
//!
//! Runs the full planning pipeline for a single flight: builds the occupancy grid at the target
//! altitude, converts the local start and goal positions into grid nodes, searches for a path,
//! simplifies it and converts the result into waypoints in the local frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Instant;

use log::{debug, info};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use util::{session, time::std_duration_to_millis};

use crate::{
    map::{MapError, Node, Obstacle, OccupancyGrid},
    nav::{
        prune::DEFAULT_COLLINEAR_EPSILON, simplify_path_with_tolerance, NavError, PathPlanner,
        PathPlannerParams,
    },
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionParams {
    /// Altitude at which the whole mission is flown
    pub target_altitude_m: f64,

    /// Distance by which each obstacle's footprint is grown
    pub safety_distance_m: f64,

    /// Heading attached to every waypoint
    pub heading_rad: f64,

    /// Tolerance on the determinant used by the collinearity test when simplifying paths
    pub collinear_epsilon: f64,

    /// If true a report of every plan is saved into the session directory
    pub save_report: bool,
}

/// A position command in the local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub north_m: f64,
    pub east_m: f64,
    pub alt_m: f64,
    pub heading_rad: f64,
}

/// The output of the mission planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionPlan {
    pub waypoints: Vec<Waypoint>,

    /// Cell by cell path returned by the search
    pub raw_path: Vec<Node>,

    /// The simplified path the waypoints were built from
    pub pruned_path: Vec<Node>,

    pub cost: f64,

    pub num_expanded: usize,

    pub grid: OccupancyGrid,
}

/// Summary of a plan, saved to the session for offline inspection.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub grid_size: (usize, usize),
    pub grid_offsets: (i64, i64),
    pub num_blocked_cells: usize,
    pub start: Node,
    pub goal: Node,
    pub raw_path: Vec<Node>,
    pub pruned_path: Vec<Node>,
    pub cost: f64,
    pub num_expanded: usize,
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Clone, Default)]
pub struct MissionPlanner {
    params: MissionParams,
    planner: PathPlanner,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MissionError {
    #[error("Could not build the occupancy grid: {0}")]
    MapError(#[from] MapError),

    #[error("Could not find a path: {0}")]
    NavError(#[from] NavError),

    #[error("The {0} position ({1}, {2}) is outside the map")]
    PositionOutsideMap(&'static str, f64, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MissionParams {
    fn default() -> Self {
        Self {
            target_altitude_m: 5.0,
            safety_distance_m: 5.0,
            heading_rad: 0.0,
            collinear_epsilon: DEFAULT_COLLINEAR_EPSILON,
            save_report: false,
        }
    }
}

impl Waypoint {
    /// The waypoint as `[north, east, altitude, heading]`.
    pub fn as_array(&self) -> [f64; 4] {
        [self.north_m, self.east_m, self.alt_m, self.heading_rad]
    }

    /// Horizontal distance from the waypoint to the given local position.
    pub fn horizontal_dist_m(&self, local_m: Vector2<f64>) -> f64 {
        (Vector2::new(self.north_m, self.east_m) - local_m).norm()
    }
}

impl MissionPlanner {
    pub fn new(params: MissionParams, planner_params: PathPlannerParams) -> Self {
        Self {
            params,
            planner: PathPlanner::new(planner_params),
        }
    }

    pub fn params(&self) -> &MissionParams {
        &self.params
    }

    /// Plan a mission between two local `(north, east)` positions.
    pub fn plan(
        &self,
        obstacles: &[Obstacle],
        start_local_m: Vector2<f64>,
        goal_local_m: Vector2<f64>,
    ) -> Result<MissionPlan, MissionError> {
        info!(
            "Planning mission from ({:.2}, {:.2}) to ({:.2}, {:.2}) at {} m",
            start_local_m.x,
            start_local_m.y,
            goal_local_m.x,
            goal_local_m.y,
            self.params.target_altitude_m
        );

        // Build the grid
        let timer = Instant::now();
        let grid = OccupancyGrid::build(
            obstacles,
            self.params.target_altitude_m,
            self.params.safety_distance_m,
        )?;
        info!(
            "Grid built in {:.3} ms",
            std_duration_to_millis(timer.elapsed())
        );

        let (north_offset, east_offset) = grid.offsets();
        debug!("North offset = {}, east offset = {}", north_offset, east_offset);

        // Convert the positions into nodes
        let start = grid.local_to_node(start_local_m).ok_or(MissionError::PositionOutsideMap(
            "start",
            start_local_m.x,
            start_local_m.y,
        ))?;
        let goal = grid.local_to_node(goal_local_m).ok_or(MissionError::PositionOutsideMap(
            "goal",
            goal_local_m.x,
            goal_local_m.y,
        ))?;
        debug!("Start node {:?}, goal node {:?}", start, goal);

        // Search
        let timer = Instant::now();
        let result = self.planner.plan(&grid, start, goal)?;
        info!(
            "Search finished in {:.3} ms",
            std_duration_to_millis(timer.elapsed())
        );

        // Simplify
        let timer = Instant::now();
        let pruned_path =
            simplify_path_with_tolerance(&result.path, &grid, self.params.collinear_epsilon);
        info!(
            "Path simplified from {} to {} nodes in {:.3} ms",
            result.path.len(),
            pruned_path.len(),
            std_duration_to_millis(timer.elapsed())
        );

        let waypoints: Vec<Waypoint> = pruned_path
            .iter()
            .map(|&n| {
                let local_m = grid.node_to_local(n);
                Waypoint {
                    north_m: local_m.x,
                    east_m: local_m.y,
                    alt_m: self.params.target_altitude_m,
                    heading_rad: self.params.heading_rad,
                }
            })
            .collect();

        let plan = MissionPlan {
            waypoints,
            raw_path: result.path,
            pruned_path,
            cost: result.cost,
            num_expanded: result.num_expanded,
            grid,
        };

        if self.params.save_report {
            session::save_with_timestamp("mission/plan_report.json", plan.report());
        }

        Ok(plan)
    }
}

impl MissionPlan {
    pub fn report(&self) -> PlanReport {
        PlanReport {
            grid_size: self.grid.num_cells(),
            grid_offsets: self.grid.offsets(),
            num_blocked_cells: self.grid.num_blocked(),
            start: self.raw_path.first().copied().unwrap_or_default(),
            goal: self.raw_path.last().copied().unwrap_or_default(),
            raw_path: self.raw_path.clone(),
            pruned_path: self.pruned_path.clone(),
            cost: self.cost,
            num_expanded: self.num_expanded,
            waypoints: self.waypoints.clone(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
