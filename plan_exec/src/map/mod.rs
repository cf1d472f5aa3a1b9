//! # Map
//!
//! This module implements the [`OccupancyGrid`], the 2.5D representation of the obstacle field at a
//! single altitude slice, along with the [`Obstacle`] records it is built from and the
//! [`LineIter`] used to rasterise straight segments across it.

// ------------------------------------------------------------------------------------------------
// MODS
// ------------------------------------------------------------------------------------------------

/// Implements the [`Obstacle`] box record
mod obstacle;

/// Implements the [`OccupancyGrid`] type and the grid builder
mod occupancy;

/// Discrete line rasterisation between grid cells
mod line;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use line::LineIter;
pub use obstacle::{Obstacle, OBSTACLE_RECORD_LEN};
pub use occupancy::{build_grid, Node, OccupancyGrid};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur while building an [`OccupancyGrid`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("Cannot build a grid from an empty obstacle list")]
    NoObstacles,

    #[error("Obstacle record has {0} fields, expected {}", OBSTACLE_RECORD_LEN)]
    InvalidRecordLength(usize),

    #[error("Obstacle {0} is invalid: {1}")]
    InvalidObstacle(usize, &'static str),

    #[error("Target altitude must be finite, got {0}")]
    InvalidTargetAltitude(f64),

    #[error("Safety distance must be finite and non-negative, got {0}")]
    InvalidSafetyDistance(f64),

    #[error(
        "Rasterised footprint north {0:?}, east {1:?} lies outside a grid of {2} x {3} cells"
    )]
    RasterOutOfBounds(
        std::ops::RangeInclusive<usize>,
        std::ops::RangeInclusive<usize>,
        usize,
        usize,
    ),
}
