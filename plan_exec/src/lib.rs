//! # Planning library
//!
//! Grid based path planning for a vehicle flying at a fixed altitude through a field of box shaped
//! obstacles. The pipeline is:
//!
//! 1. [`map`] - Rasterise the obstacles into an occupancy grid at the target altitude.
//! 2. [`nav`] - Search the grid for a minimum cost path, then simplify it.
//! 3. [`mission`] - Convert the simplified path into waypoints in the local frame.
//!
//! The [`flight`] module drives a vehicle through a planned mission.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Flight state machine, vehicle interface and simulated vehicle
pub mod flight;

/// Collider file loading
pub mod loader;

/// Obstacles and the occupancy grid
pub mod map;

/// Mission planning pipeline
pub mod mission;

/// Path search and simplification
pub mod nav;

/// Executable parameters
pub mod params;
