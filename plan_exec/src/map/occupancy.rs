//! # Occupancy Grid
//!
//! An [`OccupancyGrid`] is a 2D boolean grid of the obstacle field at a single altitude, where a
//! `true` cell is blocked. The grid is indexed by `(north, east)` cell and is paired with the
//! offsets of its origin in the local frame, such that:
//!
//! ```text
//! local_position = cell_index + offset
//! ```
//!
//! Cells are one meter square.

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use std::ops::RangeInclusive;

use log::debug;
use nalgebra::Vector2;
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{LineIter, MapError, Obstacle};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A cell in the grid, given by its north and east indexes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Node {
    pub north: usize,
    pub east: usize,
}

/// Occupancy grid of the obstacle field at one altitude slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Cell data, `true` if the cell is blocked. Dimension order is north, east.
    cells: Array2<bool>,

    /// Local north position of cell row 0
    north_offset: i64,

    /// Local east position of cell column 0
    east_offset: i64,
}

/// Horizontal extent of a set of obstacles.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    north_min: f64,
    north_max: f64,
    east_min: f64,
    east_max: f64,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the occupancy grid for the given altitude, returning the grid along with its north and
/// east offsets.
///
/// See [`OccupancyGrid::build`].
pub fn build_grid(
    obstacles: &[Obstacle],
    target_altitude_m: f64,
    safety_distance_m: f64,
) -> Result<(OccupancyGrid, i64, i64), MapError> {
    let grid = OccupancyGrid::build(obstacles, target_altitude_m, safety_distance_m)?;
    let (north_offset, east_offset) = grid.offsets();

    Ok((grid, north_offset, east_offset))
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Node {
    pub const fn new(north: usize, east: usize) -> Self {
        Self { north, east }
    }

    /// Returns the node displaced by the given signed deltas, or `None` if either index would be
    /// negative.
    pub fn offset(&self, delta_north: i64, delta_east: i64) -> Option<Node> {
        let north = self.north as i64 + delta_north;
        let east = self.east as i64 + delta_east;

        if north < 0 || east < 0 {
            return None;
        }

        Some(Node::new(north as usize, east as usize))
    }

    /// The node as a real valued point.
    pub fn as_vector(&self) -> Vector2<f64> {
        Vector2::new(self.north as f64, self.east as f64)
    }
}

impl From<(usize, usize)> for Node {
    fn from(tuple: (usize, usize)) -> Self {
        Node::new(tuple.0, tuple.1)
    }
}

impl OccupancyGrid {
    /// Build the occupancy grid of the obstacle field at the given altitude.
    ///
    /// The grid covers the horizontal bounding box of all obstacles, with the minimums floored and
    /// the maximums ceiled. Every obstacle whose top plus the safety distance is above
    /// `target_altitude_m` has its footprint, grown by the safety distance on each side and clipped
    /// to the grid, marked as blocked. All other obstacles are transparent at this altitude.
    pub fn build(
        obstacles: &[Obstacle],
        target_altitude_m: f64,
        safety_distance_m: f64,
    ) -> Result<Self, MapError> {
        if obstacles.is_empty() {
            return Err(MapError::NoObstacles);
        }
        if !target_altitude_m.is_finite() {
            return Err(MapError::InvalidTargetAltitude(target_altitude_m));
        }
        if !safety_distance_m.is_finite() || safety_distance_m < 0.0 {
            return Err(MapError::InvalidSafetyDistance(safety_distance_m));
        }

        for (i, obstacle) in obstacles.iter().enumerate() {
            obstacle
                .validate()
                .map_err(|reason| MapError::InvalidObstacle(i, reason))?;
        }

        let bounds = Bounds::of(obstacles);

        let north_min = bounds.north_min.floor();
        let north_max = bounds.north_max.ceil();
        let east_min = bounds.east_min.floor();
        let east_max = bounds.east_max.ceil();

        // A zero extent field still gets one cell on each axis
        let north_size = ((north_max - north_min).ceil() as usize).max(1);
        let east_size = ((east_max - east_min).ceil() as usize).max(1);

        let mut grid = Self::new(north_size, east_size, north_min as i64, east_min as i64);

        let mut num_rasterised = 0;

        for obstacle in obstacles
            .iter()
            .filter(|o| o.intrudes(target_altitude_m, safety_distance_m))
        {
            let north = clip_span(
                obstacle.north_m - obstacle.d_north_m - safety_distance_m - north_min,
                obstacle.north_m + obstacle.d_north_m + safety_distance_m - north_min,
                north_size,
            );
            let east = clip_span(
                obstacle.east_m - obstacle.d_east_m - safety_distance_m - east_min,
                obstacle.east_m + obstacle.d_east_m + safety_distance_m - east_min,
                east_size,
            );

            grid.block_rect(north, east)?;
            num_rasterised += 1;
        }

        debug!(
            "Built {} x {} grid at {} m (offset {}, {}): {} of {} obstacles rasterised, {} cells \
             blocked",
            north_size,
            east_size,
            target_altitude_m,
            grid.north_offset,
            grid.east_offset,
            num_rasterised,
            obstacles.len(),
            grid.num_blocked()
        );

        Ok(grid)
    }

    /// Create a new grid with all cells free.
    pub fn new(north_size: usize, east_size: usize, north_offset: i64, east_offset: i64) -> Self {
        Self::from_cells(
            Array2::from_elem((north_size, east_size), false),
            north_offset,
            east_offset,
        )
    }

    /// Create a grid from existing cell data, where `true` cells are blocked.
    pub fn from_cells(cells: Array2<bool>, north_offset: i64, east_offset: i64) -> Self {
        Self {
            cells,
            north_offset,
            east_offset,
        }
    }

    /// Number of cells along the north and east axes.
    pub fn num_cells(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// The `(north, east)` offsets of the grid origin in the local frame.
    pub fn offsets(&self) -> (i64, i64) {
        (self.north_offset, self.east_offset)
    }

    /// Read only view of the cell data.
    pub fn cells(&self) -> ArrayView2<bool> {
        self.cells.view()
    }

    pub fn cell_in_map(&self, node: Node) -> bool {
        let (north_size, east_size) = self.num_cells();
        node.north < north_size && node.east < east_size
    }

    /// Returns true if the node is blocked. Nodes outside the map are considered blocked.
    pub fn is_blocked(&self, node: Node) -> bool {
        self.cells
            .get((node.north, node.east))
            .copied()
            .unwrap_or(true)
    }

    /// Returns true if the node is inside the map and not blocked.
    pub fn is_free(&self, node: Node) -> bool {
        !self.is_blocked(node)
    }

    /// Number of blocked cells in the grid.
    pub fn num_blocked(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Mark a single node as blocked.
    pub fn set_blocked(&mut self, node: Node) -> Result<(), MapError> {
        self.block_rect(node.north..=node.north, node.east..=node.east)
    }

    /// Mark every cell in the inclusive north and east ranges as blocked.
    ///
    /// Ranges reaching outside the grid are a logic error in the caller and are rejected rather
    /// than clipped.
    pub fn block_rect(
        &mut self,
        north: RangeInclusive<usize>,
        east: RangeInclusive<usize>,
    ) -> Result<(), MapError> {
        let (north_size, east_size) = self.num_cells();

        if north.start() > north.end()
            || east.start() > east.end()
            || *north.end() >= north_size
            || *east.end() >= east_size
        {
            return Err(MapError::RasterOutOfBounds(
                north, east, north_size, east_size,
            ));
        }

        self.cells
            .slice_mut(s![*north.start()..=*north.end(), *east.start()..=*east.end()])
            .fill(true);

        Ok(())
    }

    /// Iterate over the cells on the discrete line between two nodes, inclusive of both ends.
    pub fn line_iter(&self, from: Node, to: Node) -> LineIter {
        LineIter::new(from, to)
    }

    /// Local `(north, east)` position of the given node.
    pub fn node_to_local(&self, node: Node) -> Vector2<f64> {
        Vector2::new(
            node.north as f64 + self.north_offset as f64,
            node.east as f64 + self.east_offset as f64,
        )
    }

    /// The node containing the given local `(north, east)` position, or `None` if the position is
    /// outside the map.
    ///
    /// Positions are truncated towards zero after removing the offset.
    pub fn local_to_node(&self, local_m: Vector2<f64>) -> Option<Node> {
        let north = (local_m.x - self.north_offset as f64).trunc();
        let east = (local_m.y - self.east_offset as f64).trunc();

        if !north.is_finite() || !east.is_finite() || north < 0.0 || east < 0.0 {
            return None;
        }

        let node = Node::new(north as usize, east as usize);

        if self.cell_in_map(node) {
            Some(node)
        } else {
            None
        }
    }
}

impl Bounds {
    /// Bounding box of the footprints of the given obstacles.
    fn of(obstacles: &[Obstacle]) -> Self {
        let empty = Self {
            north_min: f64::INFINITY,
            north_max: f64::NEG_INFINITY,
            east_min: f64::INFINITY,
            east_max: f64::NEG_INFINITY,
        };

        obstacles.iter().fold(empty, |b, o| Self {
            north_min: b.north_min.min(o.north_m - o.d_north_m),
            north_max: b.north_max.max(o.north_m + o.d_north_m),
            east_min: b.east_min.min(o.east_m - o.d_east_m),
            east_max: b.east_max.max(o.east_m + o.d_east_m),
        })
    }
}

/// Clip the real valued span `[low, high]` to `[0, num_cells - 1]` and truncate to indexes.
fn clip_span(low: f64, high: f64, num_cells: usize) -> RangeInclusive<usize> {
    let max = (num_cells - 1) as f64;

    let clip = |v: f64| v.max(0.0).min(max) as usize;

    clip(low)..=clip(high)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn test_obstacles() -> Vec<Obstacle> {
        vec![
            // Tall building, top at 10 m
            Obstacle::new(10.0, 10.0, 5.0, 2.0, 2.0, 5.0),
            // Low wall, top at 2 m
            Obstacle::new(20.0, 0.0, 1.0, 1.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_build_bounds_and_offsets() -> Result<(), MapError> {
        let (grid, north_offset, east_offset) = build_grid(&test_obstacles(), 5.0, 1.0)?;

        // North spans floor(8) to ceil(21), east spans floor(-1) to ceil(12)
        assert_eq!(grid.num_cells(), (13, 13));
        assert_eq!((north_offset, east_offset), (8, -1));
        assert_eq!(grid.offsets(), (8, -1));

        Ok(())
    }

    #[test]
    fn test_build_rasterisation() -> Result<(), MapError> {
        let grid = OccupancyGrid::build(&test_obstacles(), 5.0, 1.0)?;

        // Building footprint grown by 1 m is north [7, 13] and east [7, 13], which in grid cells
        // clips to north 0..=5 and east 8..=12
        for north in 0..13 {
            for east in 0..13 {
                let expected = north <= 5 && east >= 8;
                assert_eq!(
                    grid.is_blocked(Node::new(north, east)),
                    expected,
                    "cell ({}, {})",
                    north,
                    east
                );
            }
        }
        assert_eq!(grid.num_blocked(), 6 * 5);

        Ok(())
    }

    #[test]
    fn test_build_low_obstacle_intrudes_with_margin() -> Result<(), MapError> {
        // With a 4 m margin the wall's top (2 m) plus margin exceeds 5 m
        let grid = OccupancyGrid::build(&test_obstacles(), 5.0, 4.0)?;

        // Wall centre is at local (20, 0), which is cell (12, 1)
        assert!(grid.is_blocked(Node::new(12, 1)));
        assert!(grid.is_blocked(Node::new(12, 0)));

        // Raising the altitude above everything leaves the grid empty
        let grid = OccupancyGrid::build(&test_obstacles(), 20.0, 4.0)?;
        assert_eq!(grid.num_blocked(), 0);

        Ok(())
    }

    #[test]
    fn test_build_zero_extent() -> Result<(), MapError> {
        let (grid, north_offset, east_offset) =
            build_grid(&[Obstacle::new(3.0, -2.0, 1.0, 0.0, 0.0, 0.0)], 0.5, 0.0)?;

        assert_eq!(grid.num_cells(), (1, 1));
        assert_eq!((north_offset, east_offset), (3, -2));
        assert!(grid.is_blocked(Node::new(0, 0)));

        Ok(())
    }

    #[test]
    fn test_build_monotonic_occupancy() -> Result<(), MapError> {
        // Two overlapping obstacles, the second one low enough to be ignored. The cells blocked by
        // the first must remain blocked regardless of the order of the list.
        let tall = Obstacle::new(5.0, 5.0, 5.0, 2.0, 2.0, 5.0);
        let low = Obstacle::new(5.0, 5.0, 0.5, 4.0, 4.0, 0.5);

        let a = OccupancyGrid::build(&[tall, low], 5.0, 0.0)?;
        let b = OccupancyGrid::build(&[low, tall], 5.0, 0.0)?;

        assert_eq!(a, b);
        assert!(a.is_blocked(Node::new(3, 3)));

        Ok(())
    }

    #[test]
    fn test_build_errors() {
        assert_eq!(
            OccupancyGrid::build(&[], 5.0, 1.0),
            Err(MapError::NoObstacles)
        );
        assert!(matches!(
            OccupancyGrid::build(&test_obstacles(), f64::NAN, 1.0),
            Err(MapError::InvalidTargetAltitude(_))
        ));
        assert_eq!(
            OccupancyGrid::build(&test_obstacles(), 5.0, -1.0),
            Err(MapError::InvalidSafetyDistance(-1.0))
        );
        assert!(matches!(
            OccupancyGrid::build(
                &[
                    Obstacle::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0),
                    Obstacle::new(0.0, 0.0, 0.0, -1.0, 1.0, 1.0)
                ],
                5.0,
                1.0
            ),
            Err(MapError::InvalidObstacle(1, _))
        ));
    }

    #[test]
    fn test_block_rect_out_of_bounds() {
        let mut grid = OccupancyGrid::new(4, 4, 0, 0);

        assert!(grid.block_rect(1..=2, 1..=3).is_ok());
        assert_eq!(grid.num_blocked(), 6);

        assert!(matches!(
            grid.block_rect(0..=4, 0..=0),
            Err(MapError::RasterOutOfBounds(_, _, 4, 4))
        ));
        assert!(grid.set_blocked(Node::new(0, 9)).is_err());
        assert_eq!(grid.num_blocked(), 6);
    }

    #[test]
    fn test_local_node_conversion() {
        let grid = OccupancyGrid::new(10, 20, -5, 100);

        assert_eq!(grid.node_to_local(Node::new(0, 0)), Vector2::new(-5.0, 100.0));
        assert_eq!(grid.node_to_local(Node::new(3, 7)), Vector2::new(-2.0, 107.0));

        assert_eq!(
            grid.local_to_node(Vector2::new(-2.0, 107.0)),
            Some(Node::new(3, 7))
        );
        assert_eq!(
            grid.local_to_node(Vector2::new(-1.4, 107.9)),
            Some(Node::new(3, 7))
        );
        assert_eq!(grid.local_to_node(Vector2::new(-6.0, 107.0)), None);
        assert_eq!(grid.local_to_node(Vector2::new(5.0, 107.0)), None);
        assert_eq!(grid.local_to_node(Vector2::new(0.0, 120.0)), None);
    }

    #[test]
    fn test_outside_is_blocked() {
        let grid = OccupancyGrid::new(2, 2, 0, 0);

        assert!(grid.is_free(Node::new(1, 1)));
        assert!(grid.is_blocked(Node::new(2, 0)));
        assert!(grid.is_blocked(Node::new(0, 2)));
        assert!(!grid.cell_in_map(Node::new(2, 2)));
    }

    #[test]
    fn test_node_offset() {
        let node = Node::new(1, 0);

        assert_eq!(node.offset(-1, 1), Some(Node::new(0, 1)));
        assert_eq!(node.offset(0, -1), None);
        assert_eq!(node.offset(-2, 0), None);
        assert_eq!(Node::from((4, 5)).as_vector(), Vector2::new(4.0, 5.0));
    }
}
