//! # Actions
//!
//! The eight moves available from any cell of the grid. Cardinal moves cost 1, diagonal moves cost
//! sqrt(2), matching the Euclidean distance between cell centres.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use crate::map::{Node, OccupancyGrid};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A move from one cell to a neighbouring cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    West,
    East,
    North,
    South,
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Action {
    /// All actions, in the order they are tried during the search.
    pub const ALL: [Action; 8] = [
        Action::West,
        Action::East,
        Action::North,
        Action::South,
        Action::NorthWest,
        Action::NorthEast,
        Action::SouthEast,
        Action::SouthWest,
    ];

    /// The `(north, east)` index change of the action.
    ///
    /// North is towards decreasing north index.
    pub const fn delta(&self) -> (i64, i64) {
        match self {
            Action::West => (0, -1),
            Action::East => (0, 1),
            Action::North => (-1, 0),
            Action::South => (1, 0),
            Action::NorthWest => (-1, -1),
            Action::NorthEast => (-1, 1),
            Action::SouthEast => (1, 1),
            Action::SouthWest => (1, -1),
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            Action::West | Action::East | Action::North | Action::South => 1.0,
            _ => SQRT_2,
        }
    }

    /// The node reached by applying this action to `node`, if it's a valid destination in the
    /// grid (inside the map and not blocked).
    pub fn apply(&self, grid: &OccupancyGrid, node: Node) -> Option<Node> {
        let (d_north, d_east) = self.delta();

        node.offset(d_north, d_east).filter(|&n| grid.is_free(n))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Iterate over the valid actions from `node`, along with the node each one reaches.
///
/// Only the destination cell is checked, so diagonal moves may pass between two blocked cardinal
/// neighbours.
pub fn valid_actions<'a>(
    grid: &'a OccupancyGrid,
    node: Node,
) -> impl Iterator<Item = (Action, Node)> + 'a {
    Action::ALL
        .iter()
        .filter_map(move |a| a.apply(grid, node).map(|n| (*a, n)))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_costs() {
        for action in Action::ALL.iter() {
            let (dn, de) = action.delta();
            let dist = ((dn * dn + de * de) as f64).sqrt();
            assert_eq!(action.cost(), dist, "{:?}", action);
        }
    }

    #[test]
    fn test_valid_actions_open() {
        let grid = OccupancyGrid::new(3, 3, 0, 0);

        assert_eq!(valid_actions(&grid, Node::new(1, 1)).count(), 8);

        // Corners only have three neighbours
        let from_corner: Vec<Action> = valid_actions(&grid, Node::new(0, 0))
            .map(|(a, _)| a)
            .collect();
        assert_eq!(
            from_corner,
            vec![Action::East, Action::South, Action::SouthEast]
        );

        let from_far_corner: Vec<Node> = valid_actions(&grid, Node::new(2, 2))
            .map(|(_, n)| n)
            .collect();
        assert_eq!(
            from_far_corner,
            vec![Node::new(2, 1), Node::new(1, 2), Node::new(1, 1)]
        );
    }

    #[test]
    fn test_valid_actions_blocked() {
        let mut grid = OccupancyGrid::new(3, 3, 0, 0);
        grid.set_blocked(Node::new(0, 1)).unwrap();
        grid.set_blocked(Node::new(1, 0)).unwrap();

        let actions: Vec<Action> = valid_actions(&grid, Node::new(1, 1))
            .map(|(a, _)| a)
            .collect();

        assert_eq!(actions.len(), 6);
        assert!(!actions.contains(&Action::North));
        assert!(!actions.contains(&Action::West));

        // The diagonal between the two blocked cells is still allowed
        assert!(actions.contains(&Action::NorthWest));
    }
}
