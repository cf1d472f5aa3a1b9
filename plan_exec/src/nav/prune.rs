//! # Path simplification
//!
//! Raw paths from the planner step from cell to cell. Most intermediate nodes are unnecessary for a
//! vehicle which can fly straight between any two points with a clear line between them. A node is
//! removed if it lies on the line through its neighbours, or if its two neighbours can see each
//! other across the grid.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use crate::map::{Node, OccupancyGrid};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default tolerance on the collinearity determinant
pub const DEFAULT_COLLINEAR_EPSILON: f64 = 1e-2;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Returns true if the three nodes lie on a single line, to within `epsilon` on the determinant of
/// the matrix formed by their homogeneous coordinates.
pub fn collinear(p1: Node, p2: Node, p3: Node, epsilon: f64) -> bool {
    let (x1, y1) = (p1.north as f64, p1.east as f64);
    let (x2, y2) = (p2.north as f64, p2.east as f64);
    let (x3, y3) = (p3.north as f64, p3.east as f64);

    let det = x1 * (y2 - y3) + x2 * (y3 - y1) + x3 * (y1 - y2);

    det.abs() < epsilon
}

/// Returns true if every cell on the discrete line between `a` and `b` is free.
pub fn has_line_of_sight(grid: &OccupancyGrid, a: Node, b: Node) -> bool {
    grid.line_iter(a, b).all(|n| grid.is_free(n))
}

/// Run a single simplification pass over the path.
///
/// A window of three nodes slides along the path. The middle node is removed if the window is
/// collinear or the outer nodes have line of sight, and the same window position is tested again.
/// Otherwise the window advances by one.
pub fn prune_pass(path: &[Node], grid: &OccupancyGrid, epsilon: f64) -> Vec<Node> {
    let mut pruned = path.to_vec();
    let mut i = 0;

    while i + 2 < pruned.len() {
        let (p1, p2, p3) = (pruned[i], pruned[i + 1], pruned[i + 2]);

        if collinear(p1, p2, p3, epsilon) || has_line_of_sight(grid, p1, p3) {
            pruned.remove(i + 1);
        } else {
            i += 1;
        }
    }

    pruned
}

/// Simplify the path with the default collinearity tolerance.
///
/// The result is a subsequence of `path` with the same first and last nodes.
pub fn simplify_path(path: &[Node], grid: &OccupancyGrid) -> Vec<Node> {
    simplify_path_with_tolerance(path, grid, DEFAULT_COLLINEAR_EPSILON)
}

/// Simplify the path, repeating [`prune_pass`] until a pass removes nothing.
pub fn simplify_path_with_tolerance(
    path: &[Node],
    grid: &OccupancyGrid,
    epsilon: f64,
) -> Vec<Node> {
    let mut current = path.to_vec();
    let mut num_passes = 0;

    loop {
        let pruned = prune_pass(&current, grid, epsilon);
        num_passes += 1;

        if pruned.len() == current.len() {
            break;
        }
        current = pruned;
    }

    debug!(
        "Simplified path from {} to {} nodes in {} passes",
        path.len(),
        current.len(),
        num_passes
    );

    current
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::nav::{find_path, NavError};

    fn nodes(pts: &[(usize, usize)]) -> Vec<Node> {
        pts.iter().map(|&p| p.into()).collect()
    }

    fn gap_grid() -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(5, 5, 0, 0);
        for e in 0..4 {
            grid.set_blocked(Node::new(2, e)).unwrap();
        }
        grid
    }

    fn is_subsequence(sub: &[Node], full: &[Node]) -> bool {
        let mut it = full.iter();
        sub.iter().all(|s| it.any(|f| f == s))
    }

    #[test]
    fn test_collinear() {
        let eps = DEFAULT_COLLINEAR_EPSILON;

        assert!(collinear(Node::new(0, 0), Node::new(1, 1), Node::new(2, 2), eps));
        assert!(collinear(Node::new(3, 0), Node::new(3, 4), Node::new(3, 9), eps));
        assert!(collinear(Node::new(5, 5), Node::new(5, 5), Node::new(1, 2), eps));
        assert!(!collinear(Node::new(0, 0), Node::new(1, 1), Node::new(2, 1), eps));
    }

    #[test]
    fn test_line_of_sight() {
        let grid = gap_grid();

        assert!(has_line_of_sight(&grid, Node::new(0, 0), Node::new(1, 4)));
        assert!(has_line_of_sight(&grid, Node::new(1, 4), Node::new(3, 4)));
        assert!(!has_line_of_sight(&grid, Node::new(0, 0), Node::new(4, 0)));
        assert!(!has_line_of_sight(&grid, Node::new(1, 3), Node::new(3, 3)));
    }

    #[test]
    fn test_collinear_collapse() {
        let grid = OccupancyGrid::new(4, 4, 0, 0);
        let path = nodes(&[(0, 0), (1, 1), (2, 2), (3, 3)]);

        assert_eq!(simplify_path(&path, &grid), nodes(&[(0, 0), (3, 3)]));
    }

    #[test]
    fn test_short_paths_unchanged() {
        let grid = OccupancyGrid::new(4, 4, 0, 0);

        assert!(simplify_path(&[], &grid).is_empty());
        assert_eq!(simplify_path(&nodes(&[(1, 1)]), &grid), nodes(&[(1, 1)]));
        assert_eq!(
            simplify_path(&nodes(&[(0, 0), (3, 2)]), &grid),
            nodes(&[(0, 0), (3, 2)])
        );
    }

    #[test]
    fn test_gap_path() -> Result<(), NavError> {
        let grid = gap_grid();
        let (path, _) = find_path(&grid, Node::new(0, 0), Node::new(4, 0))?;

        assert_eq!(
            path,
            nodes(&[
                (0, 0),
                (1, 1),
                (1, 2),
                (1, 3),
                (2, 4),
                (3, 3),
                (3, 2),
                (3, 1),
                (4, 0)
            ])
        );

        // A single pass leaves a node which a second pass can remove
        assert_eq!(
            prune_pass(&path, &grid, DEFAULT_COLLINEAR_EPSILON),
            nodes(&[(0, 0), (1, 3), (2, 4), (3, 2), (4, 0)])
        );

        let simplified = simplify_path(&path, &grid);
        assert_eq!(simplified, nodes(&[(0, 0), (1, 3), (2, 4), (4, 0)]));

        for w in simplified.windows(2) {
            assert!(has_line_of_sight(&grid, w[0], w[1]), "{:?}", w);
        }

        Ok(())
    }

    #[test]
    fn test_properties_on_planned_paths() -> Result<(), NavError> {
        let mut grid = OccupancyGrid::new(12, 12, 0, 0);
        grid.block_rect(2..=9, 3..=4).unwrap();
        grid.block_rect(6..=7, 4..=10).unwrap();
        grid.block_rect(0..=3, 8..=8).unwrap();

        let cases = [
            (Node::new(0, 0), Node::new(11, 11)),
            (Node::new(11, 0), Node::new(0, 11)),
            (Node::new(5, 6), Node::new(10, 2)),
            (Node::new(0, 10), Node::new(11, 5)),
        ];

        for &(start, goal) in cases.iter() {
            let (path, _) = find_path(&grid, start, goal)?;
            let simplified = simplify_path(&path, &grid);

            assert_eq!(simplified.first(), Some(&start));
            assert_eq!(simplified.last(), Some(&goal));
            assert!(is_subsequence(&simplified, &path));

            for w in simplified.windows(2) {
                assert!(has_line_of_sight(&grid, w[0], w[1]), "{:?}", w);
            }

            assert_eq!(simplify_path(&simplified, &grid), simplified);
        }

        Ok(())
    }
}
