//! Plans minimum cost paths through an [`OccupancyGrid`], using an A* algorithm.
//!
//! The planner moves between 8-connected neighbouring cells, with cardinal moves costing 1 and
//! diagonal moves costing sqrt(2). By default a node is marked explored as soon as it is first
//! added to the frontier and is never reconsidered, even if a cheaper route to it is found later.
//! Setting [`PathPlannerParams::reopen_nodes`] allows explored nodes to be updated with cheaper
//! routes, which guarantees a minimum cost path at the price of extra expansions.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::{BinaryHeap, HashMap};

use log::{debug, info, trace, warn};
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::map::{Node, OccupancyGrid};

use super::{valid_actions, Action, NavError};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PathPlanner {
    params: PathPlannerParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathPlannerParams {
    /// If true nodes already added to the frontier are updated when a cheaper route to them is
    /// found.
    pub reopen_nodes: bool,

    /// Maximum number of nodes to expand before giving up on the search.
    pub max_expansions: Option<usize>,
}

/// The output of a successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Nodes from the start to the goal, inclusive
    pub path: Vec<Node>,

    /// Sum of the action costs along the path
    pub cost: f64,

    /// Number of nodes whose neighbours were generated
    pub num_expanded: usize,
}

/// An entry in the search frontier
#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    /// Cumulative cost plus heuristic
    priority: NotNan<f64>,

    /// Cumulative cost from the start at the time the entry was pushed
    cost: f64,

    node: Node,
}

/// How a node was reached during the search
#[derive(Debug, Clone, Copy)]
struct Branch {
    cost: f64,
    parent: Option<Node>,
    action: Option<Action>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl PathPlanner {
    pub fn new(params: PathPlannerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PathPlannerParams {
        &self.params
    }

    /// Plans a path from `start` to `goal` using the Euclidean distance heuristic.
    pub fn plan(
        &self,
        grid: &OccupancyGrid,
        start: Node,
        goal: Node,
    ) -> Result<SearchResult, NavError> {
        self.search(grid, euclidean, start, goal)
    }

    /// Best-first search from `start` to `goal`, with frontier priority equal to the cumulative
    /// cost plus `heuristic(node, goal)`.
    ///
    /// Ties in priority are broken by the node ordering (north index, then east index), so the
    /// result is deterministic for a given grid.
    pub fn search<H>(
        &self,
        grid: &OccupancyGrid,
        heuristic: H,
        start: Node,
        goal: Node,
    ) -> Result<SearchResult, NavError>
    where
        H: Fn(Node, Node) -> f64,
    {
        // Check both start and goal are valid cells
        check_endpoint(grid, "PathPlanner::search::start", start)?;
        check_endpoint(grid, "PathPlanner::search::goal", goal)?;

        debug!(
            "Searching from {:?} to {:?} (reopen_nodes: {}, max_expansions: {:?})",
            start, goal, self.params.reopen_nodes, self.params.max_expansions
        );

        // Create the priority queue (binary heap) for the frontier
        let mut heap = BinaryHeap::new();

        // Every node that has been added to the frontier, and how it was reached
        let mut branches: HashMap<Node, Branch> = HashMap::new();

        heap.push(FrontierEntry {
            priority: NotNan::new(0.0).map_err(|_| NavError::InvalidHeuristic(start))?,
            cost: 0.0,
            node: start,
        });
        branches.insert(
            start,
            Branch {
                cost: 0.0,
                parent: None,
                action: None,
            },
        );

        let mut num_expanded = 0;

        // Main loop
        while let Some(entry) = heap.pop() {
            // A cheaper route to this node has been pushed since this entry was, skip it
            if entry.cost > branches.get(&entry.node).map_or(entry.cost, |b| b.cost) {
                continue;
            }

            if entry.node == goal {
                let path = reconstruct(&branches, start, goal);

                info!(
                    "Path found: {} nodes, cost {:.3}, {} nodes expanded",
                    path.len(),
                    entry.cost,
                    num_expanded
                );

                return Ok(SearchResult {
                    path,
                    cost: entry.cost,
                    num_expanded,
                });
            }

            if let Some(max) = self.params.max_expansions {
                if num_expanded >= max {
                    warn!("Expansion limit of {} reached before finding the goal", max);
                    return Err(NavError::ExpansionLimitReached(max));
                }
            }
            num_expanded += 1;

            for (action, next) in valid_actions(grid, entry.node) {
                let branch_cost = entry.cost + action.cost();

                let accept = match branches.get(&next) {
                    None => true,
                    Some(b) => self.params.reopen_nodes && branch_cost < b.cost,
                };
                if !accept {
                    continue;
                }

                let priority = NotNan::new(branch_cost + heuristic(next, goal))
                    .map_err(|_| NavError::InvalidHeuristic(next))?;

                branches.insert(
                    next,
                    Branch {
                        cost: branch_cost,
                        parent: Some(entry.node),
                        action: Some(action),
                    },
                );
                heap.push(FrontierEntry {
                    priority,
                    cost: branch_cost,
                    node: next,
                });
            }

            trace!(
                "Expanded {:?}, frontier size {}, {} nodes reached",
                entry.node,
                heap.len(),
                branches.len()
            );
        }

        warn!(
            "Frontier exhausted after {} expansions, no path from {:?} to {:?}",
            num_expanded, start, goal
        );
        Err(NavError::NoPathToTarget(start, goal))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.node == other.node
    }
}

impl Eq for FrontierEntry {}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Note that we flip the order here so that the heap will be a min-heap, not a max-heap
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Straight line distance between two nodes, treating their indices as coordinates.
///
/// Never exceeds the true 8-connected path cost, so it is an admissible heuristic.
pub fn euclidean(a: Node, b: Node) -> f64 {
    (a.as_vector() - b.as_vector()).norm()
}

/// Finds a path from `start` to `goal` using the default planner parameters.
///
/// Returns the path (from start to goal inclusive) and its cost.
pub fn find_path(
    grid: &OccupancyGrid,
    start: Node,
    goal: Node,
) -> Result<(Vec<Node>, f64), NavError> {
    PathPlanner::default()
        .plan(grid, start, goal)
        .map(|r| (r.path, r.cost))
}

fn check_endpoint(grid: &OccupancyGrid, name: &str, node: Node) -> Result<(), NavError> {
    if !grid.cell_in_map(node) {
        return Err(NavError::PointOutsideMap(name.into(), node));
    }
    if grid.is_blocked(node) {
        return Err(NavError::PointBlocked(name.into(), node));
    }

    Ok(())
}

/// Follow the parent links back from the goal to the start, then reverse.
fn reconstruct(branches: &HashMap<Node, Branch>, start: Node, goal: Node) -> Vec<Node> {
    let mut path = vec![goal];
    let mut current = goal;

    while current != start {
        match branches.get(&current).and_then(|b| b.parent) {
            Some(parent) => {
                trace!("{:?} reached from {:?} by {:?}", current, parent, branches[&current].action);
                path.push(parent);
                current = parent;
            }
            None => break,
        }
    }

    path.reverse();
    path
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::cmp::Reverse;
    use std::f64::consts::SQRT_2;
    use std::sync::Arc;
    use std::thread;

    const TOL: f64 = 1e-9;

    fn grid_with_blocked(north: usize, east: usize, blocked: &[(usize, usize)]) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(north, east, 0, 0);
        for &b in blocked {
            grid.set_blocked(b.into()).unwrap();
        }
        grid
    }

    fn reopening() -> PathPlanner {
        PathPlanner::new(PathPlannerParams {
            reopen_nodes: true,
            max_expansions: None,
        })
    }

    /// Reference minimum cost by uniform cost search
    fn dijkstra(grid: &OccupancyGrid, start: Node, goal: Node) -> Option<f64> {
        let mut dist: HashMap<Node, f64> = HashMap::new();
        let mut heap = BinaryHeap::new();
        dist.insert(start, 0.0);
        heap.push(Reverse((NotNan::new(0.0).unwrap(), start)));

        while let Some(Reverse((cost, node))) = heap.pop() {
            let cost = cost.into_inner();
            if node == goal {
                return Some(cost);
            }
            if cost > dist[&node] {
                continue;
            }
            for (action, next) in valid_actions(grid, node) {
                let c = cost + action.cost();
                if dist.get(&next).map_or(true, |&d| c < d) {
                    dist.insert(next, c);
                    heap.push(Reverse((NotNan::new(c).unwrap(), next)));
                }
            }
        }

        None
    }

    /// Copy of the grid with the given nodes unblocked
    fn with_free(grid: &OccupancyGrid, nodes: &[Node]) -> OccupancyGrid {
        let mut cells = grid.cells().to_owned();
        for n in nodes {
            cells[[n.north, n.east]] = false;
        }
        OccupancyGrid::from_cells(cells, 0, 0)
    }

    /// Deterministic pseudo-random grid with roughly a quarter of the cells blocked
    fn random_grid(seed: u64, north: usize, east: usize) -> OccupancyGrid {
        let mut state = seed;
        let mut grid = OccupancyGrid::new(north, east, 0, 0);
        for n in 0..north {
            for e in 0..east {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                if (state >> 33) % 100 < 25 {
                    grid.set_blocked(Node::new(n, e)).unwrap();
                }
            }
        }
        grid
    }

    #[test]
    fn test_empty_diagonal() -> Result<(), NavError> {
        let grid = OccupancyGrid::new(5, 5, 0, 0);

        let (path, cost) = find_path(&grid, Node::new(0, 0), Node::new(4, 4))?;

        assert_eq!(
            path,
            (0..5).map(|i| Node::new(i, i)).collect::<Vec<_>>()
        );
        assert!((cost - 4.0 * SQRT_2).abs() < TOL);

        Ok(())
    }

    #[test]
    fn test_route_through_gap() -> Result<(), NavError> {
        // Row 2 is a wall with a single gap at the east edge
        let grid = grid_with_blocked(5, 5, &[(2, 0), (2, 1), (2, 2), (2, 3)]);

        let result = PathPlanner::default().plan(&grid, Node::new(0, 0), Node::new(4, 0))?;

        assert!(result.path.contains(&Node::new(2, 4)));
        assert_eq!(result.path.first(), Some(&Node::new(0, 0)));
        assert_eq!(result.path.last(), Some(&Node::new(4, 0)));
        assert!((result.cost - (4.0 + 4.0 * SQRT_2)).abs() < TOL);

        // Cost equals the sum of the steps taken
        let step_sum: f64 = result
            .path
            .windows(2)
            .map(|w| euclidean(w[0], w[1]))
            .sum();
        assert!((step_sum - result.cost).abs() < TOL);

        Ok(())
    }

    #[test]
    fn test_start_equals_goal() -> Result<(), NavError> {
        let grid = OccupancyGrid::new(3, 3, 0, 0);

        let result = PathPlanner::default().plan(&grid, Node::new(1, 2), Node::new(1, 2))?;

        assert_eq!(result.path, vec![Node::new(1, 2)]);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.num_expanded, 0);

        Ok(())
    }

    #[test]
    fn test_invalid_endpoints() {
        let grid = grid_with_blocked(4, 4, &[(1, 1)]);
        let planner = PathPlanner::default();

        assert!(matches!(
            planner.plan(&grid, Node::new(1, 1), Node::new(3, 3)),
            Err(NavError::PointBlocked(_, n)) if n == Node::new(1, 1)
        ));
        assert!(matches!(
            planner.plan(&grid, Node::new(0, 0), Node::new(1, 1)),
            Err(NavError::PointBlocked(_, _))
        ));
        assert!(matches!(
            planner.plan(&grid, Node::new(0, 0), Node::new(4, 0)),
            Err(NavError::PointOutsideMap(_, n)) if n == Node::new(4, 0)
        ));
        assert!(matches!(
            planner.plan(&grid, Node::new(0, 7), Node::new(0, 0)),
            Err(NavError::PointOutsideMap(_, _))
        ));
    }

    #[test]
    fn test_goal_enclosed() {
        let grid = grid_with_blocked(
            5,
            5,
            &[
                (1, 1),
                (1, 2),
                (1, 3),
                (2, 1),
                (2, 3),
                (3, 1),
                (3, 2),
                (3, 3),
            ],
        );

        assert_eq!(
            find_path(&grid, Node::new(0, 0), Node::new(2, 2)),
            Err(NavError::NoPathToTarget(Node::new(0, 0), Node::new(2, 2)))
        );
        assert!(reopening()
            .plan(&grid, Node::new(0, 0), Node::new(2, 2))
            .is_err());
    }

    #[test]
    fn test_closed_nodes_not_reopened() -> Result<(), NavError> {
        // The first route to reach (1, 2) is not the cheapest one, so the default policy returns
        // a longer path than reopening does.
        let grid = grid_with_blocked(3, 4, &[(0, 1), (1, 1), (1, 3)]);
        let start = Node::new(2, 3);
        let goal = Node::new(0, 0);

        let default = PathPlanner::default().plan(&grid, start, goal)?;
        assert!((default.cost - (1.0 + 3.0 * SQRT_2)).abs() < TOL);
        assert_eq!(
            default.path,
            vec![
                Node::new(2, 3),
                Node::new(1, 2),
                Node::new(2, 1),
                Node::new(1, 0),
                Node::new(0, 0)
            ]
        );

        let reopened = reopening().plan(&grid, start, goal)?;
        assert!((reopened.cost - (3.0 + SQRT_2)).abs() < TOL);
        assert_eq!(Some(reopened.cost), dijkstra(&grid, start, goal));

        Ok(())
    }

    #[test]
    fn test_reopening_is_optimal() {
        let planner = PathPlanner::default();
        let reopen = reopening();

        for seed in 0..40 {
            let start = Node::new(0, 0);
            let goal = Node::new(8, 10);
            let grid = with_free(&random_grid(seed, 9, 11), &[start, goal]);

            let expected = dijkstra(&grid, start, goal);

            match (reopen.plan(&grid, start, goal), expected) {
                (Ok(r), Some(c)) => assert!((r.cost - c).abs() < TOL, "seed {}", seed),
                (Err(NavError::NoPathToTarget(_, _)), None) => (),
                (r, c) => panic!("seed {}: got {:?}, expected {:?}", seed, r, c),
            }

            // The default policy never does better than the true minimum
            if let (Ok(r), Some(c)) = (planner.plan(&grid, start, goal), expected) {
                assert!(r.cost >= c - TOL, "seed {}", seed);
            }
        }
    }

    #[test]
    fn test_heuristic_admissible() {
        let goal = Node::new(7, 7);
        let grid = with_free(&random_grid(7, 8, 8), &[goal]);

        for n in 0..8 {
            for e in 0..8 {
                let node = Node::new(n, e);
                if grid.is_blocked(node) {
                    continue;
                }
                if let Some(true_cost) = dijkstra(&grid, node, goal) {
                    assert!(euclidean(node, goal) <= true_cost + TOL, "{:?}", node);
                }
            }
        }
    }

    #[test]
    fn test_expansion_limit() {
        let grid = OccupancyGrid::new(20, 20, 0, 0);
        let planner = PathPlanner::new(PathPlannerParams {
            reopen_nodes: false,
            max_expansions: Some(3),
        });

        assert_eq!(
            planner.plan(&grid, Node::new(0, 0), Node::new(19, 19)),
            Err(NavError::ExpansionLimitReached(3))
        );

        // Enough expansions for the straight diagonal
        let planner = PathPlanner::new(PathPlannerParams {
            reopen_nodes: false,
            max_expansions: Some(100),
        });
        assert!(planner
            .plan(&grid, Node::new(0, 0), Node::new(19, 19))
            .is_ok());
    }

    #[test]
    fn test_nan_heuristic() {
        let grid = OccupancyGrid::new(3, 3, 0, 0);

        assert!(matches!(
            PathPlanner::default().search(
                &grid,
                |_, _| std::f64::NAN,
                Node::new(0, 0),
                Node::new(2, 2)
            ),
            Err(NavError::InvalidHeuristic(_))
        ));
    }

    #[test]
    fn test_independent_searches_in_parallel() {
        let start = Node::new(0, 0);
        let goal = Node::new(11, 11);
        let grid = Arc::new(with_free(&random_grid(3, 12, 12), &[start, goal]));

        let expected = PathPlanner::default().plan(&grid, start, goal);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let grid = Arc::clone(&grid);
                thread::spawn(move || PathPlanner::default().plan(&grid, start, goal))
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }
}
