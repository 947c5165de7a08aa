//! Shortest paths over weighted directed graphs.
//!
//! Used to connect points outside the network (zone centroids, stations) to
//! the nearest part of it. The graph is a plain adjacency map so callers can
//! search any node type, not only [`NodeId`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

use ordered_float::OrderedFloat;

use crate::domain::{Link, NodeId};

/// Adjacency map: node to `{neighbour: edge cost}`.
pub type Graph<N> = HashMap<N, HashMap<N, f64>>;

/// Errors from a shortest-path search.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    /// The frontier emptied before reaching the end node
    #[error("no path between the requested nodes")]
    NoPath,

    /// An edge cost was negative or NaN
    #[error("edge cost {cost} is not a non-negative number")]
    InvalidCost { cost: f64 },
}

/// Minimum-cost path from `start` to `end`.
///
/// Returns the total cost and the nodes walked, `start` and `end`
/// included. Equal-cost alternatives may be returned in any order; only the
/// cost is guaranteed minimal.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use network_server::routing::shortest_path;
///
/// let graph = HashMap::from([
///     ("a", HashMap::from([("b", 1.0), ("c", 5.0)])),
///     ("b", HashMap::from([("c", 1.0)])),
/// ]);
///
/// let (cost, path) = shortest_path(&graph, &"a", &"c").unwrap();
/// assert_eq!(cost, 2.0);
/// assert_eq!(path, vec!["a", "b", "c"]);
/// ```
pub fn shortest_path<'g, N>(
    graph: &'g Graph<N>,
    start: &'g N,
    end: &N,
) -> Result<(f64, Vec<N>), RoutingError>
where
    N: Eq + Hash + Clone,
{
    if start == end {
        return Ok((0.0, vec![start.clone()]));
    }

    let mut best: HashMap<&N, f64> = HashMap::from([(start, 0.0)]);
    let mut previous: HashMap<&N, &N> = HashMap::new();
    let mut settled: HashSet<&N> = HashSet::new();

    // Heap entries point into `pending`, so N needs no ordering.
    let mut pending: Vec<&N> = vec![start];
    let mut frontier = BinaryHeap::from([Reverse((OrderedFloat(0.0), 0usize))]);

    while let Some(Reverse((OrderedFloat(cost), slot))) = frontier.pop() {
        let node = pending[slot];
        if !settled.insert(node) {
            continue;
        }
        if node == end {
            return Ok((cost, walk_back(&previous, node)));
        }

        let Some(edges) = graph.get(node) else {
            continue;
        };
        for (next, &edge) in edges {
            if !(edge >= 0.0) {
                return Err(RoutingError::InvalidCost { cost: edge });
            }
            if settled.contains(next) {
                continue;
            }

            let candidate = cost + edge;
            if best.get(next).is_none_or(|known| candidate < *known) {
                best.insert(next, candidate);
                previous.insert(next, node);
                pending.push(next);
                frontier.push(Reverse((OrderedFloat(candidate), pending.len() - 1)));
            }
        }
    }

    Err(RoutingError::NoPath)
}

fn walk_back<'g, N: Eq + Hash + Clone>(previous: &HashMap<&'g N, &'g N>, end: &'g N) -> Vec<N> {
    let mut path = vec![end.clone()];
    let mut at = end;
    while let Some(&prev) = previous.get(at) {
        path.push(prev.clone());
        at = prev;
    }
    path.reverse();
    path
}

/// Directed graph of a link set, costed by link length.
///
/// Where several links join the same pair of nodes (e.g. a base link and a
/// skeleton), the shortest one is kept.
pub fn network_graph(links: &[Link]) -> Graph<NodeId> {
    let mut graph: Graph<NodeId> = HashMap::new();
    for link in links {
        let Some(key) = link.key() else {
            continue;
        };
        let cost = graph
            .entry(key.from)
            .or_default()
            .entry(key.to)
            .or_insert(link.length);
        *cost = cost.min(link.length);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BaseFlag;

    fn graph(edges: &[(&'static str, &'static str, f64)]) -> Graph<&'static str> {
        let mut g: Graph<&'static str> = HashMap::new();
        for (a, b, cost) in edges {
            g.entry(*a).or_default().insert(*b, *cost);
        }
        g
    }

    fn walk_cost<N: Eq + Hash>(g: &Graph<N>, path: &[N]) -> f64 {
        path.windows(2).map(|w| g[&w[0]][&w[1]]).sum()
    }

    fn classic() -> Graph<&'static str> {
        graph(&[
            ("a", "w", 14.0),
            ("a", "x", 7.0),
            ("a", "y", 9.0),
            ("b", "w", 9.0),
            ("b", "z", 6.0),
            ("w", "a", 14.0),
            ("w", "b", 9.0),
            ("w", "y", 2.0),
            ("x", "a", 7.0),
            ("x", "y", 10.0),
            ("x", "z", 15.0),
            ("y", "a", 9.0),
            ("y", "w", 2.0),
            ("y", "x", 10.0),
            ("y", "z", 11.0),
            ("z", "b", 6.0),
            ("z", "x", 15.0),
            ("z", "y", 11.0),
        ])
    }

    #[test]
    fn classic_example() {
        let g = classic();

        let (cost, path) = shortest_path(&g, &"a", &"z").unwrap();

        assert_eq!(cost, 20.0);
        assert_eq!(path.first(), Some(&"a"));
        assert_eq!(path.last(), Some(&"z"));
        assert_eq!(walk_cost(&g, &path), 20.0);
    }

    #[test]
    fn start_is_end() {
        let g = classic();
        assert_eq!(shortest_path(&g, &"b", &"b").unwrap(), (0.0, vec!["b"]));
    }

    #[test]
    fn unreachable_end_terminates() {
        let g = graph(&[("a", "b", 1.0), ("b", "a", 1.0), ("c", "d", 1.0)]);
        assert_eq!(shortest_path(&g, &"a", &"d"), Err(RoutingError::NoPath));
        // end not in the graph at all
        assert_eq!(shortest_path(&g, &"a", &"q"), Err(RoutingError::NoPath));
    }

    #[test]
    fn edges_are_directed() {
        let g = graph(&[("a", "b", 1.0)]);
        assert!(shortest_path(&g, &"a", &"b").is_ok());
        assert_eq!(shortest_path(&g, &"b", &"a"), Err(RoutingError::NoPath));
    }

    #[test]
    fn negative_and_nan_costs_rejected() {
        let g = graph(&[("a", "b", -1.0)]);
        assert_eq!(
            shortest_path(&g, &"a", &"b"),
            Err(RoutingError::InvalidCost { cost: -1.0 })
        );

        let g = graph(&[("a", "b", f64::NAN)]);
        assert!(matches!(
            shortest_path(&g, &"a", &"b"),
            Err(RoutingError::InvalidCost { .. })
        ));
    }

    #[test]
    fn zero_cost_edges() {
        let g = graph(&[("a", "b", 0.0), ("b", "c", 0.0), ("a", "c", 1.0)]);
        let (cost, path) = shortest_path(&g, &"a", &"c").unwrap();
        assert_eq!(cost, 0.0);
        assert_eq!(path, vec!["a", "b", "c"]);
    }

    #[test]
    fn graph_from_links() {
        let skeleton = Link::new(
            Some(NodeId(1)),
            Some(NodeId(2)),
            BaseFlag::Skeleton,
            vec![(0.0, 0.0), (1.0, 0.0)],
            0.5,
        );
        let links = vec![
            Link::new(
                Some(NodeId(1)),
                Some(NodeId(2)),
                BaseFlag::Base,
                vec![(0.0, 0.0), (1.0, 0.0)],
                2.0,
            ),
            skeleton,
            Link::new(
                Some(NodeId(2)),
                Some(NodeId(3)),
                BaseFlag::Base,
                vec![(1.0, 0.0), (2.0, 0.0)],
                1.0,
            ),
            Link::new(None, None, BaseFlag::Base, vec![(5.0, 5.0), (6.0, 6.0)], 1.0),
        ];

        let g = network_graph(&links);

        assert_eq!(g.len(), 2);
        assert_eq!(g[&NodeId(1)][&NodeId(2)], 0.5);
        let (cost, path) = shortest_path(&g, &NodeId(1), &NodeId(3)).unwrap();
        assert_eq!(cost, 1.5);
        assert_eq!(path, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Cheapest cost by relaxing every edge n times.
        fn bellman_ford(g: &Graph<u8>, start: u8, end: u8) -> Option<f64> {
            let mut dist: HashMap<u8, f64> = HashMap::from([(start, 0.0)]);
            for _ in 0..=g.len() {
                for (a, edges) in g {
                    let Some(&da) = dist.get(a) else { continue };
                    for (b, c) in edges {
                        let candidate = da + c;
                        if dist.get(b).is_none_or(|d| candidate < *d) {
                            dist.insert(*b, candidate);
                        }
                    }
                }
            }
            dist.get(&end).copied()
        }

        proptest! {
            /// Returned paths are real walks with the minimum cost.
            #[test]
            fn matches_bellman_ford(
                edges in prop::collection::vec((0u8..8, 0u8..8, 0u32..50), 0..30),
                start in 0u8..8,
                end in 0u8..8,
            ) {
                let mut g: Graph<u8> = HashMap::new();
                for (a, b, c) in edges {
                    g.entry(a).or_default().insert(b, f64::from(c));
                }

                match (shortest_path(&g, &start, &end), bellman_ford(&g, start, end)) {
                    (Ok((cost, path)), Some(expected)) => {
                        prop_assert_eq!(cost, expected);
                        prop_assert_eq!(path.first(), Some(&start));
                        prop_assert_eq!(path.last(), Some(&end));
                        prop_assert_eq!(walk_cost(&g, &path), cost);
                    }
                    (Err(RoutingError::NoPath), None) => {}
                    (got, expected) => prop_assert!(false, "got {:?}, expected {:?}", got, expected),
                }
            }
        }
    }
}
