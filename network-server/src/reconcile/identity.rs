//! Node identity resolution.
//!
//! Link endpoints are grouped by exact coordinate. Each group keeps the id
//! its links (or the prior node set) already agree on, or is given one: by
//! snapping onto a nearby identified node, or by drawing the lowest free id
//! from the pool. Along the way we detect links that have been split, since
//! their pieces still carry the stale ids of the link they came from.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use super::config::ReconcileConfig;
use super::error::{Conflict, ReconcileError};
use super::geometry::{EndpointObservation, Observations};
use crate::domain::{LinkKey, Node, NodeId, NodePoint};
use crate::spatial::{PointIndex, SpatialIndex};

/// Outcome of identity resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Every observed coordinate and the id it resolved to.
    pub ids: HashMap<NodePoint, NodeId>,

    /// Observed coordinates that were snapped onto a nearby node, and the
    /// node's coordinate.
    pub snapped: HashMap<NodePoint, NodePoint>,

    /// Split stale keys and the ids of their interior points.
    pub splits: BTreeMap<LinkKey, BTreeSet<NodeId>>,

    /// The resolved node set, sorted by id.
    pub nodes: Vec<Node>,

    /// Ids drawn from the pool during this pass, in allocation order.
    pub allocated: Vec<NodeId>,
}

impl Resolution {
    /// The id resolved for an observed coordinate.
    pub fn id_at(&self, point: &NodePoint) -> Option<NodeId> {
        self.ids.get(point).copied()
    }

    /// Where a node at `point` ends up after snapping.
    pub fn location_of(&self, point: &NodePoint) -> NodePoint {
        self.snapped.get(point).copied().unwrap_or(*point)
    }
}

/// Lowest-first allocator over the configured id range.
struct IdPool {
    next: u64,
    max: u64,
    used: BTreeSet<NodeId>,
}

impl IdPool {
    fn new(config: &ReconcileConfig, used: BTreeSet<NodeId>) -> Self {
        Self {
            next: u64::from(config.min_node_id),
            max: u64::from(config.max_node_id),
            used,
        }
    }

    fn allocate(&mut self) -> Option<NodeId> {
        while self.next <= self.max {
            let id = NodeId(u32::try_from(self.next).ok()?);
            self.next += 1;
            if self.used.insert(id) {
                return Some(id);
            }
        }
        None
    }

    /// Ids still free at or above the cursor.
    fn remaining(&self) -> usize {
        if self.next > self.max {
            return 0;
        }
        let span = (self.max - self.next + 1) as usize;
        let taken = self
            .used
            .iter()
            .filter(|id| (self.next..=self.max).contains(&u64::from(id.get())))
            .count();
        span - taken
    }
}

/// Stale keys whose links now touch three or more coordinates, with the
/// coordinates touched more than once (the split points).
fn detect_splits(observations: &Observations) -> BTreeMap<LinkKey, BTreeSet<NodePoint>> {
    let mut touches: BTreeMap<LinkKey, BTreeMap<NodePoint, usize>> = BTreeMap::new();
    for obs in observations.iter() {
        if let Some(key) = obs.stale_key {
            *touches.entry(key).or_default().entry(obs.point).or_default() += 1;
        }
    }

    touches
        .into_iter()
        .filter(|(_, points)| points.len() >= 3)
        .map(|(key, points)| {
            let interior = points
                .into_iter()
                .filter(|(_, count)| *count >= 2)
                .map(|(point, _)| point)
                .collect();
            (key, interior)
        })
        .collect()
}

/// Resolve every observed coordinate to a node id.
///
/// `prior_nodes` is the node set from before the edit; a prior node at an
/// observed coordinate contributes its id like a link would, and its
/// attributes are carried onto the resolved node with the same id.
pub fn resolve(
    config: &ReconcileConfig,
    observations: &Observations,
    prior_nodes: &[Node],
) -> Result<Resolution, ReconcileError> {
    let split_points = detect_splits(observations);
    for (key, interior) in &split_points {
        debug!(%key, pieces = interior.len() + 1, "detected split link");
    }

    // Pieces of a split link carry the original link's ids at their new
    // interior ends; those ids are stale and must not vote.
    let at_split_point = |obs: &EndpointObservation| {
        obs.stale_key
            .and_then(|key| split_points.get(&key))
            .is_some_and(|points| points.contains(&obs.point))
    };

    let prior_by_point: HashMap<NodePoint, NodeId> =
        prior_nodes.iter().map(|n| (n.point, n.id)).collect();

    // Ascending coordinate order drives allocation.
    let mut groups: BTreeMap<NodePoint, BTreeSet<NodeId>> = BTreeMap::new();
    for obs in observations.iter() {
        let legacy = groups.entry(obs.point).or_default();
        if let Some(id) = obs.legacy_id
            && !at_split_point(obs)
        {
            legacy.insert(id);
        }
    }
    for (point, legacy) in groups.iter_mut() {
        if let Some(id) = prior_by_point.get(point) {
            legacy.insert(*id);
        }
    }

    let conflicts = identity_conflicts(&groups);
    if !conflicts.is_empty() {
        warn!(count = conflicts.len(), "node identity conflicts");
        return Err(ReconcileError::Consistency(conflicts));
    }

    let mut resolution = Resolution::default();
    let mut locations: BTreeMap<NodeId, NodePoint> = BTreeMap::new();

    for (point, legacy) in &groups {
        if let Some(id) = legacy.first() {
            resolution.ids.insert(*point, *id);
            locations.insert(*id, *point);
        }
    }

    let mut index = PointIndex::from_points(locations.iter().map(|(id, p)| (*id, *p)));
    let mut pool = IdPool::new(config, locations.keys().copied().collect());

    for point in groups
        .iter()
        .filter(|(_, legacy)| legacy.is_empty())
        .map(|(point, _)| *point)
    {
        if let Some(id) = index.nearest_existing(&point, config.snap_distance)
            && let Some(target) = locations.get(&id)
        {
            debug!(%point, %id, "snapped endpoint onto nearby node");
            resolution.ids.insert(point, id);
            resolution.snapped.insert(point, *target);
            continue;
        }

        let id = pool.allocate().ok_or(ReconcileError::IdPoolExhausted {
            min: config.min_node_id,
            max: config.max_node_id,
        })?;
        resolution.ids.insert(point, id);
        resolution.allocated.push(id);
        locations.insert(id, point);
        index.insert(id, point);
    }

    let remaining = pool.remaining();
    if remaining < config.low_pool_warning {
        warn!(remaining, "node id pool is running low");
    }

    let overlaps = overlapping_nodes(&locations, config.overlap_tolerance);
    if !overlaps.is_empty() {
        warn!(count = overlaps.len(), "overlapping nodes");
        return Err(ReconcileError::Consistency(overlaps));
    }

    resolution.splits = split_points
        .into_iter()
        .map(|(key, points)| {
            let ids = points
                .iter()
                .filter_map(|p| resolution.ids.get(p).copied())
                .collect();
            (key, ids)
        })
        .collect();

    let prior_attributes: HashMap<NodeId, &Node> =
        prior_nodes.iter().map(|n| (n.id, n)).collect();
    resolution.nodes = locations
        .into_iter()
        .map(|(id, point)| {
            let mut node = Node::new(id, point);
            if let Some(prior) = prior_attributes.get(&id) {
                node.attributes = prior.attributes.clone();
            }
            node
        })
        .collect();

    info!(
        nodes = resolution.nodes.len(),
        allocated = resolution.allocated.len(),
        snapped = resolution.snapped.len(),
        splits = resolution.splits.len(),
        "resolved node identities"
    );

    Ok(resolution)
}

/// Groups that disagree on an id, and ids claimed at several coordinates.
fn identity_conflicts(groups: &BTreeMap<NodePoint, BTreeSet<NodeId>>) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    let mut id_locations: BTreeMap<NodeId, Vec<NodePoint>> = BTreeMap::new();

    for (point, legacy) in groups {
        if legacy.len() > 1 {
            conflicts.push(Conflict::DuplicateIds {
                point: *point,
                ids: legacy.iter().copied().collect(),
            });
        }
        for id in legacy {
            id_locations.entry(*id).or_default().push(*point);
        }
    }

    conflicts.extend(
        id_locations
            .into_iter()
            .filter(|(_, points)| points.len() > 1)
            .map(|(id, points)| Conflict::IdAtMultipleLocations { id, points }),
    );

    conflicts
}

/// Pairs of distinct nodes strictly closer than `tolerance`.
fn overlapping_nodes(locations: &BTreeMap<NodeId, NodePoint>, tolerance: f64) -> Vec<Conflict> {
    let index = PointIndex::from_points(locations.iter().map(|(id, p)| (*id, *p)));

    let mut conflicts = Vec::new();
    for (id, point) in locations {
        for (other, other_point) in index.within(point, tolerance) {
            let distance = point.distance(&other_point);
            if other > *id && distance < tolerance {
                conflicts.push(Conflict::OverlappingNodes {
                    first: *id,
                    second: other,
                    distance,
                });
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaseFlag, Link};
    use crate::reconcile::geometry::observe_endpoints;

    fn config() -> ReconcileConfig {
        let mut config = ReconcileConfig::new(100, 199);
        config.centroid_max_id = 50;
        config
    }

    fn link(from: Option<u32>, to: Option<u32>, a: (f64, f64), b: (f64, f64)) -> Link {
        Link::new(from.map(NodeId), to.map(NodeId), BaseFlag::Base, vec![a, b], 1.0)
    }

    fn key(a: u32, b: u32) -> LinkKey {
        LinkKey::new(NodeId(a), NodeId(b), BaseFlag::Base)
    }

    fn pt(x: f64, y: f64) -> NodePoint {
        NodePoint::new(x, y)
    }

    fn resolve_links(config: &ReconcileConfig, links: &[Link]) -> Result<Resolution, ReconcileError> {
        resolve(config, &observe_endpoints(links), &[])
    }

    fn conflicts_of(result: Result<Resolution, ReconcileError>) -> Vec<Conflict> {
        match result {
            Err(ReconcileError::Consistency(conflicts)) => conflicts,
            other => panic!("expected Consistency, got {other:?}"),
        }
    }

    #[test]
    fn unchanged_network_keeps_ids() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (1.0, 0.0)),
            link(Some(101), Some(102), (1.0, 0.0), (2.0, 0.0)),
        ];

        let res = resolve_links(&config(), &links).unwrap();

        assert!(res.allocated.is_empty());
        assert!(res.splits.is_empty());
        assert_eq!(res.id_at(&pt(1.0, 0.0)), Some(NodeId(101)));
        let ids: Vec<_> = res.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![NodeId(100), NodeId(101), NodeId(102)]);
    }

    #[test]
    fn new_endpoints_get_lowest_free_ids_in_coordinate_order() {
        let links = vec![
            link(Some(100), Some(102), (0.0, 0.0), (1.0, 0.0)),
            link(None, None, (5.0, 0.0), (3.0, 0.0)),
        ];

        let res = resolve_links(&config(), &links).unwrap();

        // 101 is the lowest free id and (3, 0) sorts before (5, 0)
        assert_eq!(res.id_at(&pt(3.0, 0.0)), Some(NodeId(101)));
        assert_eq!(res.id_at(&pt(5.0, 0.0)), Some(NodeId(103)));
        assert_eq!(res.allocated, vec![NodeId(101), NodeId(103)]);
    }

    #[test]
    fn new_link_joining_existing_nodes() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (1.0, 0.0)),
            link(None, None, (1.0, 0.0), (0.0, 0.0)),
        ];
        let res = resolve_links(&config(), &links).unwrap();
        assert!(res.allocated.is_empty());
        assert_eq!(res.nodes.len(), 2);
    }

    #[test]
    fn centroid_ids_are_kept() {
        let links = vec![link(Some(7), Some(100), (0.0, 0.0), (1.0, 0.0))];
        let res = resolve_links(&config(), &links).unwrap();
        assert_eq!(res.id_at(&pt(0.0, 0.0)), Some(NodeId(7)));
    }

    #[test]
    fn duplicate_ids_at_one_coordinate() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (1.0, 0.0)),
            link(Some(102), Some(103), (1.0, 0.0), (2.0, 0.0)),
        ];

        let conflicts = conflicts_of(resolve_links(&config(), &links));

        assert_eq!(
            conflicts,
            vec![Conflict::DuplicateIds {
                point: pt(1.0, 0.0),
                ids: vec![NodeId(101), NodeId(102)],
            }]
        );
    }

    #[test]
    fn one_id_at_two_coordinates() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (1.0, 0.0)),
            link(Some(101), Some(102), (1.5, 0.0), (2.0, 0.0)),
        ];

        let conflicts = conflicts_of(resolve_links(&config(), &links));

        assert_eq!(
            conflicts,
            vec![Conflict::IdAtMultipleLocations {
                id: NodeId(101),
                points: vec![pt(1.0, 0.0), pt(1.5, 0.0)],
            }]
        );
    }

    #[test]
    fn split_link_gets_interior_id() {
        // 100-101 was split at (6, 0); both pieces still carry the old ids
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (6.0, 0.0)),
            link(Some(100), Some(101), (6.0, 0.0), (10.0, 0.0)),
        ];

        let res = resolve_links(&config(), &links).unwrap();

        assert_eq!(res.id_at(&pt(0.0, 0.0)), Some(NodeId(100)));
        assert_eq!(res.id_at(&pt(10.0, 0.0)), Some(NodeId(101)));
        assert_eq!(res.id_at(&pt(6.0, 0.0)), Some(NodeId(102)));
        assert_eq!(
            res.splits.get(&key(100, 101)),
            Some(&BTreeSet::from([NodeId(102)]))
        );
    }

    #[test]
    fn split_point_reuses_id_of_crossing_link() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (6.0, 0.0)),
            link(Some(100), Some(101), (6.0, 0.0), (10.0, 0.0)),
            link(Some(150), Some(151), (6.0, 0.0), (6.0, 5.0)),
        ];

        let res = resolve_links(&config(), &links).unwrap();

        assert!(res.allocated.is_empty());
        assert_eq!(
            res.splits.get(&key(100, 101)),
            Some(&BTreeSet::from([NodeId(150)]))
        );
    }

    #[test]
    fn three_way_split() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (2.0, 0.0)),
            link(Some(100), Some(101), (2.0, 0.0), (5.0, 0.0)),
            link(Some(100), Some(101), (5.0, 0.0), (9.0, 0.0)),
        ];

        let res = resolve_links(&config(), &links).unwrap();

        assert_eq!(
            res.splits.get(&key(100, 101)),
            Some(&BTreeSet::from([NodeId(102), NodeId(103)]))
        );
    }

    #[test]
    fn dangling_endpoint_snaps_to_nearby_node() {
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (10.0, 0.0)),
            link(None, None, (10.1, 0.0), (20.0, 0.0)),
        ];

        let res = resolve_links(&config(), &links).unwrap();

        assert_eq!(res.id_at(&pt(10.1, 0.0)), Some(NodeId(101)));
        assert_eq!(res.location_of(&pt(10.1, 0.0)), pt(10.0, 0.0));
        assert_eq!(res.allocated, vec![NodeId(102)]);
        assert_eq!(res.nodes.len(), 3);
    }

    #[test]
    fn snapping_disabled_at_zero_distance() {
        let mut config = config();
        config.snap_distance = 0.0;
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (10.0, 0.0)),
            link(None, None, (10.1, 0.0), (20.0, 0.0)),
        ];

        let res = resolve_links(&config, &links).unwrap();

        assert!(res.snapped.is_empty());
        assert_eq!(res.allocated.len(), 2);
    }

    #[test]
    fn pool_exhaustion_is_fatal() {
        let mut config = ReconcileConfig::new(100, 101);
        config.centroid_max_id = 50;
        let links = vec![
            link(Some(100), None, (0.0, 0.0), (1.0, 0.0)),
            link(None, None, (2.0, 0.0), (3.0, 0.0)),
        ];

        let err = resolve_links(&config, &links).unwrap_err();

        assert_eq!(err, ReconcileError::IdPoolExhausted { min: 100, max: 101 });
    }

    #[test]
    fn overlapping_nodes_are_fatal() {
        let mut config = config();
        config.overlap_tolerance = 0.01;
        config.snap_distance = 0.0;
        let links = vec![
            link(Some(100), Some(101), (0.0, 0.0), (1.0, 0.0)),
            link(Some(102), Some(103), (1.001, 0.0), (2.0, 0.0)),
        ];

        let conflicts = conflicts_of(resolve_links(&config, &links));

        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            conflicts[0],
            Conflict::OverlappingNodes {
                first: NodeId(101),
                second: NodeId(102),
                ..
            }
        ));
    }

    #[test]
    fn prior_nodes_vote_and_carry_attributes() {
        let mut prior = Node::new(NodeId(140), pt(1.0, 0.0));
        prior
            .attributes
            .insert("zone".into(), serde_json::json!(12));
        let links = vec![link(None, None, (0.0, 0.0), (1.0, 0.0))];

        let res = resolve(&config(), &observe_endpoints(&links), &[prior]).unwrap();

        assert_eq!(res.id_at(&pt(1.0, 0.0)), Some(NodeId(140)));
        let node = res.nodes.iter().find(|n| n.id == NodeId(140)).unwrap();
        assert_eq!(node.attributes["zone"], 12);
        assert_eq!(res.allocated, vec![NodeId(100)]);
    }

    #[test]
    fn pool_remaining_counts_free_ids() {
        let mut pool = IdPool::new(&config(), BTreeSet::from([NodeId(100), NodeId(150)]));
        assert_eq!(pool.remaining(), 98);
        assert_eq!(pool.allocate(), Some(NodeId(101)));
        assert_eq!(pool.remaining(), 97);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// New coordinates always get distinct in-pool ids.
            #[test]
            fn distinct_coordinates_distinct_ids(
                coords in prop::collection::btree_set((0i32..50, 0i32..50), 2..40)
            ) {
                let mut config = config();
                config.snap_distance = 0.0;
                let points: Vec<_> = coords.iter().map(|(x, y)| (f64::from(*x), f64::from(*y))).collect();
                let links: Vec<_> = points
                    .windows(2)
                    .map(|w| link(None, None, w[0], w[1]))
                    .collect();

                let res = resolve_links(&config, &links).unwrap();

                let ids: BTreeSet<_> = res.ids.values().copied().collect();
                prop_assert_eq!(ids.len(), points.len());
                prop_assert!(ids.iter().all(|id| config.in_pool(*id)));
                prop_assert_eq!(res.nodes.len(), points.len());
            }
        }
    }
}
