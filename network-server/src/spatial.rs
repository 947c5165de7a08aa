//! Point lookups against the node set.
//!
//! The reconciliation engine needs two spatial queries: "which assigned node
//! is nearest to this point, within a snapping distance" and "which nodes
//! lie within a tolerance of this point". `SpatialIndex` abstracts them so
//! another backend can stand in; `PointIndex` answers them from an R-tree.

use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::domain::{NodeId, NodePoint};

/// Nearest-neighbour and radius queries over identified points.
pub trait SpatialIndex {
    /// The id of the closest point no further than `max_distance` away.
    ///
    /// Equidistant candidates resolve to the lowest id.
    fn nearest_existing(&self, point: &NodePoint, max_distance: f64) -> Option<NodeId>;

    /// All points no further than `distance` away, nearest first.
    fn within(&self, point: &NodePoint, distance: f64) -> Vec<(NodeId, NodePoint)>;
}

type Entry = GeomWithData<[f64; 2], NodeId>;

/// In-memory spatial index.
#[derive(Clone, Default)]
pub struct PointIndex {
    tree: RTree<Entry>,
}

impl PointIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from existing points.
    pub fn from_points(points: impl IntoIterator<Item = (NodeId, NodePoint)>) -> Self {
        let entries: Vec<Entry> = points
            .into_iter()
            .map(|(id, p)| GeomWithData::new([p.x(), p.y()], id))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, id: NodeId, point: NodePoint) {
        self.tree.insert(GeomWithData::new([point.x(), point.y()], id));
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl SpatialIndex for PointIndex {
    fn nearest_existing(&self, point: &NodePoint, max_distance: f64) -> Option<NodeId> {
        self.within(point, max_distance).first().map(|(id, _)| *id)
    }

    fn within(&self, point: &NodePoint, distance: f64) -> Vec<(NodeId, NodePoint)> {
        if !(distance >= 0.0) {
            return Vec::new();
        }

        // the tree takes a squared radius
        let mut hits: Vec<(f64, NodeId, NodePoint)> = self
            .tree
            .locate_within_distance([point.x(), point.y()], distance * distance)
            .filter_map(|entry| {
                let [x, y] = *entry.geom();
                let p = NodePoint::new(x, y);
                let d = point.distance(&p);
                (d <= distance).then_some((d, entry.data, p))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id, p)| (id, p)).collect()
    }
}
