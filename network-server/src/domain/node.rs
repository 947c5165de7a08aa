//! Node identity and coordinate types.

use std::collections::BTreeMap;
use std::fmt;

use geo::{Distance, Euclidean};
use geo_types::{Coord, Point};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Integer identity of a network node.
///
/// Ids are drawn from a bounded pool (see `ReconcileConfig`); ids below the
/// pool are reserved for zone centroids and points of entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the raw integer id.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An exact planar coordinate, usable as a hash or ordering key.
///
/// Node identity is keyed on exact coordinate equality, so the raw `f64`
/// values are wrapped in `OrderedFloat` to give total ordering and hashing.
/// Ordering is by `x`, then `y`.
///
/// # Examples
///
/// ```
/// use network_server::domain::NodePoint;
///
/// let a = NodePoint::new(0.0, 0.0);
/// let b = NodePoint::new(3.0, 4.0);
/// assert_eq!(a.distance(&b), 5.0);
/// assert!(a < b);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePoint {
    x: OrderedFloat<f64>,
    y: OrderedFloat<f64>,
}

impl NodePoint {
    /// Create a point from raw coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: OrderedFloat(x),
            y: OrderedFloat(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x.into_inner()
    }

    pub fn y(&self) -> f64 {
        self.y.into_inner()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &NodePoint) -> f64 {
        Euclidean.distance(Point::from(Coord::from(*self)), Point::from(Coord::from(*other)))
    }

    /// Returns true if both components are finite.
    pub fn is_finite(&self) -> bool {
        self.x().is_finite() && self.y().is_finite()
    }
}

impl From<Coord<f64>> for NodePoint {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

impl From<NodePoint> for Coord<f64> {
    fn from(p: NodePoint) -> Self {
        Coord { x: p.x(), y: p.y() }
    }
}

impl fmt::Debug for NodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePoint({}, {})", self.x(), self.y())
    }
}

impl fmt::Display for NodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x(), self.y())
    }
}

/// A node of the network graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub point: NodePoint,

    /// Attributes the engine does not interpret (zone, capacity zone, ...).
    /// Carried forward whenever the id survives a reconciliation pass.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Node {
    /// Create a node with no extra attributes.
    pub fn new(id: NodeId, point: NodePoint) -> Self {
        Self {
            id,
            point,
            attributes: BTreeMap::new(),
        }
    }
}
