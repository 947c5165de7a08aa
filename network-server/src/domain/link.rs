//! Link (directed edge) types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::{Euclidean, Length};
use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::node::{NodeId, NodePoint};

/// Distinguishes real network links from project-only skeleton links.
///
/// Textual form is `1` for base links and `0` for skeletons, matching the
/// `A-B-F` key notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseFlag {
    Skeleton,
    Base,
}

impl BaseFlag {
    fn digit(self) -> char {
        match self {
            BaseFlag::Skeleton => '0',
            BaseFlag::Base => '1',
        }
    }
}

/// Composite link identity: `(from_node, to_node, base_flag)`.
///
/// Always derived from a link's current endpoints; never stored apart from
/// them. Serialized as the `"A-B-F"` string used in itinerary tables.
///
/// # Examples
///
/// ```
/// use network_server::domain::{BaseFlag, LinkKey, NodeId};
///
/// let key: LinkKey = "5001-5002-1".parse().unwrap();
/// assert_eq!(key.from, NodeId(5001));
/// assert_eq!(key.to, NodeId(5002));
/// assert_eq!(key.base, BaseFlag::Base);
/// assert_eq!(key.to_string(), "5001-5002-1");
///
/// assert!("5001-5002".parse::<LinkKey>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkKey {
    pub from: NodeId,
    pub to: NodeId,
    pub base: BaseFlag,
}

impl LinkKey {
    pub fn new(from: NodeId, to: NodeId, base: BaseFlag) -> Self {
        Self { from, to, base }
    }

    /// The same link traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.to, self.from, self.base)
    }
}

impl FromStr for LinkKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| DomainError::InvalidLinkKey {
            input: s.to_string(),
            reason,
        };

        let mut parts = s.split('-');
        let (Some(from), Some(to), Some(base), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected three '-' separated parts"));
        };

        let from = from.parse().map_err(|_| invalid("invalid from node"))?;
        let to = to.parse().map_err(|_| invalid("invalid to node"))?;
        let base = match base {
            "0" => BaseFlag::Skeleton,
            "1" => BaseFlag::Base,
            _ => return Err(invalid("base flag must be 0 or 1")),
        };

        Ok(Self::new(NodeId(from), NodeId(to), base))
    }
}

impl TryFrom<String> for LinkKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LinkKey> for String {
    fn from(key: LinkKey) -> Self {
        key.to_string()
    }
}

impl fmt::Debug for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkKey({self})")
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.from, self.to, self.base.digit())
    }
}

/// Compass bearing of a link, from its first to its last vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bearing {
    E,
    NE,
    N,
    NW,
    W,
    SW,
    S,
    SE,
}

impl Bearing {
    // Counter-clockwise from east; index math below depends on this order.
    const SECTORS: [Bearing; 8] = [
        Bearing::E,
        Bearing::NE,
        Bearing::N,
        Bearing::NW,
        Bearing::W,
        Bearing::SW,
        Bearing::S,
        Bearing::SE,
    ];

    /// Bearing of the straight line from `a` to `b`.
    ///
    /// Each direction covers a 45° sector centred on it.
    pub fn between(a: NodePoint, b: NodePoint) -> Self {
        let angle = (b.y() - a.y()).atan2(b.x() - a.x()).to_degrees();
        let index = ((angle + 22.5).rem_euclid(360.0) / 45.0).floor() as usize;
        Self::SECTORS[index % 8]
    }
}

/// A directed link of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// From-node id. `None` for freshly drawn links that have not been
    /// through a reconciliation pass.
    pub from_node: Option<NodeId>,

    /// To-node id, `None` as for `from_node`.
    pub to_node: Option<NodeId>,

    pub base_flag: BaseFlag,

    /// Ordered vertex sequence, first vertex at the from-node.
    pub geometry: LineString<f64>,

    /// Link length in network units (miles). Zero means "derive from
    /// geometry".
    pub length: f64,

    #[serde(default)]
    pub bearing: Option<Bearing>,

    /// Domain attributes the engine carries but does not interpret.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Link {
    /// Create a link with no attributes and no bearing.
    pub fn new(
        from_node: Option<NodeId>,
        to_node: Option<NodeId>,
        base_flag: BaseFlag,
        vertices: Vec<(f64, f64)>,
        length: f64,
    ) -> Self {
        Self {
            from_node,
            to_node,
            base_flag,
            geometry: LineString::from(vertices),
            length,
            bearing: None,
            attributes: BTreeMap::new(),
        }
    }

    /// The link's key, if both endpoints carry ids.
    pub fn key(&self) -> Option<LinkKey> {
        Some(LinkKey::new(self.from_node?, self.to_node?, self.base_flag))
    }

    /// The vertex sequence.
    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.geometry.0
    }

    /// First vertex.
    pub fn first_point(&self) -> Option<NodePoint> {
        self.geometry.0.first().map(|c| NodePoint::from(*c))
    }

    /// Last vertex.
    pub fn last_point(&self) -> Option<NodePoint> {
        self.geometry.0.last().map(|c| NodePoint::from(*c))
    }

    /// Planar length of the vertex sequence, in coordinate units.
    pub fn geometric_length(&self) -> f64 {
        Euclidean.length(&self.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> LinkKey {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_roundtrip() {
        assert_eq!(key("1-2-1").to_string(), "1-2-1");
        assert_eq!(key("30-9-0").base, BaseFlag::Skeleton);
    }

    #[test]
    fn reject_malformed_keys() {
        assert!("".parse::<LinkKey>().is_err());
        assert!("1-2".parse::<LinkKey>().is_err());
        assert!("1-2-1-4".parse::<LinkKey>().is_err());
        assert!("a-2-1".parse::<LinkKey>().is_err());
        assert!("1-2-3".parse::<LinkKey>().is_err());
        assert!("1--1".parse::<LinkKey>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&key("5001-5002-1")).unwrap();
        assert_eq!(json, "\"5001-5002-1\"");

        let back: LinkKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key("5001-5002-1"));

        assert!(serde_json::from_str::<LinkKey>("\"bogus\"").is_err());
    }

    #[test]
    fn reversed_key() {
        assert_eq!(key("1-2-1").reversed(), key("2-1-1"));
    }

    #[test]
    fn link_key_requires_both_ids() {
        let mut link = Link::new(
            Some(NodeId(1)),
            None,
            BaseFlag::Base,
            vec![(0.0, 0.0), (1.0, 0.0)],
            1.0,
        );
        assert!(link.key().is_none());

        link.to_node = Some(NodeId(2));
        assert_eq!(link.key(), Some(key("1-2-1")));
    }

    #[test]
    fn endpoints_and_length() {
        let link = Link::new(
            None,
            None,
            BaseFlag::Base,
            vec![(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)],
            0.0,
        );
        assert_eq!(link.first_point(), Some(NodePoint::new(0.0, 0.0)));
        assert_eq!(link.last_point(), Some(NodePoint::new(3.0, 10.0)));
        assert_eq!(link.geometric_length(), 11.0);
        assert_eq!(link.vertices().len(), 3);
    }

    #[test]
    fn bearing_sectors() {
        let o = NodePoint::new(0.0, 0.0);
        assert_eq!(Bearing::between(o, NodePoint::new(1.0, 0.0)), Bearing::E);
        assert_eq!(Bearing::between(o, NodePoint::new(1.0, 1.0)), Bearing::NE);
        assert_eq!(Bearing::between(o, NodePoint::new(0.0, 1.0)), Bearing::N);
        assert_eq!(Bearing::between(o, NodePoint::new(-1.0, 1.0)), Bearing::NW);
        assert_eq!(Bearing::between(o, NodePoint::new(-1.0, 0.0)), Bearing::W);
        assert_eq!(Bearing::between(o, NodePoint::new(-1.0, -1.0)), Bearing::SW);
        assert_eq!(Bearing::between(o, NodePoint::new(0.0, -1.0)), Bearing::S);
        assert_eq!(Bearing::between(o, NodePoint::new(1.0, -1.0)), Bearing::SE);
    }

    #[test]
    fn bearing_sector_edges() {
        let o = NodePoint::new(0.0, 0.0);
        // 20 degrees is still east, 25 degrees is north-east
        let a20 = 20f64.to_radians();
        let a25 = 25f64.to_radians();
        assert_eq!(
            Bearing::between(o, NodePoint::new(a20.cos(), a20.sin())),
            Bearing::E
        );
        assert_eq!(
            Bearing::between(o, NodePoint::new(a25.cos(), a25.sin())),
            Bearing::NE
        );
        // Just below east wraps to E, not SE
        assert_eq!(
            Bearing::between(o, NodePoint::new(1.0, -0.1)),
            Bearing::E
        );
    }
}
