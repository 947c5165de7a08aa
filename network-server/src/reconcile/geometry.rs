//! Endpoint extraction.
//!
//! Every link contributes two observations, one for its first vertex and one
//! for its last. The identity resolver groups these by exact coordinate.

use crate::domain::{Link, LinkKey, NodeId, NodePoint};

/// Which end of a link an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    From,
    To,
}

/// One endpoint of one link, as read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointObservation {
    /// Position of the link in the snapshot.
    pub link_index: usize,

    /// The link's key before this pass, if both its ids were set.
    pub stale_key: Option<LinkKey>,

    pub role: EndpointRole,

    /// The id the link carried for this endpoint.
    pub legacy_id: Option<NodeId>,

    pub point: NodePoint,
}

/// From-end and to-end observations of a link set.
#[derive(Debug, Clone, Default)]
pub struct Observations {
    pub from: Vec<EndpointObservation>,
    pub to: Vec<EndpointObservation>,
}

impl Observations {
    /// All observations, from-ends first.
    pub fn iter(&self) -> impl Iterator<Item = &EndpointObservation> {
        self.from.iter().chain(self.to.iter())
    }

    pub fn len(&self) -> usize {
        self.from.len() + self.to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.to.is_empty()
    }
}

/// Extract endpoint observations from every link.
///
/// Links without vertices contribute nothing; the validator rejects them
/// before this runs.
pub fn observe_endpoints(links: &[Link]) -> Observations {
    let mut observations = Observations::default();

    for (link_index, link) in links.iter().enumerate() {
        let stale_key = link.key();
        let (Some(first), Some(last)) = (link.first_point(), link.last_point()) else {
            continue;
        };

        observations.from.push(EndpointObservation {
            link_index,
            stale_key,
            role: EndpointRole::From,
            legacy_id: link.from_node,
            point: first,
        });
        observations.to.push(EndpointObservation {
            link_index,
            stale_key,
            role: EndpointRole::To,
            legacy_id: link.to_node,
            point: last,
        });
    }

    observations
}
