//! Reconciliation errors and warnings.
//!
//! Fatal problems abort the pass before anything is written. Per-route
//! problems are collected as [`RouteWarning`]s and returned alongside a
//! successful result.

use std::fmt;

use serde::Serialize;

use crate::domain::{LinkKey, NodeId, NodePoint};

/// A fatal consistency violation found while resolving the network.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// Connected links disagree about the id of their shared endpoint.
    #[error("node at {point} carries conflicting ids {}", join(.ids))]
    DuplicateIds { point: NodePoint, ids: Vec<NodeId> },

    /// Unconnected links share one node id.
    #[error("node id {id} is used at {} locations: {}", .points.len(), join(.points))]
    IdAtMultipleLocations { id: NodeId, points: Vec<NodePoint> },

    /// Two distinct nodes lie closer than the overlap tolerance.
    #[error("nodes {first} and {second} overlap ({distance} apart)")]
    OverlappingNodes {
        first: NodeId,
        second: NodeId,
        distance: f64,
    },

    /// More than one link resolves to the same key.
    #[error("{count} links share key {key}")]
    DuplicateLinkKey { key: LinkKey, count: usize },

    /// The pieces of a split link cannot be ordered into a chain.
    #[error("cannot order split pieces of {key} from node {at}; were any of them flipped?")]
    UnorderableSplit { key: LinkKey, at: NodeId },
}

/// A link that failed input validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkProblem {
    /// Position of the link in the snapshot.
    pub index: usize,

    /// The link's stale key, if it had one.
    pub key: Option<LinkKey>,

    pub reason: String,
}

impl fmt::Display for LinkProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "link #{} ({key}): {}", self.index, self.reason),
            None => write!(f, "link #{}: {}", self.index, self.reason),
        }
    }
}

/// Fatal reconciliation failure. Nothing is committed when one occurs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    /// Links are missing required attributes
    #[error("{} link(s) failed validation: {}", .0.len(), join(.0))]
    InvalidLinks(Vec<LinkProblem>),

    /// Node or link identity is inconsistent
    #[error("{} consistency conflict(s): {}", .0.len(), join(.0))]
    Consistency(Vec<Conflict>),

    /// No ids are left for new nodes
    #[error("all valid node ids ({min}-{max}) are in use; new nodes cannot be assigned an id")]
    IdPoolExhausted { min: u32, max: u32 },

    /// Park-and-ride entries reference nodes that no longer exist
    #[error("park-and-ride references missing or centroid nodes: {}", join(.0))]
    MissingParkAndRideNodes(Vec<NodeId>),

    /// A route system in the snapshot is not configured for this pass
    #[error("route system {0} is not configured")]
    UnknownRouteSystem(String),
}

/// Recoverable per-route problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteWarning {
    /// A project record referenced a deleted link and was removed.
    RecordDropped {
        system: String,
        route_id: String,
        link: LinkKey,
    },

    /// A route could not be rebuilt and was removed from its system.
    RouteNotRebuilt {
        system: String,
        route_id: String,
        missing: Vec<LinkKey>,
    },

    /// Route maintenance could not be applied; the route was left as it was.
    MaintenanceSkipped {
        system: String,
        route_id: String,
        reason: String,
    },
}

impl fmt::Display for RouteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteWarning::RecordDropped {
                system,
                route_id,
                link,
            } => write!(f, "{system} {route_id}: removed deleted link {link}"),
            RouteWarning::RouteNotRebuilt {
                system,
                route_id,
                missing,
            } if missing.is_empty() => {
                write!(f, "{system} {route_id} has no links left and was deleted")
            }
            RouteWarning::RouteNotRebuilt {
                system,
                route_id,
                missing,
            } => write!(
                f,
                "{system} {route_id} cannot be rebuilt because links {} no longer exist; it was deleted",
                join(missing)
            ),
            RouteWarning::MaintenanceSkipped {
                system,
                route_id,
                reason,
            } => write!(f, "{system} {route_id} was left unchanged: {reason}"),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
