//! Domain types for the link–node network.
//!
//! This module contains the core model: nodes, links, route systems and
//! their itineraries. Keys and coordinates are small value types that can be
//! hashed and ordered, so the reconciliation engine can group by them
//! directly.

mod error;
mod link;
mod node;
mod route;
mod snapshot;

pub use error::DomainError;
pub use link::{BaseFlag, Bearing, Link, LinkKey};
pub use node::{Node, NodeId, NodePoint};
pub use route::{ItineraryRecord, Measures, Route, RouteSystem, RouteSystemKind, Schedule};
pub use snapshot::NetworkSnapshot;
