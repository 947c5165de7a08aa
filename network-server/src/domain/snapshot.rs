//! Whole-network snapshot.

use serde::{Deserialize, Serialize};

use super::{Link, Node, NodeId, RouteSystem};

/// Everything a reconciliation pass reads and writes back.
///
/// A snapshot is read in full from the store, rebuilt in memory, and
/// committed as a unit; nothing is mutated record-by-record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub links: Vec<Link>,
    pub nodes: Vec<Node>,
    pub route_systems: Vec<RouteSystem>,

    /// Nodes referenced by the park-and-ride table.
    #[serde(default)]
    pub park_and_rides: Vec<NodeId>,
}

impl NetworkSnapshot {
    /// Look up a route system by name.
    pub fn route_system(&self, name: &str) -> Option<&RouteSystem> {
        self.route_systems.iter().find(|rs| rs.name == name)
    }
}
