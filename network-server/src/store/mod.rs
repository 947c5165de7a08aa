//! Persisted network state.
//!
//! A pass reads the whole network once through [`NetworkStore`] and writes
//! it back once, all tables together. [`JsonStore`] keeps one JSON file per
//! table in a directory; [`MemoryStore`] backs tests.

mod error;
mod json;
mod memory;

pub use error::StoreError;
pub use json::JsonStore;
pub use memory::MemoryStore;

use tracing::debug;

use crate::domain::{Link, NetworkSnapshot, Node, NodeId, RouteSystem};
use crate::reconcile::RouteSystemDef;

/// Read/commit access to the persisted network.
pub trait NetworkStore {
    fn read_links(&self) -> Result<Vec<Link>, StoreError>;

    fn read_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// A route system by table name, or `None` if the store has no such
    /// table.
    fn read_route_system(&self, name: &str) -> Result<Option<RouteSystem>, StoreError>;

    fn read_park_and_rides(&self) -> Result<Vec<NodeId>, StoreError>;

    /// Replace every table with the snapshot's contents.
    ///
    /// Either all tables are replaced or the prior state stays recoverable.
    fn commit(&mut self, snapshot: &NetworkSnapshot) -> Result<(), StoreError>;

    /// Read everything a pass needs.
    fn read_snapshot(&self, systems: &[RouteSystemDef]) -> Result<NetworkSnapshot, StoreError> {
        let mut route_systems = Vec::with_capacity(systems.len());
        for def in systems {
            match self.read_route_system(&def.name)? {
                Some(system) => route_systems.push(system),
                None => debug!(system = %def.name, "route system not present in store"),
            }
        }

        Ok(NetworkSnapshot {
            links: self.read_links()?,
            nodes: self.read_nodes()?,
            route_systems,
            park_and_rides: self.read_park_and_rides()?,
        })
    }
}
