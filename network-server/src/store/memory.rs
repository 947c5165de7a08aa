//! In-memory store.

use super::{NetworkStore, StoreError};
use crate::domain::{Link, NetworkSnapshot, Node, NodeId, RouteSystem};

/// A store holding one snapshot in memory. Counts commits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: NetworkSnapshot,
    commits: usize,
}

impl MemoryStore {
    pub fn new(snapshot: NetworkSnapshot) -> Self {
        Self {
            snapshot,
            commits: 0,
        }
    }

    /// The currently stored snapshot.
    pub fn snapshot(&self) -> &NetworkSnapshot {
        &self.snapshot
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl NetworkStore for MemoryStore {
    fn read_links(&self) -> Result<Vec<Link>, StoreError> {
        Ok(self.snapshot.links.clone())
    }

    fn read_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.snapshot.nodes.clone())
    }

    fn read_route_system(&self, name: &str) -> Result<Option<RouteSystem>, StoreError> {
        Ok(self.snapshot.route_system(name).cloned())
    }

    fn read_park_and_rides(&self) -> Result<Vec<NodeId>, StoreError> {
        Ok(self.snapshot.park_and_rides.clone())
    }

    fn commit(&mut self, snapshot: &NetworkSnapshot) -> Result<(), StoreError> {
        self.snapshot = snapshot.clone();
        self.commits += 1;
        Ok(())
    }
}
