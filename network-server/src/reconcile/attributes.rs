//! Derived link attributes.
//!
//! After identities are resolved, every link's endpoint ids, key, bearing
//! and (when missing) length are recomputed from its geometry.

use std::collections::{BTreeMap, HashSet};

use geo_types::Coord;
use tracing::debug;

use super::config::ReconcileConfig;
use super::error::{Conflict, ReconcileError};
use super::identity::Resolution;
use crate::domain::{Bearing, Link, LinkKey, Node, NodeId};

/// Rewrite each link's endpoint ids from the resolution, moving snapped
/// endpoints onto their node.
pub fn assign_endpoints(links: &mut [Link], resolution: &Resolution) {
    for link in links.iter_mut() {
        if let Some(first) = link.first_point() {
            link.from_node = resolution.id_at(&first);
            if let Some(c) = link.geometry.0.first_mut() {
                *c = Coord::from(resolution.location_of(&first));
            }
        }
        if let Some(last) = link.last_point() {
            link.to_node = resolution.id_at(&last);
            if let Some(c) = link.geometry.0.last_mut() {
                *c = Coord::from(resolution.location_of(&last));
            }
        }
    }
}

/// Fail if two links resolve to the same key.
pub fn check_unique_keys(links: &[Link]) -> Result<(), ReconcileError> {
    let mut counts: BTreeMap<LinkKey, usize> = BTreeMap::new();
    for key in links.iter().filter_map(Link::key) {
        *counts.entry(key).or_default() += 1;
    }

    let conflicts: Vec<Conflict> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, count)| Conflict::DuplicateLinkKey { key, count })
        .collect();

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::Consistency(conflicts))
    }
}

/// Recompute bearings, and lengths for links stored with length zero.
pub fn derive_geometry_attributes(config: &ReconcileConfig, links: &mut [Link]) {
    let mut lengths_derived = 0;
    for link in links.iter_mut() {
        if let (Some(first), Some(last)) = (link.first_point(), link.last_point()) {
            link.bearing = Some(Bearing::between(first, last));
        }
        if link.length == 0.0 {
            link.length = link.geometric_length() * config.length_units_per_coordinate_unit;
            lengths_derived += 1;
        }
    }
    debug!(lengths_derived, "derived link attributes");
}

/// Every park-and-ride must reference a resolved node that is not a
/// centroid.
pub fn check_park_and_rides(
    config: &ReconcileConfig,
    park_and_rides: &[NodeId],
    nodes: &[Node],
) -> Result<(), ReconcileError> {
    let existing: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();

    let mut missing: Vec<NodeId> = park_and_rides
        .iter()
        .filter(|id| !existing.contains(id) || config.is_centroid(**id))
        .copied()
        .collect();
    missing.sort();
    missing.dedup();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::MissingParkAndRideNodes(missing))
    }
}
