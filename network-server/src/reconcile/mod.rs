//! Network reconciliation pass.
//!
//! After links have been edited (endpoints moved, vertices added, links split
//! or drawn fresh) a pass re-derives node identity from link geometry, works
//! out which links were split and how, and rewrites every route system so it
//! only references links that exist.
//!
//! The pass runs in stages over an in-memory copy of the network:
//!
//! 1. validate the edited links
//! 2. extract endpoint observations
//! 3. resolve node ids and detect splits
//! 4. rewrite link endpoints and derived attributes, order split pieces
//! 5. rebuild route systems
//!
//! Any fatal problem aborts the pass before the store is touched.
//!
//! Separately, [`run_route_maintenance`] recomputes measures and repairs
//! schedules for one route system.

mod attributes;
mod config;
mod error;
mod geometry;
mod identity;
mod itinerary;
mod maintain;
mod split;
mod validate;

pub use config::{ConfigError, ReconcileConfig, RouteSystemDef};
pub use error::{Conflict, LinkProblem, ReconcileError, RouteWarning};
pub use geometry::{EndpointObservation, EndpointRole, Observations, observe_endpoints};
pub use identity::{Resolution, resolve};
pub use itinerary::rebuild_route_system;
pub use maintain::{MaintenanceReport, maintain_route_system, run_route_maintenance};
pub use split::{SplitMapping, SplitSegment, apportion_splits};
pub use validate::validate_links;

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::domain::{Link, LinkKey, NetworkSnapshot, NodeId};
use crate::store::{NetworkStore, StoreError};

/// Result of reconciling a snapshot in memory.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// The rebuilt network.
    pub snapshot: NetworkSnapshot,

    /// How each split link was replaced.
    pub splits: SplitMapping,

    /// Node ids drawn from the pool.
    pub allocated: Vec<NodeId>,

    /// Routes and records that were dropped.
    pub warnings: Vec<RouteWarning>,
}

/// Outcome of a full read-reconcile-commit pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Whether anything was written. False when the network was already
    /// consistent.
    pub committed: bool,

    pub warnings: Vec<RouteWarning>,

    /// Number of new node ids.
    pub allocated: usize,

    /// Number of links found split.
    pub splits: usize,
}

/// Failure of a full pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("network store error: {0}")]
    Store(#[from] StoreError),

    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Reconcile an edited snapshot.
///
/// Pure: the input is not modified and nothing is persisted.
pub fn reconcile(
    config: &ReconcileConfig,
    snapshot: &NetworkSnapshot,
) -> Result<Reconciled, ReconcileError> {
    for system in &snapshot.route_systems {
        match config.route_system(&system.name) {
            Some(def) if def.kind == system.kind => {}
            _ => return Err(ReconcileError::UnknownRouteSystem(system.name.clone())),
        }
    }

    validate_links(config, &snapshot.links)?;

    let observations = observe_endpoints(&snapshot.links);
    let resolution = resolve(config, &observations, &snapshot.nodes)?;

    let stale_keys: Vec<Option<LinkKey>> = snapshot.links.iter().map(Link::key).collect();
    let mut links = snapshot.links.clone();
    attributes::assign_endpoints(&mut links, &resolution);
    attributes::check_unique_keys(&links)?;
    attributes::derive_geometry_attributes(config, &mut links);
    let splits = apportion_splits(&resolution.splits, &links, &stale_keys)?;
    attributes::check_park_and_rides(config, &snapshot.park_and_rides, &resolution.nodes)?;

    let by_key: HashMap<LinkKey, &Link> =
        links.iter().filter_map(|l| Some((l.key()?, l))).collect();

    let mut warnings = Vec::new();
    let mut route_systems = Vec::with_capacity(snapshot.route_systems.len());
    for system in &snapshot.route_systems {
        let (rebuilt, system_warnings) = rebuild_route_system(system, &splits, &by_key);
        route_systems.push(rebuilt);
        warnings.extend(system_warnings);
    }

    info!(
        links = links.len(),
        nodes = resolution.nodes.len(),
        splits = splits.len(),
        warnings = warnings.len(),
        "reconciled network"
    );

    Ok(Reconciled {
        snapshot: NetworkSnapshot {
            links,
            nodes: resolution.nodes,
            route_systems,
            park_and_rides: snapshot.park_and_rides.clone(),
        },
        splits,
        allocated: resolution.allocated,
        warnings,
    })
}

/// Read the network from `store`, reconcile it and commit the result.
///
/// Nothing is written when reconciliation fails or changes nothing.
pub fn run_pass<S: NetworkStore + ?Sized>(
    config: &ReconcileConfig,
    store: &mut S,
) -> Result<PassReport, PassError> {
    let snapshot = store.read_snapshot(&config.route_systems)?;
    let reconciled = reconcile(config, &snapshot)?;

    let committed = if reconciled.snapshot == snapshot {
        info!("network already consistent; nothing to commit");
        false
    } else {
        store.commit(&reconciled.snapshot)?;
        true
    };

    Ok(PassReport {
        committed,
        allocated: reconciled.allocated.len(),
        splits: reconciled.splits.len(),
        warnings: reconciled.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BaseFlag, Bearing, ItineraryRecord, Node, NodePoint, Route, RouteSystem, RouteSystemKind,
    };
    use crate::store::MemoryStore;

    fn config() -> ReconcileConfig {
        let mut config = ReconcileConfig::new(100, 199);
        config.centroid_max_id = 50;
        config
    }

    fn key(a: u32, b: u32) -> LinkKey {
        LinkKey::new(NodeId(a), NodeId(b), BaseFlag::Base)
    }

    fn link(a: u32, b: u32, from: (f64, f64), to: (f64, f64), length: f64) -> Link {
        Link::new(Some(NodeId(a)), Some(NodeId(b)), BaseFlag::Base, vec![from, to], length)
    }

    /// A three-node line 100 - 101 - 102 with one bus route over it, where
    /// 100-101 has just been split 60/40.
    fn edited_network() -> NetworkSnapshot {
        NetworkSnapshot {
            links: vec![
                link(100, 101, (0.0, 0.0), (6.0, 0.0), 3.0),
                link(100, 101, (6.0, 0.0), (10.0, 0.0), 2.0),
                link(101, 102, (10.0, 0.0), (10.0, 10.0), 2.0),
            ],
            nodes: vec![
                Node::new(NodeId(100), NodePoint::new(0.0, 0.0)),
                Node::new(NodeId(101), NodePoint::new(10.0, 0.0)),
                Node::new(NodeId(102), NodePoint::new(10.0, 10.0)),
            ],
            route_systems: vec![RouteSystem::new(
                "bus_future",
                RouteSystemKind::Measured,
                vec![Route::new(
                    "R1",
                    vec![
                        ItineraryRecord::new(key(100, 101), 1).with_measures(0.0, 70.0, 7.0),
                        ItineraryRecord::new(key(101, 102), 2).with_measures(70.0, 100.0, 3.0),
                    ],
                )],
            )],
            park_and_rides: vec![NodeId(102)],
        }
    }

    #[test]
    fn split_link_end_to_end() {
        let reconciled = reconcile(&config(), &edited_network()).unwrap();

        assert_eq!(reconciled.allocated, vec![NodeId(103)]);
        assert!(reconciled.warnings.is_empty());

        let keys: Vec<_> = reconciled
            .snapshot
            .links
            .iter()
            .map(|l| l.key().unwrap())
            .collect();
        assert_eq!(keys, vec![key(100, 103), key(103, 101), key(101, 102)]);
        assert!((reconciled.snapshot.links[0].length - 3.0).abs() < 1e-9);
        assert_eq!(reconciled.snapshot.links[2].bearing, Some(Bearing::N));

        let segments = reconciled.splits.get(&key(100, 101)).unwrap();
        assert_eq!(segments.len(), 2);

        let itin = &reconciled.snapshot.route_systems[0].routes[0].itinerary;
        let summary: Vec<_> = itin
            .iter()
            .map(|r| (r.link, r.sequence_index, r.measures.unwrap().to_measure))
            .collect();
        assert_eq!(summary[0].0, key(100, 103));
        assert!((summary[0].2 - 42.0).abs() < 1e-9);
        assert_eq!((summary[1].0, summary[1].1), (key(103, 101), 2));
        assert_eq!((summary[2].0, summary[2].1), (key(101, 102), 3));

        assert_eq!(reconciled.snapshot.nodes.len(), 4);
    }

    #[test]
    fn stored_piece_lengths_drive_the_split() {
        // drawn as equal halves, but coded 60 and 40 long
        let mut network = edited_network();
        network.links[0] = link(100, 101, (0.0, 0.0), (5.0, 0.0), 60.0);
        network.links[1] = link(100, 101, (5.0, 0.0), (10.0, 0.0), 40.0);
        network.route_systems[0].routes[0].itinerary[0] =
            ItineraryRecord::new(key(100, 101), 1).with_measures(20.0, 80.0, 10.0);

        let reconciled = reconcile(&config(), &network).unwrap();

        let lengths: Vec<f64> = reconciled.snapshot.links.iter().map(|l| l.length).collect();
        assert_eq!(lengths, vec![60.0, 40.0, 2.0]);

        let itin = &reconciled.snapshot.route_systems[0].routes[0].itinerary;
        let m0 = itin[0].measures.unwrap();
        let m1 = itin[1].measures.unwrap();
        assert!((m0.from_measure - 20.0).abs() < 1e-9);
        assert!((m0.to_measure - 56.0).abs() < 1e-9);
        assert!((m1.from_measure - 56.0).abs() < 1e-9);
        assert!((m1.to_measure - 80.0).abs() < 1e-9);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let config = config();
        let first = reconcile(&config, &edited_network()).unwrap();
        let second = reconcile(&config, &first.snapshot).unwrap();

        assert_eq!(second.snapshot, first.snapshot);
        assert!(second.allocated.is_empty());
        assert!(second.splits.is_empty());
        assert!(second.warnings.is_empty());
    }

    #[test]
    fn run_pass_commits_once() {
        let config = config();
        let mut store = MemoryStore::new(edited_network());

        let report = run_pass(&config, &mut store).unwrap();
        assert!(report.committed);
        assert_eq!(report.allocated, 1);
        assert_eq!(report.splits, 1);
        assert_eq!(store.commit_count(), 1);

        let report = run_pass(&config, &mut store).unwrap();
        assert!(!report.committed);
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn fatal_error_leaves_store_untouched() {
        let mut config = config();
        config.max_node_id = 102;
        let mut store = MemoryStore::new(edited_network());

        let err = run_pass(&config, &mut store).unwrap_err();

        assert!(matches!(
            err,
            PassError::Reconcile(ReconcileError::IdPoolExhausted { min: 100, max: 102 })
        ));
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.snapshot(), &edited_network());
    }

    #[test]
    fn route_warnings_do_not_block_commit() {
        let mut network = edited_network();
        network.route_systems.push(RouteSystem::new(
            "hwyproj",
            RouteSystemKind::Project,
            vec![Route::new("P1", vec![ItineraryRecord::new(key(150, 151), 1)])],
        ));
        let mut store = MemoryStore::new(network);

        let report = run_pass(&config(), &mut store).unwrap();

        assert!(report.committed);
        assert_eq!(report.warnings.len(), 2);
        let hwyproj = store.snapshot().route_system("hwyproj").unwrap();
        assert!(hwyproj.routes.is_empty());
    }

    #[test]
    fn unconfigured_route_system() {
        let mut network = edited_network();
        network.route_systems[0].kind = RouteSystemKind::Scheduled;

        let err = reconcile(&config(), &network).unwrap_err();

        assert_eq!(err, ReconcileError::UnknownRouteSystem("bus_future".into()));
    }

    #[test]
    fn invalid_links_abort_before_resolution() {
        let mut network = edited_network();
        network.links[2].geometry.0.truncate(1);

        let err = reconcile(&config(), &network).unwrap_err();

        assert!(matches!(err, ReconcileError::InvalidLinks(problems) if problems.len() == 1));
    }

    #[test]
    fn park_and_ride_on_removed_node() {
        let mut network = edited_network();
        network.park_and_rides.push(NodeId(199));

        let err = reconcile(&config(), &network).unwrap_err();

        assert_eq!(err, ReconcileError::MissingParkAndRideNodes(vec![NodeId(199)]));
    }

    #[test]
    fn new_link_between_existing_nodes() {
        let mut network = edited_network();
        network.links.push(Link::new(
            None,
            None,
            BaseFlag::Skeleton,
            vec![(0.0, 0.0), (10.0, 10.0)],
            0.0,
        ));

        let reconciled = reconcile(&config(), &network).unwrap();

        let added = &reconciled.snapshot.links[3];
        assert_eq!(
            added.key(),
            Some(LinkKey::new(NodeId(100), NodeId(102), BaseFlag::Skeleton))
        );
        assert_eq!(added.bearing, Some(Bearing::NE));
        assert!(added.length > 0.0);
    }
}
