//! Route maintenance: measures and schedule repair for one route system.
//!
//! Run after coding changes to a route (or after a reconciliation pass) to
//! recompute every record's measures from link lengths and to straighten
//! out departure/arrival times. Routes that cannot be repaired are left as
//! they were and reported.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use super::config::ReconcileConfig;
use super::error::{ReconcileError, RouteWarning};
use super::PassError;
use crate::domain::{DomainError, LinkKey, Route, RouteSystem, RouteSystemKind};
use crate::store::NetworkStore;

/// Outcome of maintaining one route system.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub system: String,

    /// Whether anything was written.
    pub committed: bool,

    /// Number of routes whose records changed.
    pub updated_routes: usize,

    /// Routes that were left unchanged because they could not be repaired.
    pub warnings: Vec<RouteWarning>,
}

/// Recompute measures and repair times for every route of `system`.
///
/// Project systems carry neither, so they come back unchanged.
pub fn maintain_route_system(
    config: &ReconcileConfig,
    system: &RouteSystem,
    lengths: &HashMap<LinkKey, f64>,
) -> (RouteSystem, Vec<RouteWarning>) {
    let mut warnings = Vec::new();
    let mut routes = Vec::with_capacity(system.routes.len());

    for route in &system.routes {
        match maintain_route(config, system, route, lengths) {
            Ok(maintained) => routes.push(maintained),
            Err(warning) => {
                warn!(system = %system.name, "{warning}");
                warnings.push(warning);
                routes.push(route.clone());
            }
        }
    }

    (
        RouteSystem::new(system.name.clone(), system.kind, routes),
        warnings,
    )
}

fn maintain_route(
    config: &ReconcileConfig,
    system: &RouteSystem,
    route: &Route,
    lengths: &HashMap<LinkKey, f64>,
) -> Result<Route, RouteWarning> {
    let mut maintained = route.clone();
    maintained.itinerary.sort_by_key(|r| r.sequence_index);

    repair(config, system.kind, &mut maintained, lengths).map_err(|e| {
        RouteWarning::MaintenanceSkipped {
            system: system.name.clone(),
            route_id: route.route_id.clone(),
            reason: e.to_string(),
        }
    })?;

    Ok(maintained)
}

fn repair(
    config: &ReconcileConfig,
    kind: RouteSystemKind,
    route: &mut Route,
    lengths: &HashMap<LinkKey, f64>,
) -> Result<(), DomainError> {
    if kind.has_measures() {
        route.recalculate_measures(lengths)?;
    }
    if kind.has_schedule() {
        route.validate_times(lengths, config.schedule_speed)?;
    }
    Ok(())
}

/// Read the network from `store`, maintain the named route system and
/// commit the result if any route changed.
pub fn run_route_maintenance<S: NetworkStore + ?Sized>(
    config: &ReconcileConfig,
    store: &mut S,
    system_name: &str,
) -> Result<MaintenanceReport, PassError> {
    if config.route_system(system_name).is_none() {
        return Err(ReconcileError::UnknownRouteSystem(system_name.to_string()).into());
    }

    let mut snapshot = store.read_snapshot(&config.route_systems)?;
    let Some(position) = snapshot
        .route_systems
        .iter()
        .position(|s| s.name == system_name)
    else {
        return Err(ReconcileError::UnknownRouteSystem(system_name.to_string()).into());
    };

    let lengths: HashMap<LinkKey, f64> = snapshot
        .links
        .iter()
        .filter_map(|l| Some((l.key()?, l.length)))
        .collect();

    let system = &snapshot.route_systems[position];
    let (maintained, warnings) = maintain_route_system(config, system, &lengths);
    let updated_routes = maintained
        .routes
        .iter()
        .zip(&system.routes)
        .filter(|(after, before)| after != before)
        .count();

    let committed = updated_routes > 0;
    if committed {
        snapshot.route_systems[position] = maintained;
        store.commit(&snapshot)?;
    }

    info!(
        system = system_name,
        updated_routes,
        skipped = warnings.len(),
        committed,
        "maintained route system"
    );

    Ok(MaintenanceReport {
        system: system_name.to_string(),
        committed,
        updated_routes,
        warnings,
    })
}
