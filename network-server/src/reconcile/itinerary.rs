//! Route itinerary rebuilding.
//!
//! Records that reference a split link are replaced by one record per piece,
//! and everything after them in the route is renumbered to make room.
//! Position, time and service-time fields are divided between the pieces in
//! proportion to their length.

use std::collections::HashMap;

use geo_types::MultiLineString;
use tracing::{debug, warn};

use super::error::RouteWarning;
use super::split::{SplitMapping, SplitSegment};
use crate::domain::{ItineraryRecord, Link, LinkKey, Route, RouteSystem, RouteSystemKind};

/// Rebuild every route of a system against the reconciled link set.
///
/// Routes that cannot be rebuilt are left out of the returned system and
/// reported as warnings.
pub fn rebuild_route_system(
    system: &RouteSystem,
    mapping: &SplitMapping,
    links: &HashMap<LinkKey, &Link>,
) -> (RouteSystem, Vec<RouteWarning>) {
    let mut warnings = Vec::new();
    let mut routes = Vec::with_capacity(system.routes.len());

    for route in &system.routes {
        match rebuild_route(system, route, mapping, links, &mut warnings) {
            Ok(rebuilt) => routes.push(rebuilt),
            Err(warning) => warnings.push(warning),
        }
    }

    for warning in &warnings {
        warn!(system = %system.name, "{warning}");
    }
    debug!(
        system = %system.name,
        kept = routes.len(),
        dropped = system.routes.len() - routes.len(),
        "rebuilt route system"
    );

    (
        RouteSystem::new(system.name.clone(), system.kind, routes),
        warnings,
    )
}

fn rebuild_route(
    system: &RouteSystem,
    route: &Route,
    mapping: &SplitMapping,
    links: &HashMap<LinkKey, &Link>,
    warnings: &mut Vec<RouteWarning>,
) -> Result<Route, RouteWarning> {
    let mut records: Vec<&ItineraryRecord> = route.itinerary.iter().collect();
    records.sort_by_key(|r| r.sequence_index);

    let mut rebuilt = Vec::with_capacity(records.len());
    let mut missing = Vec::new();
    let mut bump = 0;

    for record in records {
        if let Some(segments) = mapping.get(&record.link) {
            rebuilt.extend(split_record(record, segments, &mut bump));
        } else if links.contains_key(&record.link) {
            let mut kept = record.clone();
            kept.sequence_index += bump;
            rebuilt.push(kept);
        } else if system.kind == RouteSystemKind::Project {
            warnings.push(RouteWarning::RecordDropped {
                system: system.name.clone(),
                route_id: route.route_id.clone(),
                link: record.link,
            });
        } else {
            missing.push(record.link);
        }
    }

    if !missing.is_empty() || rebuilt.is_empty() {
        return Err(RouteWarning::RouteNotRebuilt {
            system: system.name.clone(),
            route_id: route.route_id.clone(),
            missing,
        });
    }

    rebuilt.sort_by_key(|r| r.sequence_index);
    let geometry = MultiLineString::new(
        rebuilt
            .iter()
            .filter_map(|r| links.get(&r.link).map(|l| l.geometry.clone()))
            .collect(),
    );

    Ok(Route {
        route_id: route.route_id.clone(),
        attributes: route.attributes.clone(),
        itinerary: rebuilt,
        geometry: Some(geometry),
    })
}

/// Replace a record on a split link with one record per piece.
///
/// `bump` counts the records inserted so far in this route; every piece
/// after the first takes one more slot.
fn split_record(
    record: &ItineraryRecord,
    segments: &[SplitSegment],
    bump: &mut u32,
) -> Vec<ItineraryRecord> {
    let original = record.link;
    let backwards = record.runs_against(original.from, original.to);

    let ordered: Vec<&SplitSegment> = if backwards {
        segments.iter().rev().collect()
    } else {
        segments.iter().collect()
    };

    ordered
        .into_iter()
        .map(|segment| {
            let (from, to, start) = if backwards {
                (segment.key.to, segment.key.from, 1.0 - segment.end_ratio())
            } else {
                (segment.key.from, segment.key.to, segment.start_ratio)
            };
            let end = start + segment.length_ratio;
            let at_origin = from == record.itin_from;
            let at_destination = to == record.itin_to;

            if !at_origin {
                *bump += 1;
            }

            let mut piece = record.clone();
            piece.link = segment.key;
            piece.itin_from = from;
            piece.itin_to = to;
            piece.sequence_index = record.sequence_index + *bump;

            if let (Some(m), Some(orig)) = (piece.measures.as_mut(), record.measures) {
                let span = orig.to_measure - orig.from_measure;
                m.service_time = orig.service_time * segment.length_ratio;
                if !at_origin {
                    m.from_measure = orig.from_measure + span * start;
                }
                if !at_destination {
                    m.to_measure = orig.from_measure + span * end;
                }
            }

            if let (Some(s), Some(orig)) = (piece.schedule.as_mut(), record.schedule) {
                let span = orig.arrival - orig.departure;
                if !at_origin {
                    s.departure = orig.departure + span * start;
                }
                if !at_destination {
                    s.arrival = orig.departure + span * end;
                    // layover only happens at the original stop
                    s.layover = 0.0;
                }
            }

            piece
        })
        .collect()
}
