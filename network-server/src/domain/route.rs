//! Route systems, routes and itinerary records.

use std::collections::{BTreeMap, HashMap};

use geo_types::MultiLineString;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::link::LinkKey;
use super::node::NodeId;

/// What an itinerary record of a route system carries beyond its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSystemKind {
    /// Highway project coding: links only, no positions or times.
    Project,

    /// Measures and service time, but no wall-clock schedule.
    Measured,

    /// Measures, service time and departure/arrival times.
    Scheduled,
}

impl RouteSystemKind {
    pub fn has_measures(self) -> bool {
        matches!(self, RouteSystemKind::Measured | RouteSystemKind::Scheduled)
    }

    pub fn has_schedule(self) -> bool {
        matches!(self, RouteSystemKind::Scheduled)
    }
}

/// Route-relative position of a record, as percent of route length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measures {
    pub from_measure: f64,
    pub to_measure: f64,

    /// Time spent traversing the link (minutes).
    pub service_time: f64,
}

/// Wall-clock times of a record, in seconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub departure: f64,
    pub arrival: f64,

    /// Dwell at the record's end node, only meaningful at a true stop.
    #[serde(default)]
    pub layover: f64,
}

/// One link traversal within a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryRecord {
    /// The traversed link.
    pub link: LinkKey,

    /// Route-local order, 1-based.
    pub sequence_index: u32,

    /// Node the route enters the link at.
    pub itin_from: NodeId,

    /// Node the route leaves the link at.
    pub itin_to: NodeId,

    #[serde(default)]
    pub measures: Option<Measures>,

    #[serde(default)]
    pub schedule: Option<Schedule>,

    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ItineraryRecord {
    /// A forward traversal of `link` with no measures or schedule.
    pub fn new(link: LinkKey, sequence_index: u32) -> Self {
        Self {
            link,
            sequence_index,
            itin_from: link.from,
            itin_to: link.to,
            measures: None,
            schedule: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_measures(mut self, from_measure: f64, to_measure: f64, service_time: f64) -> Self {
        self.measures = Some(Measures {
            from_measure,
            to_measure,
            service_time,
        });
        self
    }

    pub fn with_schedule(mut self, departure: f64, arrival: f64, layover: f64) -> Self {
        self.schedule = Some(Schedule {
            departure,
            arrival,
            layover,
        });
        self
    }

    /// Traverse the link from its to-node to its from-node.
    pub fn reversed(mut self) -> Self {
        std::mem::swap(&mut self.itin_from, &mut self.itin_to);
        self
    }

    /// Whether this record runs against the direction of the chain `from -> to`.
    pub fn runs_against(&self, from: NodeId, to: NodeId) -> bool {
        self.itin_to == from || self.itin_from == to
    }
}

/// One highway project or one transit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,

    /// Header attributes (project year, headway, ...), carried opaquely.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    pub itinerary: Vec<ItineraryRecord>,

    /// Link geometries in traversal order; merging them into a single line
    /// is left to the spatial backend.
    #[serde(default)]
    pub geometry: Option<MultiLineString<f64>>,
}

impl Route {
    pub fn new(route_id: impl Into<String>, itinerary: Vec<ItineraryRecord>) -> Self {
        Self {
            route_id: route_id.into(),
            attributes: BTreeMap::new(),
            itinerary,
            geometry: None,
        }
    }

    /// Recompute `from_measure`/`to_measure` as cumulative percent of the
    /// route's total link length, so the first record starts at 0 and the
    /// last ends at exactly 100.
    pub fn recalculate_measures(
        &mut self,
        lengths: &HashMap<LinkKey, f64>,
    ) -> Result<(), DomainError> {
        let segment_lengths = self
            .itinerary
            .iter()
            .map(|r| {
                lengths
                    .get(&r.link)
                    .copied()
                    .ok_or(DomainError::UnknownLink(r.link))
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let total: f64 = segment_lengths.iter().sum();
        if total <= 0.0 {
            return Err(DomainError::ZeroLengthRoute(self.route_id.clone()));
        }

        let mut cumulative = 0.0;
        for (record, length) in self.itinerary.iter_mut().zip(segment_lengths) {
            let measures = record.measures.get_or_insert(Measures {
                from_measure: 0.0,
                to_measure: 0.0,
                service_time: 0.0,
            });
            measures.from_measure = cumulative / total * 100.0;
            cumulative += length;
            measures.to_measure = cumulative / total * 100.0;
        }

        Ok(())
    }

    /// Repair departure/arrival times in itinerary order.
    ///
    /// A departure earlier than the previous record's arrival is pushed
    /// forward to it (dragging the arrival along if needed). A record whose
    /// departure equals its arrival gets a travel time estimated from the
    /// link length at `speed` (length units per hour); its service time is
    /// set to that estimate in minutes, rounded to 0.1 with a floor of 0.1.
    pub fn validate_times(
        &mut self,
        lengths: &HashMap<LinkKey, f64>,
        speed: f64,
    ) -> Result<(), DomainError> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(DomainError::InvalidSpeed(speed));
        }

        let mut prev_arrival: Option<f64> = None;

        for record in &mut self.itinerary {
            let Some(schedule) = record.schedule.as_mut() else {
                continue;
            };

            if let Some(prev) = prev_arrival
                && schedule.departure < prev
            {
                schedule.departure = prev;
                if schedule.arrival < schedule.departure {
                    schedule.arrival = schedule.departure;
                }
            }

            if schedule.departure == schedule.arrival {
                let length = lengths
                    .get(&record.link)
                    .copied()
                    .ok_or(DomainError::UnknownLink(record.link))?;
                let estimate = (length / speed * 3600.0).round();
                schedule.arrival += estimate;
                if let Some(measures) = record.measures.as_mut() {
                    measures.service_time = ((estimate / 60.0 * 10.0).round() / 10.0).max(0.1);
                }
            }

            prev_arrival = Some(schedule.arrival);
        }

        Ok(())
    }
}

/// A named collection of routes sharing one itinerary layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSystem {
    pub name: String,
    pub kind: RouteSystemKind,
    pub routes: Vec<Route>,
}

impl RouteSystem {
    pub fn new(name: impl Into<String>, kind: RouteSystemKind, routes: Vec<Route>) -> Self {
        Self {
            name: name.into(),
            kind,
            routes,
        }
    }
}
