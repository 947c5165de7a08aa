//! Configuration for a reconciliation pass.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{NodeId, RouteSystemKind};

/// A route system the pass must rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSystemDef {
    /// Store table name (e.g. `bus_base`).
    pub name: String,
    pub kind: RouteSystemKind,
}

impl RouteSystemDef {
    pub fn new(name: impl Into<String>, kind: RouteSystemKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Error loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Immutable parameters of a reconciliation pass.
///
/// Passed explicitly into the engine so independent passes (e.g. in tests)
/// never share state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Lowest id the node pool may hand out.
    pub min_node_id: u32,

    /// Highest id the node pool may hand out.
    pub max_node_id: u32,

    /// Ids up to and including this value are zone centroids / points of
    /// entry. They are valid link endpoints but never allocated.
    pub centroid_max_id: u32,

    /// Distinct nodes closer than this are a geometric defect.
    pub overlap_tolerance: f64,

    /// A new endpoint this close to an assigned node takes that node's id.
    pub snap_distance: f64,

    /// Warn when fewer than this many ids remain in the pool.
    pub low_pool_warning: usize,

    /// Link attributes that must be present and non-empty.
    pub required_attributes: Vec<String>,

    /// Conversion from coordinate units to length units, used when a link
    /// has no stored length.
    pub length_units_per_coordinate_unit: f64,

    /// Speed, in length units per hour, used to estimate travel time for a
    /// scheduled record whose departure equals its arrival.
    pub schedule_speed: f64,

    /// Route systems rebuilt by the pass, in commit order.
    pub route_systems: Vec<RouteSystemDef>,
}

impl ReconcileConfig {
    /// Create a configuration with the given id pool and default everything
    /// else.
    pub fn new(min_node_id: u32, max_node_id: u32) -> Self {
        Self {
            min_node_id,
            max_node_id,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_node_id > self.max_node_id {
            return Err(ConfigError::Invalid(format!(
                "min_node_id {} exceeds max_node_id {}",
                self.min_node_id, self.max_node_id
            )));
        }
        if self.centroid_max_id >= self.min_node_id {
            return Err(ConfigError::Invalid(format!(
                "centroid_max_id {} overlaps the node id pool starting at {}",
                self.centroid_max_id, self.min_node_id
            )));
        }
        if !(self.overlap_tolerance >= 0.0) || !(self.snap_distance >= 0.0) {
            return Err(ConfigError::Invalid(
                "tolerances must be non-negative".to_string(),
            ));
        }
        if !(self.schedule_speed.is_finite() && self.schedule_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "schedule_speed must be positive, got {}",
                self.schedule_speed
            )));
        }
        Ok(())
    }

    /// Whether `id` lies in the allocatable pool.
    pub fn in_pool(&self, id: NodeId) -> bool {
        (self.min_node_id..=self.max_node_id).contains(&id.get())
    }

    /// Whether `id` is a zone centroid or point of entry.
    pub fn is_centroid(&self, id: NodeId) -> bool {
        id.get() >= 1 && id.get() <= self.centroid_max_id
    }

    /// Look up a route system definition by name.
    pub fn route_system(&self, name: &str) -> Option<&RouteSystemDef> {
        self.route_systems.iter().find(|d| d.name == name)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_node_id: 5001,  // 1-5000 reserved for zone centroids/POEs
            max_node_id: 29999, // 30000+ reserved for rail network nodes
            centroid_max_id: 3649,
            overlap_tolerance: 1e-6,
            snap_distance: 0.25,
            low_pool_warning: 100,
            required_attributes: Vec::new(),
            length_units_per_coordinate_unit: 1.0 / 5280.0, // feet -> miles
            schedule_speed: 30.0,
            route_systems: vec![
                RouteSystemDef::new("hwyproj", RouteSystemKind::Project),
                RouteSystemDef::new("bus_base", RouteSystemKind::Scheduled),
                RouteSystemDef::new("bus_current", RouteSystemKind::Scheduled),
                RouteSystemDef::new("bus_future", RouteSystemKind::Measured),
            ],
        }
    }
}
