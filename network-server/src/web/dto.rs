//! Data transfer objects for web requests and responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{LinkKey, NodeId};
use crate::reconcile::{MaintenanceReport, PassReport, RouteWarning};

/// Result of a reconciliation pass.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    /// Whether the store was written
    pub committed: bool,

    /// Number of new node ids
    pub allocated_nodes: usize,

    /// Number of links found split
    pub split_links: usize,

    /// Routes and records dropped during the rebuild
    pub warnings: Vec<RouteWarning>,

    /// Human-readable form of `warnings`
    pub messages: Vec<String>,
}

/// Result of maintaining one route system.
#[derive(Debug, Serialize)]
pub struct MaintenanceResponse {
    pub system: String,

    /// Whether the store was written
    pub committed: bool,

    /// Number of routes whose records changed
    pub updated_routes: usize,

    /// Routes left unchanged
    pub warnings: Vec<RouteWarning>,

    /// Human-readable form of `warnings`
    pub messages: Vec<String>,
}

/// Request for a shortest path over a caller-supplied graph.
#[derive(Debug, Deserialize)]
pub struct ShortestPathRequest {
    /// Adjacency map: node to `{neighbour: cost}`
    pub graph: HashMap<String, HashMap<String, f64>>,

    pub start: String,
    pub end: String,
}

/// A shortest path over a caller-supplied graph.
#[derive(Debug, Serialize)]
pub struct ShortestPathResponse {
    pub cost: f64,
    pub path: Vec<String>,
}

/// Query for a shortest path over the committed network.
#[derive(Debug, Deserialize)]
pub struct NetworkPathQuery {
    /// Start node id
    pub from: u32,

    /// End node id
    pub to: u32,
}

/// A shortest path over the committed network.
#[derive(Debug, Serialize)]
pub struct NetworkPathResponse {
    /// Total length
    pub cost: f64,

    /// Nodes walked, both ends included
    pub nodes: Vec<NodeId>,

    /// Links walked, in order
    pub links: Vec<LinkKey>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Individual problems, when there are several
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

// Conversion implementations

impl From<PassReport> for ReconcileResponse {
    fn from(report: PassReport) -> Self {
        let messages = report.warnings.iter().map(|w| w.to_string()).collect();
        Self {
            committed: report.committed,
            allocated_nodes: report.allocated,
            split_links: report.splits,
            warnings: report.warnings,
            messages,
        }
    }
}

impl From<MaintenanceReport> for MaintenanceResponse {
    fn from(report: MaintenanceReport) -> Self {
        let messages = report.warnings.iter().map(|w| w.to_string()).collect();
        Self {
            system: report.system,
            committed: report.committed,
            updated_routes: report.updated_routes,
            warnings: report.warnings,
            messages,
        }
    }
}

impl NetworkPathResponse {
    /// Build from a node path. `keys` names the link used between each
    /// pair of consecutive nodes.
    pub fn from_path(
        cost: f64,
        nodes: Vec<NodeId>,
        keys: &HashMap<(NodeId, NodeId), LinkKey>,
    ) -> Self {
        let links = nodes
            .windows(2)
            .filter_map(|w| keys.get(&(w[0], w[1])).copied())
            .collect();
        Self { cost, nodes, links }
    }
}
