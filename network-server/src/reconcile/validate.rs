//! Pre-pass link validation.
//!
//! Runs before anything else so a pass either starts from well-formed input
//! or reports every bad link at once.

use serde_json::Value;

use super::config::ReconcileConfig;
use super::error::{LinkProblem, ReconcileError};
use crate::domain::{Link, NodeId};

/// Check every link, returning all problems together.
pub fn validate_links(config: &ReconcileConfig, links: &[Link]) -> Result<(), ReconcileError> {
    let problems: Vec<LinkProblem> = links
        .iter()
        .enumerate()
        .flat_map(|(index, link)| {
            link_problems(config, link)
                .into_iter()
                .map(move |reason| LinkProblem {
                    index,
                    key: link.key(),
                    reason,
                })
        })
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        tracing::warn!(count = problems.len(), "links failed validation");
        Err(ReconcileError::InvalidLinks(problems))
    }
}

fn link_problems(config: &ReconcileConfig, link: &Link) -> Vec<String> {
    let mut problems = Vec::new();

    let vertices = link.vertices();
    if vertices.len() < 2 {
        problems.push(format!("has {} vertices, need at least 2", vertices.len()));
    }
    if vertices.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        problems.push("has non-finite coordinates".to_string());
    }

    if !link.length.is_finite() || link.length < 0.0 {
        problems.push(format!("has invalid length {}", link.length));
    }

    match (link.from_node, link.to_node) {
        (Some(_), None) => problems.push("has a from-node but no to-node".to_string()),
        (None, Some(_)) => problems.push("has a to-node but no from-node".to_string()),
        _ => {}
    }

    for id in [link.from_node, link.to_node].into_iter().flatten() {
        if !id_is_valid(config, id) {
            problems.push(format!(
                "endpoint id {id} is outside {}-{} and is not a centroid",
                config.min_node_id, config.max_node_id
            ));
        }
    }

    for name in &config.required_attributes {
        if attribute_is_missing(link.attributes.get(name)) {
            problems.push(format!("missing required attribute {name}"));
        }
    }

    problems
}

fn id_is_valid(config: &ReconcileConfig, id: NodeId) -> bool {
    config.in_pool(id) || config.is_centroid(id)
}

/// Null, empty strings and zero all count as "not coded".
fn attribute_is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}
