//! Mount admission
//!
//! Reviews writes to resource documents before the store accepts them and
//! rejects any write whose mount references would give a resource two paths
//! from the same root. Accepted writes are applied to the mount graph.

use dspace_graph::{GraphError, MultiTree};
use dspace_types::{Document, MountEdge};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub operation: Operation,
    #[serde(default)]
    pub object: Option<Document>,
    #[serde(default)]
    pub old_object: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

type EdgeKey = (String, String);

pub struct MountValidator {
    graph: Arc<RwLock<MultiTree>>,
}

impl MountValidator {
    pub fn new(graph: Arc<RwLock<MultiTree>>) -> Self {
        Self { graph }
    }

    /// Admit or deny one write. Denied writes leave the graph unchanged.
    pub async fn review(&self, request: &AdmissionRequest) -> ValidationResult {
        let mut graph = self.graph.write().await;
        let snapshot = graph.clone();

        let applied = match request.operation {
            Operation::Create => match &request.object {
                Some(object) => apply_edges(&mut graph, object, &BTreeMap::new()),
                None => Err("create without an object".to_string()),
            },
            Operation::Update => match &request.object {
                Some(object) => match request.old_object.as_ref().map(edge_map).transpose() {
                    Ok(old) => apply_edges(&mut graph, object, &old.unwrap_or_default()),
                    Err(e) => Err(e),
                },
                None => Err("update without an object".to_string()),
            },
            Operation::Delete => {
                if let Some(object) = request.old_object.as_ref().or(request.object.as_ref()) {
                    // Deleting a resource the graph never saw is fine.
                    let _ = graph.remove_node(&object.id());
                }
                Ok(())
            }
            Operation::Other => Ok(()),
        };

        match applied {
            Ok(()) => ValidationResult::allowed(),
            Err(message) => {
                *graph = snapshot;
                tracing::info!(operation = ?request.operation, reason = %message, "Admission denied");
                ValidationResult::denied(message)
            }
        }
    }
}

fn edge_map(doc: &Document) -> Result<BTreeMap<EdgeKey, MountEdge>, String> {
    let edges = doc.mount_edges().map_err(|e| e.to_string())?;
    Ok(edges
        .into_iter()
        .map(|edge| ((edge.target.id(), edge.source.to_string()), edge))
        .collect())
}

fn apply_edges(
    graph: &mut MultiTree,
    object: &Document,
    old: &BTreeMap<EdgeKey, MountEdge>,
) -> Result<(), String> {
    let new = edge_map(object)?;

    for key in old.keys().filter(|key| !new.contains_key(*key)) {
        match graph.remove_edge(&key.0, &key.1) {
            Ok(()) | Err(GraphError::EdgeNotFound { .. }) | Err(GraphError::NodeNotFound(_)) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    for ((target, source), edge) in &new {
        graph.add_node(target);
        graph.add_node(source);
        graph
            .add_edge_with(target, source, edge.status, &edge.mode)
            .map_err(|e| match e {
                GraphError::AmbiguousPath { node, root } => format!(
                    "mounting {} in {} would give {} a second path from {}",
                    source, target, node, root
                ),
                other => other.to_string(),
            })?;
        graph
            .set_edge_status(target, source, edge.status)
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}
