//! Mount graph discovery
//!
//! Rebuilds the mount graph from the mount references already persisted in
//! the store. Runs once at startup before any mount is admitted.

use crate::error::Result;
use dspace_graph::{EdgeOutcome, MultiTree};
use dspace_store::ResourceStore;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Documents scanned
    pub documents: usize,
    /// Nodes in the graph afterwards
    pub nodes: usize,
    /// Edges added
    pub edges: usize,
    /// Documents or edges left out
    pub skipped: usize,
}

pub struct Discovery {
    store: Arc<dyn ResourceStore>,
    graph: Arc<RwLock<MultiTree>>,
    api_groups: Vec<String>,
}

impl Discovery {
    pub fn new(store: Arc<dyn ResourceStore>, graph: Arc<RwLock<MultiTree>>) -> Self {
        Self {
            store,
            graph,
            api_groups: Vec::new(),
        }
    }

    /// Only scan kinds whose `group/version` is listed; empty scans everything
    pub fn with_api_groups(mut self, api_groups: Vec<String>) -> Self {
        self.api_groups = api_groups;
        self
    }

    pub async fn run(&self) -> Result<DiscoveryReport> {
        let docs = self.store.list(None).await?;
        let mut report = DiscoveryReport::default();
        let mut graph = self.graph.write().await;

        for doc in docs {
            if !self.api_groups.is_empty() && !self.api_groups.contains(&doc.kind.api_version()) {
                continue;
            }
            report.documents += 1;

            let target = doc.id();
            graph.add_node(&target);
            let edges = match doc.mount_edges() {
                Ok(edges) => edges,
                Err(e) => {
                    tracing::warn!(resource = %target, kind = %doc.kind, error = %e, "Skipping unreadable mounts");
                    report.skipped += 1;
                    continue;
                }
            };

            for edge in edges {
                let source = edge.source.to_string();
                graph.add_node(&source);
                match graph.add_edge_with(&target, &source, edge.status, &edge.mode) {
                    Ok(EdgeOutcome::Added) => report.edges += 1,
                    Ok(EdgeOutcome::AlreadyExists) => {}
                    Err(e) => {
                        tracing::warn!(target = %target, source = %source, error = %e, "Skipping mount");
                        report.skipped += 1;
                    }
                }
            }
        }

        report.nodes = graph.len();
        tracing::info!(
            documents = report.documents,
            nodes = report.nodes,
            edges = report.edges,
            skipped = report.skipped,
            "Mount graph discovered"
        );
        Ok(report)
    }
}
