//! Startup seeding of the in-memory store
//!
//! A seed file holds either a JSON array of documents or a list object with
//! an `items` array, each document in its full object form.

use crate::error::{DaemonError, DaemonResult};
use dspace_store::{ResourceStore, StoreError};
use dspace_types::Document;
use serde_json::Value;
use std::path::Path;

/// Parse seed documents from JSON text
pub fn parse_seed(raw: &str) -> DaemonResult<Vec<Document>> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DaemonError::Seed(format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut list) => match list.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Err(DaemonError::Seed("expected an array or an object with 'items'".into())),
        },
        _ => return Err(DaemonError::Seed("expected an array or an object with 'items'".into())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Document::from_value(item).map_err(|e| DaemonError::Seed(format!("item {}: {}", i, e)))
        })
        .collect()
}

pub async fn load_seed(path: &Path) -> DaemonResult<Vec<Document>> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_seed(&raw)
}

/// Create every document; ones that already exist are skipped. Returns the
/// number created.
pub async fn seed_store(store: &dyn ResourceStore, docs: Vec<Document>) -> DaemonResult<usize> {
    let mut created = 0;
    for doc in docs {
        let id = doc.id();
        let kind = doc.kind.clone();
        match store.create(doc).await {
            Ok(_) => created += 1,
            Err(StoreError::Conflict(_)) => {
                tracing::warn!(kind = %kind, resource = %id, "Seed document already exists, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!(created, "Store seeded");
    Ok(created)
}
