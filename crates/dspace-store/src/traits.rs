//! Store trait definition

use crate::error::StoreResult;
use crate::event::WatchEvent;
use async_trait::async_trait;
use dspace_types::{Document, Kind, ResourceRef};
use tokio::sync::broadcast;

/// Receiving end of a per-kind change feed
pub type WatchStream = broadcast::Receiver<WatchEvent>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the current document; any attribute path on the reference is ignored
    async fn get(&self, reference: &ResourceRef) -> StoreResult<Document>;

    /// Store a new document, assigning its uid and first version
    async fn create(&self, doc: Document) -> StoreResult<Document>;

    /// Replace a document. Fails with `Conflict` when `doc.resource_version`
    /// is not the stored version.
    async fn update(&self, doc: Document) -> StoreResult<Document>;

    async fn delete(&self, reference: &ResourceRef) -> StoreResult<()>;

    /// All documents, or only those of `kind`
    async fn list(&self, kind: Option<&Kind>) -> StoreResult<Vec<Document>>;

    /// Kinds with at least one stored document
    async fn kinds(&self) -> StoreResult<Vec<Kind>>;

    /// Subscribe to changes of one kind
    fn watch(&self, kind: &Kind) -> WatchStream;
}
