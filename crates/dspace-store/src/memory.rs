//! In-memory store implementation

use crate::error::{StoreError, StoreResult};
use crate::event::{WatchEvent, WatchEventType};
use crate::traits::{ResourceStore, WatchStream};
use async_trait::async_trait;
use dspace_types::{Document, Kind, NamespacedName, ResourceRef};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

type ObjectKey = (Kind, NamespacedName);

/// In-memory store with optimistic concurrency and per-kind change feeds
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<ObjectKey, Document>>>,
    feeds: Arc<Mutex<HashMap<Kind, broadcast::Sender<WatchEvent>>>>,
    event_capacity: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Store whose watch feeds buffer up to `capacity` events per kind
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            feeds: Arc::new(Mutex::new(HashMap::new())),
            event_capacity: capacity.max(1),
        }
    }

    fn key(reference: &ResourceRef) -> ObjectKey {
        (reference.kind.clone(), reference.namespaced_name())
    }

    fn sender(&self, kind: &Kind) -> broadcast::Sender<WatchEvent> {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds
            .entry(kind.clone())
            .or_insert_with(|| broadcast::channel(self.event_capacity).0)
            .clone()
    }

    fn publish(&self, kind: &Kind, name: NamespacedName, event_type: WatchEventType) {
        let event = WatchEvent::new(kind.clone(), name, event_type);
        // No subscribers is fine; nobody is interested in this kind yet.
        if self.sender(kind).send(event).is_err() {
            trace!(kind = %kind, "no watchers for event");
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, reference: &ResourceRef) -> StoreResult<Document> {
        let objects = self.objects.read().await;
        objects
            .get(&Self::key(reference))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.resource().to_string()))
    }

    async fn create(&self, mut doc: Document) -> StoreResult<Document> {
        let key = Self::key(&doc.reference());
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "{} already exists",
                doc.reference()
            )));
        }

        doc.uid = Some(Uuid::new_v4());
        doc.resource_version = 1;
        objects.insert(key.clone(), doc.clone());
        debug!(resource = %doc.reference(), "created");
        self.publish(&key.0, key.1, WatchEventType::Added);
        Ok(doc)
    }

    async fn update(&self, mut doc: Document) -> StoreResult<Document> {
        let key = Self::key(&doc.reference());
        let mut objects = self.objects.write().await;
        let current = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(doc.reference().to_string()))?;

        if current.resource_version != doc.resource_version {
            return Err(StoreError::Conflict(format!(
                "{} is at version {}, update was based on {}",
                doc.reference(),
                current.resource_version,
                doc.resource_version
            )));
        }
        if current.body == doc.body {
            return Ok(current.clone());
        }

        doc.uid = current.uid;
        doc.resource_version = current.resource_version + 1;
        objects.insert(key.clone(), doc.clone());
        debug!(resource = %doc.reference(), version = doc.resource_version, "updated");
        self.publish(&key.0, key.1, WatchEventType::Modified);
        Ok(doc)
    }

    async fn delete(&self, reference: &ResourceRef) -> StoreResult<()> {
        let key = Self::key(reference);
        let mut objects = self.objects.write().await;
        if objects.remove(&key).is_none() {
            return Err(StoreError::NotFound(reference.resource().to_string()));
        }
        debug!(resource = %reference.resource(), "deleted");
        self.publish(&key.0, key.1, WatchEventType::Deleted);
        Ok(())
    }

    async fn list(&self, kind: Option<&Kind>) -> StoreResult<Vec<Document>> {
        let objects = self.objects.read().await;
        let mut docs: Vec<Document> = objects
            .iter()
            .filter(|((k, _), _)| kind.map_or(true, |wanted| k == wanted))
            .map(|(_, doc)| doc.clone())
            .collect();
        docs.sort_by(|a, b| (&a.kind, a.id()).cmp(&(&b.kind, b.id())));
        Ok(docs)
    }

    async fn kinds(&self) -> StoreResult<Vec<Kind>> {
        let objects = self.objects.read().await;
        let kinds: BTreeSet<Kind> = objects.keys().map(|(kind, _)| kind.clone()).collect();
        Ok(kinds.into_iter().collect())
    }

    fn watch(&self, kind: &Kind) -> WatchStream {
        self.sender(kind).subscribe()
    }
}
