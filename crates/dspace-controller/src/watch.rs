//! Per-kind watch registration
//!
//! A [`StoreWatcher`] turns a store's change feed for one kind into tagged
//! reconcile requests on a controller's queue.

use crate::error::{ControllerError, Result};
use crate::mux::{ReconcileRequest, RequestTag};
use dspace_store::ResourceStore;
use dspace_types::Kind;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};

pub trait KindWatcher: Send + Sync {
    /// Start routing changes of `kind` to the queue as `tag` requests
    fn watch(&self, kind: &Kind, tag: RequestTag) -> Result<()>;
}

pub struct StoreWatcher {
    store: Arc<dyn ResourceStore>,
    queue: mpsc::Sender<ReconcileRequest>,
    shutdown: watch::Receiver<bool>,
}

impl StoreWatcher {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        queue: mpsc::Sender<ReconcileRequest>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            queue,
            shutdown,
        }
    }
}

impl KindWatcher for StoreWatcher {
    fn watch(&self, kind: &Kind, tag: RequestTag) -> Result<()> {
        if self.queue.is_closed() {
            return Err(ControllerError::Watch(format!(
                "queue closed, cannot watch {}",
                kind
            )));
        }

        let mut events = self.store.watch(kind);
        let queue = self.queue.clone();
        let mut shutdown = self.shutdown.clone();
        let kind = kind.clone();

        tracing::debug!(kind = %kind, tag = tag.as_str(), "Watch registered");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    received = events.recv() => match received {
                        Ok(event) => {
                            let request = ReconcileRequest { tag, name: event.name };
                            if queue.send(request).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(kind = %kind, missed, "Watch lagged, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            tracing::debug!(kind = %kind, "Watch stopped");
        });

        Ok(())
    }
}
