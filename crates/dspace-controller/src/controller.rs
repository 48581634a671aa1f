//! Controller runtime
//!
//! A controller drains a queue of [`ReconcileRequest`]s into its
//! [`Reconciler`], running each request as its own task. Concurrency is bounded
//! by a semaphore, failures are requeued with a delay up to a limit, and the
//! loop stops when the shutdown signal flips.

use crate::error::Result;
use crate::mux::{ReconcileRequest, RequestTag};
use crate::watch::KindWatcher;
use async_trait::async_trait;
use dspace_store::ResourceStore;
use dspace_types::Kind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};

#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Kind of the configuration records this reconciler owns
    fn primary_kind(&self) -> Kind;

    async fn reconcile(&self, request: &ReconcileRequest) -> Result<()>;
}

/// Controller runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Maximum reconciliations running at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciles: usize,

    /// Delay before a failed request is retried
    #[serde(default = "default_requeue_delay")]
    pub requeue_delay_ms: u64,

    /// Retries per request key before it is dropped
    #[serde(default = "default_max_requeues")]
    pub max_requeues: u32,

    /// Capacity of the request queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent(),
            requeue_delay_ms: default_requeue_delay(),
            max_requeues: default_max_requeues(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}

fn default_requeue_delay() -> u64 {
    500
}

fn default_max_requeues() -> u32 {
    5
}

fn default_queue_capacity() -> usize {
    1024
}

/// Request queue feeding one controller
pub struct RequestQueue {
    sender: mpsc::Sender<ReconcileRequest>,
    receiver: mpsc::Receiver<ReconcileRequest>,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self { sender, receiver }
    }

    pub fn sender(&self) -> mpsc::Sender<ReconcileRequest> {
        self.sender.clone()
    }
}

pub struct Controller<R: Reconciler> {
    reconciler: Arc<R>,
    store: Arc<dyn ResourceStore>,
    watcher: Arc<dyn KindWatcher>,
    config: ControllerConfig,
    queue: RequestQueue,
}

impl<R: Reconciler> Controller<R> {
    pub fn new(
        reconciler: Arc<R>,
        store: Arc<dyn ResourceStore>,
        watcher: Arc<dyn KindWatcher>,
        config: ControllerConfig,
        queue: RequestQueue,
    ) -> Self {
        Self {
            reconciler,
            store,
            watcher,
            config,
            queue,
        }
    }

    /// Watch the primary kind, queue every existing record, then process
    /// requests until shutdown. In-flight reconciliations finish before this
    /// returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Controller {
            reconciler,
            store,
            watcher,
            config,
            queue,
        } = self;
        let RequestQueue {
            sender,
            mut receiver,
        } = queue;
        let name = reconciler.name().to_string();
        let primary = reconciler.primary_kind();

        watcher.watch(&primary, RequestTag::Primary)?;
        let existing = store.list(Some(&primary)).await?;
        let backlog = sender.clone();
        // Fed alongside the loop below; the backlog may exceed the queue capacity.
        tokio::spawn(async move {
            for doc in existing {
                if backlog
                    .send(ReconcileRequest::primary(doc.namespaced_name()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let permits = config.max_concurrent_reconciles.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let attempts: Arc<Mutex<HashMap<String, u32>>> = Arc::new(Mutex::new(HashMap::new()));

        tracing::info!(controller = %name, kind = %primary, "Controller started");

        loop {
            let request = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = receiver.recv() => match received {
                    Some(request) => request,
                    None => break,
                },
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let reconciler = reconciler.clone();
            let attempts = attempts.clone();
            let sender = sender.clone();
            let config = config.clone();
            let name = name.clone();
            tokio::spawn(async move {
                let key = request.key();
                let outcome = reconciler.reconcile(&request).await;
                drop(permit);

                match outcome {
                    Ok(()) => {
                        attempts.lock().await.remove(&key);
                    }
                    Err(e) if e.is_permanent() => {
                        attempts.lock().await.remove(&key);
                        tracing::error!(controller = %name, request = %key, error = %e, "Reconcile failed permanently");
                    }
                    Err(e) => {
                        let attempt = {
                            let mut attempts = attempts.lock().await;
                            let count = attempts.entry(key.clone()).or_insert(0);
                            *count += 1;
                            *count
                        };
                        if attempt > config.max_requeues {
                            attempts.lock().await.remove(&key);
                            tracing::error!(controller = %name, request = %key, error = %e, attempt, "Giving up on request");
                            return;
                        }
                        tracing::warn!(controller = %name, request = %key, error = %e, attempt, "Reconcile failed, requeueing");
                        tokio::time::sleep(Duration::from_millis(config.requeue_delay_ms)).await;
                        let _ = sender.send(request).await;
                    }
                }
            });
        }

        let _drain = semaphore.acquire_many(permits as u32).await;
        tracing::info!(controller = %name, "Controller stopped");
        Ok(())
    }
}
