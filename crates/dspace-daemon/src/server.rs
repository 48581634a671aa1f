//! Server setup and lifecycle management

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use crate::seed;
use dspace_controller::{
    Controller, ControllerConfig, Discovery, MountValidator, Mounter, PolicyController,
    PolicyEngine, Reconciler, RequestQueue, StoreWatcher, SyncController, SyncEngine,
};
use dspace_graph::MultiTree;
use dspace_store::{InMemoryStore, ResourceStore};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// dSpace daemon server
pub struct Server {
    config: DaemonConfig,
    store: Arc<InMemoryStore>,
    graph: Arc<RwLock<MultiTree>>,
}

impl Server {
    pub fn new(config: DaemonConfig) -> Self {
        let store = Arc::new(InMemoryStore::with_event_capacity(config.store.event_capacity));
        Self {
            config,
            store,
            graph: Arc::new(RwLock::new(MultiTree::new())),
        }
    }

    pub fn store(&self) -> Arc<InMemoryStore> {
        self.store.clone()
    }

    pub fn graph(&self) -> Arc<RwLock<MultiTree>> {
        self.graph.clone()
    }

    /// Mount operations against this server's store and graph
    pub fn mounter(&self) -> Mounter {
        Mounter::new(self.store.clone(), self.graph.clone())
    }

    /// Admission reviews against this server's graph
    pub fn validator(&self) -> MountValidator {
        MountValidator::new(self.graph.clone())
    }

    /// Load the seed file, if configured, and rebuild the mount graph
    pub async fn prepare(&self) -> DaemonResult<()> {
        if let Some(path) = &self.config.store.seed_path {
            let docs = seed::load_seed(path).await?;
            tracing::info!(path = %path.display(), documents = docs.len(), "Loading seed");
            seed::seed_store(self.store.as_ref(), docs).await?;
        }

        if self.config.discovery.enabled {
            Discovery::new(self.store.clone(), self.graph.clone())
                .with_api_groups(self.config.discovery.api_groups.clone())
                .run()
                .await?;
        }
        Ok(())
    }

    /// Run until Ctrl+C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the sync and policy controllers until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> DaemonResult<()>
    where
        F: Future<Output = ()>,
    {
        self.prepare().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let store: Arc<dyn ResourceStore> = self.store.clone();
        let controller_config = &self.config.controller;

        let sync_queue = RequestQueue::new(controller_config.queue_capacity);
        let sync_watcher = Arc::new(StoreWatcher::new(
            store.clone(),
            sync_queue.sender(),
            shutdown_rx.clone(),
        ));
        let sync_engine = Arc::new(SyncEngine::new(store.clone(), sync_watcher.clone()));
        let sync = Arc::new(SyncController::new(sync_engine, store.clone()));

        let policy_queue = RequestQueue::new(controller_config.queue_capacity);
        let policy_watcher = Arc::new(StoreWatcher::new(
            store.clone(),
            policy_queue.sender(),
            shutdown_rx.clone(),
        ));
        let policy_engine = Arc::new(
            PolicyEngine::new(store.clone(), policy_watcher.clone()).with_graph(self.graph.clone()),
        );
        let policy = Arc::new(PolicyController::new(policy_engine, store.clone()));

        let handles = vec![
            spawn_controller(
                sync,
                store.clone(),
                sync_watcher,
                controller_config.clone(),
                sync_queue,
                shutdown_rx.clone(),
            ),
            spawn_controller(
                policy,
                store.clone(),
                policy_watcher,
                controller_config.clone(),
                policy_queue,
                shutdown_rx,
            ),
        ];

        tracing::info!("dSpace daemon running");
        shutdown.await;
        tracing::info!("dSpace daemon shutting down");

        // Receivers live as long as the controllers; a send error means they are gone.
        let _ = shutdown_tx.send(true);
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Controller exited with error"),
                Err(e) => tracing::error!(error = %e, "Controller task panicked"),
            }
        }

        Ok(())
    }
}

fn spawn_controller<R: Reconciler>(
    reconciler: Arc<R>,
    store: Arc<dyn ResourceStore>,
    watcher: Arc<StoreWatcher>,
    config: ControllerConfig,
    queue: RequestQueue,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<dspace_controller::Result<()>> {
    let controller = Controller::new(reconciler, store, watcher, config, queue);
    tokio::spawn(controller.run(shutdown))
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
