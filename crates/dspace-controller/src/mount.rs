//! Mount, unmount, yield and activate
//!
//! Every operation rewrites the target's `spec.mount` map and mirrors the
//! change onto the mount graph. The graph write lock is held until the store
//! accepts the new document; a rejected write restores the graph.

use crate::error::{ControllerError, Result};
use dspace_graph::MultiTree;
use dspace_store::ResourceStore;
use dspace_types::{Document, MountRef, MountStatus, Mounts, ResourceRef, DEFAULT_MOUNT_MODE};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOp {
    Mount { mode: String },
    Unmount,
    Yield,
    Activate,
}

impl fmt::Display for MountOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountOp::Mount { .. } => write!(f, "mount"),
            MountOp::Unmount => write!(f, "unmount"),
            MountOp::Yield => write!(f, "yield"),
            MountOp::Activate => write!(f, "activate"),
        }
    }
}

pub struct Mounter {
    store: Arc<dyn ResourceStore>,
    graph: Arc<RwLock<MultiTree>>,
}

impl Mounter {
    pub fn new(store: Arc<dyn ResourceStore>, graph: Arc<RwLock<MultiTree>>) -> Self {
        Self { store, graph }
    }

    pub fn graph(&self) -> &Arc<RwLock<MultiTree>> {
        &self.graph
    }

    /// Mount `sources` into `target`; an empty mode means the default
    pub async fn mount(
        &self,
        sources: &[ResourceRef],
        target: &ResourceRef,
        mode: &str,
    ) -> Result<Document> {
        let mode = if mode.is_empty() {
            DEFAULT_MOUNT_MODE
        } else {
            mode
        };
        self.apply(
            MountOp::Mount {
                mode: mode.to_string(),
            },
            sources,
            target,
        )
        .await
    }

    pub async fn unmount(&self, sources: &[ResourceRef], target: &ResourceRef) -> Result<Document> {
        self.apply(MountOp::Unmount, sources, target).await
    }

    pub async fn yield_mount(
        &self,
        sources: &[ResourceRef],
        target: &ResourceRef,
    ) -> Result<Document> {
        self.apply(MountOp::Yield, sources, target).await
    }

    pub async fn activate(&self, sources: &[ResourceRef], target: &ResourceRef) -> Result<Document> {
        self.apply(MountOp::Activate, sources, target).await
    }

    pub async fn apply(
        &self,
        op: MountOp,
        sources: &[ResourceRef],
        target: &ResourceRef,
    ) -> Result<Document> {
        let mut graph = self.graph.write().await;
        let snapshot = graph.clone();

        let mut doc = self.store.get(target).await?;
        let target_id = target.id();

        let staged = doc.mounts().map_err(ControllerError::from).and_then(|mut mounts| {
            for source in sources {
                stage(&mut graph, &mut mounts, &op, source, &target_id)?;
            }
            doc.set_mounts(&mounts)?;
            Ok(())
        });
        if let Err(e) = staged {
            *graph = snapshot;
            return Err(e);
        }

        match self.store.update(doc).await {
            Ok(doc) => {
                tracing::info!(op = %op, target = %target_id, sources = sources.len(), "Mounts updated");
                Ok(doc)
            }
            Err(e) => {
                *graph = snapshot;
                tracing::warn!(op = %op, target = %target_id, error = %e, "Mount write rejected, graph restored");
                Err(e.into())
            }
        }
    }
}

fn stage(
    graph: &mut MultiTree,
    mounts: &mut Mounts,
    op: &MountOp,
    source: &ResourceRef,
    target_id: &str,
) -> Result<()> {
    let gvr = source.kind.gvr_string();
    let source_id = source.id();

    if let MountOp::Mount { mode } = op {
        graph.add_node(target_id);
        graph.add_node(&source_id);
        graph.add_edge_with(target_id, &source_id, MountStatus::Active, mode)?;
        // Remounting an existing child reactivates it under the new mode.
        graph.set_edge_status(target_id, &source_id, MountStatus::Active)?;
        graph.set_edge_mode(target_id, &source_id, mode)?;
        mounts
            .entry(gvr)
            .or_default()
            .insert(source_id, MountRef::active(mode.clone()));
        return Ok(());
    }

    let not_found = || ControllerError::MountNotFound {
        mount: format!("{}/{}", gvr, source_id),
        target: target_id.to_string(),
    };
    let names = mounts.get_mut(&gvr).ok_or_else(not_found)?;

    match op {
        MountOp::Unmount => {
            names.remove(&source_id).ok_or_else(not_found)?;
            if graph.edge_exists(target_id, &source_id) {
                graph.remove_edge(target_id, &source_id)?;
            }
        }
        MountOp::Yield | MountOp::Activate => {
            let status = if *op == MountOp::Yield {
                MountStatus::Inactive
            } else {
                MountStatus::Active
            };
            names.get_mut(&source_id).ok_or_else(not_found)?.status = status;
            if graph.edge_exists(target_id, &source_id) {
                graph.set_edge_status(target_id, &source_id, status)?;
            }
        }
        MountOp::Mount { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dspace_graph::GraphError;
    use dspace_store::{InMemoryStore, StoreError, StoreResult, WatchStream};
    use dspace_types::Kind;

    fn room(name: &str) -> ResourceRef {
        ResourceRef::new(Kind::new("digi.dev", "v1", "Room"), "default", name)
    }

    fn lamp(name: &str) -> ResourceRef {
        ResourceRef::new(Kind::new("digi.dev", "v1", "Lamp"), "default", name)
    }

    async fn seeded(refs: &[ResourceRef]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for r in refs {
            store
                .create(Document::new(r.kind.clone(), r.namespace.clone(), r.name.clone()))
                .await
                .unwrap();
        }
        store
    }

    fn mounter(store: Arc<dyn ResourceStore>) -> Mounter {
        Mounter::new(store, Arc::new(RwLock::new(MultiTree::new())))
    }

    #[tokio::test]
    async fn test_mount_writes_document_and_graph() {
        let store = seeded(&[room("a"), lamp("l")]).await;
        let mounter = mounter(store.clone());

        let doc = mounter.mount(&[lamp("l")], &room("a"), "").await.unwrap();
        let mounts = doc.mounts().unwrap();
        assert_eq!(
            mounts["digi.dev/v1/lamps"]["default/l"],
            MountRef::active(DEFAULT_MOUNT_MODE)
        );

        let graph = mounter.graph().read().await;
        assert!(graph.edge_exists("default/a", "default/l"));
        assert_eq!(
            graph.roots_of("default/l").unwrap().iter().collect::<Vec<_>>(),
            vec!["default/a"]
        );
    }

    #[tokio::test]
    async fn test_ambiguous_mount_leaves_document_untouched() {
        let store = seeded(&[room("a"), room("b"), room("c")]).await;
        let mounter = mounter(store.clone());

        mounter.mount(&[room("b")], &room("a"), "hide").await.unwrap();
        mounter.mount(&[room("c")], &room("b"), "hide").await.unwrap();
        let err = mounter.mount(&[room("c")], &room("a"), "hide").await.unwrap_err();
        assert!(matches!(err, ControllerError::Graph(GraphError::AmbiguousPath { .. })));

        let a = store.get(&room("a")).await.unwrap();
        assert!(!a.mounts().unwrap()["digi.dev/v1/rooms"].contains_key("default/c"));
        assert!(!mounter.graph().read().await.edge_exists("default/a", "default/c"));
    }

    #[tokio::test]
    async fn test_partial_batch_rolls_back() {
        let store = seeded(&[room("a"), room("b"), lamp("l")]).await;
        let mounter = mounter(store.clone());
        mounter.mount(&[room("a")], &room("b"), "hide").await.unwrap();
        let before = mounter.graph().read().await.clone();

        // The lamp is fine; mounting b under a closes a cycle.
        let err = mounter
            .mount(&[lamp("l"), room("b")], &room("a"), "hide")
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::Graph(_)));
        assert_eq!(*mounter.graph().read().await, before);
        assert_eq!(store.get(&room("a")).await.unwrap().resource_version, 1);
    }

    #[tokio::test]
    async fn test_unmount_requires_existing_mount() {
        let store = seeded(&[room("a"), lamp("l")]).await;
        let mounter = mounter(store.clone());

        let err = mounter.unmount(&[lamp("l")], &room("a")).await.unwrap_err();
        assert!(matches!(err, ControllerError::MountNotFound { .. }));

        mounter.mount(&[lamp("l")], &room("a"), "hide").await.unwrap();
        let doc = mounter.unmount(&[lamp("l")], &room("a")).await.unwrap();
        assert!(doc.mounts().unwrap().is_empty());
        let graph = mounter.graph().read().await;
        assert!(!graph.edge_exists("default/a", "default/l"));
        assert!(graph.roots_of("default/l").unwrap().contains("default/l"));
    }

    #[tokio::test]
    async fn test_yield_and_activate_flip_status() {
        let store = seeded(&[room("a"), lamp("l")]).await;
        let mounter = mounter(store.clone());
        mounter.mount(&[lamp("l")], &room("a"), "expose").await.unwrap();

        let doc = mounter.yield_mount(&[lamp("l")], &room("a")).await.unwrap();
        let mount = &doc.mounts().unwrap()["digi.dev/v1/lamps"]["default/l"];
        assert_eq!(mount.status, MountStatus::Inactive);
        assert_eq!(mount.mode, "expose");
        assert_eq!(
            mounter.graph().read().await.edge("default/a", "default/l").unwrap().status,
            MountStatus::Inactive
        );

        let doc = mounter.activate(&[lamp("l")], &room("a")).await.unwrap();
        assert_eq!(
            doc.mounts().unwrap()["digi.dev/v1/lamps"]["default/l"].status,
            MountStatus::Active
        );

        let err = mounter.yield_mount(&[lamp("x")], &room("a")).await.unwrap_err();
        assert!(matches!(err, ControllerError::MountNotFound { .. }));
    }

    #[tokio::test]
    async fn test_remount_updates_mode_in_graph() {
        let store = seeded(&[room("a"), lamp("l")]).await;
        let mounter = mounter(store.clone());
        mounter.mount(&[lamp("l")], &room("a"), "expose").await.unwrap();
        mounter.yield_mount(&[lamp("l")], &room("a")).await.unwrap();

        let doc = mounter.mount(&[lamp("l")], &room("a"), "hide").await.unwrap();
        assert_eq!(
            doc.mounts().unwrap()["digi.dev/v1/lamps"]["default/l"],
            MountRef::active("hide")
        );
        let graph = mounter.graph().read().await;
        let edge = graph.edge("default/a", "default/l").unwrap();
        assert_eq!(edge.mode, "hide");
        assert_eq!(edge.status, MountStatus::Active);
    }

    struct RejectingStore(InMemoryStore);

    #[async_trait]
    impl ResourceStore for RejectingStore {
        async fn get(&self, reference: &ResourceRef) -> StoreResult<Document> {
            self.0.get(reference).await
        }
        async fn create(&self, doc: Document) -> StoreResult<Document> {
            self.0.create(doc).await
        }
        async fn update(&self, _doc: Document) -> StoreResult<Document> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        async fn delete(&self, reference: &ResourceRef) -> StoreResult<()> {
            self.0.delete(reference).await
        }
        async fn list(&self, kind: Option<&Kind>) -> StoreResult<Vec<Document>> {
            self.0.list(kind).await
        }
        async fn kinds(&self) -> StoreResult<Vec<Kind>> {
            self.0.kinds().await
        }
        fn watch(&self, kind: &Kind) -> WatchStream {
            self.0.watch(kind)
        }
    }

    #[tokio::test]
    async fn test_rejected_write_restores_graph() {
        let inner = InMemoryStore::new();
        inner
            .create(Document::new(room("a").kind, "default", "a"))
            .await
            .unwrap();
        let mounter = mounter(Arc::new(RejectingStore(inner)));

        let err = mounter.mount(&[lamp("l")], &room("a"), "hide").await.unwrap_err();
        assert!(matches!(err, ControllerError::Store(_)));
        assert!(mounter.graph().read().await.is_empty());
    }
}
