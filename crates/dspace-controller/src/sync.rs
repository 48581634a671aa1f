//! Attribute bindings
//!
//! A `Sync` record binds an attribute of one resource to an attribute of
//! another. In `match` mode the target attribute follows the source; in
//! `sync` mode whichever side changed is copied to the other.

use crate::cache::{EnforceReport, Endpoints, IndexedCache};
use crate::controller::Reconciler;
use crate::error::{ControllerError, Result};
use crate::mux::{ReconcileRequest, RequestTag};
use crate::watch::KindWatcher;
use async_trait::async_trait;
use dspace_store::ResourceStore;
use dspace_types::{AttrPath, Kind, ResourceRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Kind of the records declaring bindings
pub fn sync_kind() -> Kind {
    Kind::new("digi.dev", "v1", "Sync")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    /// Copy the changed side to the other
    Sync,
    /// Target follows source
    Match,
}

impl FromStr for BindingMode {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sync" => Ok(BindingMode::Sync),
            "match" => Ok(BindingMode::Match),
            other => Err(ControllerError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingMode::Sync => write!(f, "sync"),
            BindingMode::Match => write!(f, "match"),
        }
    }
}

/// The `spec` of a `Sync` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    pub source: ResourceRef,
    pub target: ResourceRef,
    #[serde(default)]
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub source: ResourceRef,
    pub target: ResourceRef,
    pub mode: BindingMode,
    source_path: AttrPath,
    target_path: AttrPath,
}

impl Binding {
    pub fn new(name: impl Into<String>, spec: BindingSpec) -> Result<Self> {
        let mode: BindingMode = spec.mode.parse()?;
        let source_path = spec.source.attr_path()?;
        let target_path = spec.target.attr_path()?;
        if source_path.is_root() || target_path.is_root() {
            return Err(ControllerError::InvalidSpec(
                "both binding endpoints need an attribute path".into(),
            ));
        }

        Ok(Self {
            name: name.into(),
            source: spec.source,
            target: spec.target,
            mode,
            source_path,
            target_path,
        })
    }
}

impl Endpoints for Binding {
    fn source(&self) -> &ResourceRef {
        &self.source
    }

    fn target(&self) -> &ResourceRef {
        &self.target
    }
}

enum Copied {
    Written,
    AlreadyEqual,
}

/// Binding cache plus the logic that enforces bindings against the store
pub struct SyncEngine {
    store: Arc<dyn ResourceStore>,
    bindings: IndexedCache<Binding>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ResourceStore>, watcher: Arc<dyn KindWatcher>) -> Self {
        Self {
            store,
            bindings: IndexedCache::new(watcher),
        }
    }

    pub fn bindings(&self) -> &IndexedCache<Binding> {
        &self.bindings
    }

    /// Register or replace the binding declared by record `name`
    pub async fn add(&self, name: &str, spec: BindingSpec) -> Result<Binding> {
        let binding = Binding::new(name, spec)?;
        self.bindings.insert(name, binding.clone()).await?;
        tracing::debug!(binding = %name, mode = %binding.mode, "Binding added");
        Ok(binding)
    }

    /// Drop a binding. A `match` binding clears its target attribute on the way out.
    pub async fn remove(&self, name: &str) -> Option<Binding> {
        let binding = self.bindings.remove(name).await?;
        if binding.mode == BindingMode::Match {
            self.finalize(&binding).await;
        }
        tracing::debug!(binding = %name, "Binding removed");
        Some(binding)
    }

    async fn finalize(&self, binding: &Binding) {
        let result = async {
            let mut target = self.store.get(&binding.target).await?;
            target.set(&binding.target_path, Value::Null)?;
            self.store.update(target).await?;
            Ok::<_, ControllerError>(())
        }
        .await;

        match result {
            Ok(()) => tracing::info!(binding = %binding.name, "Finalized"),
            Err(e) => {
                tracing::warn!(binding = %binding.name, error = %e, "Finalize failed")
            }
        }
    }

    /// Enforce every binding that touches the resource `identity`
    #[instrument(skip(self))]
    pub async fn enforce(&self, identity: &str) -> EnforceReport {
        let mut report = EnforceReport::default();

        for (name, binding) in self.bindings.touching(identity).await {
            let (from, from_path, to, to_path) = match binding.mode {
                BindingMode::Match => (
                    &binding.source,
                    &binding.source_path,
                    &binding.target,
                    &binding.target_path,
                ),
                BindingMode::Sync if binding.source.id() == identity => (
                    &binding.source,
                    &binding.source_path,
                    &binding.target,
                    &binding.target_path,
                ),
                BindingMode::Sync => (
                    &binding.target,
                    &binding.target_path,
                    &binding.source,
                    &binding.source_path,
                ),
            };

            match self.copy_attr(from, from_path, to, to_path).await {
                Ok(Copied::Written) => {
                    tracing::debug!(binding = %name, from = %from, to = %to, "Binding enforced");
                    report.applied += 1;
                }
                Ok(Copied::AlreadyEqual) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(binding = %name, error = %e, "Unable to enforce binding");
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn copy_attr(
        &self,
        from: &ResourceRef,
        from_path: &AttrPath,
        to: &ResourceRef,
        to_path: &AttrPath,
    ) -> Result<Copied> {
        let source = self.store.get(from).await?;
        let value = source.get(from_path).cloned().unwrap_or(Value::Null);

        let mut target = self.store.get(to).await?;
        let unchanged = match target.get(to_path) {
            Some(current) => *current == value,
            None => value.is_null(),
        };
        if unchanged {
            return Ok(Copied::AlreadyEqual);
        }

        target.set(to_path, value)?;
        self.store.update(target).await?;
        Ok(Copied::Written)
    }
}

/// Reconciler for `Sync` records and the resources they bind
pub struct SyncController {
    engine: Arc<SyncEngine>,
    store: Arc<dyn ResourceStore>,
}

impl SyncController {
    pub fn new(engine: Arc<SyncEngine>, store: Arc<dyn ResourceStore>) -> Self {
        Self { engine, store }
    }
}

#[async_trait]
impl Reconciler for SyncController {
    fn name(&self) -> &str {
        "sync"
    }

    fn primary_kind(&self) -> Kind {
        sync_kind()
    }

    #[instrument(skip(self, request), fields(request = %request))]
    async fn reconcile(&self, request: &ReconcileRequest) -> Result<()> {
        let name = request.name.to_string();
        match request.tag {
            RequestTag::Enforce => {
                self.engine.enforce(&name).await;
                Ok(())
            }
            RequestTag::Primary => {
                let reference = ResourceRef::new(
                    sync_kind(),
                    request.name.namespace.clone(),
                    request.name.name.clone(),
                );
                let doc = match self.store.get(&reference).await {
                    Ok(doc) => doc,
                    Err(e) if e.is_not_found() => {
                        self.engine.remove(&name).await;
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };

                let spec_value = doc.get(&AttrPath::from_segments(["spec"])).cloned();
                let spec: BindingSpec = spec_value
                    .ok_or_else(|| ControllerError::InvalidSpec(format!("{} has no spec", name)))
                    .and_then(|value| {
                        serde_json::from_value(value)
                            .map_err(|e| ControllerError::InvalidSpec(format!("{}: {}", name, e)))
                    })?;

                let binding = self.engine.add(&name, spec).await?;
                self.engine.enforce(&binding.source.id()).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::RecordingWatcher;
    use dspace_store::InMemoryStore;
    use dspace_types::Document;
    use serde_json::json;

    fn lamp_kind() -> Kind {
        Kind::new("digi.dev", "v1", "Lamp")
    }

    fn endpoint(name: &str, path: &str) -> ResourceRef {
        ResourceRef::new(lamp_kind(), "default", name).with_path(path)
    }

    fn spec(mode: &str) -> BindingSpec {
        BindingSpec {
            source: endpoint("s", ".spec.x"),
            target: endpoint("t", ".spec.y"),
            mode: mode.into(),
        }
    }

    async fn setup() -> (Arc<InMemoryStore>, SyncEngine) {
        let store = Arc::new(InMemoryStore::new());
        store
            .create(Document::new(lamp_kind(), "default", "s").with_body(json!({"spec": {"x": 1}})))
            .await
            .unwrap();
        store
            .create(Document::new(lamp_kind(), "default", "t").with_body(json!({"spec": {"y": 0}})))
            .await
            .unwrap();
        let engine = SyncEngine::new(store.clone(), Arc::new(RecordingWatcher::default()));
        (store, engine)
    }

    async fn read(store: &InMemoryStore, name: &str, path: &str) -> Value {
        let doc = store
            .get(&ResourceRef::new(lamp_kind(), "default", name))
            .await
            .unwrap();
        doc.get(&AttrPath::parse(path).unwrap())
            .cloned()
            .unwrap_or(Value::Null)
    }

    async fn write(store: &InMemoryStore, name: &str, path: &str, value: Value) {
        let mut doc = store
            .get(&ResourceRef::new(lamp_kind(), "default", name))
            .await
            .unwrap();
        doc.set(&AttrPath::parse(path).unwrap(), value).unwrap();
        store.update(doc).await.unwrap();
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("sync".parse::<BindingMode>().unwrap(), BindingMode::Sync);
        assert_eq!("match".parse::<BindingMode>().unwrap(), BindingMode::Match);
        assert!(matches!(
            "mirror".parse::<BindingMode>(),
            Err(ControllerError::InvalidMode(m)) if m == "mirror"
        ));
        assert!("".parse::<BindingMode>().is_err());
    }

    #[test]
    fn test_binding_requires_paths() {
        let mut no_path = spec("sync");
        no_path.target.path = None;
        assert!(matches!(
            Binding::new("b", no_path),
            Err(ControllerError::InvalidSpec(_))
        ));
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_mode() {
        let (_, engine) = setup().await;
        assert!(matches!(
            engine.add("default/b", spec("copy")).await,
            Err(ControllerError::InvalidMode(_))
        ));
        assert!(engine.bindings().is_empty().await);
    }

    #[tokio::test]
    async fn test_match_copies_source_to_target() {
        let (store, engine) = setup().await;
        engine.add("default/b", spec("match")).await.unwrap();

        let report = engine.enforce("default/s").await;
        assert_eq!(report.applied, 1);
        assert_eq!(read(&store, "t", "spec.y").await, json!(1));

        // Target drifts; match pulls it back even when the target triggered.
        write(&store, "t", "spec.y", json!(42)).await;
        engine.enforce("default/t").await;
        assert_eq!(read(&store, "t", "spec.y").await, json!(1));
    }

    #[tokio::test]
    async fn test_sync_copies_from_changed_side() {
        let (store, engine) = setup().await;
        engine.add("default/b", spec("sync")).await.unwrap();

        write(&store, "t", "spec.y", json!("from-target")).await;
        engine.enforce("default/t").await;
        assert_eq!(read(&store, "s", "spec.x").await, json!("from-target"));

        write(&store, "s", "spec.x", json!("from-source")).await;
        engine.enforce("default/s").await;
        assert_eq!(read(&store, "t", "spec.y").await, json!("from-source"));
    }

    #[tokio::test]
    async fn test_enforce_is_idempotent() {
        let (store, engine) = setup().await;
        engine.add("default/b", spec("match")).await.unwrap();
        engine.enforce("default/s").await;

        let version = store
            .get(&ResourceRef::new(lamp_kind(), "default", "t"))
            .await
            .unwrap()
            .resource_version;
        let report = engine.enforce("default/s").await;
        assert_eq!(report, EnforceReport { applied: 0, unchanged: 1, failed: 0 });

        let after = store
            .get(&ResourceRef::new(lamp_kind(), "default", "t"))
            .await
            .unwrap()
            .resource_version;
        assert_eq!(version, after);
    }

    #[tokio::test]
    async fn test_enforce_unrelated_identity_is_noop() {
        let (_, engine) = setup().await;
        engine.add("default/b", spec("match")).await.unwrap();
        assert_eq!(engine.enforce("default/nobody").await, EnforceReport::default());
    }

    #[tokio::test]
    async fn test_missing_endpoint_counts_as_failed() {
        let (store, engine) = setup().await;
        engine.add("default/b", spec("match")).await.unwrap();
        store
            .delete(&ResourceRef::new(lamp_kind(), "default", "t"))
            .await
            .unwrap();

        let report = engine.enforce("default/s").await;
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_remove_match_finalizes_target() {
        let (store, engine) = setup().await;
        engine.add("default/b", spec("match")).await.unwrap();
        engine.enforce("default/s").await;

        let removed = engine.remove("default/b").await.unwrap();
        assert_eq!(removed.mode, BindingMode::Match);
        assert_eq!(read(&store, "t", "spec.y").await, Value::Null);
        assert!(engine.bindings().touching("default/s").await.is_empty());
        assert!(engine.bindings().is_consistent().await);
    }

    #[tokio::test]
    async fn test_remove_sync_leaves_target() {
        let (store, engine) = setup().await;
        engine.add("default/b", spec("sync")).await.unwrap();
        engine.enforce("default/s").await;

        engine.remove("default/b").await.unwrap();
        assert_eq!(read(&store, "t", "spec.y").await, json!(1));
    }

    #[tokio::test]
    async fn test_controller_primary_adds_and_removes() {
        let (store, engine) = setup().await;
        let engine = Arc::new(engine);
        let controller = SyncController::new(engine.clone(), store.clone());

        store
            .create(
                Document::new(sync_kind(), "default", "b").with_body(json!({
                    "spec": serde_json::to_value(spec("match")).unwrap()
                })),
            )
            .await
            .unwrap();

        let request = ReconcileRequest::primary("default/b".parse().unwrap());
        controller.reconcile(&request).await.unwrap();
        assert!(engine.bindings().get("default/b").await.is_some());
        assert_eq!(read(&store, "t", "spec.y").await, json!(1));

        store
            .delete(&ResourceRef::new(sync_kind(), "default", "b"))
            .await
            .unwrap();
        controller.reconcile(&request).await.unwrap();
        assert!(engine.bindings().is_empty().await);
        assert_eq!(read(&store, "t", "spec.y").await, Value::Null);
    }

    #[tokio::test]
    async fn test_controller_rejects_bad_spec() {
        let (store, engine) = setup().await;
        let controller = SyncController::new(Arc::new(engine), store.clone());
        store
            .create(Document::new(sync_kind(), "default", "bad").with_body(json!({"spec": {"mode": "sync"}})))
            .await
            .unwrap();

        let err = controller
            .reconcile(&ReconcileRequest::primary("default/bad".parse().unwrap()))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }
}
