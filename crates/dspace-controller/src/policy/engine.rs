use super::condition::Condition;
use crate::cache::{EnforceReport, Endpoints, IndexedCache};
use crate::controller::Reconciler;
use crate::error::{ControllerError, Result};
use crate::mux::{ReconcileRequest, RequestTag};
use crate::watch::KindWatcher;
use async_trait::async_trait;
use dspace_graph::MultiTree;
use dspace_store::ResourceStore;
use dspace_types::{AttrPath, Document, Kind, MountStatus, ResourceRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Kind of the records declaring yield policies
pub fn policy_kind() -> Kind {
    Kind::new("digi.dev", "v1", "YieldPolicy")
}

/// The `spec` of a `YieldPolicy` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub source: ResourceRef,
    pub target: ResourceRef,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub name: String,
    pub source: ResourceRef,
    pub target: ResourceRef,
    pub condition: Condition,
}

impl Policy {
    pub fn new(name: impl Into<String>, spec: PolicySpec) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            condition: Condition::compile(&spec.condition)?,
            source: spec.source.resource(),
            target: spec.target.resource(),
        })
    }
}

impl Endpoints for Policy {
    fn source(&self) -> &ResourceRef {
        &self.source
    }

    fn target(&self) -> &ResourceRef {
        &self.target
    }
}

enum Outcome {
    NotFired,
    NothingToMove,
    Transferred(Vec<String>),
}

/// Policy cache plus the transfer logic
pub struct PolicyEngine {
    store: Arc<dyn ResourceStore>,
    policies: IndexedCache<Policy>,
    graph: Option<Arc<RwLock<MultiTree>>>,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn ResourceStore>, watcher: Arc<dyn KindWatcher>) -> Self {
        Self {
            store,
            policies: IndexedCache::new(watcher),
            graph: None,
        }
    }

    /// Mirror transfers onto the edge statuses of a mount graph
    pub fn with_graph(mut self, graph: Arc<RwLock<MultiTree>>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn policies(&self) -> &IndexedCache<Policy> {
        &self.policies
    }

    /// Compile and register the policy declared by record `name`
    pub async fn add(&self, name: &str, spec: PolicySpec) -> Result<Policy> {
        let policy = Policy::new(name, spec)?;
        self.policies.insert(name, policy.clone()).await?;
        tracing::debug!(policy = %name, condition = %policy.condition, "Policy added");
        Ok(policy)
    }

    pub async fn remove(&self, name: &str) -> Option<Policy> {
        let policy = self.policies.remove(name).await?;
        tracing::debug!(policy = %name, "Policy removed");
        Some(policy)
    }

    /// Evaluate every policy touching `identity` and apply the transfers that fire
    #[instrument(skip(self))]
    pub async fn enforce(&self, identity: &str) -> EnforceReport {
        let mut report = EnforceReport::default();

        for (name, policy) in self.policies.touching(identity).await {
            match self.enforce_policy(&policy).await {
                Ok(Outcome::Transferred(children)) => {
                    tracing::info!(policy = %name, moved = children.len(), "Mounts transferred");
                    report.applied += 1;
                }
                Ok(Outcome::NotFired) | Ok(Outcome::NothingToMove) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(policy = %name, error = %e, "Unable to enforce policy");
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn enforce_policy(&self, policy: &Policy) -> Result<Outcome> {
        let mut source = self.store.get(&policy.source).await?;
        let mut target = self.store.get(&policy.target).await?;

        match policy
            .condition
            .evaluate(&source.to_value(), &target.to_value())
        {
            Ok(Value::Bool(true)) => {}
            Ok(Value::Bool(false)) => return Ok(Outcome::NotFired),
            Ok(other) => {
                tracing::warn!(policy = %policy.name, result = %other, "Condition did not yield a boolean");
                return Ok(Outcome::NotFired);
            }
            Err(e) => {
                tracing::warn!(policy = %policy.name, error = %e, "Condition evaluation failed");
                return Ok(Outcome::NotFired);
            }
        }

        let (moved, target_changed) = transfer(&mut source, &mut target)?;
        if moved.is_empty() && !target_changed {
            return Ok(Outcome::NothingToMove);
        }

        // Source first: a failure after this point can leave a child inactive
        // on both sides until the next pass.
        if !moved.is_empty() {
            self.store.update(source).await?;
        }
        if target_changed {
            self.store.update(target).await?;
        }

        if let Some(graph) = &self.graph {
            let mut graph = graph.write().await;
            let edges = [
                (policy.source.id(), MountStatus::Inactive),
                (policy.target.id(), MountStatus::Active),
            ];
            for child in &moved {
                for (parent, status) in &edges {
                    if let Err(e) = graph.set_edge_status(parent, child, *status) {
                        tracing::warn!(
                            policy = %policy.name,
                            parent = %parent,
                            child = %child,
                            error = %e,
                            "Graph edge out of step with mounts"
                        );
                    }
                }
            }
        }

        Ok(Outcome::Transferred(moved))
    }
}

/// Flip every child active under `source` and mounted under `target`.
/// Returns the moved child identities and whether `target` changed.
fn transfer(source: &mut Document, target: &mut Document) -> Result<(Vec<String>, bool)> {
    let mut source_mounts = source.mounts()?;
    let mut target_mounts = target.mounts()?;
    let mut moved = Vec::new();
    let mut target_changed = false;

    for (gvr, names) in source_mounts.iter_mut() {
        let Some(target_names) = target_mounts.get_mut(gvr) else {
            continue;
        };
        for (child, mount) in names.iter_mut() {
            if mount.status != MountStatus::Active {
                continue;
            }
            let Some(target_mount) = target_names.get_mut(child) else {
                continue;
            };
            mount.status = MountStatus::Inactive;
            moved.push(child.clone());
            if target_mount.status != MountStatus::Active {
                target_mount.status = MountStatus::Active;
                target_changed = true;
            }
        }
    }

    if !moved.is_empty() {
        source.set_mounts(&source_mounts)?;
    }
    if target_changed {
        target.set_mounts(&target_mounts)?;
    }
    Ok((moved, target_changed))
}

/// Reconciler for `YieldPolicy` records and the resources they watch
pub struct PolicyController {
    engine: Arc<PolicyEngine>,
    store: Arc<dyn ResourceStore>,
}

impl PolicyController {
    pub fn new(engine: Arc<PolicyEngine>, store: Arc<dyn ResourceStore>) -> Self {
        Self { engine, store }
    }
}

#[async_trait]
impl Reconciler for PolicyController {
    fn name(&self) -> &str {
        "yieldpolicy"
    }

    fn primary_kind(&self) -> Kind {
        policy_kind()
    }

    #[instrument(skip(self, request), fields(request = %request))]
    async fn reconcile(&self, request: &ReconcileRequest) -> Result<()> {
        let name = request.name.to_string();
        if request.tag == RequestTag::Enforce {
            self.engine.enforce(&name).await;
            return Ok(());
        }

        let reference = ResourceRef::new(
            policy_kind(),
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

        let spec: PolicySpec = doc
            .get(&AttrPath::from_segments(["spec"]))
            .cloned()
            .ok_or_else(|| ControllerError::InvalidSpec(format!("{} has no spec", name)))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| ControllerError::InvalidSpec(format!("{}: {}", name, e)))
            })?;

        let policy = self.engine.add(&name, spec).await?;
        self.engine.enforce(&policy.source.id()).await;
        Ok(())
    }
}
