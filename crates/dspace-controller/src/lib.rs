//! dSpace Controller - reconciliation over the resource store
//!
//! The controller crate keeps resources bound and composed:
//!
//! - **Sync engine**: propagates attribute values between bound resources
//! - **Policy engine**: moves active mounts between parents when a condition holds
//! - **Watch multiplexer**: lazily watches every kind an entry touches and
//!   routes its changes, tagged, into the owning controller
//! - **Mounter**: mount, unmount, yield and activate with graph checks
//! - **Admission**: rejects writes that would break the mount forest
//! - **Discovery**: rebuilds the mount graph from persisted mounts
//!
//! # Example
//!
//! ```rust,ignore
//! let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
//! let queue = RequestQueue::new(config.queue_capacity);
//! let watcher = Arc::new(StoreWatcher::new(store.clone(), queue.sender(), shutdown.clone()));
//! let engine = Arc::new(SyncEngine::new(store.clone(), watcher.clone()));
//! let reconciler = Arc::new(SyncController::new(engine, store.clone()));
//! Controller::new(reconciler, store, watcher, config, queue).run(shutdown).await?;
//! ```

#![deny(unsafe_code)]

pub mod admission;
pub mod cache;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod mount;
pub mod mux;
pub mod policy;
pub mod sync;
pub mod watch;

pub use admission::{AdmissionRequest, MountValidator, Operation, ValidationResult};
pub use cache::{EnforceReport, Endpoints, IndexedCache};
pub use controller::{Controller, ControllerConfig, Reconciler, RequestQueue};
pub use discovery::{Discovery, DiscoveryReport};
pub use error::{ControllerError, Result};
pub use mount::{MountOp, Mounter};
pub use mux::{demux, mux, ReconcileRequest, RequestTag};
pub use policy::{
    policy_kind, Condition, ConditionError, Policy, PolicyController, PolicyEngine, PolicySpec,
};
pub use sync::{sync_kind, Binding, BindingMode, BindingSpec, SyncController, SyncEngine};
pub use watch::{KindWatcher, StoreWatcher};
