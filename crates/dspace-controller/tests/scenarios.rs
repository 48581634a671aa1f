//! End-to-end scenarios over the in-memory store

use dspace_controller::{
    policy_kind, sync_kind, BindingSpec, Controller, ControllerConfig, ControllerError, Mounter,
    PolicyController, PolicyEngine, PolicySpec, RequestQueue, StoreWatcher, SyncController,
    SyncEngine,
};
use dspace_graph::{GraphError, MultiTree};
use dspace_store::{InMemoryStore, ResourceStore};
use dspace_types::{AttrPath, Document, Kind, MountRef, MountStatus, Mounts, ResourceRef};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

fn room_kind() -> Kind {
    Kind::new("digi.dev", "v1", "Room")
}

fn lamp_kind() -> Kind {
    Kind::new("digi.dev", "v1", "Lamp")
}

fn room(name: &str) -> ResourceRef {
    ResourceRef::new(room_kind(), "default", name)
}

fn lamp(name: &str) -> ResourceRef {
    ResourceRef::new(lamp_kind(), "default", name)
}

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        requeue_delay_ms: 10,
        ..ControllerConfig::default()
    }
}

async fn wait_for<F>(store: &InMemoryStore, reference: &ResourceRef, predicate: F) -> Document
where
    F: Fn(&Document) -> bool,
{
    for _ in 0..300 {
        if let Ok(doc) = store.get(reference).await {
            if predicate(&doc) {
                return doc;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never reached the expected state", reference);
}

async fn set_attr(store: &InMemoryStore, reference: &ResourceRef, path: &str, value: Value) {
    let mut doc = store.get(reference).await.unwrap();
    doc.set(&AttrPath::parse(path).unwrap(), value).unwrap();
    store.update(doc).await.unwrap();
}

#[tokio::test]
async fn scenario_a_second_path_from_same_root_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    for name in ["a", "b", "c"] {
        store
            .create(Document::new(room_kind(), "default", name))
            .await
            .unwrap();
    }
    let mounter = Mounter::new(store.clone(), Arc::new(RwLock::new(MultiTree::new())));

    mounter.mount(&[room("b")], &room("a"), "hide").await.unwrap();
    mounter.mount(&[room("c")], &room("b"), "hide").await.unwrap();
    let err = mounter.mount(&[room("c")], &room("a"), "hide").await.unwrap_err();

    assert!(matches!(
        err,
        ControllerError::Graph(GraphError::AmbiguousPath { .. })
    ));
    assert_eq!(mounter.graph().read().await.path_count("default/a", "default/c"), 1);
}

#[tokio::test]
async fn scenario_b_removing_one_parent_keeps_the_other_root() {
    let store = Arc::new(InMemoryStore::new());
    for name in ["a", "b", "d"] {
        store
            .create(Document::new(room_kind(), "default", name))
            .await
            .unwrap();
    }
    let mounter = Mounter::new(store.clone(), Arc::new(RwLock::new(MultiTree::new())));

    mounter.mount(&[room("b")], &room("a"), "hide").await.unwrap();
    mounter.mount(&[room("b")], &room("d"), "hide").await.unwrap();
    {
        let graph = mounter.graph().read().await;
        let roots: Vec<&String> = graph.roots_of("default/b").unwrap().iter().collect();
        assert_eq!(roots, vec!["default/a", "default/d"]);
    }

    mounter.unmount(&[room("b")], &room("a")).await.unwrap();
    let graph = mounter.graph().read().await;
    let roots: Vec<&String> = graph.roots_of("default/b").unwrap().iter().collect();
    assert_eq!(roots, vec!["default/d"]);
}

#[tokio::test]
async fn scenario_c_match_binding_follows_source_and_clears_on_removal() {
    let store = Arc::new(InMemoryStore::new());
    store
        .create(Document::new(lamp_kind(), "default", "s"))
        .await
        .unwrap();
    store
        .create(Document::new(lamp_kind(), "default", "t"))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = fast_config();
    let queue = RequestQueue::new(config.queue_capacity);
    let watcher = Arc::new(StoreWatcher::new(store.clone(), queue.sender(), shutdown_rx.clone()));
    let engine = Arc::new(SyncEngine::new(store.clone(), watcher.clone()));
    let reconciler = Arc::new(SyncController::new(engine.clone(), store.clone()));
    let controller = Controller::new(reconciler, store.clone(), watcher, config, queue);
    let handle = tokio::spawn(controller.run(shutdown_rx));

    let spec = BindingSpec {
        source: lamp("s").with_path("spec.x"),
        target: lamp("t").with_path("spec.y"),
        mode: "match".into(),
    };
    store
        .create(
            Document::new(sync_kind(), "default", "s-to-t")
                .with_body(json!({ "spec": serde_json::to_value(&spec).unwrap() })),
        )
        .await
        .unwrap();
    for _ in 0..300 {
        if !engine.bindings().is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.bindings().len().await, 1);

    let y = AttrPath::parse("spec.y").unwrap();
    set_attr(&store, &lamp("s"), "spec.x", json!(5)).await;
    wait_for(&store, &lamp("t"), |doc| doc.get(&y) == Some(&json!(5))).await;

    store
        .delete(&ResourceRef::new(sync_kind(), "default", "s-to-t"))
        .await
        .unwrap();
    wait_for(&store, &lamp("t"), |doc| doc.get(&y) == Some(&Value::Null)).await;
    assert!(engine.bindings().is_empty().await);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

fn level_room(name: &str, level: i64, status: MountStatus) -> Document {
    let mut doc = Document::new(room_kind(), "default", name).with_body(json!({ "level": level }));
    let mut mounts = Mounts::new();
    mounts.entry(lamp_kind().gvr_string()).or_default().insert(
        "default/m".to_string(),
        MountRef {
            mode: "hide".into(),
            status,
        },
    );
    doc.set_mounts(&mounts).unwrap();
    doc
}

fn status_of_m(doc: &Document) -> MountStatus {
    doc.mounts().unwrap()[&lamp_kind().gvr_string()]["default/m"].status
}

#[tokio::test]
async fn scenario_d_policy_moves_active_mount_when_condition_holds() {
    let store = Arc::new(InMemoryStore::new());
    store
        .create(level_room("s", 10, MountStatus::Active))
        .await
        .unwrap();
    store
        .create(level_room("t", 2, MountStatus::Inactive))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config = fast_config();
    let queue = RequestQueue::new(config.queue_capacity);
    let watcher = Arc::new(StoreWatcher::new(store.clone(), queue.sender(), shutdown_rx.clone()));
    let engine = Arc::new(PolicyEngine::new(store.clone(), watcher.clone()));
    let reconciler = Arc::new(PolicyController::new(engine.clone(), store.clone()));
    let controller = Controller::new(reconciler, store.clone(), watcher, config, queue);
    let handle = tokio::spawn(controller.run(shutdown_rx));

    let spec = PolicySpec {
        source: room("s"),
        target: room("t"),
        condition: "target.level > source.level".into(),
    };
    store
        .create(
            Document::new(policy_kind(), "default", "prefer-t")
                .with_body(json!({ "spec": serde_json::to_value(&spec).unwrap() })),
        )
        .await
        .unwrap();
    for _ in 0..300 {
        if !engine.policies().is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.policies().len().await, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Condition is false: neither side was written.
    assert_eq!(store.get(&room("s")).await.unwrap().resource_version, 1);
    assert_eq!(store.get(&room("t")).await.unwrap().resource_version, 1);

    set_attr(&store, &room("t"), "level", json!(20)).await;
    wait_for(&store, &room("s"), |doc| status_of_m(doc) == MountStatus::Inactive).await;
    let t = wait_for(&store, &room("t"), |doc| status_of_m(doc) == MountStatus::Active).await;
    assert_eq!(t.get(&AttrPath::parse("level").unwrap()), Some(&json!(20)));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
