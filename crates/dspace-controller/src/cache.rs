//! Dual-index cache shared by the sync and policy engines
//!
//! Entries are indexed by their declaring record's name and, in reverse, by
//! the identity of each endpoint they touch. Both maps and the set of watched
//! kinds live behind one lock so the reverse index is always the exact
//! transpose of the forward map.

use crate::error::Result;
use crate::mux::RequestTag;
use crate::watch::KindWatcher;
use dspace_types::{Kind, ResourceRef};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Something with a source and a target resource
pub trait Endpoints {
    fn source(&self) -> &ResourceRef;
    fn target(&self) -> &ResourceRef;

    fn identities(&self) -> BTreeSet<String> {
        BTreeSet::from([self.source().id(), self.target().id()])
    }
}

/// Outcome counts of one enforcement pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnforceReport {
    /// Entries that wrote a change
    pub applied: usize,
    /// Entries that found nothing to do
    pub unchanged: usize,
    /// Entries skipped after an error
    pub failed: usize,
}

struct CacheState<T> {
    by_name: HashMap<String, T>,
    by_identity: HashMap<String, BTreeSet<String>>,
    watched: HashSet<Kind>,
}

impl<T: Endpoints> CacheState<T> {
    fn unindex(&mut self, name: &str, entry: &T) {
        for identity in entry.identities() {
            if let Some(names) = self.by_identity.get_mut(&identity) {
                names.remove(name);
                if names.is_empty() {
                    self.by_identity.remove(&identity);
                }
            }
        }
    }
}

pub struct IndexedCache<T> {
    state: RwLock<CacheState<T>>,
    watcher: Arc<dyn KindWatcher>,
}

impl<T> IndexedCache<T>
where
    T: Endpoints + Clone + Send + Sync,
{
    pub fn new(watcher: Arc<dyn KindWatcher>) -> Self {
        Self {
            state: RwLock::new(CacheState {
                by_name: HashMap::new(),
                by_identity: HashMap::new(),
                watched: HashSet::new(),
            }),
            watcher,
        }
    }

    /// Insert or replace the entry for `name`, returning the one it replaced.
    ///
    /// Watches for both endpoint kinds are registered before anything is
    /// indexed; if a registration fails the cache is left as it was.
    pub async fn insert(&self, name: &str, entry: T) -> Result<Option<T>> {
        let mut state = self.state.write().await;

        for kind in [&entry.source().kind, &entry.target().kind] {
            if !state.watched.contains(kind) {
                self.watcher.watch(kind, RequestTag::Enforce)?;
                state.watched.insert(kind.clone());
            }
        }

        let previous = state.by_name.remove(name);
        if let Some(old) = &previous {
            state.unindex(name, old);
        }
        for identity in entry.identities() {
            state
                .by_identity
                .entry(identity)
                .or_default()
                .insert(name.to_string());
        }
        state.by_name.insert(name.to_string(), entry);

        Ok(previous)
    }

    pub async fn remove(&self, name: &str) -> Option<T> {
        let mut state = self.state.write().await;
        let entry = state.by_name.remove(name)?;
        state.unindex(name, &entry);
        Some(entry)
    }

    pub async fn get(&self, name: &str) -> Option<T> {
        self.state.read().await.by_name.get(name).cloned()
    }

    /// Snapshot of every entry touching `identity`, ordered by name
    pub async fn touching(&self, identity: &str) -> Vec<(String, T)> {
        let state = self.state.read().await;
        state
            .by_identity
            .get(identity)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| {
                        state
                            .by_name
                            .get(name)
                            .map(|entry| (name.clone(), entry.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.by_name.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn watched_kinds(&self) -> Vec<Kind> {
        let state = self.state.read().await;
        let mut kinds: Vec<Kind> = state.watched.iter().cloned().collect();
        kinds.sort();
        kinds
    }

    /// True when the reverse index is exactly the transpose of the forward map
    pub async fn is_consistent(&self) -> bool {
        let state = self.state.read().await;
        let mut expected: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (name, entry) in &state.by_name {
            for identity in entry.identities() {
                expected.entry(identity).or_default().insert(name.clone());
            }
        }
        expected == state.by_identity
    }
}
