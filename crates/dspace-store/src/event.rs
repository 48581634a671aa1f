//! Change notifications

use chrono::{DateTime, Utc};
use dspace_types::{Kind, NamespacedName};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for WatchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEventType::Added => write!(f, "added"),
            WatchEventType::Modified => write!(f, "modified"),
            WatchEventType::Deleted => write!(f, "deleted"),
        }
    }
}

/// One change to one resource. Delivery is at-least-once with no ordering
/// across resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: Kind,
    pub name: NamespacedName,
    pub event_type: WatchEventType,
    pub observed_at: DateTime<Utc>,
}

impl WatchEvent {
    pub fn new(kind: Kind, name: NamespacedName, event_type: WatchEventType) -> Self {
        Self {
            kind,
            name,
            event_type,
            observed_at: Utc::now(),
        }
    }
}
