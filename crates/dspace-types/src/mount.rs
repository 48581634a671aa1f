//! Mount references
//!
//! A resource that mounts others records them inside its own document:
//!
//! ```text
//! spec.mount:
//!   digi.dev/v1/lamps:
//!     lab/lamp-1: { mode: hide, status: active }
//! ```

use crate::name::NamespacedName;
use crate::reference::ResourceRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Document path holding the mount map
pub const MOUNT_ATTR_PATH: &str = "spec.mount";

/// Mode recorded when a mount request does not name one
pub const DEFAULT_MOUNT_MODE: &str = "hide";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountStatus::Active => write!(f, "active"),
            MountStatus::Inactive => write!(f, "inactive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRef {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub status: MountStatus,
}

fn default_mode() -> String {
    DEFAULT_MOUNT_MODE.to_string()
}

impl MountRef {
    pub fn active(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            status: MountStatus::Active,
        }
    }
}

impl Default for MountRef {
    fn default() -> Self {
        Self::active(DEFAULT_MOUNT_MODE)
    }
}

/// gvr string -> `namespace/name` -> mount reference
pub type Mounts = BTreeMap<String, BTreeMap<String, MountRef>>;

/// One composition relationship read out of a target document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEdge {
    /// gvr string of the mounted resource's kind
    pub source_gvr: String,
    pub source: NamespacedName,
    pub target: ResourceRef,
    pub mode: String,
    pub status: MountStatus,
}
