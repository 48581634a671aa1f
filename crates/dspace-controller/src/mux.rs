//! Reconcile request multiplexing
//!
//! One controller receives two streams of work through the same queue: changes
//! to its own configuration records and changes to the resources those records
//! bind. Requests carry a tag saying which stream they came from. The string
//! form `tag-namespace/name` is used as the request key.

use dspace_types::NamespacedName;
use std::fmt;

const SEPARATOR: char = '-';

/// Encode a tagged request key
pub fn mux(tag: &str, name: &str) -> String {
    format!("{}{}{}", tag, SEPARATOR, name)
}

/// Split a request key at the first separator. A key without one has an empty tag.
pub fn demux(key: &str) -> (&str, &str) {
    match key.split_once(SEPARATOR) {
        Some((tag, name)) => (tag, name),
        None => ("", key),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    /// The controller's own configuration record changed
    Primary,
    /// A resource referenced by some binding or policy changed
    Enforce,
}

impl RequestTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestTag::Primary => "primary",
            RequestTag::Enforce => "enforce",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "primary" => Some(RequestTag::Primary),
            "enforce" => Some(RequestTag::Enforce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileRequest {
    pub tag: RequestTag,
    pub name: NamespacedName,
}

impl ReconcileRequest {
    pub fn primary(name: NamespacedName) -> Self {
        Self {
            tag: RequestTag::Primary,
            name,
        }
    }

    pub fn enforce(name: NamespacedName) -> Self {
        Self {
            tag: RequestTag::Enforce,
            name,
        }
    }

    pub fn key(&self) -> String {
        mux(self.tag.as_str(), &self.name.to_string())
    }

    /// Decode a request key produced by [`ReconcileRequest::key`]
    pub fn from_key(key: &str) -> Option<Self> {
        let (tag, name) = demux(key);
        Some(Self {
            tag: RequestTag::from_tag(tag)?,
            name: name.parse().ok()?,
        })
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
