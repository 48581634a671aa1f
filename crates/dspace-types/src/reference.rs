//! Resource references
//!
//! A reference names a resource and optionally an attribute inside it:
//! `/digi.dev/v1/Lamp/lab/lamp-1.spec.power`.

use crate::error::{Result, TypesError};
use crate::kind::Kind;
use crate::name::{NamespacedName, DEFAULT_NAMESPACE};
use crate::path::AttrPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: Kind,
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl ResourceRef {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let nn = NamespacedName::new(namespace, name);
        Self {
            kind,
            name: nn.name,
            namespace: nn.namespace,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    /// Identity of the referenced resource, shared by the caches and the graph
    pub fn id(&self) -> String {
        self.namespaced_name().to_string()
    }

    /// The referenced resource without any attribute path
    pub fn resource(&self) -> Self {
        Self {
            path: None,
            ..self.clone()
        }
    }

    /// Parsed attribute path; the root path when none is set
    pub fn attr_path(&self) -> Result<AttrPath> {
        match &self.path {
            Some(path) => AttrPath::parse(path),
            None => Ok(AttrPath::root()),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)?;
        if let Some(path) = &self.path {
            write!(f, ".{}", path.trim_start_matches('.'))?;
        }
        Ok(())
    }
}

impl FromStr for ResourceRef {
    type Err = TypesError;

    /// Accepts `/g/v/Kind/name[.path]` and `/g/v/Kind/ns/name[.path]`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TypesError::InvalidRef(s.to_string());
        if !s.starts_with('/') {
            return Err(invalid());
        }

        let fields: Vec<&str> = s[1..].splitn(4, '/').collect();
        let [group, version, kind_name, rest] = fields.as_slice() else {
            return Err(invalid());
        };
        if version.is_empty() || kind_name.is_empty() {
            return Err(invalid());
        }

        let (names, path) = match rest.split_once('.') {
            Some((names, path)) if !path.is_empty() => (names, Some(path.to_string())),
            Some(_) => return Err(invalid()),
            None => (*rest, None),
        };
        let (namespace, name) = match names.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                (ns, name)
            }
            None if !names.is_empty() => (DEFAULT_NAMESPACE, names),
            _ => return Err(invalid()),
        };

        let mut reference = Self::new(Kind::new(*group, *version, *kind_name), namespace, name);
        reference.path = path;
        Ok(reference)
    }
}
