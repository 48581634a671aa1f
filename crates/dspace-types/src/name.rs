use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace assumed when a reference leaves it out
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity of a resource: `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace
            },
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for NamespacedName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((namespace, name)) if !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(namespace, name))
            }
            None if !s.is_empty() => Ok(Self::new(DEFAULT_NAMESPACE, s)),
            _ => Err(TypesError::InvalidName(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let nn: NamespacedName = "lab/lamp-1".parse().unwrap();
        assert_eq!(nn.namespace, "lab");
        assert_eq!(nn.name, "lamp-1");
        assert_eq!(nn.to_string(), "lab/lamp-1");
    }

    #[test]
    fn test_default_namespace() {
        let nn: NamespacedName = "lamp-1".parse().unwrap();
        assert_eq!(nn.to_string(), "default/lamp-1");
        assert_eq!(NamespacedName::new("", "x").namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("".parse::<NamespacedName>().is_err());
        assert!("a/".parse::<NamespacedName>().is_err());
        assert!("a/b/c".parse::<NamespacedName>().is_err());
    }
}
