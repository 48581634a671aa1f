//! Resource kinds
//!
//! A kind names the schema of a resource. Mount maps are keyed by the kind's
//! group/version/resource string, which uses the lowercase plural of the name.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema identifier of a resource, e.g. `digi.dev/v1/Lamp`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Kind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
}

impl Kind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            name: name.into(),
        }
    }

    /// Lowercase plural resource name (`Lamp` -> `lamps`, `Policy` -> `policies`)
    pub fn plural(&self) -> String {
        pluralize(&self.name.to_lowercase())
    }

    /// `group/version/plural`, the key used in mount maps
    pub fn gvr_string(&self) -> String {
        format!("{}/{}/{}", self.group, self.version, self.plural())
    }

    /// The gvr string with `.` escaped so it fits in one dotted-path segment
    pub fn escaped_gvr_string(&self) -> String {
        self.gvr_string().replace('.', "\\.")
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Rebuild a kind from an `apiVersion` string and a kind name
    pub fn from_api_version(api_version: &str, name: &str) -> Result<Self> {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        if version.is_empty() || name.is_empty() {
            return Err(TypesError::InvalidKind(format!("{}/{}", api_version, name)));
        }
        Ok(Self::new(group, version, name))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.group, self.version, self.name)
    }
}

impl FromStr for Kind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            [group, version, name] if !version.is_empty() && !name.is_empty() => {
                Ok(Self::new(*group, *version, *name))
            }
            _ => Err(TypesError::InvalidKind(s.to_string())),
        }
    }
}

fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let consonant_before = stem
            .chars()
            .last()
            .map(|c| !"aeiou".contains(c))
            .unwrap_or(false);
        if consonant_before {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}
