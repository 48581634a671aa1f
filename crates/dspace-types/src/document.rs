//! Resource documents
//!
//! A document is the persisted state of one resource: its identity, the
//! store-assigned uid and version, and a free-form JSON body. Attributes in the
//! body are read and written through [`AttrPath`]s.

use crate::error::{Result, TypesError};
use crate::kind::Kind;
use crate::mount::{MountEdge, Mounts, MOUNT_ATTR_PATH};
use crate::name::NamespacedName;
use crate::path::AttrPath;
use crate::reference::ResourceRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Serializes as the full object form of [`Document::to_value`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Document {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
    pub uid: Option<Uuid>,
    pub resource_version: u64,
    pub body: Map<String, Value>,
}

impl Document {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let nn = NamespacedName::new(namespace, name);
        Self {
            kind,
            namespace: nn.namespace,
            name: nn.name,
            uid: None,
            resource_version: 0,
            body: Map::new(),
        }
    }

    /// Replace the body; non-object values leave it empty
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    /// Resource identity, `namespace/name`
    pub fn id(&self) -> String {
        self.namespaced_name().to_string()
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.kind.clone(), self.namespace.clone(), self.name.clone())
    }

    /// Value at `path`, or `None` when any segment is missing
    pub fn get(&self, path: &AttrPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.body.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at `path`, creating missing intermediate maps
    pub fn set(&mut self, path: &AttrPath, value: Value) -> Result<()> {
        let Some((parents, last)) = path.split_last() else {
            return Err(TypesError::InvalidPath(path.to_string()));
        };

        let mut current = &mut self.body;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(TypesError::NotAMap {
                        path: path.to_string(),
                        segment: segment.clone(),
                    })
                }
            };
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    /// Remove and return the value at `path`
    pub fn remove(&mut self, path: &AttrPath) -> Option<Value> {
        let (parents, last) = path.split_last()?;
        let mut current = &mut self.body;
        for segment in parents {
            current = match current.get_mut(segment) {
                Some(Value::Object(map)) => map,
                _ => return None,
            };
        }
        current.remove(last)
    }

    /// Mount references carried at `spec.mount`; absent means none
    pub fn mounts(&self) -> Result<Mounts> {
        match self.get(&mount_path()) {
            None | Some(Value::Null) => Ok(Mounts::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                TypesError::InvalidDocument(format!("{}: malformed {}: {}", self.id(), MOUNT_ATTR_PATH, e))
            }),
        }
    }

    /// Write the mount map back, dropping kinds with no remaining mounts
    pub fn set_mounts(&mut self, mounts: &Mounts) -> Result<()> {
        let pruned: Mounts = mounts
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(gvr, names)| (gvr.clone(), names.clone()))
            .collect();
        let value = serde_json::to_value(&pruned)
            .map_err(|e| TypesError::InvalidDocument(e.to_string()))?;
        self.set(&mount_path(), value)
    }

    /// Every mount this document holds, as edges from it to the mounted resource
    pub fn mount_edges(&self) -> Result<Vec<MountEdge>> {
        let target = self.reference();
        let mut edges = Vec::new();
        for (gvr, names) in self.mounts()? {
            for (name, mount) in names {
                let source: NamespacedName = name.parse()?;
                edges.push(MountEdge {
                    source_gvr: gvr.clone(),
                    source,
                    target: target.clone(),
                    mode: mount.mode,
                    status: mount.status,
                });
            }
        }
        Ok(edges)
    }

    /// Full object form: `apiVersion`, `kind`, `metadata` and the body
    pub fn to_value(&self) -> Value {
        let mut object = self.body.clone();

        let mut metadata = match object.remove("metadata") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        metadata.insert("name".into(), Value::String(self.name.clone()));
        metadata.insert("namespace".into(), Value::String(self.namespace.clone()));
        if let Some(uid) = self.uid {
            metadata.insert("uid".into(), Value::String(uid.to_string()));
        }
        metadata.insert(
            "resourceVersion".into(),
            Value::String(self.resource_version.to_string()),
        );

        object.insert("apiVersion".into(), Value::String(self.kind.api_version()));
        object.insert("kind".into(), Value::String(self.kind.name.clone()));
        object.insert("metadata".into(), Value::Object(metadata));
        Value::Object(object)
    }

    /// Parse the full object form produced by [`Document::to_value`]
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(TypesError::InvalidDocument("expected an object".into()));
        };

        let api_version = take_string(&mut object, "apiVersion")?;
        let kind_name = take_string(&mut object, "kind")?;
        let kind = Kind::from_api_version(&api_version, &kind_name)?;

        let mut metadata = match object.remove("metadata") {
            Some(Value::Object(map)) => map,
            _ => return Err(TypesError::InvalidDocument("missing metadata".into())),
        };
        let name = take_string(&mut metadata, "name")?;
        let namespace = match metadata.remove("namespace") {
            Some(Value::String(ns)) => ns,
            _ => String::new(),
        };
        let uid = match metadata.remove("uid") {
            Some(Value::String(raw)) => Some(
                Uuid::parse_str(&raw).map_err(|e| TypesError::InvalidDocument(e.to_string()))?,
            ),
            _ => None,
        };
        let resource_version = match metadata.remove("resourceVersion") {
            Some(Value::String(raw)) => raw
                .parse()
                .map_err(|_| TypesError::InvalidDocument(format!("bad resourceVersion '{}'", raw)))?,
            Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
            _ => 0,
        };
        if !metadata.is_empty() {
            object.insert("metadata".into(), Value::Object(metadata));
        }

        let mut doc = Self::new(kind, namespace, name);
        doc.uid = uid;
        doc.resource_version = resource_version;
        doc.body = object;
        Ok(doc)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.to_value()
    }
}

impl TryFrom<Value> for Document {
    type Error = TypesError;

    fn try_from(value: Value) -> Result<Self> {
        Document::from_value(value)
    }
}

fn mount_path() -> AttrPath {
    AttrPath::from_segments(MOUNT_ATTR_PATH.split('.'))
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Result<String> {
    match object.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(TypesError::InvalidDocument(format!("missing '{}'", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{MountRef, MountStatus};
    use serde_json::json;

    fn lamp() -> Document {
        Document::new(Kind::new("digi.dev", "v1", "Lamp"), "lab", "lamp-1")
            .with_body(json!({"spec": {"power": "on", "levels": [1, 2, 3]}}))
    }

    fn path(raw: &str) -> AttrPath {
        AttrPath::parse(raw).unwrap()
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let doc = lamp();
        assert_eq!(doc.get(&path(".spec.power")), Some(&json!("on")));
        assert_eq!(doc.get(&path("spec.levels.1")), Some(&json!(2)));
        assert_eq!(doc.get(&path("spec.missing")), None);
        assert_eq!(doc.get(&path("spec.power.deeper")), None);
    }

    #[test]
    fn test_set_creates_intermediate_maps() {
        let mut doc = lamp();
        doc.set(&path("status.brightness.level"), json!(0.5)).unwrap();
        assert_eq!(doc.get(&path("status.brightness.level")), Some(&json!(0.5)));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut doc = lamp();
        let err = doc.set(&path("spec.power.mode"), json!(1)).unwrap_err();
        assert!(matches!(err, TypesError::NotAMap { segment, .. } if segment == "power"));
        assert_eq!(doc.get(&path("spec.power")), Some(&json!("on")));
    }

    #[test]
    fn test_set_root_rejected() {
        let mut doc = lamp();
        assert!(doc.set(&AttrPath::root(), json!({})).is_err());
    }

    #[test]
    fn test_remove() {
        let mut doc = lamp();
        assert_eq!(doc.remove(&path("spec.power")), Some(json!("on")));
        assert_eq!(doc.get(&path("spec.power")), None);
        assert_eq!(doc.remove(&path("spec.power")), None);
        assert_eq!(doc.remove(&path("nothing.here")), None);
    }

    #[test]
    fn test_mounts_round_trip() {
        let mut doc = Document::new(Kind::new("digi.dev", "v1", "Room"), "lab", "room-1");
        assert!(doc.mounts().unwrap().is_empty());

        let mut mounts = Mounts::new();
        mounts
            .entry("digi.dev/v1/lamps".to_string())
            .or_default()
            .insert("lab/lamp-1".to_string(), MountRef::default());
        mounts.entry("digi.dev/v1/fans".to_string()).or_default();
        doc.set_mounts(&mounts).unwrap();

        let stored = doc.get(&path("spec.mount")).unwrap();
        assert_eq!(
            stored,
            &json!({"digi.dev/v1/lamps": {"lab/lamp-1": {"mode": "hide", "status": "active"}}})
        );

        let edges = doc.mount_edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source.to_string(), "lab/lamp-1");
        assert_eq!(edges[0].target.id(), "lab/room-1");
        assert_eq!(edges[0].status, MountStatus::Active);
    }

    #[test]
    fn test_malformed_mounts() {
        let doc = Document::new(Kind::new("digi.dev", "v1", "Room"), "lab", "room-1")
            .with_body(json!({"spec": {"mount": ["not", "a", "map"]}}));
        assert!(matches!(doc.mounts(), Err(TypesError::InvalidDocument(_))));
    }

    #[test]
    fn test_value_round_trip() {
        let mut doc = lamp();
        doc.uid = Some(Uuid::new_v4());
        doc.resource_version = 7;
        doc.set(&path("metadata.labels.app"), json!("light")).unwrap();

        let value = doc.to_value();
        assert_eq!(value["apiVersion"], json!("digi.dev/v1"));
        assert_eq!(value["kind"], json!("Lamp"));
        assert_eq!(value["metadata"]["name"], json!("lamp-1"));
        assert_eq!(value["metadata"]["resourceVersion"], json!("7"));
        assert_eq!(value["metadata"]["labels"]["app"], json!("light"));

        let parsed = Document::from_value(value).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_from_value_requires_identity() {
        assert!(Document::from_value(json!({"kind": "Lamp"})).is_err());
        assert!(Document::from_value(json!({
            "apiVersion": "digi.dev/v1",
            "kind": "Lamp",
            "metadata": {}
        }))
        .is_err());

        let doc = Document::from_value(json!({
            "apiVersion": "digi.dev/v1",
            "kind": "Lamp",
            "metadata": {"name": "l1"}
        }))
        .unwrap();
        assert_eq!(doc.id(), "default/l1");
    }

    #[test]
    fn test_serde_uses_object_form() {
        let docs: Vec<Document> = serde_json::from_value(json!([
            {"apiVersion": "digi.dev/v1", "kind": "Lamp", "metadata": {"name": "l1"}, "spec": {"power": "off"}},
            {"apiVersion": "digi.dev/v1", "kind": "Room", "metadata": {"name": "r1", "namespace": "lab"}}
        ]))
        .unwrap();
        assert_eq!(docs[0].get(&path("spec.power")), Some(&json!("off")));
        assert_eq!(docs[1].id(), "lab/r1");
        assert_eq!(serde_json::to_value(&docs[1]).unwrap(), docs[1].to_value());

        let bad: std::result::Result<Document, _> = serde_json::from_value(json!({"kind": "Lamp"}));
        assert!(bad.is_err());
    }
}
