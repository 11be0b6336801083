//! Configuration document
//!
//! A JSON tree of `engines → groups → logics → fields` handled as an opaque
//! value with id-keyed access. Engines are matched by `engine_id`, groups by
//! `group_number` and logics by `logic_name`; every other key on a logic
//! object is a field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::hash::ContentHash;
use crate::ids::{EngineId, FieldName, GroupId};
use crate::path::LeafPath;

const ENGINES: &str = "engines";
const ENGINE_ID: &str = "engine_id";
const GROUPS: &str = "groups";
const GROUP_NUMBER: &str = "group_number";
const LOGICS: &str = "logics";
const LOGIC_NAME: &str = "logic_name";

/// Trading configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct ConfigDocument {
    value: JsonValue,
}

impl ConfigDocument {
    /// Wrap a JSON value
    ///
    /// # Errors
    /// Returns error if the root is not an object with an `engines` array
    pub fn new(value: JsonValue) -> Result<Self, DocumentError> {
        match value.get(ENGINES) {
            Some(JsonValue::Array(_)) => Ok(Self { value }),
            Some(_) => Err(DocumentError::InvalidShape(
                "'engines' must be an array".to_string(),
            )),
            None => Err(DocumentError::InvalidShape(
                "missing top-level 'engines' array".to_string(),
            )),
        }
    }

    /// Parse from JSON string
    ///
    /// # Errors
    /// Returns error if JSON is invalid or has the wrong shape
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::new(value)
    }

    /// Parse from YAML string
    ///
    /// # Errors
    /// Returns error if YAML is invalid or has the wrong shape
    pub fn from_yaml(yaml: &str) -> Result<Self, DocumentError> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::new(value)
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    /// Returns error if serialization fails (rare for JSON)
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(&self.value)
            .map_err(|e| DocumentError::Serialization(e.to_string()))
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String, DocumentError> {
        serde_yaml::to_string(&self.value).map_err(|e| DocumentError::Serialization(e.to_string()))
    }

    /// Underlying JSON value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    /// Engines in document order
    #[must_use]
    pub fn engine_ids(&self) -> Vec<EngineId> {
        self.engines()
            .filter_map(engine_id_of)
            .collect()
    }

    /// Groups of an engine in document order
    #[must_use]
    pub fn group_ids(&self, engine: &EngineId) -> Vec<GroupId> {
        self.find_engine(engine)
            .map(|engine| {
                children(engine, GROUPS)
                    .filter_map(group_id_of)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Logic names of a group in document order
    #[must_use]
    pub fn logic_names(&self, engine: &EngineId, group: GroupId) -> Vec<String> {
        self.find_group(engine, group)
            .map(|group| {
                children(group, LOGICS)
                    .filter_map(logic_name_of)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fields carried by one logic, in document order
    #[must_use]
    pub fn field_names(&self, engine: &EngineId, group: GroupId, logic: &str) -> Vec<FieldName> {
        self.find_logic(engine, group, logic)
            .and_then(JsonValue::as_object)
            .map(|fields| {
                fields
                    .keys()
                    .filter(|key| key.as_str() != LOGIC_NAME)
                    .map(FieldName::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Read a leaf
    #[must_use]
    pub fn get(&self, leaf: &LeafPath) -> Option<&JsonValue> {
        self.find_logic(&leaf.engine, leaf.group, &leaf.logic)?
            .get(leaf.field.as_str())
    }

    /// Read a numeric leaf
    #[inline]
    #[must_use]
    pub fn get_f64(&self, leaf: &LeafPath) -> Option<f64> {
        self.get(leaf).and_then(JsonValue::as_f64)
    }

    /// Write a leaf, returning the previous value
    ///
    /// Only existing fields can be written; the tree shape never changes.
    ///
    /// # Errors
    /// Returns `LeafNotFound` if the engine, group, logic or field is absent
    pub fn set(&mut self, leaf: &LeafPath, value: JsonValue) -> Result<JsonValue, DocumentError> {
        let slot = self
            .find_logic_mut(&leaf.engine, leaf.group, &leaf.logic)
            .and_then(|logic| logic.get_mut(leaf.field.as_str()))
            .ok_or_else(|| DocumentError::LeafNotFound(leaf.to_string()))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Every addressable leaf, in engine/group/logic/field document order
    #[must_use]
    pub fn leaves(&self) -> Vec<LeafPath> {
        let mut out = Vec::new();
        for engine in self.engine_ids() {
            for group in self.group_ids(&engine) {
                for logic in self.logic_names(&engine, group) {
                    for field in self.field_names(&engine, group, &logic) {
                        out.push(LeafPath::new(engine.clone(), group, &logic, field));
                    }
                }
            }
        }
        out
    }

    /// Flatten to id-keyed slash paths
    ///
    /// Array elements carrying an id key are addressed by that id
    /// (`engines/A/groups/1/logics/POWER/grid`), other elements by index.
    #[must_use]
    pub fn flatten(&self) -> BTreeMap<String, JsonValue> {
        let mut out = BTreeMap::new();
        flatten_into(&self.value, String::new(), &mut out);
        out
    }

    /// Blake3 hash of the canonical (sorted-key) JSON form
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::compute(canonical_json(&self.value).as_bytes())
    }

    fn engines(&self) -> impl Iterator<Item = &JsonValue> {
        children(&self.value, ENGINES)
    }

    fn find_engine(&self, engine: &EngineId) -> Option<&JsonValue> {
        self.engines()
            .find(|candidate| engine_id_of(candidate).as_ref() == Some(engine))
    }

    fn find_group(&self, engine: &EngineId, group: GroupId) -> Option<&JsonValue> {
        children(self.find_engine(engine)?, GROUPS).find(|g| group_id_of(g) == Some(group))
    }

    fn find_logic(&self, engine: &EngineId, group: GroupId, logic: &str) -> Option<&JsonValue> {
        children(self.find_group(engine, group)?, LOGICS)
            .find(|l| logic_name_of(l).is_some_and(|name| name.eq_ignore_ascii_case(logic)))
    }

    fn find_logic_mut(
        &mut self,
        engine: &EngineId,
        group: GroupId,
        logic: &str,
    ) -> Option<&mut Map<String, JsonValue>> {
        self.value
            .get_mut(ENGINES)?
            .as_array_mut()?
            .iter_mut()
            .find(|candidate| engine_id_of(candidate).as_ref() == Some(engine))?
            .get_mut(GROUPS)?
            .as_array_mut()?
            .iter_mut()
            .find(|g| group_id_of(g) == Some(group))?
            .get_mut(LOGICS)?
            .as_array_mut()?
            .iter_mut()
            .find(|l| logic_name_of(l).is_some_and(|name| name.eq_ignore_ascii_case(logic)))?
            .as_object_mut()
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            value: serde_json::json!({ "engines": [] }),
        }
    }
}

impl TryFrom<JsonValue> for ConfigDocument {
    type Error = DocumentError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfigDocument> for JsonValue {
    fn from(document: ConfigDocument) -> Self {
        document.value
    }
}

/// Document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Input is not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Input is not valid YAML
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Parsed tree lacks the engines/groups/logics structure
    #[error("invalid document shape: {0}")]
    InvalidShape(String),

    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Engine, group, logic or field does not exist
    #[error("leaf not found: {0}")]
    LeafNotFound(String),
}

fn children<'a>(node: &'a JsonValue, key: &str) -> impl Iterator<Item = &'a JsonValue> {
    node.get(key)
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
}

fn engine_id_of(node: &JsonValue) -> Option<EngineId> {
    node.get(ENGINE_ID)
        .and_then(JsonValue::as_str)
        .and_then(|id| EngineId::new(id).ok())
}

fn group_id_of(node: &JsonValue) -> Option<GroupId> {
    let n = match node.get(GROUP_NUMBER)? {
        JsonValue::Number(n) => n.as_u64()?,
        JsonValue::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    GroupId::new(u8::try_from(n).ok()?).ok()
}

fn logic_name_of(node: &JsonValue) -> Option<String> {
    node.get(LOGIC_NAME)
        .and_then(JsonValue::as_str)
        .map(str::to_ascii_uppercase)
}

/// Id used to key an array element in flattened paths
fn element_key(node: &JsonValue) -> Option<String> {
    if let Some(engine) = engine_id_of(node) {
        return Some(engine.to_string());
    }
    if let Some(group) = group_id_of(node) {
        return Some(group.get().to_string());
    }
    logic_name_of(node)
}

fn is_id_key(key: &str) -> bool {
    matches!(key, ENGINE_ID | GROUP_NUMBER | LOGIC_NAME)
}

fn flatten_into(node: &JsonValue, prefix: String, out: &mut BTreeMap<String, JsonValue>) {
    let join = |segment: &str| {
        if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{prefix}/{segment}")
        }
    };
    match node {
        JsonValue::Object(map) => {
            for (key, child) in map {
                if is_id_key(key) {
                    continue;
                }
                flatten_into(child, join(key), out);
            }
        }
        JsonValue::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let segment = element_key(child).unwrap_or_else(|| index.to_string());
                flatten_into(child, join(&segment), out);
            }
        }
        scalar => {
            out.insert(prefix, scalar.clone());
        }
    }
}

/// Canonical JSON (sorted keys)
fn canonical_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .filter_map(|key| map.get(key).map(|val| format!("{key:?}:{}", canonical_json(val))))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        JsonValue::Array(arr) => {
            let parts: Vec<_> = arr.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> ConfigDocument {
        ConfigDocument::new(json!({
            "engines": [
                { "engine_id": "A", "groups": [
                    { "group_number": 1, "logics": [
                        { "logic_name": "POWER", "grid": 600, "initial_lot": 0.02 },
                        { "logic_name": "SCALPER", "grid": 300 }
                    ]},
                    { "group_number": 2, "logics": [
                        { "logic_name": "POWER", "grid": 700 }
                    ]}
                ]}
            ]
        }))
        .unwrap()
    }

    fn leaf(text: &str) -> LeafPath {
        text.parse().unwrap()
    }

    #[test]
    fn rejects_missing_engines() {
        assert!(matches!(
            ConfigDocument::new(json!({"groups": []})),
            Err(DocumentError::InvalidShape(_))
        ));
        assert!(ConfigDocument::from_json("{not json").is_err());
    }

    #[test]
    fn enumerates_in_document_order() {
        let doc = doc();
        let a = EngineId::new("A").unwrap();
        assert_eq!(doc.engine_ids(), vec![a.clone()]);
        assert_eq!(
            doc.group_ids(&a).iter().map(|g| g.get()).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(
            doc.logic_names(&a, GroupId::new(1).unwrap()),
            vec!["POWER".to_string(), "SCALPER".to_string()]
        );
        assert_eq!(doc.leaves().len(), 4);
    }

    #[test]
    fn get_and_set_by_leaf() {
        let mut doc = doc();
        let grid = leaf("A/G1/power/grid");
        assert_eq!(doc.get_f64(&grid), Some(600.0));

        let old = doc.set(&grid, json!(500)).unwrap();
        assert_eq!(old, json!(600));
        assert_eq!(doc.get(&grid), Some(&json!(500)));
    }

    #[test]
    fn set_never_creates_leaves() {
        let mut doc = doc();
        let before = doc.clone();
        for missing in ["A/G1/POWER/tp_value", "A/G3/POWER/grid", "B/G1/POWER/grid"] {
            assert!(matches!(
                doc.set(&leaf(missing), json!(1)),
                Err(DocumentError::LeafNotFound(_))
            ));
        }
        assert_eq!(doc, before);
    }

    #[test]
    fn flatten_uses_ids() {
        let flat = doc().flatten();
        assert_eq!(flat.get("engines/A/groups/1/logics/POWER/grid"), Some(&json!(600)));
        assert_eq!(flat.get("engines/A/groups/2/logics/POWER/grid"), Some(&json!(700)));
        assert!(!flat.keys().any(|k| k.ends_with("logic_name")));
    }

    #[test]
    fn hash_ignores_key_order() {
        let a = ConfigDocument::from_json(r#"{"engines": [], "b": 1, "a": 2}"#).unwrap();
        let b = ConfigDocument::from_json(r#"{"a": 2, "b": 1, "engines": []}"#).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());

        let mut changed = doc();
        let original = changed.content_hash();
        changed.set(&leaf("A/G1/POWER/grid"), json!(601)).unwrap();
        assert_ne!(changed.content_hash(), original);
    }

    #[test]
    fn yaml_round_trip_preserves_values() {
        let doc = doc();
        let yaml = doc.to_yaml().unwrap();
        let back = ConfigDocument::from_yaml(&yaml).unwrap();
        assert_eq!(back.get_f64(&leaf("A/G1/POWER/initial_lot")), Some(0.02));
    }
}
