//! # Snapshots
//!
//! A [`Snapshot`] is one decoded telemetry frame. It wraps the JSON object in
//! an `Arc` so the store, the diff engine and tests can hold it without
//! copying, and it is never mutated after the decoder builds it.
//!
//! Fields are addressed with dotted [`FieldPath`]s (`gameplay.hit_100`) and
//! surfaced to the rest of the pipeline as [`FieldValue`]s.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bindings::ConfigError;

/// A dotted path into a snapshot, e.g. `beatmap.paths.background_path_full`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path. Empty paths and empty segments (`a..b`) are rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidPath(raw.to_string()));
        }
        let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::InvalidPath(raw.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// One immutable decoded frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: Arc<Map<String, Value>>,
}

impl Snapshot {
    /// Wraps a JSON value. Only objects are valid snapshots.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self { root: Arc::new(map) }),
            _ => None,
        }
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Walks nested objects along `path`. JSON `null` is reported as absent.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.root.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Returns the first alias in `paths` present in this snapshot.
    pub fn lookup<'p>(&self, paths: &'p [FieldPath]) -> Option<(&'p FieldPath, &Value)> {
        paths
            .iter()
            .find_map(|path| self.get(path).map(|value| (path, value)))
    }
}

/// A field value as carried in a [`crate::state_store::Delta`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// Sentinel for "no value yet", used as the old side of the first delta.
    #[default]
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value. Numeric strings count; empty strings do not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Absent => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => !s.is_empty(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Compares against a JSON literal from a binding file. `2` and `2.0` are equal.
    pub fn matches_json(&self, expected: &Value) -> bool {
        let expected = FieldValue::from(expected);
        match (self.as_number(), expected.as_number()) {
            (Some(a), Some(b)) if !matches!(self, FieldValue::Text(_)) => a == b,
            _ => *self == expected,
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Absent,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Absent => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    #[test]
    fn test_field_path_rejects_empty_segments() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("gameplay..hit_100").is_err());
        assert_eq!(path("gameplay.hit_100").segments().len(), 2);
        assert_eq!(path("gameplay.hit_100").to_string(), "gameplay.hit_100");
    }

    #[test]
    fn test_get_walks_nested_groups_and_treats_null_as_absent() {
        let snap = Snapshot::from_value(json!({
            "state": 2,
            "gameplay": { "hit_100": 4, "grade": null },
            "beatmap": { "paths": { "background_path_full": "a/bg.jpg" } }
        }))
        .unwrap();

        assert_eq!(snap.get(&path("state")), Some(&json!(2)));
        assert_eq!(snap.get(&path("gameplay.hit_100")), Some(&json!(4)));
        assert_eq!(
            snap.get(&path("beatmap.paths.background_path_full")),
            Some(&json!("a/bg.jpg"))
        );
        assert_eq!(snap.get(&path("gameplay.grade")), None);
        assert_eq!(snap.get(&path("state.inner")), None);
        assert_eq!(snap.get(&path("missing")), None);
    }

    #[test]
    fn test_lookup_prefers_first_present_alias() {
        let snap = Snapshot::from_value(json!({ "status": 5 })).unwrap();
        let aliases = vec![path("state"), path("status")];
        let (hit, value) = snap.lookup(&aliases).unwrap();
        assert_eq!(hit.to_string(), "status");
        assert_eq!(value, &json!(5));
    }

    #[test]
    fn test_only_objects_are_snapshots() {
        assert!(Snapshot::from_value(json!([1, 2])).is_none());
        assert!(Snapshot::from_value(json!("text")).is_none());
    }

    #[test]
    fn test_field_value_views() {
        assert_eq!(FieldValue::Text("12.5".into()).as_number(), Some(12.5));
        assert_eq!(FieldValue::Text(String::new()).as_number(), None);
        assert!(FieldValue::Number(2.0).matches_json(&json!(2)));
        assert!(!FieldValue::Text("2".into()).matches_json(&json!(2)));
        assert_eq!(FieldValue::Number(305.0).to_string(), "305");
        assert_eq!(FieldValue::Number(1.25).to_string(), "1.25");
    }
}
