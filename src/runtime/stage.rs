use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TrackError};

/// Parameter name -> JSON value. Equality is structural and ignores key order.
pub type ParameterSet = Map<String, Value>;

/// Stage id, scoped per node type. Always written as its decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub u64);

impl StageId {
    pub const DEFAULT: StageId = StageId(0);

    /// The id after this one, or `None` at `u64::MAX`.
    pub fn checked_next(self) -> Option<StageId> {
        self.0.checked_add(1).map(StageId)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StageId {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        // Canonical decimal only, so "01" never aliases "1" in the store
        let canonical = !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_digit())
            && (s == "0" || !s.starts_with('0'));
        if !canonical {
            return Err(TrackError::InvalidStageId(s.to_string()));
        }
        s.parse::<u64>()
            .map(StageId)
            .map_err(|_| TrackError::InvalidStageId(s.to_string()))
    }
}

impl From<u64> for StageId {
    fn from(value: u64) -> Self {
        StageId(value)
    }
}

impl Serialize for StageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct StageIdVisitor;

impl<'de> Visitor<'de> for StageIdVisitor {
    type Value = StageId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative decimal stage id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<StageId, E> {
        v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<StageId, E> {
        Ok(StageId(v))
    }
}

impl<'de> Deserialize<'de> for StageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(StageIdVisitor)
    }
}

/// Serialize any value into a parameter set, rejecting anything that is not a JSON object.
pub fn to_parameter_set<T: Serialize>(node_type: &str, value: T) -> Result<ParameterSet> {
    let value = serde_json::to_value(value).map_err(|e| TrackError::InvalidParameterSet {
        node_type: node_type.to_string(),
        found: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(TrackError::InvalidParameterSet {
            node_type: node_type.to_string(),
            found: json_kind(&other).to_string(),
        }),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `{node_type}_{id}`, the key the pipeline tool knows the stage by.
pub fn stage_name(node_type: &str, id: StageId) -> String {
    format!("{}_{}", node_type, id)
}
