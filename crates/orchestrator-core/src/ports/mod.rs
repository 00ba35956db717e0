//! # Ports, port schemas, and the `PortValue` tagged union
//!
//! A [`Port`] is a typed input/output slot on a node. Values flowing through
//! the [`crate::context::ExecutionContext`] are heterogeneous at runtime, so
//! they are represented as [`PortValue`] — a small tagged union — validated
//! against a [`PortSchema`] with tolerant conversion rules (numeric strings
//! accepted as numbers, comma-separated strings accepted as numeric vectors).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role a port plays within its owning node family. Distinct families
/// only ever use a subset of these; [`PortRole::is_valid_for`] enforces that
/// at metamodel-validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    // LLM
    UserPrompt,
    SystemPromptVariable,
    Response,
    // HTTP
    ReqBody,
    ReqBodyField,
    ReqHeader,
    ReqQueryParameter,
    ReqPathVariable,
    ResFullBody,
    ResBodyField,
    ResStatus,
    ResHeaders,
    // Vector DB
    InputVector,
    Results,
    FirstResult,
    // Embeddings
    InputText,
    OutputVector,
}

impl PortRole {
    /// Roles legal for an AI/LLM node.
    const LLM_ROLES: &'static [PortRole] = &[
        PortRole::UserPrompt,
        PortRole::SystemPromptVariable,
        PortRole::Response,
    ];

    /// Roles legal for an AI/embeddings node.
    const EMBEDDINGS_ROLES: &'static [PortRole] = &[PortRole::InputText, PortRole::OutputVector];

    /// Roles legal for a TOOL/REST node.
    const REST_ROLES: &'static [PortRole] = &[
        PortRole::ReqBody,
        PortRole::ReqBodyField,
        PortRole::ReqHeader,
        PortRole::ReqQueryParameter,
        PortRole::ReqPathVariable,
        PortRole::ResFullBody,
        PortRole::ResBodyField,
        PortRole::ResStatus,
        PortRole::ResHeaders,
    ];

    /// Roles legal for a TOOL/vector-DB node.
    const VECTOR_DB_ROLES: &'static [PortRole] =
        &[PortRole::InputVector, PortRole::Results, PortRole::FirstResult];

    /// Whether this role is legal for the given node family, identified by
    /// one of `"llm" | "embeddings" | "rest" | "vector_db" | "gateway"`.
    pub fn is_valid_for(&self, family: &str) -> bool {
        match family {
            "llm" => Self::LLM_ROLES.contains(self),
            "embeddings" => Self::EMBEDDINGS_ROLES.contains(self),
            "rest" => Self::REST_ROLES.contains(self),
            "vector_db" => Self::VECTOR_DB_ROLES.contains(self),
            // A gateway node is pure flow control; it has no typed ports.
            "gateway" => false,
            _ => false,
        }
    }
}

/// Structural shape of a port's accepted values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PortSchemaKind {
    String,
    Int,
    Float,
    Bool,
    Date,
    Object { properties: BTreeMap<String, PortSchema> },
    Array { items: Box<PortSchema> },
}

/// A port's schema: its structural shape plus whether a value is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSchema {
    pub kind: PortSchemaKind,
    pub required: bool,
}

impl PortSchema {
    pub fn new(kind: PortSchemaKind, required: bool) -> Self {
        Self { kind, required }
    }

    pub fn required(kind: PortSchemaKind) -> Self {
        Self::new(kind, true)
    }

    pub fn optional(kind: PortSchemaKind) -> Self {
        Self::new(kind, false)
    }

    /// Tolerant structural validation against a runtime [`PortValue`].
    ///
    /// `Null` is valid for any non-required schema; numeric strings convert
    /// to `Int`/`Float`, and comma-separated strings convert to numeric
    /// `Array`s, matching the source system's tolerant-conversion behavior.
    pub fn is_valid_value(&self, value: &PortValue) -> bool {
        if matches!(value, PortValue::Null) {
            return !self.required;
        }
        match (&self.kind, value) {
            (PortSchemaKind::String, PortValue::String(_)) => true,
            (PortSchemaKind::Int, PortValue::Int(_)) => true,
            (PortSchemaKind::Int, PortValue::String(s)) => s.trim().parse::<i64>().is_ok(),
            (PortSchemaKind::Float, PortValue::Float(_)) => true,
            (PortSchemaKind::Float, PortValue::Int(_)) => true,
            (PortSchemaKind::Float, PortValue::String(s)) => s.trim().parse::<f64>().is_ok(),
            (PortSchemaKind::Bool, PortValue::Bool(_)) => true,
            (PortSchemaKind::Date, PortValue::Date(_)) => true,
            (PortSchemaKind::Date, PortValue::String(s)) => {
                DateTime::parse_from_rfc3339(s).is_ok()
            }
            (PortSchemaKind::Object { properties }, PortValue::Map(map)) => {
                properties.iter().all(|(key, schema)| {
                    map.get(key)
                        .map(|v| schema.is_valid_value(v))
                        .unwrap_or(!schema.required)
                })
            }
            (PortSchemaKind::Array { items }, PortValue::Seq(seq)) => {
                seq.iter().all(|v| items.is_valid_value(v))
            }
            // A comma-separated string is tolerated as a numeric vector.
            (PortSchemaKind::Array { items }, PortValue::String(s))
                if matches!(items.kind, PortSchemaKind::Int | PortSchemaKind::Float) =>
            {
                s.split(',').all(|part| {
                    let part = part.trim();
                    !part.is_empty() && part.parse::<f64>().is_ok()
                })
            }
            _ => false,
        }
    }
}

/// Tagged union of runtime values flowing through an [`crate::context::ExecutionContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Seq(Vec<PortValue>),
    Map(BTreeMap<String, PortValue>),
}

impl PortValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PortValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PortValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PortValue>> {
        match self {
            PortValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, PortValue>> {
        match self {
            PortValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Vec<PortValue>> {
        match self {
            PortValue::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<PortValue>> {
        match self {
            PortValue::Seq(s) => Some(s),
            _ => None,
        }
    }

    /// `true`-ish coercion per the edge-condition evaluator's rules:
    /// booleans as-is; strings `"true"/"yes"/"1"` (case-insensitive) are
    /// true, `"false"/"no"/"0"/""` are false; non-zero numbers are true.
    pub fn is_true_value(&self) -> bool {
        match self {
            PortValue::Bool(b) => *b,
            PortValue::Null => false,
            PortValue::Int(i) => *i != 0,
            PortValue::Float(f) => *f != 0.0,
            PortValue::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
            PortValue::Seq(s) => !s.is_empty(),
            PortValue::Map(m) => !m.is_empty(),
            PortValue::Date(_) => true,
        }
    }

    /// `IS_FALSE` semantics. Notably `is_false_value(Null) == true` while
    /// `is_true_value(Null) == false` — both values are legal simultaneously
    /// because "false" here means "not true", not merely "negation of true".
    pub fn is_false_value(&self) -> bool {
        match self {
            PortValue::Null => true,
            PortValue::String(s) => {
                matches!(s.to_lowercase().as_str(), "false" | "no" | "0" | "")
            }
            other => !other.is_true_value(),
        }
    }

    /// Deep clone, matching the mandatory deep-copy semantics of the
    /// execution context: mappings and sequences are recursively copied,
    /// primitive leaves are shared by value (cheap to clone regardless).
    pub fn deep_copy(&self) -> Self {
        match self {
            PortValue::Seq(items) => PortValue::Seq(items.iter().map(PortValue::deep_copy).collect()),
            PortValue::Map(map) => {
                PortValue::Map(map.iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect())
            }
            other => other.clone(),
        }
    }
}

impl From<&str> for PortValue {
    fn from(s: &str) -> Self {
        PortValue::String(s.to_string())
    }
}

impl From<String> for PortValue {
    fn from(s: String) -> Self {
        PortValue::String(s)
    }
}

impl From<i64> for PortValue {
    fn from(n: i64) -> Self {
        PortValue::Int(n)
    }
}

impl From<f64> for PortValue {
    fn from(n: f64) -> Self {
        PortValue::Float(n)
    }
}

impl From<bool> for PortValue {
    fn from(b: bool) -> Self {
        PortValue::Bool(b)
    }
}

/// Typed input/output slot on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique within the owning node.
    pub key: String,
    pub schema: PortSchema,
    pub role: PortRole,
    pub default: Option<PortValue>,
}

impl Port {
    pub fn new(key: impl Into<String>, schema: PortSchema, role: PortRole) -> Self {
        Self { key: key.into(), schema, role, default: None }
    }

    pub fn with_default(mut self, default: PortValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.schema.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerant_numeric_string_conversion() {
        let schema = PortSchema::required(PortSchemaKind::Int);
        assert!(schema.is_valid_value(&PortValue::String("42".to_string())));
        assert!(!schema.is_valid_value(&PortValue::String("forty-two".to_string())));
    }

    #[test]
    fn comma_separated_string_as_numeric_array() {
        let schema = PortSchema::required(PortSchemaKind::Array {
            items: Box::new(PortSchema::required(PortSchemaKind::Float)),
        });
        assert!(schema.is_valid_value(&PortValue::String("1,2,3.5".to_string())));
        assert!(!schema.is_valid_value(&PortValue::String("1,a,3".to_string())));
    }

    #[test]
    fn optional_schema_accepts_null() {
        let schema = PortSchema::optional(PortSchemaKind::String);
        assert!(schema.is_valid_value(&PortValue::Null));
    }

    #[test]
    fn required_schema_rejects_null() {
        let schema = PortSchema::required(PortSchemaKind::String);
        assert!(!schema.is_valid_value(&PortValue::Null));
    }

    #[test]
    fn true_false_value_rules() {
        assert!(!PortValue::Null.is_true_value());
        assert!(PortValue::Null.is_false_value());
        assert!(PortValue::String("yes".to_string()).is_true_value());
        assert!(PortValue::String("0".to_string()).is_false_value());
        assert!(PortValue::Int(5).is_true_value());
        assert!(!PortValue::Int(0).is_true_value());
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), PortValue::Seq(vec![PortValue::Int(1)]));
        let original = PortValue::Map(map);
        let mut copy = original.deep_copy();

        if let PortValue::Map(m) = &mut copy {
            if let Some(PortValue::Seq(seq)) = m.get_mut("a") {
                seq.push(PortValue::Int(2));
            }
        }

        assert_eq!(original.as_map().unwrap()["a"].as_seq().unwrap().len(), 1);
    }
}
