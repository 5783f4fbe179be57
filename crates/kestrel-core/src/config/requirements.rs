//! Presence and type checks over dotted paths in a configuration mapping.

use serde_yaml::Value;
use std::fmt;
use tracing::error;

/// Expected type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Bool,
    Mapping,
    Sequence,
}

impl ValueKind {
    /// Whether `value` has this kind. Integers do not match `Float`.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => matches!(value, Value::Number(n) if n.is_f64()),
            Self::Bool => value.is_bool(),
            Self::Mapping => value.is_mapping(),
            Self::Sequence => value.is_sequence(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Mapping => "mapping",
            Self::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

/// Ordered set of dotted paths that must be present, optionally with a type.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    fields: Vec<(String, Option<ValueKind>)>,
}

impl Requirements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `path` to be present with the given kind.
    #[must_use]
    pub fn typed(mut self, path: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push((path.into(), Some(kind)));
        self
    }

    /// Require `path` to be present, any kind.
    #[must_use]
    pub fn present(mut self, path: impl Into<String>) -> Self {
        self.fields.push((path.into(), None));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<ValueKind>)> {
        self.fields.iter().map(|(path, kind)| (path.as_str(), *kind))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolve a dotted path (`"roboflow.api_key"`) one segment at a time.
#[must_use]
pub fn lookup<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(config, |current, segment| current.as_mapping().and_then(|map| map.get(segment)))
}

/// Check every requirement against `config`.
///
/// Returns `false` on the first missing path or type mismatch, after logging
/// it. Never fails otherwise.
#[must_use]
pub fn validate(config: &Value, requirements: &Requirements) -> bool {
    for (path, expected) in requirements.iter() {
        let Some(value) = lookup(config, path) else {
            error!(field = path, "required configuration field not found");
            return false;
        };

        if let Some(kind) = expected {
            if !kind.matches(value) {
                error!(
                    field = path,
                    expected = %kind,
                    actual = describe(value),
                    "configuration field has the wrong type"
                );
                return false;
            }
        }
    }
    true
}
