//! Shape definitions for receipt payloads
//!
//! A shape lists the top-level fields a payload must (or may) carry and the
//! kind of value each holds. Fields not listed are allowed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SchemaError, SchemaResult};

/// Kind of value a field holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    NonEmptyString,
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Integer {
        #[serde(default)]
        min: Option<i64>,
    },
    Boolean,
    Enum {
        values: Vec<String>,
    },
    Array,
    Object,
}

impl FieldKind {
    /// Non-negative number (dollar amounts, rates)
    pub fn amount() -> Self {
        FieldKind::Number {
            min: Some(0.0),
            max: None,
        }
    }

    /// Number in `[0, 1]`
    pub fn fraction() -> Self {
        FieldKind::Number {
            min: Some(0.0),
            max: Some(1.0),
        }
    }

    /// Any finite number
    pub fn number() -> Self {
        FieldKind::Number {
            min: None,
            max: None,
        }
    }

    /// Non-negative integer (counts)
    pub fn count() -> Self {
        FieldKind::Integer { min: Some(0) }
    }

    pub fn one_of(values: &[&str]) -> Self {
        FieldKind::Enum {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn check(&self, path: &str, value: &Value) -> SchemaResult<()> {
        match self {
            FieldKind::String => {
                if !value.is_string() {
                    return Err(SchemaError::field(path, "expected string"));
                }
            }
            FieldKind::NonEmptyString => match value.as_str() {
                Some(s) if !s.trim().is_empty() => {}
                Some(_) => return Err(SchemaError::field(path, "must not be empty")),
                None => return Err(SchemaError::field(path, "expected string")),
            },
            FieldKind::Number { min, max } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| SchemaError::field(path, "expected number"))?;
                if let Some(min) = min {
                    if n < *min {
                        return Err(SchemaError::field(path, format!("must be >= {min}")));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(SchemaError::field(path, format!("must be <= {max}")));
                    }
                }
            }
            FieldKind::Integer { min } => {
                let n = value
                    .as_i64()
                    .or_else(|| value.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                    .ok_or_else(|| SchemaError::field(path, "expected integer"))?;
                if let Some(min) = min {
                    if n < *min {
                        return Err(SchemaError::field(path, format!("must be >= {min}")));
                    }
                }
            }
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    return Err(SchemaError::field(path, "expected boolean"));
                }
            }
            FieldKind::Enum { values } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| SchemaError::field(path, "expected string"))?;
                if !values.iter().any(|v| v == s) {
                    return Err(SchemaError::field(
                        path,
                        format!("must be one of [{}]", values.join(", ")),
                    ));
                }
            }
            FieldKind::Array => {
                if !value.is_array() {
                    return Err(SchemaError::field(path, "expected array"));
                }
            }
            FieldKind::Object => {
                if !value.is_object() {
                    return Err(SchemaError::field(path, "expected object"));
                }
            }
        }
        Ok(())
    }
}

fn default_required() -> bool {
    true
}

/// One top-level payload field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Numeric value must not exceed the named sibling field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_greater_than: Option<String>,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            not_greater_than: None,
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn not_greater_than(mut self, other: &str) -> Self {
        self.not_greater_than = Some(other.to_string());
        self
    }
}

/// Registered shape for one receipt type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub fields: Vec<FieldSpec>,
}

impl Shape {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Check a payload object against this shape. Fields are checked in
    /// declaration order and the first failure is reported.
    pub fn check(&self, payload: &Map<String, Value>) -> SchemaResult<()> {
        for spec in &self.fields {
            let value = match payload.get(&spec.name) {
                Some(Value::Null) | None if spec.required => {
                    return Err(SchemaError::field(&spec.name, "required field missing"));
                }
                Some(Value::Null) | None => continue,
                Some(v) => v,
            };
            spec.kind.check(&spec.name, value)?;

            if let Some(other) = &spec.not_greater_than {
                let ceiling = payload.get(other).and_then(Value::as_f64);
                if let (Some(n), Some(ceiling)) = (value.as_f64(), ceiling) {
                    if n > ceiling {
                        return Err(SchemaError::field(
                            &spec.name,
                            format!("must not exceed {other} ({ceiling})"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
