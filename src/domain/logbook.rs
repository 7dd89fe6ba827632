//! Logbooks and their typed attribute definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::LogbookId;
use crate::error::GatewayError;

/// Value type of an entry attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// Free text.
    Text,
    /// Floating point number; numeric strings are accepted and converted.
    Number,
    /// `true` / `false`; the strings `"true"` and `"false"` are accepted.
    Boolean,
    /// One value, normally taken from `options`.
    Option,
    /// Any number of values, normally taken from `options`.
    Multioption,
}

/// Declaration of an attribute that entries in a logbook may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttributeDef {
    /// Attribute name, unique within the logbook.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Whether every entry must set this attribute.
    #[serde(default)]
    pub required: bool,
    /// Suggested values for option attributes.
    #[serde(default)]
    pub options: Vec<String>,
}

impl AttributeDef {
    /// Converts `value` to this attribute's type.
    ///
    /// Returns `Ok(None)` for empty values (`null`, `""`, `[]`), which are
    /// dropped rather than stored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAttribute`] if the value cannot be
    /// converted.
    pub fn convert(&self, value: &Value) -> Result<Option<Value>, GatewayError> {
        let invalid = || {
            GatewayError::InvalidAttribute(format!(
                "attribute '{}' expects a {:?} value, got {value}",
                self.name, self.attr_type
            ))
        };
        match value {
            Value::Null => return Ok(None),
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::Array(a) if a.is_empty() => return Ok(None),
            _ => {}
        }
        let converted = match self.attr_type {
            AttributeType::Text | AttributeType::Option => match value {
                Value::String(_) => value.clone(),
                Value::Number(n) => Value::String(n.to_string()),
                _ => return Err(invalid()),
            },
            AttributeType::Number => match value {
                Value::Number(_) => value.clone(),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(invalid)?,
                _ => return Err(invalid()),
            },
            AttributeType::Boolean => match value {
                Value::Bool(_) => value.clone(),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
                _ => return Err(invalid()),
            },
            AttributeType::Multioption => match value {
                Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
                Value::String(_) => Value::Array(vec![value.clone()]),
                _ => return Err(invalid()),
            },
        };
        Ok(Some(converted))
    }
}

/// A node in the logbook tree.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Logbook {
    /// Logbook identifier.
    pub id: LogbookId,
    /// Parent logbook, `None` for top-level logbooks.
    pub parent_id: Option<LogbookId>,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Content pre-filled into new entries.
    #[serde(default)]
    pub template: String,
    /// Attributes entries in this logbook may carry.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last metadata change.
    pub last_changed_at: DateTime<Utc>,
}

impl Logbook {
    /// Checks `attributes` against the logbook's definitions, returning the
    /// converted set with empty values removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAttribute`] for unknown attributes,
    /// values of the wrong type, or missing required attributes.
    pub fn check_attributes(
        &self,
        attributes: &Map<String, Value>,
    ) -> Result<Map<String, Value>, GatewayError> {
        let mut checked = Map::new();
        for (name, value) in attributes {
            let def = self
                .attributes
                .iter()
                .find(|d| &d.name == name)
                .ok_or_else(|| {
                    GatewayError::InvalidAttribute(format!(
                        "logbook {} has no attribute '{name}'",
                        self.id
                    ))
                })?;
            if let Some(converted) = def.convert(value)? {
                checked.insert(name.clone(), converted);
            }
        }
        if let Some(missing) = self
            .attributes
            .iter()
            .find(|d| d.required && !checked.contains_key(&d.name))
        {
            return Err(GatewayError::InvalidAttribute(format!(
                "attribute '{}' is required",
                missing.name
            )));
        }
        Ok(checked)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logbook() -> Logbook {
        let now = Utc::now();
        Logbook {
            id: LogbookId::new(1),
            parent_id: None,
            name: "Operations".to_string(),
            description: String::new(),
            template: String::new(),
            attributes: vec![
                AttributeDef {
                    name: "shift".to_string(),
                    attr_type: AttributeType::Option,
                    required: true,
                    options: vec!["day".to_string(), "night".to_string()],
                },
                AttributeDef {
                    name: "current".to_string(),
                    attr_type: AttributeType::Number,
                    required: false,
                    options: vec![],
                },
                AttributeDef {
                    name: "beam".to_string(),
                    attr_type: AttributeType::Boolean,
                    required: false,
                    options: vec![],
                },
                AttributeDef {
                    name: "systems".to_string(),
                    attr_type: AttributeType::Multioption,
                    required: false,
                    options: vec![],
                },
            ],
            created_at: now,
            last_changed_at: now,
        }
    }

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn converts_numeric_and_boolean_strings() {
        let Ok(checked) = logbook().check_attributes(&map(json!({
            "shift": "night",
            "current": "1.5",
            "beam": "TRUE",
            "systems": "vacuum",
        }))) else {
            panic!("attributes should be valid");
        };
        assert_eq!(checked.get("current"), Some(&json!(1.5)));
        assert_eq!(checked.get("beam"), Some(&json!(true)));
        assert_eq!(checked.get("systems"), Some(&json!(["vacuum"])));
    }

    #[test]
    fn empty_values_are_dropped() {
        let Ok(checked) = logbook().check_attributes(&map(json!({
            "shift": "day",
            "current": null,
            "systems": [],
        }))) else {
            panic!("attributes should be valid");
        };
        assert_eq!(checked.len(), 1);
    }

    #[test]
    fn rejects_unknown_attribute() {
        let result = logbook().check_attributes(&map(json!({"shift": "day", "color": "red"})));
        assert!(matches!(result, Err(GatewayError::InvalidAttribute(_))));
    }

    #[test]
    fn rejects_wrong_type() {
        let result = logbook().check_attributes(&map(json!({"shift": "day", "current": "lots"})));
        assert!(result.is_err());
        let result = logbook().check_attributes(&map(json!({"shift": "day", "beam": 3})));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_required() {
        let result = logbook().check_attributes(&map(json!({"current": 2})));
        assert!(
            matches!(result, Err(GatewayError::InvalidAttribute(msg)) if msg.contains("shift"))
        );
    }
}
