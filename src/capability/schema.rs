//! Structured-output constraints passed alongside a prompt.

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons a decoded response does not satisfy a [`ResponseSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// The response was not a JSON object.
    #[error("response is not a JSON object")]
    NotAnObject,
    /// A required property was absent.
    #[error("missing required property '{0}'")]
    MissingProperty(String),
    /// A declared property held a non-string value.
    #[error("property '{0}' must be a string")]
    NotAString(String),
    /// A property value did not match its declared pattern.
    #[error("property '{property}' does not match pattern {pattern}")]
    PatternMismatch {
        /// Offending property name.
        property: String,
        /// Pattern declared for the property.
        pattern: String,
    },
    /// The response carried a property the schema does not declare.
    #[error("unexpected property '{0}'")]
    UnexpectedProperty(String),
    /// The schema itself declared a pattern the regex engine rejects.
    #[error("invalid pattern {pattern} on property '{property}'")]
    InvalidPattern {
        /// Property carrying the pattern.
        property: String,
        /// Rejected pattern.
        pattern: String,
    },
}

/// A string property declared by a [`ResponseSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    /// Property name as it appears in the JSON object.
    pub name: String,
    /// Human-readable hint forwarded to the model.
    pub description: Option<String>,
    /// Optional regular expression the value must match.
    pub pattern: Option<String>,
}

/// JSON object schema with string-typed properties.
///
/// Patterns are compiled once, when the property is declared.
#[derive(Debug, Clone, Default)]
pub struct ResponseSchema {
    properties: Vec<PropertySchema>,
    matchers: Vec<Option<Result<Regex, regex::Error>>>,
    required: Vec<String>,
    additional_properties: bool,
}

impl ResponseSchema {
    /// Start an object schema that permits additional properties until told otherwise.
    pub fn object() -> Self {
        Self {
            additional_properties: true,
            ..Self::default()
        }
    }

    /// Declare a string property.
    pub fn string_property(mut self, name: &str, description: &str) -> Self {
        self.properties.push(PropertySchema {
            name: name.to_string(),
            description: Some(description.to_string()),
            pattern: None,
        });
        self.matchers.push(None);
        self
    }

    /// Declare a string property whose value must match `pattern`.
    pub fn pattern_property(mut self, name: &str, description: &str, pattern: &str) -> Self {
        self.properties.push(PropertySchema {
            name: name.to_string(),
            description: Some(description.to_string()),
            pattern: Some(pattern.to_string()),
        });
        self.matchers.push(Some(Regex::new(pattern)));
        self
    }

    /// Mark properties as required.
    pub fn require(mut self, names: &[&str]) -> Self {
        self.required
            .extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    /// Forbid properties that were not declared.
    pub fn deny_additional_properties(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    /// Declared properties in declaration order.
    pub fn properties(&self) -> &[PropertySchema] {
        &self.properties
    }

    /// Names of the required properties.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Render as a JSON Schema document.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for property in &self.properties {
            let mut schema = Map::new();
            schema.insert("type".into(), Value::String("string".into()));
            if let Some(description) = property.description.as_ref() {
                schema.insert("description".into(), Value::String(description.clone()));
            }
            if let Some(pattern) = property.pattern.as_ref() {
                schema.insert("pattern".into(), Value::String(pattern.clone()));
            }
            properties.insert(property.name.clone(), Value::Object(schema));
        }

        let mut schema = Map::new();
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert(
            "required".into(),
            Value::Array(
                self.required
                    .iter()
                    .map(|name| Value::String(name.clone()))
                    .collect(),
            ),
        );
        schema.insert(
            "additionalProperties".into(),
            Value::Bool(self.additional_properties),
        );
        Value::Object(schema)
    }

    /// Check a decoded response against the schema, reporting the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let Value::Object(object) = value else {
            return Err(SchemaViolation::NotAnObject);
        };

        for name in &self.required {
            if !object.contains_key(name) {
                return Err(SchemaViolation::MissingProperty(name.clone()));
            }
        }

        for (key, entry) in object {
            let Some(index) = self.properties.iter().position(|p| &p.name == key) else {
                if self.additional_properties {
                    continue;
                }
                return Err(SchemaViolation::UnexpectedProperty(key.clone()));
            };
            let Some(text) = entry.as_str() else {
                return Err(SchemaViolation::NotAString(key.clone()));
            };
            let pattern = || self.properties[index].pattern.clone().unwrap_or_default();
            match &self.matchers[index] {
                None => {}
                Some(Err(_)) => {
                    return Err(SchemaViolation::InvalidPattern {
                        property: key.clone(),
                        pattern: pattern(),
                    });
                }
                Some(Ok(regex)) if !regex.is_match(text) => {
                    return Err(SchemaViolation::PatternMismatch {
                        property: key.clone(),
                        pattern: pattern(),
                    });
                }
                Some(Ok(_)) => {}
            }
        }

        Ok(())
    }
}
