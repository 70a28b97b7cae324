//! Fixed-field schema descriptors.
//!
//! Every topic written by cta-stations is bound to one key schema and one value
//! schema for its whole lifetime. A schema is either a single primitive (used for
//! keys such as `station_id`) or a named record with an ordered field list.
//! Values are checked against the descriptor before they are encoded, so a
//! mismatch surfaces at the write boundary instead of somewhere downstream.

use crate::error::SchemaViolation;
use serde_json::{json, Map, Value};
use std::fmt;

/// Primitive field types understood by the descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    String,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Boolean => value.is_boolean(),
            FieldType::Int => value
                .as_i64()
                .is_some_and(|n| i32::try_from(n).is_ok()),
            FieldType::Long => value.is_i64(),
            FieldType::String => value.is_string(),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::Int => json!({ "type": "integer", "format": "int32" }),
            FieldType::Long => json!({ "type": "integer", "format": "int64" }),
            FieldType::String => json!({ "type": "string" }),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::String => "string",
        };
        f.write_str(name)
    }
}

/// A single named field of a record schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldSchema {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}

/// Structural contract of a key or value written to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordSchema {
    Primitive(FieldType),
    Record {
        name: String,
        fields: Vec<FieldSchema>,
    },
}

impl RecordSchema {
    pub fn record(name: &str, fields: Vec<FieldSchema>) -> Self {
        RecordSchema::Record {
            name: name.to_string(),
            fields,
        }
    }

    /// Human readable name, used in log lines and error messages.
    pub fn name(&self) -> String {
        match self {
            RecordSchema::Primitive(field_type) => field_type.to_string(),
            RecordSchema::Record { name, .. } => name.clone(),
        }
    }

    /// Check that `value` has exactly the shape this schema describes.
    ///
    /// Records must contain every declared field with the declared type and no
    /// other fields.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        match self {
            RecordSchema::Primitive(field_type) => {
                if field_type.accepts(value) {
                    Ok(())
                } else {
                    Err(SchemaViolation::WrongType {
                        field: "<key>".to_string(),
                        expected: field_type.to_string(),
                        actual: json_kind(value).to_string(),
                    })
                }
            }
            RecordSchema::Record { name, fields } => {
                let object = value
                    .as_object()
                    .ok_or_else(|| SchemaViolation::NotAnObject {
                        record: name.clone(),
                    })?;

                for field in fields {
                    let field_value =
                        object
                            .get(&field.name)
                            .ok_or_else(|| SchemaViolation::MissingField {
                                record: name.clone(),
                                field: field.name.clone(),
                            })?;
                    if !field.field_type.accepts(field_value) {
                        return Err(SchemaViolation::WrongType {
                            field: field.name.clone(),
                            expected: field.field_type.to_string(),
                            actual: json_kind(field_value).to_string(),
                        });
                    }
                }

                if let Some(extra) = object
                    .keys()
                    .find(|key| !fields.iter().any(|f| &f.name == *key))
                {
                    return Err(SchemaViolation::UnknownField {
                        record: name.clone(),
                        field: extra.clone(),
                    });
                }

                Ok(())
            }
        }
    }

    /// Render this descriptor as a JSON Schema document for registry registration.
    pub fn to_json_schema(&self) -> Value {
        match self {
            RecordSchema::Primitive(field_type) => field_type.json_schema(),
            RecordSchema::Record { name, fields } => {
                let mut properties = Map::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.field_type.json_schema());
                }
                let required: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
                json!({
                    "title": name,
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                })
            }
        }
    }
}

/// Types that carry a fixed schema descriptor.
pub trait SchemaBound {
    fn schema() -> RecordSchema;
}

impl SchemaBound for i64 {
    fn schema() -> RecordSchema {
        RecordSchema::Primitive(FieldType::Long)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_schema() -> RecordSchema {
        RecordSchema::record(
            "point",
            vec![
                FieldSchema::new("x", FieldType::Int),
                FieldSchema::new("label", FieldType::String),
            ],
        )
    }

    #[test]
    fn test_validate_accepts_exact_shape() {
        let schema = point_schema();
        assert!(schema.validate(&json!({ "x": 3, "label": "a" })).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_and_unknown_fields() {
        let schema = point_schema();

        let missing = schema.validate(&json!({ "x": 3 })).unwrap_err();
        assert_eq!(
            missing,
            SchemaViolation::MissingField {
                record: "point".to_string(),
                field: "label".to_string(),
            }
        );

        let unknown = schema
            .validate(&json!({ "x": 3, "label": "a", "y": 4 }))
            .unwrap_err();
        assert!(matches!(unknown, SchemaViolation::UnknownField { field, .. } if field == "y"));
    }

    #[test]
    fn test_validate_rejects_wrong_types() {
        let schema = point_schema();
        let err = schema
            .validate(&json!({ "x": "3", "label": "a" }))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::WrongType {
                field: "x".to_string(),
                expected: "int".to_string(),
                actual: "string".to_string(),
            }
        );

        // Int is 32-bit
        assert!(schema
            .validate(&json!({ "x": 5_000_000_000i64, "label": "a" }))
            .is_err());
        assert!(schema.validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_primitive_schema() {
        let schema = i64::schema();
        assert!(schema.validate(&json!(42)).is_ok());
        assert!(schema.validate(&json!(4.2)).is_err());
        assert!(schema.validate(&json!("42")).is_err());
        assert_eq!(schema.name(), "long");
    }

    #[test]
    fn test_json_schema_document() {
        let doc = point_schema().to_json_schema();
        assert_eq!(doc["title"], "point");
        assert_eq!(doc["type"], "object");
        assert_eq!(doc["properties"]["x"]["format"], "int32");
        assert_eq!(doc["required"], json!(["x", "label"]));
        assert_eq!(doc["additionalProperties"], false);
    }
}
