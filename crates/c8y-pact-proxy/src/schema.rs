//! JSON Schema validation and generation for response bodies.

use crate::error::{PactError, Result};
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

const DRAFT7_URI: &str = "http://json-schema.org/draft-07/schema#";

/// Validates a body against a JSON Schema.
pub trait SchemaMatcher: Send + Sync {
    fn validate(&self, body: &Value, schema: &Value) -> Result<()>;
}

/// Generates a JSON Schema from a sample payload.
pub trait SchemaGenerator: Send + Sync {
    fn generate(&self, sample: &Value) -> Value;
}

/// Draft 7 validator backed by the `jsonschema` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaMatcher;

impl SchemaMatcher for JsonSchemaMatcher {
    fn validate(&self, body: &Value, schema: &Value) -> Result<()> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| PactError::Schema(format!("Failed to compile schema: {e}")))?;

        if let Err(errors) = compiled.validate(body) {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{e} at {path}")
                    }
                })
                .collect();
            return Err(PactError::matching("schema", messages.join("; ")));
        }
        Ok(())
    }
}

/// Infers types, properties and required keys from a sample.
///
/// Arrays take the schema of their first element; empty arrays get no
/// `items`. Every key present in a sample object is marked required.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferringSchemaGenerator;

impl InferringSchemaGenerator {
    fn infer(sample: &Value) -> Value {
        match sample {
            Value::Null => json!({"type": "null"}),
            Value::Bool(_) => json!({"type": "boolean"}),
            Value::Number(n) if n.is_i64() || n.is_u64() => json!({"type": "integer"}),
            Value::Number(_) => json!({"type": "number"}),
            Value::String(_) => json!({"type": "string"}),
            Value::Array(items) => match items.first() {
                Some(first) => json!({"type": "array", "items": Self::infer(first)}),
                None => json!({"type": "array"}),
            },
            Value::Object(map) => {
                let properties: Map<String, Value> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::infer(value)))
                    .collect();
                let mut required: Vec<&String> = map.keys().collect();
                required.sort();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

impl SchemaGenerator for InferringSchemaGenerator {
    fn generate(&self, sample: &Value) -> Value {
        let mut schema = Self::infer(sample);
        if let Value::Object(map) = &mut schema {
            map.insert("$schema".to_string(), Value::String(DRAFT7_URI.to_string()));
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_body_passes() {
        let schema = json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        });
        assert!(JsonSchemaMatcher.validate(&json!({"id": "42"}), &schema).is_ok());
    }

    #[test]
    fn test_invalid_body_reports_validator_message() {
        let schema = json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        });
        let err = JsonSchemaMatcher
            .validate(&json!({"id": 42}), &schema)
            .unwrap_err();
        assert!(matches!(err, PactError::Matching { .. }));
        assert!(err.to_string().contains("/id"));
    }

    #[test]
    fn test_uncompilable_schema() {
        let err = JsonSchemaMatcher
            .validate(&json!({}), &json!({"type": 12}))
            .unwrap_err();
        assert!(matches!(err, PactError::Schema(_)));
    }

    #[test]
    fn test_generated_schema_validates_its_sample() {
        let sample = json!({
            "id": "42",
            "count": 3,
            "ratio": 0.5,
            "tags": ["a"],
            "empty": [],
            "owner": {"name": "admin", "active": true},
            "nothing": null
        });
        let schema = InferringSchemaGenerator.generate(&sample);
        assert_eq!(schema["$schema"], DRAFT7_URI);
        assert_eq!(schema["properties"]["count"]["type"], "integer");
        assert_eq!(schema["properties"]["ratio"]["type"], "number");
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(schema["properties"]["owner"]["required"], json!(["active", "name"]));
        assert!(JsonSchemaMatcher.validate(&sample, &schema).is_ok());
        assert!(JsonSchemaMatcher
            .validate(&json!({"id": "42"}), &schema)
            .is_err());
    }
}
