//! Schema registry boundary.
//!
//! Every topic is written with one key schema and one value schema. Both are
//! registered under the `<topic>-key` / `<topic>-value` subjects before the
//! first write; the returned ids go into the frame header of every record.

use crate::error::RegistryError;
use async_trait::async_trait;
use cta_stations_types::RecordSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// A schema together with the id the registry assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSchema {
    pub id: u32,
    pub schema: RecordSchema,
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Register `schema` under `subject` and return its id.
    ///
    /// Registering the schema already bound to the subject returns the existing
    /// id. A different schema is rejected with [`RegistryError::Incompatible`].
    async fn register(&self, subject: &str, schema: &RecordSchema) -> Result<u32, RegistryError>;
}

/// Register `schema` and pair it with its id.
pub async fn register_schema(
    registry: &dyn SchemaRegistry,
    subject: &str,
    schema: RecordSchema,
) -> Result<RegisteredSchema, RegistryError> {
    let id = registry.register(subject, &schema).await?;
    info!("Schema '{}' registered for subject '{subject}' with id {id}", schema.name());
    Ok(RegisteredSchema { id, schema })
}

pub fn key_subject(topic: &str) -> String {
    format!("{topic}-key")
}

pub fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    schema_type: &'static str,
    schema: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

/// Client for a Confluent-compatible schema registry REST API.
pub struct ConfluentSchemaRegistry {
    base_url: String,
    http_client: reqwest::Client,
}

impl ConfluentSchemaRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl SchemaRegistry for ConfluentSchemaRegistry {
    async fn register(&self, subject: &str, schema: &RecordSchema) -> Result<u32, RegistryError> {
        let url = format!("{}/subjects/{subject}/versions", self.base_url);
        let request = RegisterRequest {
            schema_type: "JSON",
            schema: schema.to_json_schema().to_string(),
        };
        debug!("Registering schema at {url}");

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/vnd.schemaregistry.v1+json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(RegistryError::Incompatible {
                subject: subject.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                subject: subject.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let registered: RegisterResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        Ok(registered.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySchemaRegistry;
    use cta_stations_types::{FieldType, SchemaBound, TransformedStation};

    #[test]
    fn test_subjects() {
        assert_eq!(key_subject("cta_stations"), "cta_stations-key");
        assert_eq!(value_subject("cta_stations"), "cta_stations-value");
    }

    #[test]
    fn test_register_request_body() {
        let request = RegisterRequest {
            schema_type: "JSON",
            schema: RecordSchema::Primitive(FieldType::Long)
                .to_json_schema()
                .to_string(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["schemaType"], "JSON");
        assert!(body["schema"].as_str().unwrap().contains("int64"));
    }

    #[tokio::test]
    async fn test_register_schema_pairs_id() {
        let registry = InMemorySchemaRegistry::new();
        let registered = register_schema(
            &registry,
            "out-value",
            TransformedStation::schema(),
        )
        .await
        .unwrap();
        assert_eq!(registered.schema, TransformedStation::schema());

        let again = register_schema(&registry, "out-value", TransformedStation::schema())
            .await
            .unwrap();
        assert_eq!(again.id, registered.id);
    }
}
