use async_trait::async_trait;

use crate::{error::AppError, types::ontology::DestinationSchema};

/// Destination schema lookup collaborator. The core never enumerates
/// schemas; it asks for one snapshot by id at mapping time.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn get_schema(&self, id: &str) -> Result<DestinationSchema, AppError>;
}

/// Registry over a JSON file holding a list of destination schemas.
pub struct FileSchemaRegistry {
    path: String,
}

impl FileSchemaRegistry {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SchemaRegistry for FileSchemaRegistry {
    async fn get_schema(&self, id: &str) -> Result<DestinationSchema, AppError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::Mapping(format!(
                "destination schema file '{}' unavailable: {e}",
                self.path
            ))
        })?;

        let schemas: Vec<DestinationSchema> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Mapping(format!(
                "destination schema file '{}' is malformed: {e}",
                self.path
            ))
        })?;

        schemas
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::Mapping(format!("destination schema '{id}' not found")))
    }
}

/// In-memory registry, used by the binary when a single schema is loaded
/// at startup and by tests.
pub struct StaticSchemaRegistry {
    schemas: Vec<DestinationSchema>,
}

impl StaticSchemaRegistry {
    pub fn new(schemas: Vec<DestinationSchema>) -> Self {
        Self { schemas }
    }
}

#[async_trait]
impl SchemaRegistry for StaticSchemaRegistry {
    async fn get_schema(&self, id: &str) -> Result<DestinationSchema, AppError> {
        self.schemas
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| AppError::Mapping(format!("destination schema '{id}' not found")))
    }
}
