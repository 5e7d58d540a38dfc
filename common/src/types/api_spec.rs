use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One endpoint described by the documentation page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
    /// Query or path parameters the documentation lists for this endpoint.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Name of the entity this endpoint returns, when the documentation says so.
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub rate_limit_note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub field_type: String,
}

/// A data model exposed by the documented API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Paths of the endpoints that serve this entity. Must all be defined
    /// in the spec's endpoint list.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Structured extraction of one documentation page. Produced once per
/// extraction call and immutable afterwards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiSpec {
    pub platform: String,
    #[serde(default)]
    pub overview: String,
    pub base_url: String,
    #[serde(default)]
    pub authentication_method: String,
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub rate_limits: Option<String>,
    #[serde(default)]
    pub pagination_note: Option<String>,
    #[serde(default)]
    pub integration_notes: String,
}

impl ApiSpec {
    /// Structural validation of an extracted spec. This is a shape gate,
    /// not a semantic one: it rejects empty endpoint lists and entities
    /// referencing endpoints the spec never defines.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.platform.trim().is_empty() {
            return Err(AppError::Extraction(
                "extracted spec is missing a platform name".into(),
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(AppError::Extraction(
                "extracted spec is missing a base URL".into(),
            ));
        }

        if self.endpoints.is_empty() {
            return Err(AppError::Extraction(
                "extracted spec contains no endpoints".into(),
            ));
        }

        for endpoint in &self.endpoints {
            if endpoint.method.trim().is_empty() || endpoint.path.trim().is_empty() {
                return Err(AppError::Extraction(format!(
                    "endpoint with empty method or path: {endpoint:?}"
                )));
            }
        }

        for entity in &self.entities {
            for path in &entity.endpoints {
                if !self.endpoints.iter().any(|e| &e.path == path) {
                    return Err(AppError::Extraction(format!(
                        "entity '{}' references undefined endpoint '{path}'",
                        entity.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Endpoints serving the given entity, by declared entity link or by
    /// the entity's own endpoint list.
    pub fn endpoints_for_entity(&self, entity_name: &str) -> Vec<&Endpoint> {
        let declared: Vec<&Endpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.entity.as_deref() == Some(entity_name))
            .collect();
        if !declared.is_empty() {
            return declared;
        }

        self.entities
            .iter()
            .find(|en| en.name == entity_name)
            .map(|en| {
                self.endpoints
                    .iter()
                    .filter(|e| en.endpoints.contains(&e.path))
                    .collect()
            })
            .unwrap_or_default()
    }
}
