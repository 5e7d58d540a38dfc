use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::AppError,
    types::auth_context::{AuthContext, AuthScheme},
    utils::config::{AppConfig, PlatformCredential},
};

/// Credential resolution collaborator: platform name -> auth context.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve_auth(&self, platform: &str) -> Result<AuthContext, AppError>;
}

/// Resolver over the per-platform credential table in `AppConfig`.
/// Platform names are matched case-insensitively.
pub struct ConfigCredentialResolver {
    credentials: HashMap<String, PlatformCredential>,
}

impl ConfigCredentialResolver {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = config
            .credentials
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        Self { credentials }
    }
}

#[async_trait]
impl CredentialResolver for ConfigCredentialResolver {
    async fn resolve_auth(&self, platform: &str) -> Result<AuthContext, AppError> {
        let credential = self
            .credentials
            .get(&platform.to_lowercase())
            .ok_or_else(|| AppError::MissingCredentials(platform.to_string()))?;

        let scheme = scheme_from_credential(platform, credential)?;

        Ok(AuthContext {
            platform: platform.to_string(),
            scheme,
        })
    }
}

fn scheme_from_credential(
    platform: &str,
    credential: &PlatformCredential,
) -> Result<AuthScheme, AppError> {
    match credential.scheme.to_lowercase().as_str() {
        "bearer" => credential
            .token
            .clone()
            .map(|token| AuthScheme::Bearer { token })
            .ok_or_else(|| AppError::MissingCredentials(platform.to_string())),
        "api_key" => credential
            .api_key
            .clone()
            .map(|key| AuthScheme::ApiKey {
                header: credential
                    .header
                    .clone()
                    .unwrap_or_else(|| "X-API-Key".to_string()),
                key,
            })
            .ok_or_else(|| AppError::MissingCredentials(platform.to_string())),
        "basic" => credential
            .username
            .clone()
            .map(|username| AuthScheme::Basic {
                username,
                password: credential.password.clone().unwrap_or_default(),
            })
            .ok_or_else(|| AppError::MissingCredentials(platform.to_string())),
        "none" | "" => Ok(AuthScheme::None),
        other => Err(AppError::Validation(format!(
            "unknown credential scheme '{other}' for platform '{platform}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(platform: &str, credential: PlatformCredential) -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            openai_base_url: "https://example.com".into(),
            compact_model: "compact".into(),
            large_context_model: "large".into(),
            synthesis_model: "large".into(),
            extraction_char_threshold: 10_000,
            document_char_limit: 50_000,
            fetch_timeout_secs: 10,
            execution_timeout_secs: 600,
            mapping_confidence_threshold: 0.6,
            ontology_path: "./ontology.json".into(),
            credentials: HashMap::from([(platform.to_string(), credential)]),
        }
    }

    #[tokio::test]
    async fn resolves_bearer_credentials_case_insensitively() {
        let config = config_with(
            "Stripe",
            PlatformCredential {
                scheme: "bearer".into(),
                token: Some("sk_test".into()),
                ..PlatformCredential::default()
            },
        );
        let resolver = ConfigCredentialResolver::new(&config);

        let auth = resolver.resolve_auth("stripe").await.expect("resolved");
        assert_eq!(
            auth.scheme,
            AuthScheme::Bearer {
                token: "sk_test".into()
            }
        );
    }

    #[tokio::test]
    async fn unknown_platform_is_missing_credentials() {
        let config = config_with(
            "stripe",
            PlatformCredential {
                scheme: "bearer".into(),
                token: Some("sk_test".into()),
                ..PlatformCredential::default()
            },
        );
        let resolver = ConfigCredentialResolver::new(&config);

        let err = resolver.resolve_auth("github").await.unwrap_err();
        assert!(matches!(err, AppError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn api_key_scheme_defaults_header() {
        let config = config_with(
            "acme",
            PlatformCredential {
                scheme: "api_key".into(),
                api_key: Some("k-123".into()),
                ..PlatformCredential::default()
            },
        );
        let resolver = ConfigCredentialResolver::new(&config);

        let auth = resolver.resolve_auth("acme").await.expect("resolved");
        assert_eq!(
            auth.scheme,
            AuthScheme::ApiKey {
                header: "X-API-Key".into(),
                key: "k-123".into()
            }
        );
    }
}
