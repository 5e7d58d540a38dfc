use serde::{Deserialize, Serialize};

/// How the target platform expects requests to be authenticated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthScheme {
    Bearer {
        token: String,
    },
    ApiKey {
        header: String,
        key: String,
    },
    /// HTTP basic with the secret as username and an empty password,
    /// the Stripe convention.
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
    None,
}

impl AuthScheme {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bearer { .. } => "bearer",
            Self::ApiKey { .. } => "api_key",
            Self::Basic { .. } => "basic",
            Self::None => "none",
        }
    }
}

/// Resolved credentials for one platform, supplied by the credential
/// resolution collaborator at synthesis time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub platform: String,
    pub scheme: AuthScheme,
}
