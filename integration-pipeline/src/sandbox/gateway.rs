use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{error::AppError, types::auth_context::AuthScheme};

/// Status and parsed body of one upstream response. Non-JSON bodies come
/// back as `Value::Null` so an HTML error page never aborts classification.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// The only door out of the sandbox. The interpreter never touches the
/// network directly, which keeps execution tests fully scripted.
#[async_trait]
pub trait HttpGateway: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> Result<GatewayResponse, AppError>;
}

pub struct ReqwestGateway {
    client: reqwest::Client,
}

impl ReqwestGateway {
    pub fn new(request_timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpGateway for ReqwestGateway {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> Result<GatewayResponse, AppError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);

        Ok(GatewayResponse { status, body })
    }
}

/// Request headers for a resolved auth scheme. Basic auth sends the secret
/// as username with an empty password, the Stripe convention.
pub fn auth_headers(scheme: &AuthScheme) -> Vec<(String, String)> {
    match scheme {
        AuthScheme::Bearer { token } => {
            vec![("Authorization".into(), format!("Bearer {token}"))]
        }
        AuthScheme::ApiKey { header, key } => vec![(header.clone(), key.clone())],
        AuthScheme::Basic { username, password } => {
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            vec![("Authorization".into(), format!("Basic {encoded}"))]
        }
        AuthScheme::None => Vec::new(),
    }
}
