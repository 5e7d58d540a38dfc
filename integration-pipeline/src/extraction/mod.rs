mod backends;

pub use backends::{CompactBackend, ExtractionBackend, LargeContextBackend};

use std::sync::Arc;

use common::{error::AppError, types::api_spec::ApiSpec, utils::config::AppConfig};
use tracing::{debug, warn};

type OpenAIClient = async_openai::Client<async_openai::config::OpenAIConfig>;

/// Turns cleaned documentation text into a validated `ApiSpec`, choosing
/// between the compact and large-context backends by document length and
/// retrying exactly once against the alternate on failure.
pub struct SpecExtractor {
    compact: Arc<dyn ExtractionBackend>,
    large_context: Arc<dyn ExtractionBackend>,
    char_threshold: usize,
}

impl SpecExtractor {
    pub fn new(
        compact: Arc<dyn ExtractionBackend>,
        large_context: Arc<dyn ExtractionBackend>,
        char_threshold: usize,
    ) -> Self {
        Self {
            compact,
            large_context,
            char_threshold,
        }
    }

    pub fn from_config(client: Arc<OpenAIClient>, config: &AppConfig) -> Self {
        Self::new(
            Arc::new(CompactBackend::new(
                Arc::clone(&client),
                &config.compact_model,
            )),
            Arc::new(LargeContextBackend::new(client, &config.large_context_model)),
            config.extraction_char_threshold,
        )
    }

    /// Ordered fallback list for a document of the given length: below the
    /// threshold the compact model goes first, above it the large-context
    /// model does. The other backend is the single fallback either way.
    fn backend_order(&self, document_chars: usize) -> [&dyn ExtractionBackend; 2] {
        if document_chars < self.char_threshold {
            [self.compact.as_ref(), self.large_context.as_ref()]
        } else {
            [self.large_context.as_ref(), self.compact.as_ref()]
        }
    }

    #[tracing::instrument(skip_all, fields(document_chars = document.chars().count()))]
    pub async fn extract(&self, document: &str) -> Result<ApiSpec, AppError> {
        if document.trim().is_empty() {
            return Err(AppError::Extraction("document text is empty".into()));
        }

        let [primary, alternate] = self.backend_order(document.chars().count());

        let first_failure = match self.attempt(primary, document).await {
            Ok(spec) => return Ok(spec),
            Err(err) => {
                warn!(
                    backend = primary.name(),
                    error = %err,
                    "extraction backend failed; retrying against alternate"
                );
                err
            }
        };

        self.attempt(alternate, document).await.map_err(|err| {
            AppError::Extraction(format!(
                "both backends failed: {} ({first_failure}), {} ({err})",
                primary.name(),
                alternate.name()
            ))
        })
    }

    async fn attempt(
        &self,
        backend: &dyn ExtractionBackend,
        document: &str,
    ) -> Result<ApiSpec, AppError> {
        let reply = backend.extract(document).await?;
        let spec = parse_spec_reply(&reply)?;
        debug!(
            backend = backend.name(),
            endpoints = spec.endpoints.len(),
            entities = spec.entities.len(),
            "extraction backend produced a valid spec"
        );
        Ok(spec)
    }
}

/// Parses a backend reply into a validated spec. The reply is expected to
/// contain one JSON object; surrounding prose is tolerated by locating the
/// outermost braces.
pub fn parse_spec_reply(reply: &str) -> Result<ApiSpec, AppError> {
    let json_str = locate_json_object(reply)
        .ok_or_else(|| AppError::Extraction("no JSON object in model reply".into()))?;

    let spec: ApiSpec = serde_json::from_str(json_str)
        .map_err(|e| AppError::Extraction(format!("malformed spec JSON: {e}")))?;

    spec.validate()?;
    Ok(spec)
}

fn locate_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    reply.get(start..=end)
}
