use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use common::error::AppError;

use crate::utils::llm_instructions::{
    get_api_spec_schema, spec_extraction_user_message, SPEC_EXTRACTION_SYSTEM_MESSAGE,
};

type OpenAIClient = async_openai::Client<async_openai::config::OpenAIConfig>;

/// One way of turning documentation text into a raw spec reply. The
/// extractor owns the ordered fallback list; backends only know how to
/// make their own call.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Input budget of this backend. Longer documents are truncated to it.
    fn context_char_limit(&self) -> usize;

    async fn extract(&self, document: &str) -> Result<String, AppError>;
}

/// Smaller-context model, preferred for short documents.
pub struct CompactBackend {
    client: Arc<OpenAIClient>,
    model: String,
}

impl CompactBackend {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ExtractionBackend for CompactBackend {
    fn name(&self) -> &str {
        "compact"
    }

    fn context_char_limit(&self) -> usize {
        24_000
    }

    async fn extract(&self, document: &str) -> Result<String, AppError> {
        run_extraction_call(
            &self.client,
            &self.model,
            document,
            self.context_char_limit(),
        )
        .await
    }
}

/// Large-context model, preferred once the document outgrows the compact
/// backend's budget.
pub struct LargeContextBackend {
    client: Arc<OpenAIClient>,
    model: String,
}

impl LargeContextBackend {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ExtractionBackend for LargeContextBackend {
    fn name(&self) -> &str {
        "large-context"
    }

    fn context_char_limit(&self) -> usize {
        400_000
    }

    async fn extract(&self, document: &str) -> Result<String, AppError> {
        run_extraction_call(
            &self.client,
            &self.model,
            document,
            self.context_char_limit(),
        )
        .await
    }
}

async fn run_extraction_call(
    client: &OpenAIClient,
    model: &str,
    document: &str,
    char_limit: usize,
) -> Result<String, AppError> {
    let truncated: String = document.chars().take(char_limit).collect();

    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: Some("Structured API specification extracted from documentation".into()),
            name: "api_spec".into(),
            schema: Some(get_api_spec_schema()),
            strict: Some(true),
        },
    };

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(SPEC_EXTRACTION_SYSTEM_MESSAGE).into(),
            ChatCompletionRequestUserMessage::from(spec_extraction_user_message(&truncated))
                .into(),
        ])
        .response_format(response_format)
        .build()?;

    let response = client.chat().create(request).await?;

    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .ok_or_else(|| AppError::Extraction("no content in model response".into()))
}
