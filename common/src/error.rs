use async_openai::error::OpenAIError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;

/// Classification of a failure inside the sandboxed execution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionFaultKind {
    Timeout,
    AuthRejected,
    RateLimited,
    RuntimeFault,
}

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Extraction error: {0}")]
    Extraction(String),
    #[error("Mapping error: {0}")]
    Mapping(String),
    #[error("Synthesis error: {0}")]
    Synthesis(String),
    #[error("Execution error ({kind:?}): {detail}")]
    Execution {
        kind: ExecutionFaultKind,
        detail: String,
    },
    #[error("Missing credentials for platform: {0}")]
    MissingCredentials(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
