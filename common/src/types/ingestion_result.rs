use serde::{Deserialize, Serialize};

use crate::error::ExecutionFaultKind;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Ok,
    NoData,
    Error,
}

/// Terminal value of one pipeline run. Not persisted by the core.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngestionResult {
    pub status: IngestionStatus,
    pub records: u64,
    pub message: String,
    #[serde(default)]
    pub error_kind: Option<ExecutionFaultKind>,
    /// Raw error detail, preserved verbatim for diagnostics.
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl IngestionResult {
    pub fn ok(records: u64, message: impl Into<String>) -> Self {
        Self {
            status: IngestionStatus::Ok,
            records,
            message: message.into(),
            error_kind: None,
            error_detail: None,
        }
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self {
            status: IngestionStatus::NoData,
            records: 0,
            message: message.into(),
            error_kind: None,
            error_detail: None,
        }
    }

    pub fn error(kind: ExecutionFaultKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            status: IngestionStatus::Error,
            records: 0,
            message: format!("ingestion failed: {detail}"),
            error_kind: Some(kind),
            error_detail: Some(detail),
        }
    }
}
