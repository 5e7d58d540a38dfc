use serde::{Deserialize, Serialize};

/// Operations the sandbox knows how to interpret. A synthesized routine
/// referencing anything outside this list fails static validation.
pub const ALLOWED_OPS: &[&str] = &["fetch"];

/// HTTP methods the sandbox will issue.
pub const ALLOWED_METHODS: &[&str] = &["GET"];

/// Authentication block of a synthesized routine. Names a scheme kind;
/// the actual secret comes from the paired `AuthContext`, never from the
/// generated text.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobAuth {
    pub scheme: String,
    #[serde(default)]
    pub header: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub method: String,
    pub path: String,
}

/// Pagination interpretation for one fetch step.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPagination {
    None,
    /// Page-numbered listing; the sandbox increments `param` until a page
    /// comes back empty.
    Page { param: String },
    /// Cursor listing; the sandbox passes the last row's id as `param`
    /// while the response reports `has_more`.
    Cursor { param: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobFieldMap {
    pub source: String,
    pub column: String,
}

/// One instruction of the routine: fetch an entity's rows from an endpoint
/// and shape them for a destination table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobStep {
    pub op: String,
    pub entity: String,
    pub table: String,
    pub request: JobRequest,
    pub pagination: JobPagination,
    #[serde(default)]
    pub fields: Vec<JobFieldMap>,
}

/// The capability-restricted ingestion routine. This is the entire
/// instruction surface the sandbox executes; there is no escape hatch to
/// arbitrary code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobProgram {
    pub auth: JobAuth,
    pub base_url: String,
    pub steps: Vec<JobStep>,
}
