mod gateway;

pub use gateway::{auth_headers, GatewayResponse, HttpGateway, ReqwestGateway};

use std::sync::Arc;
use std::time::Duration;

use common::{
    error::ExecutionFaultKind,
    types::{
        ingestion_result::IngestionResult,
        job_program::{JobPagination, JobStep},
        synthesized_job::SynthesizedJob,
    },
};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Wording kept stable because downstream consumers match on it.
pub static NO_DATA_MESSAGE: &str =
    "The API endpoints were successfully queried but no data was found.";

/// Knobs for transient-fault retries and pagination caps.
#[derive(Debug, Clone)]
pub struct SandboxTuning {
    pub transient_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_pages: u32,
}

impl Default for SandboxTuning {
    fn default() -> Self {
        Self {
            transient_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            max_pages: 100,
        }
    }
}

struct StepFault {
    kind: ExecutionFaultKind,
    detail: String,
}

impl StepFault {
    fn new(kind: ExecutionFaultKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Interprets synthesized routines against the gateway. The interpreter is
/// the whole attack surface: routines cannot reach anything the gateway and
/// the instruction set do not expose.
pub struct SandboxExecutor {
    gateway: Arc<dyn HttpGateway>,
    tuning: SandboxTuning,
}

impl SandboxExecutor {
    pub fn new(gateway: Arc<dyn HttpGateway>, tuning: SandboxTuning) -> Self {
        Self { gateway, tuning }
    }

    /// Runs a job to a terminal `IngestionResult`. Never returns `Err` and
    /// never panics: every fault, including the deadline, becomes a result
    /// with `status: Error`.
    #[tracing::instrument(skip_all, fields(job_id = %job.id, platform = %job.platform, steps = job.program.steps.len()))]
    pub async fn run(&self, job: &SynthesizedJob, deadline: Duration) -> IngestionResult {
        match tokio::time::timeout(deadline, self.interpret(job)).await {
            Ok(result) => result,
            Err(_) => IngestionResult::error(
                ExecutionFaultKind::Timeout,
                format!("execution exceeded {}s", deadline.as_secs()),
            ),
        }
    }

    async fn interpret(&self, job: &SynthesizedJob) -> IngestionResult {
        let headers = auth_headers(&job.auth.scheme);
        let mut total: u64 = 0;
        let mut lines: Vec<String> = Vec::new();

        for step in &job.program.steps {
            match self.run_step(&job.program.base_url, step, &headers).await {
                Ok(rows) => {
                    let count = rows.len() as u64;
                    debug!(entity = %step.entity, records = count, "step complete");
                    lines.push(format!(
                        "{}: {} records from {}",
                        step.entity, count, step.request.path
                    ));
                    total += count;
                }
                Err(fault) => {
                    warn!(entity = %step.entity, kind = ?fault.kind, "step faulted");
                    return IngestionResult::error(
                        fault.kind,
                        format!(
                            "step '{}' failed after {total} records ingested: {}",
                            step.entity, fault.detail
                        ),
                    );
                }
            }
        }

        if total == 0 {
            return IngestionResult::no_data(NO_DATA_MESSAGE);
        }

        IngestionResult::ok(
            total,
            format!("Successfully ingested {total} records ({})", lines.join("; ")),
        )
    }

    async fn run_step(
        &self,
        base_url: &str,
        step: &JobStep,
        headers: &[(String, String)],
    ) -> Result<Vec<Value>, StepFault> {
        let url = resolve_url(base_url, &step.request.path)?;
        let mut rows: Vec<Value> = Vec::new();

        match &step.pagination {
            JobPagination::None => {
                let body = self.fetch_page(&url, headers, &[]).await?;
                rows.extend(extract_rows(&body));
            }
            JobPagination::Page { param } => {
                for page in 1..=self.tuning.max_pages {
                    let query = vec![(param.clone(), page.to_string())];
                    let body = self.fetch_page(&url, headers, &query).await?;
                    let page_rows = extract_rows(&body);
                    if page_rows.is_empty() {
                        break;
                    }
                    rows.extend(page_rows);
                    if page == self.tuning.max_pages {
                        warn!(entity = %step.entity, "page cap reached, stopping pagination");
                    }
                }
            }
            JobPagination::Cursor { param } => {
                let mut cursor: Option<String> = None;
                for page in 1..=self.tuning.max_pages {
                    let query = match &cursor {
                        Some(value) => vec![(param.clone(), value.clone())],
                        None => Vec::new(),
                    };
                    let body = self.fetch_page(&url, headers, &query).await?;
                    let page_rows = extract_rows(&body);
                    let has_more = body
                        .get("has_more")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    cursor = page_rows.last().and_then(cursor_from_row);
                    rows.extend(page_rows);

                    if !has_more || cursor.is_none() {
                        break;
                    }
                    if page == self.tuning.max_pages {
                        warn!(entity = %step.entity, "page cap reached, stopping pagination");
                    }
                }
            }
        }

        Ok(rows.iter().map(|row| project_row(row, step)).collect())
    }

    /// One request with backoff on transient responses. 429 and 5xx are
    /// transient; 401/403 reject immediately as auth faults, and every
    /// other 4xx as well as transport errors reject immediately as
    /// runtime faults.
    async fn fetch_page(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> Result<Value, StepFault> {
        let mut backoff_ms = self.tuning.initial_backoff_ms;
        let mut last_transient: Option<StepFault> = None;

        for attempt in 1..=self.tuning.transient_attempts {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = backoff_ms
                    .saturating_mul(2)
                    .min(self.tuning.max_backoff_ms);
            }

            let response = self
                .gateway
                .get(url, headers, query)
                .await
                .map_err(|err| {
                    StepFault::new(
                        ExecutionFaultKind::RuntimeFault,
                        format!("transport error: {err}"),
                    )
                })?;

            let fault = match response.status {
                200..=299 => return Ok(response.body),
                401 | 403 => {
                    return Err(StepFault::new(
                        ExecutionFaultKind::AuthRejected,
                        format!("upstream rejected credentials with status {}", response.status),
                    ))
                }
                429 => StepFault::new(
                    ExecutionFaultKind::RateLimited,
                    "upstream responded 429 Too Many Requests",
                ),
                500..=599 => StepFault::new(
                    ExecutionFaultKind::RuntimeFault,
                    format!("upstream server error {}", response.status),
                ),
                other => {
                    return Err(StepFault::new(
                        ExecutionFaultKind::RuntimeFault,
                        format!("upstream responded with unexpected status {other}"),
                    ))
                }
            };

            debug!(attempt, url, "transient fault, backing off");
            last_transient = Some(fault);
        }

        Err(last_transient.unwrap_or_else(|| {
            StepFault::new(ExecutionFaultKind::RuntimeFault, "no attempts were made")
        }))
    }
}

/// Joins a step path onto the declared base URL and refuses anything that
/// escapes the base host. Violations never reach the gateway.
fn resolve_url(base_url: &str, path: &str) -> Result<String, StepFault> {
    if path.contains("://") || !path.starts_with('/') {
        return Err(StepFault::new(
            ExecutionFaultKind::RuntimeFault,
            format!("step path '{path}' is not relative to the base URL"),
        ));
    }

    let base = Url::parse(base_url).map_err(|e| {
        StepFault::new(
            ExecutionFaultKind::RuntimeFault,
            format!("invalid base URL '{base_url}': {e}"),
        )
    })?;
    let joined = base.join(path).map_err(|e| {
        StepFault::new(
            ExecutionFaultKind::RuntimeFault,
            format!("cannot resolve path '{path}': {e}"),
        )
    })?;

    if joined.host_str() != base.host_str() || joined.scheme() != base.scheme() {
        return Err(StepFault::new(
            ExecutionFaultKind::RuntimeFault,
            format!("resolved URL '{joined}' escapes the declared base URL"),
        ));
    }

    Ok(joined.to_string())
}

/// Cursor for the next page, taken from a row's `id`. Upstream APIs use
/// both string and numeric ids, so numbers are stringified.
fn cursor_from_row(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Pulls the row list out of a response body: a bare array, the first of
/// the conventional wrapper keys, or the object itself as a single record.
fn extract_rows(body: &Value) -> Vec<Value> {
    if let Some(rows) = body.as_array() {
        return rows.clone();
    }

    if let Some(object) = body.as_object() {
        for key in ["data", "results", "items"] {
            if let Some(rows) = object.get(key).and_then(Value::as_array) {
                return rows.clone();
            }
        }
        if !object.is_empty() {
            return vec![body.clone()];
        }
    }

    Vec::new()
}

/// Shapes one row for the destination table. Steps without field mappings
/// pass rows through unchanged; missing source fields become null.
fn project_row(row: &Value, step: &JobStep) -> Value {
    if step.fields.is_empty() {
        return row.clone();
    }

    let mut projected = serde_json::Map::with_capacity(step.fields.len());
    for field in &step.fields {
        projected.insert(
            field.column.clone(),
            row.get(&field.source).cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(projected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{
        error::AppError,
        types::{
            auth_context::{AuthContext, AuthScheme},
            ingestion_result::IngestionStatus,
            job_program::{JobAuth, JobFieldMap, JobProgram, JobRequest},
        },
    };
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct ScriptedGateway {
        responses: Mutex<VecDeque<GatewayResponse>>,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<GatewayResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        async fn request_count(&self) -> usize {
            self.requests.lock().await.len()
        }

        async fn queries(&self) -> Vec<Vec<(String, String)>> {
            self.requests
                .lock()
                .await
                .iter()
                .map(|(_, q)| q.clone())
                .collect()
        }
    }

    #[async_trait]
    impl HttpGateway for ScriptedGateway {
        async fn get(
            &self,
            url: &str,
            _headers: &[(String, String)],
            query: &[(String, String)],
        ) -> Result<GatewayResponse, AppError> {
            self.requests
                .lock()
                .await
                .push((url.to_string(), query.to_vec()));
            self.responses
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| AppError::InternalError("script exhausted".into()))
        }
    }

    struct BrokenTransportGateway {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl HttpGateway for BrokenTransportGateway {
        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _query: &[(String, String)],
        ) -> Result<GatewayResponse, AppError> {
            *self.calls.lock().await += 1;
            Err(AppError::InternalError("connection refused".into()))
        }
    }

    struct SlowGateway;

    #[async_trait]
    impl HttpGateway for SlowGateway {
        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _query: &[(String, String)],
        ) -> Result<GatewayResponse, AppError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(ok_response(json!([])))
        }
    }

    fn ok_response(body: Value) -> GatewayResponse {
        GatewayResponse { status: 200, body }
    }

    fn status_response(status: u16) -> GatewayResponse {
        GatewayResponse {
            status,
            body: Value::Null,
        }
    }

    fn job(pagination: JobPagination) -> SynthesizedJob {
        SynthesizedJob {
            id: "job-1".into(),
            platform: "example".into(),
            source: String::new(),
            program: JobProgram {
                auth: JobAuth {
                    scheme: "bearer".into(),
                    header: None,
                },
                base_url: "https://api.example.com".into(),
                steps: vec![JobStep {
                    op: "fetch".into(),
                    entity: "users".into(),
                    table: "users".into(),
                    request: JobRequest {
                        method: "GET".into(),
                        path: "/v1/users".into(),
                    },
                    pagination,
                    fields: vec![JobFieldMap {
                        source: "id".into(),
                        column: "id".into(),
                    }],
                }],
            },
            auth: AuthContext {
                platform: "example".into(),
                scheme: AuthScheme::Bearer {
                    token: "tok".into(),
                },
            },
            fingerprint: "test-fingerprint".into(),
        }
    }

    fn executor(gateway: Arc<dyn HttpGateway>) -> SandboxExecutor {
        SandboxExecutor::new(
            gateway,
            SandboxTuning {
                transient_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 4,
                max_pages: 10,
            },
        )
    }

    #[tokio::test]
    async fn single_fetch_counts_records() {
        let gateway = ScriptedGateway::new(vec![ok_response(json!({
            "data": [{"id": "u1"}, {"id": "u2"}]
        }))]);
        let result = executor(gateway.clone())
            .run(&job(JobPagination::None), Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Ok);
        assert_eq!(result.records, 2);
        assert_eq!(gateway.request_count().await, 1);
    }

    #[tokio::test]
    async fn empty_data_is_no_data_not_error() {
        let gateway = ScriptedGateway::new(vec![ok_response(json!({"data": []}))]);
        let result = executor(gateway)
            .run(&job(JobPagination::None), Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::NoData);
        assert_eq!(result.records, 0);
        assert_eq!(result.message, NO_DATA_MESSAGE);
        assert!(result.error_kind.is_none());
    }

    #[tokio::test]
    async fn unauthorized_fails_immediately_without_retry() {
        let gateway = ScriptedGateway::new(vec![status_response(401)]);
        let result = executor(gateway.clone())
            .run(&job(JobPagination::None), Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Error);
        assert_eq!(result.error_kind, Some(ExecutionFaultKind::AuthRejected));
        assert_eq!(gateway.request_count().await, 1);
    }

    #[tokio::test]
    async fn server_error_is_retried_until_success() {
        let gateway = ScriptedGateway::new(vec![
            status_response(503),
            ok_response(json!({"data": [{"id": "u1"}]})),
        ]);
        let result = executor(gateway.clone())
            .run(&job(JobPagination::None), Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Ok);
        assert_eq!(result.records, 1);
        assert_eq!(gateway.request_count().await, 2);
    }

    #[tokio::test]
    async fn rate_limit_exhausts_attempts_then_reports_kind() {
        let gateway = ScriptedGateway::new(vec![
            status_response(429),
            status_response(429),
            status_response(429),
        ]);
        let result = executor(gateway.clone())
            .run(&job(JobPagination::None), Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Error);
        assert_eq!(result.error_kind, Some(ExecutionFaultKind::RateLimited));
        assert_eq!(gateway.request_count().await, 3);
    }

    #[tokio::test]
    async fn transport_errors_fail_immediately_without_retry() {
        let gateway = Arc::new(BrokenTransportGateway {
            calls: Mutex::new(0),
        });
        let result = executor(gateway.clone())
            .run(&job(JobPagination::None), Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Error);
        assert_eq!(result.error_kind, Some(ExecutionFaultKind::RuntimeFault));
        assert!(result
            .error_detail
            .expect("detail")
            .contains("transport error"));
        assert_eq!(*gateway.calls.lock().await, 1);
    }

    #[tokio::test]
    async fn page_pagination_increments_until_empty() {
        let gateway = ScriptedGateway::new(vec![
            ok_response(json!({"data": [{"id": "u1"}, {"id": "u2"}]})),
            ok_response(json!({"data": [{"id": "u3"}]})),
            ok_response(json!({"data": []})),
        ]);
        let result = executor(gateway.clone())
            .run(
                &job(JobPagination::Page {
                    param: "page".into(),
                }),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(result.status, IngestionStatus::Ok);
        assert_eq!(result.records, 3);

        let queries = gateway.queries().await;
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], vec![("page".to_string(), "1".to_string())]);
        assert_eq!(queries[2], vec![("page".to_string(), "3".to_string())]);
    }

    #[tokio::test]
    async fn cursor_pagination_passes_last_id_while_has_more() {
        let gateway = ScriptedGateway::new(vec![
            ok_response(json!({"data": [{"id": "a"}, {"id": "b"}], "has_more": true})),
            ok_response(json!({"data": [{"id": "c"}], "has_more": false})),
        ]);
        let result = executor(gateway.clone())
            .run(
                &job(JobPagination::Cursor {
                    param: "starting_after".into(),
                }),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(result.status, IngestionStatus::Ok);
        assert_eq!(result.records, 3);

        let queries = gateway.queries().await;
        assert_eq!(queries.len(), 2);
        assert!(queries[0].is_empty());
        assert_eq!(
            queries[1],
            vec![("starting_after".to_string(), "b".to_string())]
        );
    }

    #[tokio::test]
    async fn cursor_pagination_stringifies_numeric_ids() {
        let gateway = ScriptedGateway::new(vec![
            ok_response(json!({"data": [{"id": 1}, {"id": 2}], "has_more": true})),
            ok_response(json!({"data": [{"id": 3}], "has_more": false})),
        ]);
        let result = executor(gateway.clone())
            .run(
                &job(JobPagination::Cursor {
                    param: "starting_after".into(),
                }),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(result.status, IngestionStatus::Ok);
        assert_eq!(result.records, 3);

        let queries = gateway.queries().await;
        assert_eq!(queries.len(), 2);
        assert_eq!(
            queries[1],
            vec![("starting_after".to_string(), "2".to_string())]
        );
    }

    #[tokio::test]
    async fn path_escaping_the_base_url_never_reaches_the_gateway() {
        let gateway = ScriptedGateway::new(Vec::new());
        let mut escaping = job(JobPagination::None);
        escaping.program.steps[0].request.path = "https://evil.example/steal".into();

        let result = executor(gateway.clone())
            .run(&escaping, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Error);
        assert_eq!(result.error_kind, Some(ExecutionFaultKind::RuntimeFault));
        assert_eq!(gateway.request_count().await, 0);
    }

    #[tokio::test]
    async fn deadline_overrun_becomes_a_timeout_result() {
        let result = executor(Arc::new(SlowGateway))
            .run(&job(JobPagination::None), Duration::from_millis(10))
            .await;

        assert_eq!(result.status, IngestionStatus::Error);
        assert_eq!(result.error_kind, Some(ExecutionFaultKind::Timeout));
    }

    #[tokio::test]
    async fn fields_are_projected_onto_destination_columns() {
        let row = json!({"id": "u1", "email": "a@example.com", "extra": 1});
        let step = job(JobPagination::None).program.steps.remove(0);
        let projected = project_row(&row, &step);

        assert_eq!(projected, json!({"id": "u1"}));
    }

    #[tokio::test]
    async fn fault_detail_reports_partial_progress() {
        let gateway = ScriptedGateway::new(vec![
            ok_response(json!({"data": [{"id": "u1"}]})),
            status_response(401),
        ]);
        let mut two_steps = job(JobPagination::None);
        let mut second = two_steps.program.steps[0].clone();
        second.entity = "orders".into();
        second.request.path = "/v1/orders".into();
        two_steps.program.steps.push(second);

        let result = executor(gateway)
            .run(&two_steps, Duration::from_secs(5))
            .await;

        assert_eq!(result.status, IngestionStatus::Error);
        let detail = result.error_detail.expect("detail");
        assert!(detail.contains("orders"));
        assert!(detail.contains("after 1 records"));
    }

    #[test]
    fn bare_arrays_and_wrapper_keys_both_extract() {
        assert_eq!(extract_rows(&json!([1, 2])).len(), 2);
        assert_eq!(extract_rows(&json!({"results": [1]})).len(), 1);
        assert_eq!(extract_rows(&json!({"items": [1, 2, 3]})).len(), 3);
    }

    #[test]
    fn nonempty_object_without_wrapper_is_a_single_record() {
        let rows = extract_rows(&json!({"id": "u1"}));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn null_and_empty_bodies_extract_nothing() {
        assert!(extract_rows(&Value::Null).is_empty());
        assert!(extract_rows(&json!({})).is_empty());
    }
}
