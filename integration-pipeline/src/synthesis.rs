use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use common::{
    error::AppError,
    types::{
        api_spec::ApiSpec,
        auth_context::{AuthContext, AuthScheme},
        job_program::{JobProgram, ALLOWED_METHODS, ALLOWED_OPS},
        ontology_mapping::OntologyMapping,
        synthesized_job::SynthesizedJob,
    },
};
use tracing::debug;

use crate::utils::llm_instructions::{
    get_job_program_schema, job_synthesis_user_message, JOB_SYNTHESIS_SYSTEM_MESSAGE,
};

type OpenAIClient = async_openai::Client<async_openai::config::OpenAIConfig>;

/// Pagination style inferred from the extracted spec, used to steer the
/// synthesis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationHint {
    Cursor,
    Page,
    None,
}

impl PaginationHint {
    fn as_str(self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::Page => "page",
            Self::None => "none",
        }
    }
}

/// Asks the synthesis model for an ingestion routine covering the mapped
/// entities, then runs the static capability gate before anything can be
/// executed.
pub struct CodeSynthesizer {
    client: Arc<OpenAIClient>,
    model: String,
}

impl CodeSynthesizer {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    #[tracing::instrument(skip_all, fields(platform = %spec.platform, mapped = mapping.mapped_count()))]
    pub async fn synthesize(
        &self,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
        auth: AuthContext,
    ) -> Result<SynthesizedJob, AppError> {
        if mapping.mapped_count() == 0 {
            return Err(AppError::Synthesis(
                "no mapped entities to synthesize a routine for".into(),
            ));
        }

        // Documentation wording decides the hint only when no configured
        // credential pins the scheme down.
        let auth_kind = match &auth.scheme {
            AuthScheme::None => infer_auth_kind(spec),
            scheme => scheme.kind_name(),
        };

        let user_message = job_synthesis_user_message(
            &spec.platform,
            &spec.base_url,
            auth_kind,
            infer_pagination(spec).as_str(),
            &mapped_endpoint_summary(spec, mapping),
        );

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Ingestion routine over the allowed instruction set".into()),
                name: "job_program".into(),
                schema: Some(get_job_program_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(JOB_SYNTHESIS_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let source = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::Synthesis("no content in model response".into()))?;

        let program = parse_job_program(&source)?;
        validate_program(&program, spec, mapping)?;

        debug!(
            steps = program.steps.len(),
            "synthesized routine passed static validation"
        );

        SynthesizedJob::new(&spec.platform, source, program, auth, spec, mapping)
    }
}

/// Infers the pagination style from endpoint paths and the pagination
/// note. Stripe-style platforms are cursor-paginated regardless of what
/// the note says.
pub fn infer_pagination(spec: &ApiSpec) -> PaginationHint {
    if spec.platform.to_lowercase().contains("stripe") {
        return PaginationHint::Cursor;
    }

    let mut haystack = spec
        .endpoints
        .iter()
        .flat_map(|e| {
            std::iter::once(e.path.to_lowercase())
                .chain(e.parameters.iter().map(|p| p.to_lowercase()))
        })
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(note) = &spec.pagination_note {
        haystack.push(' ');
        haystack.push_str(&note.to_lowercase());
    }

    if ["cursor", "after", "before"].iter().any(|k| haystack.contains(k)) {
        PaginationHint::Cursor
    } else if ["page", "offset", "limit"].iter().any(|k| haystack.contains(k)) {
        PaginationHint::Page
    } else {
        PaginationHint::None
    }
}

/// Guesses the auth scheme kind from the free-text authentication
/// description the extractor produced.
pub fn infer_auth_kind(spec: &ApiSpec) -> &'static str {
    let text = spec.authentication_method.to_lowercase();
    if text.contains("basic") {
        "basic"
    } else if text.contains("api key") || text.contains("api-key") || text.contains("x-api-key") {
        "api_key"
    } else if text.contains("oauth") || text.contains("bearer") || text.contains("token") {
        "bearer"
    } else {
        "none"
    }
}

/// Parses routine source text into a `JobProgram`, tolerating prose around
/// the JSON object.
pub fn parse_job_program(source: &str) -> Result<JobProgram, AppError> {
    let start = source
        .find('{')
        .ok_or_else(|| AppError::Synthesis("no JSON object in routine source".into()))?;
    let end = source
        .rfind('}')
        .ok_or_else(|| AppError::Synthesis("no JSON object in routine source".into()))?;
    let json_str = source
        .get(start..=end)
        .ok_or_else(|| AppError::Synthesis("no JSON object in routine source".into()))?;

    serde_json::from_str(json_str)
        .map_err(|e| AppError::Synthesis(format!("routine is not parseable: {e}")))
}

/// The static safety gate: every capability the routine references must be
/// on the allow-list, and the routine must cover exactly the mapped
/// entities. This is a safety gate, not a correctness gate.
pub fn validate_program(
    program: &JobProgram,
    spec: &ApiSpec,
    mapping: &OntologyMapping,
) -> Result<(), AppError> {
    if normalize_base(&program.base_url) != normalize_base(&spec.base_url) {
        return Err(AppError::Synthesis(format!(
            "routine declares base URL '{}' but the spec declares '{}'",
            program.base_url, spec.base_url
        )));
    }

    if !matches!(
        program.auth.scheme.as_str(),
        "bearer" | "api_key" | "basic" | "none"
    ) {
        return Err(AppError::Synthesis(format!(
            "routine references unknown auth scheme '{}'",
            program.auth.scheme
        )));
    }

    let mapped: BTreeSet<&str> = mapping.mapped().map(|(entity, _)| entity).collect();
    let mut covered: BTreeSet<&str> = BTreeSet::new();

    for step in &program.steps {
        if !ALLOWED_OPS.contains(&step.op.as_str()) {
            return Err(AppError::Synthesis(format!(
                "routine references capability '{}' outside the allow-list",
                step.op
            )));
        }

        if !ALLOWED_METHODS.contains(&step.request.method.as_str()) {
            return Err(AppError::Synthesis(format!(
                "routine requests disallowed HTTP method '{}'",
                step.request.method
            )));
        }

        if step.request.path.contains("://") || !step.request.path.starts_with('/') {
            return Err(AppError::Synthesis(format!(
                "step path '{}' must be relative to the declared base URL",
                step.request.path
            )));
        }

        let Some(target) = mapping.target_for(&step.entity) else {
            return Err(AppError::Synthesis(format!(
                "routine fetches unmapped entity '{}'",
                step.entity
            )));
        };

        if target.table != step.table {
            return Err(AppError::Synthesis(format!(
                "step for entity '{}' writes to '{}' but the mapping says '{}'",
                step.entity, step.table, target.table
            )));
        }

        for field in &step.fields {
            if !target.fields.iter().any(|f| f.column == field.column) {
                return Err(AppError::Synthesis(format!(
                    "step for entity '{}' writes unmapped column '{}'",
                    step.entity, field.column
                )));
            }
        }

        covered.insert(step.entity.as_str());
    }

    for entity in mapped {
        if !covered.contains(entity) {
            return Err(AppError::Synthesis(format!(
                "routine has no fetch step for mapped entity '{entity}'"
            )));
        }
    }

    Ok(())
}

/// Plain-text endpoint and field-mapping summary fed to the synthesis
/// prompt: mapped entities only, unverified mappings never reach the model.
fn mapped_endpoint_summary(spec: &ApiSpec, mapping: &OntologyMapping) -> String {
    let mut out = String::new();
    for (entity, target) in mapping.mapped() {
        let _ = writeln!(out, "- entity '{entity}' -> table '{}'", target.table);
        for endpoint in spec.endpoints_for_entity(entity) {
            let _ = writeln!(
                out,
                "  endpoint: {} {} ({})",
                endpoint.method, endpoint.path, endpoint.description
            );
        }
        for field in &target.fields {
            let _ = writeln!(out, "  field: {} -> {}", field.source_field, field.column);
        }
    }
    out
}

fn normalize_base(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
