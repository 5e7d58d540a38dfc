mod config;
mod context;
mod services;
mod stages;
mod state;

pub use config::{PipelineConfig, PipelineTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    types::{
        api_spec::ApiSpec, ingestion_result::IngestionResult, ontology_mapping::OntologyMapping,
    },
    utils::{
        config::AppConfig, credentials::CredentialResolver, schema_registry::SchemaRegistry,
    },
};
use tracing::info;

use self::{
    context::PipelineRun,
    stages::{execute_job, extract_spec, fetch_document, map_ontology, synthesize_job},
    state::ready,
};

type OpenAIClient = async_openai::Client<async_openai::config::OpenAIConfig>;

/// Stage a run was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Fetching,
    Extracting,
    Mapping,
    Synthesizing,
    Executing,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Mapping => "mapping",
            Self::Synthesizing => "synthesizing",
            Self::Executing => "executing",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one run. Execution faults surface as
/// `Done(IngestionResult { status: Error, .. })`; `Failed` means a stage
/// itself broke and no result exists.
#[derive(Debug)]
pub enum RunOutcome {
    Done(IngestionResult),
    Failed { stage: StageName, error: AppError },
}

#[allow(clippy::module_name_repetitions)]
pub struct IntegrationPipeline {
    pipeline_config: PipelineConfig,
    services: Arc<dyn PipelineServices>,
}

impl IntegrationPipeline {
    pub fn new(
        openai_client: Arc<OpenAIClient>,
        config: &AppConfig,
        registry: Arc<dyn SchemaRegistry>,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Result<Self, AppError> {
        let pipeline_config = PipelineConfig::from_app_config(config);
        let services = DefaultPipelineServices::new(
            openai_client,
            config,
            &pipeline_config,
            registry,
            resolver,
        )?;

        Ok(Self::with_services(pipeline_config, Arc::new(services)))
    }

    pub fn with_services(
        pipeline_config: PipelineConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            pipeline_config,
            services,
        }
    }

    /// Drives one documentation page through to a terminal outcome. Stage
    /// failures are converted, never propagated as bare errors.
    #[tracing::instrument(skip_all, fields(url = %url, schema_id = %schema_id))]
    pub async fn run(&self, url: &str, schema_id: &str) -> RunOutcome {
        let mut run = PipelineRun::new(url, schema_id, self.services.as_ref());

        match self.drive(&mut run).await {
            Ok(result) => RunOutcome::Done(result),
            Err((stage, error)) => RunOutcome::Failed { stage, error },
        }
    }

    /// Fetches and extracts only: documentation URL to structured spec.
    pub async fn parse_doc(&self, url: &str) -> Result<ApiSpec, AppError> {
        let document = self.services.fetch_document(url).await?;
        self.services.extract_spec(&document).await
    }

    /// Maps an extracted spec onto one destination schema.
    pub async fn map_ontology(
        &self,
        spec: &ApiSpec,
        schema_id: &str,
    ) -> Result<OntologyMapping, AppError> {
        let schema = self.services.load_schema(schema_id).await?;
        Ok(self.services.map_ontology(spec, &schema))
    }

    /// Synthesizes and executes a job for an already-mapped spec.
    pub async fn ingest_data(
        &self,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<IngestionResult, AppError> {
        let job = self.services.synthesize_job(spec, mapping).await?;
        self.services.execute_job(&job, spec, mapping).await
    }

    async fn drive(
        &self,
        run: &mut PipelineRun<'_>,
    ) -> Result<IngestionResult, (StageName, AppError)> {
        let machine = ready();

        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = fetch_document(machine, run)
            .await
            .map_err(|err| (StageName::Fetching, run.abort(err)))?;
        let fetch_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = extract_spec(machine, run)
            .await
            .map_err(|err| (StageName::Extracting, run.abort(err)))?;
        let extract_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = map_ontology(machine, run)
            .await
            .map_err(|err| (StageName::Mapping, run.abort(err)))?;
        let map_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = synthesize_job(machine, run)
            .await
            .map_err(|err| (StageName::Synthesizing, run.abort(err)))?;
        let synthesize_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let (_machine, result) = execute_job(machine, run)
            .await
            .map_err(|err| (StageName::Executing, run.abort(err)))?;
        let execute_duration = stage_start.elapsed();

        let total_duration = pipeline_started.elapsed();
        info!(
            run_id = %run.run_id,
            status = ?result.status,
            records = result.records,
            total_ms = Self::duration_millis(total_duration),
            fetch_ms = Self::duration_millis(fetch_duration),
            extract_ms = Self::duration_millis(extract_duration),
            map_ms = Self::duration_millis(map_duration),
            synthesize_ms = Self::duration_millis(synthesize_duration),
            execute_ms = Self::duration_millis(execute_duration),
            "integration pipeline finished"
        );

        Ok(result)
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}
