use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{
    error::AppError,
    types::{
        api_spec::ApiSpec, ingestion_result::IngestionResult, ontology::DestinationSchema,
        ontology_mapping::OntologyMapping, synthesized_job::SynthesizedJob,
    },
    utils::{
        config::AppConfig,
        credentials::CredentialResolver,
        document::{DocumentFetcher, HttpDocumentFetcher},
        schema_registry::SchemaRegistry,
    },
};

use crate::{
    extraction::SpecExtractor,
    mapping::OntologyMapper,
    sandbox::{ReqwestGateway, SandboxExecutor},
    synthesis::CodeSynthesizer,
};

use super::config::PipelineConfig;

type OpenAIClient = async_openai::Client<async_openai::config::OpenAIConfig>;

/// Everything the orchestrator needs from the outside world. Stages only
/// talk to this trait, so orchestrator tests run on mock services with no
/// network, models or files involved.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<String, AppError>;

    async fn extract_spec(&self, document: &str) -> Result<ApiSpec, AppError>;

    async fn load_schema(&self, id: &str) -> Result<DestinationSchema, AppError>;

    fn map_ontology(&self, spec: &ApiSpec, schema: &DestinationSchema) -> OntologyMapping;

    /// Resolves the platform's credentials and synthesizes a validated job.
    async fn synthesize_job(
        &self,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<SynthesizedJob, AppError>;

    /// Runs a job after checking it still belongs to the given artifacts.
    async fn execute_job(
        &self,
        job: &SynthesizedJob,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<IngestionResult, AppError>;
}

pub struct DefaultPipelineServices {
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: SpecExtractor,
    registry: Arc<dyn SchemaRegistry>,
    mapper: OntologyMapper,
    resolver: Arc<dyn CredentialResolver>,
    synthesizer: CodeSynthesizer,
    executor: SandboxExecutor,
    execution_timeout: Duration,
}

impl DefaultPipelineServices {
    pub fn new(
        openai_client: Arc<OpenAIClient>,
        config: &AppConfig,
        pipeline_config: &PipelineConfig,
        registry: Arc<dyn SchemaRegistry>,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Result<Self, AppError> {
        let fetcher = Arc::new(HttpDocumentFetcher::new(
            config.fetch_timeout_secs,
            config.document_char_limit,
        )?);
        let extractor = SpecExtractor::from_config(Arc::clone(&openai_client), config);
        let mapper = OntologyMapper::new(config.mapping_confidence_threshold);
        let synthesizer = CodeSynthesizer::new(openai_client, &config.synthesis_model);
        let gateway = Arc::new(ReqwestGateway::new(Duration::from_secs(
            config.fetch_timeout_secs,
        ))?);
        let executor = SandboxExecutor::new(gateway, pipeline_config.tuning.sandbox.clone());

        Ok(Self {
            fetcher,
            extractor,
            registry,
            mapper,
            resolver,
            synthesizer,
            executor,
            execution_timeout: pipeline_config.tuning.execution_timeout,
        })
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn fetch_document(&self, url: &str) -> Result<String, AppError> {
        self.fetcher.fetch(url).await
    }

    async fn extract_spec(&self, document: &str) -> Result<ApiSpec, AppError> {
        self.extractor.extract(document).await
    }

    async fn load_schema(&self, id: &str) -> Result<DestinationSchema, AppError> {
        self.registry.get_schema(id).await
    }

    fn map_ontology(&self, spec: &ApiSpec, schema: &DestinationSchema) -> OntologyMapping {
        self.mapper.map(spec, schema)
    }

    async fn synthesize_job(
        &self,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<SynthesizedJob, AppError> {
        let auth = self.resolver.resolve_auth(&spec.platform).await?;
        self.synthesizer.synthesize(spec, mapping, auth).await
    }

    async fn execute_job(
        &self,
        job: &SynthesizedJob,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<IngestionResult, AppError> {
        if !job.matches_artifacts(spec, mapping)? {
            return Err(AppError::Validation(
                "job fingerprint does not match the current spec and mapping".into(),
            ));
        }

        Ok(self.executor.run(job, self.execution_timeout).await)
    }
}
