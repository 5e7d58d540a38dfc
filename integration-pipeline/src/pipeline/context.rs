use common::{
    error::AppError,
    types::{
        api_spec::ApiSpec, ontology_mapping::OntologyMapping, synthesized_job::SynthesizedJob,
    },
};
use tracing::error;
use uuid::Uuid;

use super::services::PipelineServices;

/// Mutable state threaded through the stages of one run. Artifacts are
/// filled in stage order; accessors fail if a stage reads ahead of what
/// has been produced.
pub struct PipelineRun<'a> {
    pub run_id: String,
    pub url: &'a str,
    pub schema_id: &'a str,
    pub services: &'a dyn PipelineServices,
    pub document: Option<String>,
    pub spec: Option<ApiSpec>,
    pub mapping: Option<OntologyMapping>,
    pub job: Option<SynthesizedJob>,
}

impl<'a> PipelineRun<'a> {
    pub fn new(url: &'a str, schema_id: &'a str, services: &'a dyn PipelineServices) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            url,
            schema_id,
            services,
            document: None,
            spec: None,
            mapping: None,
            job: None,
        }
    }

    pub fn document(&self) -> Result<&str, AppError> {
        self.document
            .as_deref()
            .ok_or_else(|| AppError::InternalError("document expected to be available".into()))
    }

    pub fn spec(&self) -> Result<&ApiSpec, AppError> {
        self.spec
            .as_ref()
            .ok_or_else(|| AppError::InternalError("spec expected to be available".into()))
    }

    pub fn mapping(&self) -> Result<&OntologyMapping, AppError> {
        self.mapping
            .as_ref()
            .ok_or_else(|| AppError::InternalError("mapping expected to be available".into()))
    }

    pub fn job(&self) -> Result<&SynthesizedJob, AppError> {
        self.job
            .as_ref()
            .ok_or_else(|| AppError::InternalError("job expected to be available".into()))
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            run_id = %self.run_id,
            url = %self.url,
            error = %err,
            "integration pipeline aborted"
        );
        err
    }
}
