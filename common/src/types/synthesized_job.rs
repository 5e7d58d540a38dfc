use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::AppError,
    types::{
        api_spec::ApiSpec, auth_context::AuthContext, job_program::JobProgram,
        ontology_mapping::OntologyMapping,
    },
};

/// A generated, statically validated ingestion routine, paired with the
/// exact (spec, mapping) it was derived from. Jobs are never reused across
/// differing mappings: the executor checks the fingerprint before running.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SynthesizedJob {
    pub id: String,
    pub platform: String,
    /// The routine as the model produced it, before parsing.
    pub source: String,
    pub program: JobProgram,
    pub auth: AuthContext,
    pub fingerprint: String,
}

impl SynthesizedJob {
    pub fn new(
        platform: impl Into<String>,
        source: impl Into<String>,
        program: JobProgram,
        auth: AuthContext,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<Self, AppError> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            platform: platform.into(),
            source: source.into(),
            program,
            auth,
            fingerprint: artifact_fingerprint(spec, mapping)?,
        })
    }

    pub fn matches_artifacts(
        &self,
        spec: &ApiSpec,
        mapping: &OntologyMapping,
    ) -> Result<bool, AppError> {
        Ok(self.fingerprint == artifact_fingerprint(spec, mapping)?)
    }
}

/// SHA-256 over the serialized (spec, mapping) pair.
pub fn artifact_fingerprint(
    spec: &ApiSpec,
    mapping: &OntologyMapping,
) -> Result<String, AppError> {
    let serialized = serde_json::to_vec(&(spec, mapping))
        .map_err(|e| AppError::InternalError(format!("failed to fingerprint artifacts: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    Ok(format!("{:x}", hasher.finalize()))
}
