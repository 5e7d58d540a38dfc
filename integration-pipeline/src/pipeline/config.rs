use std::time::Duration;

use common::utils::config::AppConfig;

use crate::sandbox::SandboxTuning;

#[derive(Debug, Clone)]
pub struct PipelineTuning {
    /// Wall-clock budget for one sandbox execution.
    pub execution_timeout: Duration,
    pub sandbox: SandboxTuning,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(600),
            sandbox: SandboxTuning::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub tuning: PipelineTuning,
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: PipelineTuning {
                execution_timeout: Duration::from_secs(config.execution_timeout_secs),
                sandbox: SandboxTuning::default(),
            },
        }
    }
}
