use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Stored credential material for one platform, as configured. The scheme
/// string selects how the secret is presented on the wire.
#[derive(Clone, Deserialize, Debug, Default)]
pub struct PlatformCredential {
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_compact_model")]
    pub compact_model: String,
    #[serde(default = "default_large_context_model")]
    pub large_context_model: String,
    #[serde(default = "default_synthesis_model")]
    pub synthesis_model: String,
    /// Documents shorter than this go to the compact backend first.
    #[serde(default = "default_extraction_char_threshold")]
    pub extraction_char_threshold: usize,
    #[serde(default = "default_document_char_limit")]
    pub document_char_limit: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
    #[serde(default = "default_mapping_confidence_threshold")]
    pub mapping_confidence_threshold: f64,
    #[serde(default = "default_ontology_path")]
    pub ontology_path: String,
    #[serde(default)]
    pub credentials: HashMap<String, PlatformCredential>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_compact_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_large_context_model() -> String {
    "gpt-4o".to_string()
}

fn default_synthesis_model() -> String {
    "gpt-4o".to_string()
}

fn default_extraction_char_threshold() -> usize {
    10_000
}

fn default_document_char_limit() -> usize {
    50_000
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_execution_timeout_secs() -> u64 {
    600
}

fn default_mapping_confidence_threshold() -> f64 {
    0.6
}

fn default_ontology_path() -> String {
    "./ontology.json".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
