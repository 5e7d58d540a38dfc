use std::sync::Arc;

use common::utils::{
    config::get_config, credentials::ConfigCredentialResolver,
    schema_registry::FileSchemaRegistry,
};
use integration_pipeline::{IntegrationPipeline, RunOutcome};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(schema_id)) = (args.next(), args.next()) else {
        eprintln!("usage: integrate <documentation-url> <schema-id>");
        std::process::exit(2);
    };

    // Get config
    let config = get_config()?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let registry = Arc::new(FileSchemaRegistry::new(&config.ontology_path));
    let resolver = Arc::new(ConfigCredentialResolver::new(&config));

    let pipeline = IntegrationPipeline::new(openai_client, &config, registry, resolver)?;

    info!(url = %url, schema_id = %schema_id, "starting integration run");

    match pipeline.run(&url, &schema_id).await {
        RunOutcome::Done(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        RunOutcome::Failed { stage, error } => {
            eprintln!("integration run failed while {stage}: {error}");
            std::process::exit(1);
        }
    }
}
