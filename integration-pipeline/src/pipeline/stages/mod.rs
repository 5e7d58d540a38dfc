use common::{error::AppError, types::ingestion_result::IngestionResult};
use state_machines::core::GuardError;
use tracing::{debug, instrument};

use super::{
    context::PipelineRun,
    state::{Executed, Extracted, Fetched, IntegrationMachine, Mapped, Ready, Synthesized},
};

#[instrument(level = "trace", skip_all, fields(run_id = %run.run_id, url = %run.url))]
pub async fn fetch_document(
    machine: IntegrationMachine<(), Ready>,
    run: &mut PipelineRun<'_>,
) -> Result<IntegrationMachine<(), Fetched>, AppError> {
    let document = run.services.fetch_document(run.url).await?;

    tracing::info!(
        run_id = %run.run_id,
        url = %run.url,
        document_chars = document.chars().count(),
        "documentation page fetched"
    );

    run.document = Some(document);

    machine
        .fetch()
        .map_err(|(_, guard)| map_guard_error("fetch", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %run.run_id))]
pub async fn extract_spec(
    machine: IntegrationMachine<(), Fetched>,
    run: &mut PipelineRun<'_>,
) -> Result<IntegrationMachine<(), Extracted>, AppError> {
    let spec = run.services.extract_spec(run.document()?).await?;

    debug!(
        run_id = %run.run_id,
        platform = %spec.platform,
        endpoints = spec.endpoints.len(),
        entities = spec.entities.len(),
        "spec extracted"
    );

    run.spec = Some(spec);

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %run.run_id, schema_id = %run.schema_id))]
pub async fn map_ontology(
    machine: IntegrationMachine<(), Extracted>,
    run: &mut PipelineRun<'_>,
) -> Result<IntegrationMachine<(), Mapped>, AppError> {
    let schema = run.services.load_schema(run.schema_id).await?;
    let mapping = run.services.map_ontology(run.spec()?, &schema);

    debug!(
        run_id = %run.run_id,
        schema_id = %schema.id,
        mapped = mapping.mapped_count(),
        unmapped = mapping.entries.len().saturating_sub(mapping.mapped_count()),
        "ontology mapping computed"
    );

    run.mapping = Some(mapping);

    machine
        .map()
        .map_err(|(_, guard)| map_guard_error("map", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %run.run_id))]
pub async fn synthesize_job(
    machine: IntegrationMachine<(), Mapped>,
    run: &mut PipelineRun<'_>,
) -> Result<IntegrationMachine<(), Synthesized>, AppError> {
    let job = run
        .services
        .synthesize_job(run.spec()?, run.mapping()?)
        .await?;

    debug!(
        run_id = %run.run_id,
        job_id = %job.id,
        steps = job.program.steps.len(),
        "ingestion job synthesized"
    );

    run.job = Some(job);

    machine
        .synthesize()
        .map_err(|(_, guard)| map_guard_error("synthesize", &guard))
}

#[instrument(level = "trace", skip_all, fields(run_id = %run.run_id))]
pub async fn execute_job(
    machine: IntegrationMachine<(), Synthesized>,
    run: &mut PipelineRun<'_>,
) -> Result<(IntegrationMachine<(), Executed>, IngestionResult), AppError> {
    let result = run
        .services
        .execute_job(run.job()?, run.spec()?, run.mapping()?)
        .await?;

    debug!(
        run_id = %run.run_id,
        status = ?result.status,
        records = result.records,
        "ingestion job executed"
    );

    let machine = machine
        .execute()
        .map_err(|(_, guard)| map_guard_error("execute", &guard))?;

    Ok((machine, result))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid integration pipeline transition during {event}: {guard:?}"
    ))
}
