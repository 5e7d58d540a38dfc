pub mod api_spec;
pub mod auth_context;
pub mod ingestion_result;
pub mod job_program;
pub mod ontology;
pub mod ontology_mapping;
pub mod synthesized_job;
