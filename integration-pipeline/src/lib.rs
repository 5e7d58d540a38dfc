#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod extraction;
pub mod mapping;
pub mod pipeline;
pub mod sandbox;
pub mod synthesis;
pub mod utils;

pub use pipeline::{
    IntegrationPipeline, PipelineConfig, PipelineTuning, RunOutcome, StageName,
};
