//! Command handlers for the Fable CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod chunk;
pub mod prompts;
pub mod run;
pub mod scrape;

// Re-export command types for convenience
pub use chunk::ChunkCommand;
pub use prompts::PromptsCommand;
pub use run::RunCommand;
pub use scrape::ScrapeCommand;

use fable_core::{config::AppConfig, AppResult};
use fable_llm::create_client_from_config;
use fable_pipeline::{Pipeline, PipelineConfig, PipelinePrompts, ProgressEvent, ProgressReporter};
use std::sync::Arc;

/// Validate the configuration and assemble a pipeline with a live model client.
///
/// Every failure here is a startup error: nothing has been read or written yet.
pub(crate) fn build_pipeline(config: &AppConfig) -> AppResult<Pipeline> {
    config.validate()?;

    let client = create_client_from_config(config)?;
    let pipeline_config = PipelineConfig::from_app_config(config)?;
    let prompts = PipelinePrompts::load(&config.workspace)?;

    Ok(Pipeline::new(client, pipeline_config, prompts)?.with_progress(progress_reporter(config.verbose)))
}

/// Progress lines go to stderr in verbose mode so stdout stays clean for data.
fn progress_reporter(verbose: bool) -> ProgressReporter {
    if verbose {
        ProgressReporter::new(Arc::new(|event: ProgressEvent| {
            eprintln!("{}", event.format_simple());
        }))
    } else {
        ProgressReporter::noop()
    }
}
