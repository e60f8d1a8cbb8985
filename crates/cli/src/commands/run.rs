//! Run command handler.
//!
//! Processes every document in the input folder and writes one story per
//! document to the output folder.

use super::build_pipeline;
use clap::Args;
use fable_core::{config::AppConfig, AppError, AppResult};
use fable_pipeline::BatchReport;
use std::path::PathBuf;

/// Summarize documents and write stories
#[derive(Args, Debug, Default)]
pub struct RunCommand {
    /// Folder with input documents (default: `documents` in the workspace)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Folder for generated stories (default: `stories` in the workspace)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write numbered image prompts for each story
    #[arg(long)]
    pub image_prompts: bool,

    /// Keep finished chunk summaries when a later call fails
    #[arg(long)]
    pub keep_partials: bool,

    /// Model calls in flight per document
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Wall-clock budget for each document, in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Output the batch report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing run command");
        tracing::debug!("Run options: {:?}", self);

        let config = self.apply(config);
        let input = self.input.clone().unwrap_or_else(|| config.input_path());
        let output = self.output.clone().unwrap_or_else(|| config.output_path());

        let pipeline = build_pipeline(&config)?;
        let report = pipeline.run(&input, &output).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        } else {
            print_report(&report, &input);
        }

        if report.has_failures() {
            return Err(AppError::Other(format!(
                "{} of {} documents failed",
                report.failed.len(),
                report.processed.len() + report.failed.len()
            )));
        }

        Ok(())
    }

    /// Fold command flags into a copy of the configuration.
    fn apply(&self, config: &AppConfig) -> AppConfig {
        let mut config = config.clone();

        if self.image_prompts {
            config.pipeline.image_prompts = true;
        }
        if self.keep_partials {
            config.summary.keep_partials = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.summary.max_concurrency = concurrency;
        }
        if let Some(secs) = self.deadline_secs {
            config.pipeline.deadline_secs = Some(secs);
        }

        config
    }
}

fn print_report(report: &BatchReport, input: &std::path::Path) {
    if report.is_empty() {
        println!("No documents found in {}", input.display());
    }

    for doc in &report.processed {
        println!(
            "✓ {} ({} chunks, {} model calls)",
            doc.path.display(),
            doc.chunks,
            doc.model_calls
        );
        for output in &doc.outputs {
            println!("    → {}", output.display());
        }
    }

    for failure in &report.failed {
        match &failure.step {
            Some(step) => println!("✗ {} [{} at {}]: {}", failure.path.display(), failure.kind, step, failure.message),
            None => println!("✗ {} [{}]: {}", failure.path.display(), failure.kind, failure.message),
        }
        if let Some(checkpoint) = &failure.checkpoint {
            println!(
                "    kept {} of {} chunk summaries",
                checkpoint.completed(),
                checkpoint.len()
            );
        }
    }

    for path in &report.skipped {
        println!("- {} (no reader for this file type)", path.display());
    }
}
