//! Scrape command handler.

use clap::Args;
use fable_core::{config::AppConfig, AppResult};
use fable_pipeline::{scrape_urls, write_scrape_results, WebSource};
use std::path::PathBuf;
use std::time::Duration;

/// Fetch web pages and stage their text as an input document
#[derive(Args, Debug)]
pub struct ScrapeCommand {
    /// Pages to fetch (default: the configured scrape URLs)
    pub urls: Vec<String>,

    /// Folder for the results file (default: the input folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ScrapeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing scrape command");

        let urls = if self.urls.is_empty() {
            config.scrape_urls.clone()
        } else {
            self.urls.clone()
        };
        let output = self.output.clone().unwrap_or_else(|| config.input_path());

        let source = WebSource::new(Duration::from_secs(config.call_timeout_secs))?;
        let results = scrape_urls(&source, &urls).await;
        let path = write_scrape_results(&output, &results, chrono::Local::now())?;

        let failed = results.iter().filter(|r| r.failed).count();
        println!("Scraped {} pages ({} failed) into {}", results.len(), failed, path.display());

        Ok(())
    }
}
