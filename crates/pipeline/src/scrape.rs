//! Scraping driver: fetch a fixed list of pages and stage their text as an
//! input document.

use crate::source::{TextSource, WebSource};
use chrono::{DateTime, Local};
use fable_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Width of the rule between pages in the results file.
const RULE_WIDTH: usize = 50;

/// Text obtained from one URL, or the error recorded in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub url: String,
    pub text: String,
    pub failed: bool,
}

/// Fetch each URL in order.
///
/// A failed page does not stop the run; its text becomes
/// `Error al procesar <url>: <error>`.
pub async fn scrape_urls(source: &WebSource, urls: &[String]) -> Vec<ScrapeResult> {
    let mut results = Vec::with_capacity(urls.len());

    for url in urls {
        tracing::info!(url = %url, "Scraping page");
        let result = match source.extract(url).await {
            Ok(document) => ScrapeResult {
                url: url.clone(),
                text: document.text,
                failed: false,
            },
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Scrape failed");
                ScrapeResult {
                    url: url.clone(),
                    text: format!("Error al procesar {}: {}", url, e),
                    failed: true,
                }
            }
        };
        results.push(result);
    }

    results
}

/// Render results in the staging file layout.
pub fn format_scrape_results(results: &[ScrapeResult]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    results
        .iter()
        .map(|r| format!("Texto extraído de {}:\n{}\n\n{}\n\n", r.url, r.text, rule))
        .collect()
}

/// Write results to `dir/resultados_scraping_<YYYYmmdd_HHMMSS>.txt`.
///
/// The stem carries through `run`, so the story becomes
/// `cuento_resultados_scraping_<timestamp>.txt`.
pub fn write_scrape_results(
    dir: &Path,
    results: &[ScrapeResult],
    timestamp: DateTime<Local>,
) -> AppResult<PathBuf> {
    let path = dir.join(format!("resultados_scraping_{}.txt", timestamp.format("%Y%m%d_%H%M%S")));
    let write_error = |e: std::io::Error| AppError::Write {
        path: path.clone(),
        message: e.to_string(),
    };

    std::fs::create_dir_all(dir).map_err(write_error)?;
    std::fs::write(&path, format_scrape_results(results)).map_err(write_error)?;

    tracing::info!(path = %path.display(), pages = results.len(), "Scrape results saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn result(url: &str, text: &str) -> ScrapeResult {
        ScrapeResult {
            url: url.to_string(),
            text: text.to_string(),
            failed: false,
        }
    }

    #[test]
    fn test_format_layout() {
        let formatted = format_scrape_results(&[result("https://a.test", "Hielo"), result("https://b.test", "Mar")]);
        let rule = "=".repeat(50);
        assert_eq!(
            formatted,
            format!(
                "Texto extraído de https://a.test:\nHielo\n\n{rule}\n\nTexto extraído de https://b.test:\nMar\n\n{rule}\n\n"
            )
        );
    }

    #[test]
    fn test_write_uses_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();

        let path = write_scrape_results(&dir.path().join("documents"), &[result("u", "t")], timestamp).unwrap();
        assert_eq!(path.file_name().unwrap(), "resultados_scraping_20240309_070501.txt");
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Texto extraído de u:\nt\n\n"));
    }

    #[tokio::test]
    async fn test_failed_fetch_recorded_as_text() {
        let source = WebSource::new(Duration::from_secs(2)).unwrap();
        let urls = vec!["not a url".to_string()];

        let results = scrape_urls(&source, &urls).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].failed);
        assert!(results[0].text.starts_with("Error al procesar not a url: "));
    }
}
