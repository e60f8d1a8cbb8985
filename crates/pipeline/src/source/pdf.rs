//! PDF text extraction.

use super::{read_error, RawDocument, TextSource};
use async_trait::async_trait;
use fable_core::AppResult;

/// Reads the text layer of a PDF, page by page in order.
///
/// No layout analysis: pages that are only images yield no text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfSource;

/// Concatenate the page texts of an in-memory PDF.
pub(crate) fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())?;

    // pdf-extract separates pages with form feeds
    let pages: Vec<&str> = text
        .split('\x0C')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect();

    Ok(pages.join("\n"))
}

#[async_trait]
impl TextSource for PdfSource {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn extract(&self, location: &str) -> AppResult<RawDocument> {
        let bytes = tokio::fs::read(location)
            .await
            .map_err(|e| read_error(location, e.to_string()))?;

        tracing::debug!(path = %location, bytes = bytes.len(), "Extracting PDF text");

        // Parsing is CPU-bound and may panic on malformed files
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| read_error(location, format!("PDF extraction aborted: {}", e)))?
            .map_err(|e| read_error(location, format!("invalid PDF: {}", e)))?;

        Ok(RawDocument::new(location, text))
    }
}
