//! Text sources.
//!
//! A [`TextSource`] turns a location (file path or URL) into raw text. The
//! [`SourceRegistry`] maps file extensions to sources so new formats plug in
//! without touching the orchestrator.

mod pdf;
mod text;
mod web;

pub use pdf::PdfSource;
pub use text::PlainTextSource;
pub use web::{html_to_text, WebSource};

use async_trait::async_trait;
use fable_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Text extracted from one source, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Path or URL the text came from
    pub source_id: String,

    /// Extracted text
    pub text: String,
}

impl RawDocument {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Something that can produce raw text from a location.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Short name used in logs ("pdf", "text", "web").
    fn name(&self) -> &str;

    /// Extract the text at `location`.
    ///
    /// Failures are reported as [`AppError::SourceRead`] carrying the location.
    async fn extract(&self, location: &str) -> AppResult<RawDocument>;
}

pub(crate) fn read_error(location: &str, message: impl Into<String>) -> AppError {
    AppError::SourceRead {
        source_id: location.to_string(),
        message: message.into(),
    }
}

/// Maps lowercase file extensions to the source that reads them.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    by_extension: BTreeMap<String, Arc<dyn TextSource>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

impl SourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with PDF and plain-text readers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("pdf", Arc::new(PdfSource));
        registry.register("txt", Arc::new(PlainTextSource));
        registry
    }

    pub fn register(&mut self, extension: &str, source: Arc<dyn TextSource>) {
        self.by_extension
            .insert(extension.trim_start_matches('.').to_lowercase(), source);
    }

    /// Source for a file, chosen by its extension (case-insensitive).
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn TextSource>> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.by_extension.get(&extension).cloned()
    }

    pub fn extensions(&self) -> Vec<&str> {
        self.by_extension.keys().map(|k| k.as_str()).collect()
    }
}
