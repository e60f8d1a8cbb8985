//! Document to story pipeline.
//!
//! Raw text is extracted from a [`TextSource`], normalized, split into
//! overlapping chunks, summarized with a map-reduce pass over the model and
//! finally rewritten into narrative artifacts (a children's story and,
//! optionally, a numbered list of image prompts).

pub mod chunk;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod scrape;
pub mod source;
pub mod summarize;
pub mod transform;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunk::{reassemble, split, Chunk, ChunkConfig, Chunker};
pub use model::{ModelCaller, ModelSettings};
pub use normalize::{normalize, NormalizedText};
pub use orchestrator::{
    ArtifactInput, ArtifactSpec, BatchReport, DocumentArtifacts, DocumentError, DocumentFailure,
    Pipeline, PipelineConfig, PipelinePrompts, ProcessedDocument, IMAGE_PROMPTS_ARTIFACT,
    STORY_ARTIFACT,
};
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use scrape::{format_scrape_results, scrape_urls, write_scrape_results, ScrapeResult};
pub use source::{
    html_to_text, PdfSource, PlainTextSource, RawDocument, SourceRegistry, TextSource,
    WebSource,
};
pub use summarize::{
    CombinedSummary, PartialPolicy, SummarizeError, SummaryCheckpoint, SummaryConfig,
    SummaryPrompts, Summarizer,
};
pub use transform::{
    parse_numbered_items, validate_output, NarrativeArtifact, NarrativeTransform, OutputConstraint,
};
