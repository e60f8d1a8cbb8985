//! Recursive separator-based chunking.
//!
//! Text is cut into pieces at the highest-priority separator that occurs in
//! it; pieces that are still too long are cut again with the next separator,
//! down to grapheme clusters. Pieces are then merged greedily into windows of
//! at most `max_size` characters, each window sharing a tail of whole pieces
//! with the previous one.
//!
//! Chunks are exact slices of the input. Sizes are counted in characters,
//! ranges are byte offsets.

mod merging;
mod pieces;

use fable_core::config::ChunkingSettings;
use fable_core::{AppError, AppResult};
use serde::Serialize;

/// Separators tried in order when none are configured.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A window of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in document (0-indexed)
    pub position: u32,

    /// Exact slice of the source text
    pub text: String,

    /// Byte offset of the first character
    pub start: usize,

    /// Byte offset one past the last character
    pub end: usize,

    /// Character count
    pub char_count: usize,
}

impl Chunk {
    pub fn new(position: u32, text: impl Into<String>, start: usize, end: usize) -> Self {
        let text = text.into();
        let char_count = text.chars().count();
        Self {
            position,
            text,
            start,
            end,
            char_count,
        }
    }
}

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub max_size: usize,

    /// Maximum overlap between consecutive chunks in characters
    pub overlap: usize,

    /// Separators in priority order; `""` means a grapheme-cluster cut
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    pub fn new(max_size: usize, overlap: usize, separators: Vec<String>) -> AppResult<Self> {
        let config = Self {
            max_size,
            overlap,
            separators,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_size == 0 {
            return Err(AppError::Config("Chunk size must be greater than 0".to_string()));
        }

        if self.overlap >= self.max_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.max_size
            )));
        }

        Ok(())
    }
}

impl TryFrom<&ChunkingSettings> for ChunkConfig {
    type Error = AppError;

    fn try_from(settings: &ChunkingSettings) -> AppResult<Self> {
        Self::new(
            settings.chunk_size,
            settings.chunk_overlap,
            settings.separators.clone(),
        )
    }
}

/// Splits text with a fixed, validated configuration.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let max_size = self.config.max_size;
        let total_chars = text.chars().count();
        if total_chars <= max_size {
            return vec![Chunk::new(0, text, 0, text.len())];
        }

        let pieces = pieces::split_pieces(text, max_size, &self.config.separators);
        let chunks = merging::merge_pieces(text, &pieces, max_size, self.config.overlap);

        tracing::debug!(
            chars = total_chars,
            pieces = pieces.len(),
            chunks = chunks.len(),
            "Split text into chunks"
        );

        chunks
    }
}

/// Split `text` into overlapping chunks of at most `max_size` characters.
pub fn split(
    text: &str,
    max_size: usize,
    overlap: usize,
    separators: &[&str],
) -> AppResult<Vec<Chunk>> {
    let config = ChunkConfig::new(
        max_size,
        overlap,
        separators.iter().map(|s| s.to_string()).collect(),
    )?;
    Ok(Chunker::new(config)?.split(text))
}

/// Rebuild the source text by dropping each chunk's overlap with its
/// predecessor.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;

    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start).min(chunk.text.len());
        out.push_str(&chunk.text[skip..]);
        covered = covered.max(chunk.end);
    }

    out
}
