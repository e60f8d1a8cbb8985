//! Chunk command handler.
//!
//! Shows where the chunker cuts a document. No model is called, so this works
//! without a credential.

use clap::Args;
use fable_core::{config::AppConfig, AppError, AppResult};
use fable_pipeline::{normalize, Chunk, ChunkConfig, Chunker, SourceRegistry};
use std::path::PathBuf;

/// Show how a document would be chunked
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// Document to chunk
    pub file: PathBuf,

    /// Output chunks as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunkCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chunk command for {}", self.file.display());

        let registry = SourceRegistry::with_defaults();
        let source = registry.for_path(&self.file).ok_or_else(|| AppError::SourceRead {
            source_id: self.file.display().to_string(),
            message: format!("no reader for this file type (known: {})", registry.extensions().join(", ")),
        })?;

        let raw = source.extract(&self.file.to_string_lossy()).await?;
        let text = normalize(&raw.text);
        let chunker = Chunker::new(ChunkConfig::try_from(&config.chunking)?)?;
        let chunks = chunker.split(&text);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&chunks)?);
        } else {
            print_chunks(&chunks, text.char_len());
        }

        Ok(())
    }
}

fn print_chunks(chunks: &[Chunk], total_chars: usize) {
    println!("{} chunks from {} characters", chunks.len(), total_chars);
    for chunk in chunks {
        println!();
        println!(
            "#{} bytes {}..{} ({} chars)",
            chunk.position, chunk.start, chunk.end, chunk.char_count
        );
        println!("{}", chunk.text);
    }
}
