//! Prompts command handler.
//!
//! Derives image prompts from a story written by an earlier run.

use super::build_pipeline;
use clap::Args;
use fable_core::{config::AppConfig, AppError, AppResult};
use fable_pipeline::IMAGE_PROMPTS_ARTIFACT;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

/// Derive numbered image prompts from an existing story
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Story file to illustrate
    #[arg(short, long)]
    pub story: PathBuf,

    /// Number of prompts (default: from config)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output file (default: `prompts_<story>.txt` next to the story)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command for {}", self.story.display());

        let story = tokio::fs::read_to_string(&self.story)
            .await
            .map_err(|e| AppError::SourceRead {
                source_id: self.story.display().to_string(),
                message: e.to_string(),
            })?;
        if story.trim().is_empty() {
            return Err(AppError::SourceRead {
                source_id: self.story.display().to_string(),
                message: "story is empty".to_string(),
            });
        }

        let mut config = config.clone();
        config.pipeline.image_prompts = true;
        if let Some(count) = self.count {
            config.pipeline.image_prompt_count = count;
        }

        let pipeline = build_pipeline(&config)?;
        let spec = pipeline.artifact(IMAGE_PROMPTS_ARTIFACT).ok_or_else(|| {
            AppError::Other(format!("artifact '{}' is not configured", IMAGE_PROMPTS_ARTIFACT))
        })?;
        let deadline = pipeline.config().document_deadline.map(|d| Instant::now() + d);

        let artifact = pipeline.generate_artifact(spec, &story, deadline).await?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output(&self.story));
        write_output(&output, &artifact.text)?;

        for item in &artifact.items {
            println!("{}", item);
        }
        eprintln!("Saved {} image prompts to {}", artifact.items.len(), output.display());

        Ok(())
    }
}

/// `stories/cuento_rio.txt` becomes `stories/prompts_rio.txt`.
fn default_output(story: &Path) -> PathBuf {
    let stem = story
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_prefix("cuento_").unwrap_or(&stem);
    story.with_file_name(format!("prompts_{}.txt", stem))
}

fn write_output(path: &Path, text: &str) -> AppResult<()> {
    let write_error = |e: std::io::Error| AppError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(path, text).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_replaces_story_prefix() {
        assert_eq!(
            default_output(Path::new("stories/cuento_rio.txt")),
            PathBuf::from("stories/prompts_rio.txt")
        );
        assert_eq!(
            default_output(Path::new("mi_cuento.txt")),
            PathBuf::from("prompts_mi_cuento.txt")
        );
    }

    #[test]
    fn test_write_output_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nuevo").join("prompts_rio.txt");

        write_output(&path, "1. Un río").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1. Un río");
    }
}
