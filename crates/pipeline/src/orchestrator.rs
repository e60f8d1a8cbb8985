//! Batch orchestration over an input directory.
//!
//! Each recognised file runs through extract, normalize, chunk, summarize and
//! the configured artifact transforms; artifacts are written only once all of
//! them succeeded. A failing document is recorded in the [`BatchReport`] and
//! the batch moves on.

use crate::chunk::{ChunkConfig, Chunker};
use crate::model::{before_deadline, ModelCaller, ModelSettings};
use crate::normalize::normalize;
use crate::progress::ProgressReporter;
use crate::source::{SourceRegistry, TextSource};
use crate::summarize::{
    CombinedSummary, SummarizeError, SummaryCheckpoint, SummaryConfig, SummaryPrompts, Summarizer,
};
use crate::transform::{NarrativeArtifact, NarrativeTransform, OutputConstraint};
use fable_core::{AppConfig, AppError, AppResult, PipelineStep};
use fable_llm::LlmClient;
use fable_prompt::{
    load_prompt, PromptTemplate, COLLAPSE_PROMPT_ID, COMBINE_PROMPT_ID, IMAGE_PROMPTS_PROMPT_ID,
    MAP_PROMPT_ID, STORY_PROMPT_ID,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use walkdir::WalkDir;

pub const STORY_ARTIFACT: &str = "story";
pub const IMAGE_PROMPTS_ARTIFACT: &str = "image_prompts";

/// Everything the pipeline needs from the application configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk: ChunkConfig,
    pub summary: SummaryConfig,
    pub model: ModelSettings,
    /// Documents processed at once
    pub document_concurrency: usize,
    /// Wall-clock budget for one document
    pub document_deadline: Option<Duration>,
    /// Extra attempts for an artifact that fails validation
    pub transform_retries: u32,
    /// Also derive numbered image prompts from the story
    pub image_prompts: bool,
    pub image_prompt_count: usize,
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            chunk: ChunkConfig::try_from(&config.chunking)?,
            summary: SummaryConfig::from(&config.summary),
            model: ModelSettings::from_app_config(config),
            document_concurrency: config.pipeline.document_concurrency.max(1),
            document_deadline: config.pipeline.deadline_secs.map(Duration::from_secs),
            transform_retries: config.pipeline.transform_retries,
            image_prompts: config.pipeline.image_prompts,
            image_prompt_count: config.pipeline.image_prompt_count,
        })
    }
}

/// Compiled templates for every model call the pipeline makes.
#[derive(Debug, Clone)]
pub struct PipelinePrompts {
    pub summary: SummaryPrompts,
    pub story: Arc<PromptTemplate>,
    pub image_prompts: Arc<PromptTemplate>,
}

impl PipelinePrompts {
    /// Load built-in prompts, honouring overrides in the workspace.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let compile = |id: &str| -> AppResult<Arc<PromptTemplate>> {
            Ok(Arc::new(PromptTemplate::compile(load_prompt(workspace, id)?)?))
        };

        Ok(Self {
            summary: SummaryPrompts {
                map: compile(MAP_PROMPT_ID)?,
                combine: compile(COMBINE_PROMPT_ID)?,
                collapse: Some(compile(COLLAPSE_PROMPT_ID)?),
            },
            story: compile(STORY_PROMPT_ID)?,
            image_prompts: compile(IMAGE_PROMPTS_PROMPT_ID)?,
        })
    }
}

/// Text an artifact is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactInput {
    /// The document summary
    Summary,
    /// An artifact generated earlier for the same document
    Artifact(String),
}

/// One artifact generated and written per document.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    pub transform: NarrativeTransform,
    pub input: ArtifactInput,
    /// Output file name is `<file_prefix><stem>.txt`
    pub file_prefix: String,
}

impl ArtifactSpec {
    pub fn name(&self) -> &str {
        self.transform.name()
    }
}

/// Results of a pipeline run over one text.
#[derive(Debug, Clone)]
pub struct DocumentArtifacts {
    pub chunks: usize,
    pub summary: CombinedSummary,
    /// In the order the artifact specs are configured
    pub artifacts: Vec<NarrativeArtifact>,
}

/// A document failure together with any summaries worth keeping.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct DocumentError {
    #[source]
    pub error: AppError,
    pub checkpoint: Option<SummaryCheckpoint>,
}

impl From<AppError> for DocumentError {
    fn from(error: AppError) -> Self {
        Self {
            error,
            checkpoint: None,
        }
    }
}

impl From<SummarizeError> for DocumentError {
    fn from(err: SummarizeError) -> Self {
        Self {
            error: err.error,
            checkpoint: err.checkpoint,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub path: PathBuf,
    pub chunks: usize,
    pub collapse_passes: usize,
    pub model_calls: usize,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFailure {
    pub path: PathBuf,
    /// Stable error category (see `AppError::kind`)
    pub kind: String,
    /// Failing step, when the error belongs to one model call
    pub step: Option<String>,
    pub message: String,
    #[serde(skip)]
    pub checkpoint: Option<SummaryCheckpoint>,
}

impl DocumentFailure {
    fn new(path: PathBuf, err: DocumentError) -> Self {
        Self {
            path,
            kind: err.error.kind().to_string(),
            step: err.error.step().map(|s| s.to_string()),
            message: err.error.to_string(),
            checkpoint: err.checkpoint,
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedDocument>,
    pub failed: Vec<DocumentFailure>,
    /// Files without a registered reader
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    /// No document was attempted.
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// A file scheduled for processing.
#[derive(Clone)]
struct DocumentJob {
    path: PathBuf,
    /// File stem used in output names, disambiguated when two inputs share one
    output_stem: String,
    source: Arc<dyn TextSource>,
}

pub struct Pipeline {
    caller: ModelCaller,
    registry: SourceRegistry,
    chunker: Chunker,
    summarizer: Summarizer,
    artifacts: Vec<ArtifactSpec>,
    config: PipelineConfig,
    progress: ProgressReporter,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn LlmClient>,
        config: PipelineConfig,
        prompts: PipelinePrompts,
    ) -> AppResult<Self> {
        let caller = ModelCaller::new(client, config.model.clone());
        let chunker = Chunker::new(config.chunk.clone())?;
        let summarizer = Summarizer::new(caller.clone(), prompts.summary, config.summary.clone());

        let story_format = prompts.story.definition().output.format;
        let mut artifacts = vec![ArtifactSpec {
            transform: NarrativeTransform::new(
                STORY_ARTIFACT,
                prompts.story,
                OutputConstraint::for_format(story_format, 1),
            ),
            input: ArtifactInput::Summary,
            file_prefix: "cuento_".to_string(),
        }];

        if config.image_prompts {
            artifacts.push(ArtifactSpec {
                transform: NarrativeTransform::new(
                    IMAGE_PROMPTS_ARTIFACT,
                    prompts.image_prompts,
                    OutputConstraint::NumberedItems {
                        count: config.image_prompt_count,
                    },
                ),
                input: ArtifactInput::Artifact(STORY_ARTIFACT.to_string()),
                file_prefix: "prompts_".to_string(),
            });
        }

        Ok(Self {
            caller,
            registry: SourceRegistry::with_defaults(),
            chunker,
            summarizer,
            artifacts,
            config,
            progress: ProgressReporter::noop(),
        })
    }

    pub fn with_registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.summarizer = self.summarizer.with_progress(progress.clone());
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactSpec> {
        self.artifacts.iter().find(|spec| spec.name() == name)
    }

    /// Process every recognised file in `input_dir`, writing artifacts to
    /// `output_dir`.
    ///
    /// Only a missing or unreadable input directory fails the whole run.
    pub async fn run(&self, input_dir: &Path, output_dir: &Path) -> AppResult<BatchReport> {
        let (jobs, skipped, unreadable) = self.discover(input_dir)?;
        self.progress
            .discover(jobs.len() as u64, &input_dir.display().to_string());

        let mut report = BatchReport {
            failed: unreadable,
            skipped,
            ..BatchReport::default()
        };

        if jobs.is_empty() {
            tracing::warn!(
                dir = %input_dir.display(),
                extensions = ?self.registry.extensions(),
                "No processable documents found"
            );
            return Ok(report);
        }

        tracing::info!(documents = jobs.len(), skipped = report.skipped.len(), "Starting batch");

        let total = jobs.len() as u64;
        let outcomes: Vec<(PathBuf, Result<ProcessedDocument, DocumentError>)> =
            stream::iter(jobs.into_iter().enumerate().map(|(i, job)| async move {
                let span = tracing::info_span!("document", path = %job.path.display());
                let outcome = self
                    .process_document(&job, i as u64 + 1, total, output_dir)
                    .instrument(span)
                    .await;
                (job.path, outcome)
            }))
            .buffer_unordered(self.config.document_concurrency.max(1))
            .collect()
            .await;

        for (path, outcome) in outcomes {
            match outcome {
                Ok(document) => {
                    tracing::info!(path = %path.display(), outputs = document.outputs.len(), "Document processed");
                    report.processed.push(document);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "Document failed");
                    report.failed.push(DocumentFailure::new(path, err));
                }
            }
        }

        report.processed.sort_by(|a, b| a.path.cmp(&b.path));
        report.failed.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(report)
    }

    /// Files directly inside `input_dir`, sorted by name, split into those
    /// with a registered reader, the rest, and entries that could not be read.
    fn discover(
        &self,
        input_dir: &Path,
    ) -> AppResult<(Vec<DocumentJob>, Vec<PathBuf>, Vec<DocumentFailure>)> {
        if !input_dir.is_dir() {
            return Err(AppError::SourceRead {
                source_id: input_dir.display().to_string(),
                message: "input directory does not exist".to_string(),
            });
        }

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut unreadable = Vec::new();

        for entry in WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(input_dir).to_path_buf();
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable directory entry");
                    let error = AppError::SourceRead {
                        source_id: path.display().to_string(),
                        message: e.to_string(),
                    };
                    unreadable.push(DocumentFailure::new(path, error.into()));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            match self.registry.for_path(&path) {
                Some(source) => candidates.push((path, source)),
                None => {
                    tracing::debug!(path = %path.display(), "Skipping file without a reader");
                    skipped.push(path);
                }
            }
        }

        let mut stem_counts: HashMap<String, usize> = HashMap::new();
        for (path, _) in &candidates {
            *stem_counts.entry(file_stem(path)).or_default() += 1;
        }

        let jobs = candidates
            .into_iter()
            .map(|(path, source)| {
                let stem = file_stem(&path);
                let output_stem = if stem_counts.get(&stem).copied().unwrap_or(0) > 1 {
                    let extension = path
                        .extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_default();
                    format!("{}_{}", stem, extension)
                } else {
                    stem
                };
                DocumentJob {
                    path,
                    output_stem,
                    source,
                }
            })
            .collect();

        Ok((jobs, skipped, unreadable))
    }

    async fn process_document(
        &self,
        job: &DocumentJob,
        index: u64,
        total: u64,
        output_dir: &Path,
    ) -> Result<ProcessedDocument, DocumentError> {
        let deadline = self.config.document_deadline.map(|d| Instant::now() + d);
        let location = job.path.to_string_lossy();

        self.progress.read(index, total, &location);
        tracing::info!(reader = job.source.name(), "Reading document");
        let raw = job.source.extract(&location).await?;

        let result = self.process_text(&raw.source_id, &raw.text, deadline).await?;

        let mut outputs = Vec::with_capacity(result.artifacts.len());
        for (spec, artifact) in self.artifacts.iter().zip(&result.artifacts) {
            let path = output_dir.join(format!("{}{}.txt", spec.file_prefix, job.output_stem));
            if let Err(e) = write_artifact(&path, &artifact.text).await {
                remove_outputs(&outputs).await;
                return Err(e.into());
            }
            self.progress.write(&path.display().to_string());
            outputs.push(path);
        }

        Ok(ProcessedDocument {
            path: job.path.clone(),
            chunks: result.chunks,
            collapse_passes: result.summary.collapse_passes,
            model_calls: result.summary.model_calls,
            outputs,
        })
    }

    /// Run normalize, chunk, summarize and every artifact over `raw_text`.
    pub async fn process_text(
        &self,
        source_id: &str,
        raw_text: &str,
        deadline: Option<Instant>,
    ) -> Result<DocumentArtifacts, DocumentError> {
        let text = normalize(raw_text);
        if text.is_empty() {
            return Err(AppError::SourceRead {
                source_id: source_id.to_string(),
                message: "no extractable text".to_string(),
            }
            .into());
        }

        let chunks = self.chunker.split(&text);
        self.progress.chunk(chunks.len() as u64, source_id);
        tracing::info!(chars = text.char_len(), chunks = chunks.len(), "Document chunked");

        let summary = self.summarizer.summarize(&chunks, deadline, None).await?;

        let mut artifacts: Vec<NarrativeArtifact> = Vec::with_capacity(self.artifacts.len());
        for spec in &self.artifacts {
            let input = match &spec.input {
                ArtifactInput::Summary => summary.text.as_str(),
                ArtifactInput::Artifact(name) => artifacts
                    .iter()
                    .find(|a| &a.name == name)
                    .map(|a| a.text.as_str())
                    .ok_or_else(|| {
                        AppError::Other(format!(
                            "artifact '{}' needs '{}', which was not generated before it",
                            spec.name(),
                            name
                        ))
                    })?,
            };

            let artifact = self.generate_artifact(spec, input, deadline).await?;
            artifacts.push(artifact);
        }

        Ok(DocumentArtifacts {
            chunks: chunks.len(),
            summary,
            artifacts,
        })
    }

    /// Generate one artifact, retrying answers that fail validation.
    pub async fn generate_artifact(
        &self,
        spec: &ArtifactSpec,
        input: &str,
        deadline: Option<Instant>,
    ) -> AppResult<NarrativeArtifact> {
        let attempts = self.config.transform_retries + 1;
        let mut attempt = 1;

        loop {
            self.progress.transform(spec.name(), attempt as u64);

            let result = before_deadline(deadline, spec.name(), spec.transform.apply(&self.caller, input))
                .await
                .map_err(|e| match e {
                    AppError::DeadlineExceeded(_) => e.at(PipelineStep::Artifact(spec.name().to_string())),
                    other => other,
                });

            match result {
                Err(e) if e.is_validation() && attempt < attempts => {
                    tracing::warn!(artifact = spec.name(), attempt, error = %e, "Artifact failed validation, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn write_artifact(path: &Path, text: &str) -> AppResult<()> {
    let write_error = |e: std::io::Error| AppError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(path, text).await.map_err(write_error)?;

    tracing::debug!(path = %path.display(), bytes = text.len(), "Artifact written");
    Ok(())
}

/// Undo the writes of a document that failed part way through.
async fn remove_outputs(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove partial output");
        }
    }
}
