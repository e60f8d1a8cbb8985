//! Error types for Fable.
//!
//! A single error enum covers every failure category of the pipeline. The
//! variants map onto how the orchestrator reacts to them: configuration errors
//! are fatal at startup, everything else is fatal only for the document that
//! raised it.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for Fable.
///
/// All fallible functions return `Result<T, AppError>`. Errors are represented
/// and propagated, never turned into panics.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credential, invalid chunker parameters, unreadable config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// An input document (file or URL) could not be read or decoded
    #[error("Failed to read source {source_id}: {message}")]
    SourceRead { source_id: String, message: String },

    /// Network or model-call failure, including timeouts and empty completions
    #[error("Transport error: {0}")]
    Transport(String),

    /// Model output violated a declared structural constraint
    #[error("Validation error: {0}")]
    Validation(String),

    /// Output directory or file could not be created
    #[error("Failed to write {path:?}: {message}")]
    Write { path: PathBuf, message: String },

    /// A failure attributed to one step of the summarization pipeline
    #[error("{step} failed: {source}")]
    Stage {
        step: PipelineStep,
        #[source]
        source: Box<AppError>,
    },

    /// The overall document deadline passed before the pipeline finished
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Identifies the model call (or artifact) a stage failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStep {
    /// Map-phase summary of one chunk (0-indexed)
    Map { chunk: usize },

    /// Intermediate collapse of one group of summaries
    Collapse { level: usize, group: usize },

    /// Final combine call
    Combine,

    /// Narrative transform producing the named artifact
    Artifact(String),
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map { chunk } => write!(f, "map chunk {}", chunk),
            Self::Collapse { level, group } => {
                write!(f, "collapse level {} group {}", level, group)
            }
            Self::Combine => write!(f, "combine"),
            Self::Artifact(name) => write!(f, "artifact '{}'", name),
        }
    }
}

impl AppError {
    /// Attribute this error to a pipeline step.
    pub fn at(self, step: PipelineStep) -> Self {
        AppError::Stage {
            step,
            source: Box::new(self),
        }
    }

    /// Stable label of the underlying failure category.
    ///
    /// `Stage` wrappers are looked through so a transport failure in the map
    /// phase still reports as `"transport"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::SourceRead { .. } => "source_read",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Write { .. } => "write",
            Self::Stage { source, .. } => source.kind(),
            Self::DeadlineExceeded(_) => "deadline",
            Self::Prompt(_) => "prompt",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }

    /// The innermost step this error was attributed to, if any.
    pub fn step(&self) -> Option<&PipelineStep> {
        match self {
            Self::Stage { step, source } => source.step().or(Some(step)),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == "validation"
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == "transport"
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
