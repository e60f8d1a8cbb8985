//! Configuration management for Fable.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults (the `documents`/`stories` layout)
//! - `.env` file (loaded into the process environment)
//! - Config file (`.fable/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is established once at startup and then only read.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["huggingface", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains `.fable/`, input and output dirs)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider ("huggingface" or "ollama")
    pub provider: String,

    /// Model identifier (Hugging Face repo id or Ollama model tag)
    pub model: String,

    /// Optional custom endpoint for the provider
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the provider credential
    pub api_key_env: String,

    /// Explicit credential, takes precedence over `api_key_env`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Sampling temperature for every model call
    pub temperature: f32,

    /// Nucleus sampling for every model call
    pub top_p: f32,

    /// Maximum tokens to generate per call
    pub max_tokens: Option<u32>,

    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,

    /// Directory scanned for input documents (relative to workspace)
    pub input_dir: PathBuf,

    /// Directory receiving generated artifacts (relative to workspace)
    pub output_dir: PathBuf,

    /// Chunker parameters
    pub chunking: ChunkingSettings,

    /// Map-reduce parameters
    pub summary: SummarySettings,

    /// Orchestrator parameters
    pub pipeline: PipelineSettings,

    /// Pages fetched by the `scrape` command when no URL is given
    pub scrape_urls: Vec<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit JSON log lines instead of human-readable output
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Chunker parameters. Sizes are in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    #[serde(rename = "chunkSize")]
    pub chunk_size: usize,

    #[serde(rename = "chunkOverlap")]
    pub chunk_overlap: usize,

    /// Separators in priority order; `""` means a hard character cut
    pub separators: Vec<String>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Map-reduce parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// Maximum characters sent to a single combine call
    #[serde(rename = "combineBudget")]
    pub combine_budget: usize,

    /// Maximum concurrent map-phase calls per document
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: usize,

    /// Surface completed partial summaries when a document fails
    #[serde(rename = "keepPartials")]
    pub keep_partials: bool,

    /// Upper bound on intermediate collapse passes
    #[serde(rename = "maxCollapseDepth")]
    pub max_collapse_depth: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            combine_budget: 12_000,
            max_concurrency: 4,
            keep_partials: false,
            max_collapse_depth: 8,
        }
    }
}

/// Orchestrator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Documents processed at the same time
    #[serde(rename = "documentConcurrency")]
    pub document_concurrency: usize,

    /// Wall-clock budget per document in seconds (none = unbounded)
    #[serde(rename = "deadlineSecs")]
    pub deadline_secs: Option<u64>,

    /// Extra attempts for a transform whose output fails validation
    #[serde(rename = "transformRetries")]
    pub transform_retries: u32,

    /// Also derive numbered image prompts from each story
    #[serde(rename = "imagePrompts")]
    pub image_prompts: bool,

    /// Number of image prompts requested and enforced
    #[serde(rename = "imagePromptCount")]
    pub image_prompt_count: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            document_concurrency: 1,
            deadline_secs: Some(900),
            transform_retries: 1,
            image_prompts: false,
            image_prompt_count: 6,
        }
    }
}

/// LLM section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LlmFileConfig {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
    temperature: Option<f32>,
    #[serde(rename = "topP")]
    top_p: Option<f32>,
    #[serde(rename = "maxTokens")]
    max_tokens: Option<u32>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileConfig>,
    paths: Option<PathsConfig>,
    chunking: Option<ChunkingSettings>,
    summary: Option<SummarySettings>,
    pipeline: Option<PipelineSettings>,
    scrape: Option<ScrapeConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PathsConfig {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScrapeConfig {
    urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "huggingface".to_string(),
            model: "meta-llama/Llama-3.2-3B-Instruct".to_string(),
            endpoint: None,
            api_key_env: "HUGGINGFACEHUB_API_TOKEN".to_string(),
            api_key: None,
            temperature: 0.8,
            top_p: 0.95,
            max_tokens: Some(1024),
            call_timeout_secs: 120,
            input_dir: PathBuf::from("documents"),
            output_dir: PathBuf::from("stories"),
            chunking: ChunkingSettings::default(),
            summary: SummarySettings::default(),
            pipeline: PipelineSettings::default(),
            scrape_urls: vec![
                "https://elpais.com/clima-y-medio-ambiente/cambio-climatico/".to_string(),
                "https://www.nationalgeographicla.com/medio-ambiente".to_string(),
            ],
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, config file, environment and defaults.
    ///
    /// Environment variables:
    /// - `FABLE_WORKSPACE`: Override workspace path
    /// - `FABLE_CONFIG`: Path to config file
    /// - `FABLE_PROVIDER`: LLM provider
    /// - `FABLE_MODEL`: Model identifier
    /// - `FABLE_ENDPOINT`: Provider endpoint
    /// - `FABLE_API_KEY`: Explicit credential
    /// - `FABLE_INPUT_DIR` / `FABLE_OUTPUT_DIR`: Document and story directories
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use fable_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration with an explicit workspace and/or config file.
    ///
    /// Explicit arguments win over `FABLE_WORKSPACE` and `FABLE_CONFIG`.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        // A missing .env is not an error
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| std::env::var("FABLE_WORKSPACE").ok().map(PathBuf::from)) {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("FABLE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.fable_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("FABLE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("FABLE_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("FABLE_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(input) = std::env::var("FABLE_INPUT_DIR") {
            config.input_dir = PathBuf::from(input);
        }

        if let Ok(output) = std::env::var("FABLE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(output);
        }

        if let Ok(key) = std::env::var("FABLE_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            if let Some(env) = llm.api_key_env {
                result.api_key_env = env;
            }
            if let Some(temperature) = llm.temperature {
                result.temperature = temperature;
            }
            if let Some(top_p) = llm.top_p {
                result.top_p = top_p;
            }
            if llm.max_tokens.is_some() {
                result.max_tokens = llm.max_tokens;
            }
            if let Some(timeout) = llm.timeout_secs {
                result.call_timeout_secs = timeout;
            }
        }

        if let Some(paths) = config_file.paths {
            if let Some(input) = paths.input {
                result.input_dir = input;
            }
            if let Some(output) = paths.output {
                result.output_dir = output;
            }
        }

        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }

        if let Some(summary) = config_file.summary {
            result.summary = summary;
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(scrape) = config_file.scrape {
            result.scrape_urls = scrape.urls;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .fable directory.
    pub fn fable_dir(&self) -> PathBuf {
        self.workspace.join(".fable")
    }

    /// Input directory resolved against the workspace.
    pub fn input_path(&self) -> PathBuf {
        self.workspace.join(&self.input_dir)
    }

    /// Output directory resolved against the workspace.
    pub fn output_path(&self) -> PathBuf {
        self.workspace.join(&self.output_dir)
    }

    /// Whether the provider needs a credential.
    pub fn requires_api_key(&self) -> bool {
        self.provider.eq_ignore_ascii_case("huggingface")
    }

    /// Resolve the provider credential.
    ///
    /// An explicit key wins; otherwise the variable named by `api_key_env` is read.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate configuration. Any error here is fatal at startup.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.requires_api_key() && self.resolve_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.api_key_env
            )));
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.summary.combine_budget == 0 {
            return Err(AppError::Config(
                "combineBudget must be greater than 0".to_string(),
            ));
        }

        if self.summary.max_concurrency == 0 || self.pipeline.document_concurrency == 0 {
            return Err(AppError::Config(
                "concurrency limits must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.image_prompt_count == 0 {
            return Err(AppError::Config(
                "imagePromptCount must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout_secs == 0 {
            return Err(AppError::Config("timeoutSecs must be greater than 0".to_string()));
        }

        Ok(())
    }
}
