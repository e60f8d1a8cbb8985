//! Fable CLI
//!
//! Main entry point for the fable command-line tool.
//! Turns a folder of documents into children's stories, and stages web pages
//! as input documents.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ChunkCommand, PromptsCommand, RunCommand, ScrapeCommand};
use fable_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Fable - children's stories from the documents you already have
#[derive(Parser, Debug)]
#[command(name = "fable")]
#[command(about = "Summarize documents and retell them as children's stories", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "FABLE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "FABLE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug and prints progress)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (huggingface, ollama)
    #[arg(short, long, global = true, env = "FABLE_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "FABLE_MODEL")]
    model: Option<String>,

    /// Defaults to `run`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize every document in the input folder and write stories
    Run(RunCommand),

    /// Fetch web pages and stage their text as an input document
    Scrape(ScrapeCommand),

    /// Derive numbered image prompts from an existing story
    Prompts(PromptsCommand),

    /// Show how a document would be chunked, without calling a model
    Chunk(ChunkCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run(_) => "run",
            Commands::Scrape(_) => "scrape",
            Commands::Prompts(_) => "prompts",
            Commands::Chunk(_) => "chunk",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file and environment, then CLI overrides
    let config = AppConfig::load_with(cli.workspace, cli.config)?.with_overrides(
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Fable CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command = cli.command.unwrap_or_else(|| Commands::Run(RunCommand::default()));
    let _span = tracing::info_span!("command", name = command.name()).entered();

    let result = match command {
        Commands::Run(cmd) => cmd.execute(&config).await,
        Commands::Scrape(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
        Commands::Chunk(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
