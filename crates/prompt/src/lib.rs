//! Prompt system for Fable.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, compiled into the binary
//! - Workspace overrides in `.fable/prompts/`
//! - Strict Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::PromptTemplate;
pub use loader::{
    load_builtin, load_prompt, COLLAPSE_PROMPT_ID, COMBINE_PROMPT_ID,
    IMAGE_PROMPTS_PROMPT_ID, MAP_PROMPT_ID, STORY_PROMPT_ID,
};
pub use types::{BuiltPrompt, BuiltPromptMetadata, OutputFormat, PromptDefinition, PromptOutputSpec};
