//! LLM integration crate for Fable.
//!
//! This crate provides the single capability the pipeline needs from a
//! language model: turn a prompt into text. Providers implement the
//! [`LlmClient`] trait and are built once at startup by the factory.
//!
//! # Providers
//! - **Hugging Face** Inference API (default)
//! - **Ollama**: Local LLM runtime
//!
//! # Example
//! ```no_run
//! use fable_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::with_base_url("http://localhost:11434", Duration::from_secs(60))?;
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse};
pub use factory::{create_client, create_client_from_config};
pub use providers::{HuggingFaceClient, OllamaClient};
pub use types::ProviderType;
