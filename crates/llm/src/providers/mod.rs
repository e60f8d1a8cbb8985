//! Concrete LLM providers.

mod huggingface;
mod ollama;

pub use huggingface::{HuggingFaceClient, DEFAULT_HF_ENDPOINT};
pub use ollama::{OllamaClient, DEFAULT_OLLAMA_ENDPOINT};
