//! LLM integration.
//!
//! Supports any OpenAI-compatible chat completions endpoint. The
//! `LlmProvider` trait is the seam the qualifier talks to, so tests can
//! substitute canned responses.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(config)?;
    tracing::info!("Using OpenAI-compatible endpoint {} (model: {})", config.base_url, config.model);
    Ok(Arc::new(provider))
}
