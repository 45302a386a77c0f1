//! Error types for the vaani coaching engine

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the detection pipeline
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("provider {provider} failed: {reason}")]
    Provider {
        provider: &'static str,
        reason: String,
    },

    #[error("all {attempted} configured LLM providers failed (last: {last})")]
    ProvidersExhausted { attempted: usize, last: String },

    #[error("no LLM provider configured")]
    NoProviderConfigured,

    #[error("LLM verdict was not valid JSON: {0}")]
    Verdict(#[from] serde_json::Error),

    #[error("speech service error: {0}")]
    Speech(String),
}
