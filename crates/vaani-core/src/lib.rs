//! vaani-core: real-time spoken-English coaching engine (grammar rules, LLM
//! fallback router, chunk analyzer, interviewer personas, speech bridge).
//!
//! Re-exports the full pipeline so the gateway and tests keep a consistent
//! public API.

mod analyzer;
mod config;
mod detector;
mod error;
mod llm;
mod persona;
pub mod rules;
mod speech;

// Detection pipeline
pub use analyzer::{ChunkAnalyzer, ChunkReport, SessionStats};
pub use detector::{
    cached_native_explanation, ErrorResult, GrammarDetector, INTERIM_CONFIDENCE, LLM_CONFIDENCE,
    LLM_RULE_ID, RULE_CONFIDENCE,
};
pub use rules::{detect_error, GrammarRule};

// LLM provider routing
pub use llm::{ChatCompletionProvider, GeminiProvider, LlmRouter, TextProvider};

// Session policy and speech
pub use persona::{Persona, PersonaRegistry};
pub use speech::{SpeechClient, TranscriptResult};

// Configuration and errors
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
