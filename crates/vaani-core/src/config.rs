//! Engine configuration, loaded once at startup from the environment.
//!
//! Provider credentials stay in the backend only; the frontend is a stateless
//! client and never receives API keys. Detection cutoffs that are product
//! policy rather than derived properties (LLM word cutoff, target latency)
//! live here so they can be tuned without touching the pipeline.

/// Immutable configuration for the detection pipeline and its collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Groq credential; provider is skipped when empty/absent.
    pub groq_api_key: Option<String>,
    /// OpenAI credential; provider is skipped when empty/absent.
    pub openai_api_key: Option<String>,
    /// Gemini credential; provider is skipped when empty/absent.
    pub gemini_api_key: Option<String>,
    /// Deepgram credential for the STT/TTS collaborator.
    pub deepgram_api_key: Option<String>,
    /// Per-provider request timeout. Short, since the router sits on the
    /// interruption path.
    pub llm_timeout_secs: u64,
    /// Minimum word count before an unmatched span is escalated to the LLM.
    pub min_llm_words: usize,
    /// Advertised detection latency target, reported on interruption events.
    pub target_latency_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            openai_api_key: None,
            gemini_api_key: None,
            deepgram_api_key: None,
            llm_timeout_secs: 8,
            min_llm_words: 5,
            target_latency_ms: 300,
        }
    }
}

impl EngineConfig {
    /// Load from environment: GROQ_API_KEY, OPENAI_API_KEY, GEMINI_API_KEY,
    /// DEEPGRAM_API_KEY, plus VAANI_LLM_TIMEOUT_SECS, VAANI_MIN_LLM_WORDS,
    /// VAANI_TARGET_LATENCY_MS overrides.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            groq_api_key: non_empty_env("GROQ_API_KEY"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            deepgram_api_key: non_empty_env("DEEPGRAM_API_KEY"),
            llm_timeout_secs: parsed_env("VAANI_LLM_TIMEOUT_SECS").unwrap_or(defaults.llm_timeout_secs),
            min_llm_words: parsed_env("VAANI_MIN_LLM_WORDS").unwrap_or(defaults.min_llm_words),
            target_latency_ms: parsed_env("VAANI_TARGET_LATENCY_MS")
                .unwrap_or(defaults.target_latency_ms),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.min_llm_words, 5);
        assert_eq!(config.target_latency_ms, 300);
        assert!(config.groq_api_key.is_none());
    }
}
