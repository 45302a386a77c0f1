//! LLM fallback router: a priority-ordered list of text-generation providers
//! behind one `generate(prompt) -> text` contract.
//!
//! Providers are attempted strictly in declaration order (Groq, then OpenAI,
//! then Gemini); the first success is returned and later providers are never
//! touched. Only providers with a non-empty credential are configured at all.
//! Provider-specific request/response shaping stays inside each provider
//! implementation; the router only sees plain text or an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// One text-generation provider. Implementations own their wire format.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, prompt: &str) -> EngineResult<String>;
}

// OpenAI-compatible request/response (Groq and OpenAI share this shape)
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

/// Chat-completion style provider (Groq, OpenAI): bearer auth, `choices[0]`.
pub struct ChatCompletionProvider {
    name: &'static str,
    url: &'static str,
    model: &'static str,
    api_key: String,
    client: reqwest::Client,
}

impl ChatCompletionProvider {
    pub fn groq(api_key: String, client: reqwest::Client) -> Self {
        Self {
            name: "groq",
            url: GROQ_API_URL,
            model: GROQ_MODEL,
            api_key,
            client,
        }
    }

    pub fn openai(api_key: String, client: reqwest::Client) -> Self {
        Self {
            name: "openai",
            url: OPENAI_API_URL,
            model: OPENAI_MODEL,
            api_key,
            client,
        }
    }
}

#[async_trait]
impl TextProvider for ChatCompletionProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        let body = ChatRequest {
            model: self.model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.3,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Provider {
                provider: self.name,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Provider {
                provider: self.name,
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| EngineError::Provider {
            provider: self.name,
            reason: format!("malformed response: {e}"),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(EngineError::Provider {
                provider: self.name,
                reason: "response had no choices".to_string(),
            })
    }
}

// Gemini "candidates" style request/response
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

/// Gemini provider: key in the query string, `candidates[0].content.parts[0]`.
pub struct GeminiProvider {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        let url = format!(
            "{GEMINI_API_BASE}/{GEMINI_MODEL}:generateContent?key={}",
            self.api_key
        );
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.3,
                max_output_tokens: 500,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Provider {
                provider: "gemini",
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Provider {
                provider: "gemini",
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| EngineError::Provider {
            provider: "gemini",
            reason: format!("malformed response: {e}"),
        })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or(EngineError::Provider {
                provider: "gemini",
                reason: "response had no candidates".to_string(),
            })
    }
}

/// Sequential-fallback router over the configured providers.
pub struct LlmRouter {
    providers: Vec<Box<dyn TextProvider>>,
}

impl LlmRouter {
    /// Build from explicit providers, in priority order. Used directly by
    /// tests; production goes through [`LlmRouter::from_config`].
    pub fn new(providers: Vec<Box<dyn TextProvider>>) -> Self {
        Self { providers }
    }

    /// Build the Groq → OpenAI → Gemini chain from config. Providers without
    /// a credential are skipped entirely, never attempted-and-failed.
    pub fn from_config(config: &EngineConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut providers: Vec<Box<dyn TextProvider>> = Vec::new();
        if let Some(key) = config.groq_api_key.clone() {
            providers.push(Box::new(ChatCompletionProvider::groq(key, client.clone())));
        }
        if let Some(key) = config.openai_api_key.clone() {
            providers.push(Box::new(ChatCompletionProvider::openai(key, client.clone())));
        }
        if let Some(key) = config.gemini_api_key.clone() {
            providers.push(Box::new(GeminiProvider::new(key, client)));
        }
        if providers.is_empty() {
            tracing::warn!(
                target: "vaani::llm",
                "no LLM provider configured; detection runs on rules only"
            );
        }
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn is_configured(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Try each provider in order; return the first success. Every failure is
    /// logged and swallowed until the list is exhausted.
    pub async fn generate(&self, prompt: &str) -> EngineResult<String> {
        if self.providers.is_empty() {
            return Err(EngineError::NoProviderConfigured);
        }

        let mut last = String::new();
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) => {
                    tracing::debug!(
                        target: "vaani::llm",
                        provider = provider.name(),
                        "generation succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "vaani::llm",
                        provider = provider.name(),
                        error = %e,
                        "provider failed, falling through"
                    );
                    last = e.to_string();
                }
            }
        }

        Err(EngineError::ProvidersExhausted {
            attempted: self.providers.len(),
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        name: &'static str,
        response: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextProvider for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn generate(&self, _prompt: &str) -> EngineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.response {
                Some(text) => Ok(text.to_string()),
                None => Err(EngineError::Provider {
                    provider: self.name,
                    reason: "scripted failure".to_string(),
                }),
            }
        }
    }

    fn scripted(
        name: &'static str,
        response: Option<&'static str>,
    ) -> (Box<dyn TextProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Scripted {
                name,
                response,
                calls: Arc::clone(&calls),
            }),
            calls,
        )
    }

    #[tokio::test]
    async fn returns_first_success_in_priority_order() {
        let (p1, c1) = scripted("one", None);
        let (p2, c2) = scripted("two", None);
        let (p3, c3) = scripted("three", Some("third answer"));
        let (p4, c4) = scripted("four", Some("never reached"));
        let router = LlmRouter::new(vec![p1, p2, p3, p4]);

        let out = router.generate("hello").await.expect("third provider succeeds");
        assert_eq!(out, "third answer");
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 1);
        assert_eq!(c4.load(Ordering::SeqCst), 0, "later providers must not be invoked");
    }

    #[tokio::test]
    async fn first_provider_success_short_circuits() {
        let (p1, c1) = scripted("one", Some("fast"));
        let (p2, c2) = scripted("two", Some("slow"));
        let router = LlmRouter::new(vec![p1, p2]);

        assert_eq!(router.generate("x").await.expect("ok"), "fast");
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_providers_yield_aggregate_error() {
        let (p1, _) = scripted("one", None);
        let (p2, _) = scripted("two", None);
        let router = LlmRouter::new(vec![p1, p2]);

        match router.generate("x").await {
            Err(EngineError::ProvidersExhausted { attempted, .. }) => assert_eq!(attempted, 2),
            other => panic!("expected ProvidersExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_router_reports_no_provider() {
        let router = LlmRouter::new(Vec::new());
        assert!(matches!(
            router.generate("x").await,
            Err(EngineError::NoProviderConfigured)
        ));
    }

    #[test]
    fn from_config_skips_missing_credentials() {
        let config = EngineConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..EngineConfig::default()
        };
        let router = LlmRouter::from_config(&config);
        assert_eq!(router.provider_count(), 1);
    }
}
