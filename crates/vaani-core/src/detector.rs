//! Grammar detection: rule engine first, LLM fallback second.
//!
//! The rule catalog answers in microseconds with high confidence; only spans
//! long enough to carry real sentence structure are escalated to the LLM
//! router. A rule hit therefore never pays network latency. With no router
//! configured the product runs rules-only; a configured router that fails
//! mid-escalation surfaces as a detection error for that input.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::llm::LlmRouter;
use crate::rules;

/// Confidence attached to a rule-engine hit.
pub const RULE_CONFIDENCE: f64 = 0.95;
/// Confidence attached to an LLM-confirmed error.
pub const LLM_CONFIDENCE: f64 = 0.85;
/// Confidence attached to an advisory hit on an interim (non-final) span.
pub const INTERIM_CONFIDENCE: f64 = 0.9;
/// Rule id used for errors the LLM found that no catalog rule covers.
pub const LLM_RULE_ID: &str = "LLM_DETECTED";

/// One detected grammar error, ready for serialization to a client.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResult {
    pub original: String,
    pub corrected: String,
    pub error_type: String,
    pub explanation_english: String,
    pub explanation_native: String,
    pub rule_id: String,
    pub confidence: f64,
}

/// Shape the LLM is instructed to answer with.
#[derive(Deserialize)]
struct Verdict {
    #[serde(default)]
    has_error: bool,
    #[serde(default)]
    corrected: String,
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    explanation: String,
}

/// Cached native-language renderings of the catalog's explanation phrases.
/// Covers the high-frequency rules so the common path never needs the LLM.
static TRANSLATIONS: Lazy<Vec<(&'static str, &'static str, &'static str)>> = Lazy::new(|| {
    vec![
        (
            "Use 'have' with 'I', not 'has'",
            "Hindi",
            "'I' ke saath 'have' ka prayog karein, 'has' nahi",
        ),
        (
            "Use 'has' with 'he/she/it', not 'have'",
            "Hindi",
            "'he/she/it' ke saath 'has' ka prayog karein, 'have' nahi",
        ),
        (
            "Use 'are' with 'they', not 'is'",
            "Hindi",
            "'they' ke saath 'are' ka prayog karein, 'is' nahi",
        ),
        (
            "Use 'were' with 'we', not 'was'",
            "Hindi",
            "'we' ke saath 'were' ka prayog karein, 'was' nahi",
        ),
        (
            "Use past tense 'went' with 'yesterday'",
            "Hindi",
            "'yesterday' ke saath past tense 'went' ka prayog karein",
        ),
        (
            "Use 'have' with 'I', not 'has'",
            "Tamil",
            "'I' udan 'have' payanpadutha vendum, 'has' alla",
        ),
        (
            "Use 'are' with 'they', not 'is'",
            "Tamil",
            "'they' udan 'are' payanpadutha vendum, 'is' alla",
        ),
        (
            "Use 'have' with 'I', not 'has'",
            "Telugu",
            "'I' tho 'have' vaadaali, 'has' kaadu",
        ),
        (
            "Use 'are' with 'they', not 'is'",
            "Telugu",
            "'they' tho 'are' vaadaali, 'is' kaadu",
        ),
    ]
});

/// Dictionary-only lookup. Used on the interim path, which must stay cheap.
pub fn cached_native_explanation(english: &str, language: &str) -> Option<&'static str> {
    TRANSLATIONS
        .iter()
        .find(|(en, lang, _)| *en == english && lang.eq_ignore_ascii_case(language))
        .map(|(_, _, native)| *native)
}

/// Rule-first grammar detector with LLM escalation for long spans.
pub struct GrammarDetector {
    router: Arc<LlmRouter>,
    min_llm_words: usize,
}

impl GrammarDetector {
    pub fn new(router: Arc<LlmRouter>, min_llm_words: usize) -> Self {
        Self {
            router,
            min_llm_words,
        }
    }

    /// Detect an error in `text`. Rule hits win outright; spans of at least
    /// the configured word count that no rule matches go to the LLM. Short
    /// unmatched spans are assumed clean.
    pub async fn detect(
        &self,
        text: &str,
        native_language: &str,
    ) -> EngineResult<Option<ErrorResult>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        if let Some((rule, corrected)) = rules::detect_error(text) {
            let explanation_native = self
                .native_explanation(rule.explanation, native_language)
                .await;
            return Ok(Some(ErrorResult {
                original: text.to_string(),
                corrected,
                error_type: rule.error_type.to_string(),
                explanation_english: rule.explanation.to_string(),
                explanation_native,
                rule_id: rule.id.to_string(),
                confidence: RULE_CONFIDENCE,
            }));
        }

        let word_count = text.split_whitespace().count();
        if word_count < self.min_llm_words || !self.router.is_configured() {
            return Ok(None);
        }

        self.detect_with_llm(text, native_language).await
    }

    async fn detect_with_llm(
        &self,
        text: &str,
        native_language: &str,
    ) -> EngineResult<Option<ErrorResult>> {
        let prompt = format!(
            "You are an English grammar checker for spoken Indian English. \
             Analyze this sentence for grammar errors: \"{text}\"\n\n\
             Respond with ONLY a JSON object, no other text:\n\
             {{\"has_error\": true/false, \"corrected\": \"corrected sentence\", \
             \"error_type\": \"category of error\", \"explanation\": \"one-line explanation\"}}\n\n\
             If the sentence is grammatically correct, set has_error to false."
        );

        // Router failure on the escalation path is the one hard I/O failure
        // of detection; callers decide how to degrade.
        let response = self.router.generate(&prompt).await?;

        let verdict: Verdict = serde_json::from_str(strip_fences(&response))?;
        if !verdict.has_error {
            return Ok(None);
        }

        let explanation_native = self
            .native_explanation(&verdict.explanation, native_language)
            .await;
        Ok(Some(ErrorResult {
            original: text.to_string(),
            corrected: verdict.corrected,
            error_type: if verdict.error_type.is_empty() {
                "Grammar Error".to_string()
            } else {
                verdict.error_type
            },
            explanation_english: verdict.explanation,
            explanation_native,
            rule_id: LLM_RULE_ID.to_string(),
            confidence: LLM_CONFIDENCE,
        }))
    }

    /// Render an explanation in the learner's language. Dictionary first, LLM
    /// translation second, English as the last resort. Never fails; a broken
    /// translation path must not suppress the correction itself.
    pub async fn native_explanation(&self, english: &str, language: &str) -> String {
        if language.eq_ignore_ascii_case("english") {
            return english.to_string();
        }
        if let Some(cached) = cached_native_explanation(english, language) {
            return cached.to_string();
        }
        if self.router.is_configured() {
            let prompt = format!(
                "Translate this English grammar tip to {language}, using Latin script \
                 (romanized), in one short sentence: \"{english}\"\n\
                 Respond with only the translation."
            );
            match self.router.generate(&prompt).await {
                Ok(translated) => return translated.trim().to_string(),
                Err(e) => {
                    tracing::warn!(
                        target: "vaani::detector",
                        error = %e,
                        "translation failed, falling back to English"
                    );
                }
            }
        }
        english.to_string()
    }
}

/// LLMs habitually wrap JSON in markdown fences despite instructions.
fn strip_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, EngineResult};
    use crate::llm::TextProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        response: EngineResult<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextProvider for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn generate(&self, _prompt: &str) -> EngineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.to_string()),
                Err(_) => Err(EngineError::Provider {
                    provider: "counting",
                    reason: "scripted failure".to_string(),
                }),
            }
        }
    }

    fn detector_with(
        response: EngineResult<&'static str>,
        min_llm_words: usize,
    ) -> (GrammarDetector, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Counting {
            response,
            calls: Arc::clone(&calls),
        };
        let router = Arc::new(LlmRouter::new(vec![Box::new(provider)]));
        (GrammarDetector::new(router, min_llm_words), calls)
    }

    fn rules_only_detector() -> GrammarDetector {
        GrammarDetector::new(Arc::new(LlmRouter::new(Vec::new())), 5)
    }

    #[tokio::test]
    async fn rule_hit_wins_without_touching_llm() {
        let (detector, calls) = detector_with(Ok(r#"{"has_error": false}"#), 1);
        let result = detector
            .detect("I has a book", "English")
            .await
            .expect("detect")
            .expect("rule hit");
        assert_eq!(result.rule_id, "I_HAS");
        assert_eq!(result.corrected, "I have a book");
        assert_eq!(result.confidence, RULE_CONFIDENCE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_unmatched_span_skips_llm() {
        let (detector, calls) = detector_with(Ok(r#"{"has_error": true}"#), 5);
        let result = detector.detect("hello there", "English").await.expect("detect");
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn long_unmatched_span_escalates_to_llm() {
        let verdict = r#"{"has_error": true, "corrected": "She goes to school every day", "error_type": "Subject-Verb Agreement", "explanation": "Use 'goes' with 'she'"}"#;
        let (detector, calls) = detector_with(Ok(verdict), 5);
        let result = detector
            .detect("She go to school every day", "English")
            .await
            .expect("detect")
            .expect("LLM hit");
        assert_eq!(result.rule_id, LLM_RULE_ID);
        assert_eq!(result.confidence, LLM_CONFIDENCE);
        assert_eq!(result.corrected, "She goes to school every day");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn llm_clean_verdict_yields_none() {
        let (detector, _) = detector_with(Ok(r#"{"has_error": false}"#), 2);
        let result = detector
            .detect("the weather is pleasant today", "English")
            .await
            .expect("detect");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let (detector, _) = detector_with(
            Err(EngineError::NoProviderConfigured),
            2,
        );
        let result = detector
            .detect("a long enough sentence for escalation", "English")
            .await;
        assert!(
            matches!(result, Err(EngineError::ProvidersExhausted { .. })),
            "escalation outage must surface as an error, not a clean verdict"
        );
    }

    #[tokio::test]
    async fn fenced_verdict_is_accepted() {
        let fenced = "```json\n{\"has_error\": false}\n```";
        let (detector, _) = detector_with(Ok(fenced), 2);
        let result = detector
            .detect("perfectly fine sentence here", "English")
            .await
            .expect("detect");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn tense_marker_detected_end_to_end() {
        let detector = rules_only_detector();
        let result = detector
            .detect("Yesterday I go to the market", "English")
            .await
            .expect("detect")
            .expect("rule hit");
        assert_eq!(result.rule_id, "YESTERDAY_GO");
        assert_eq!(result.error_type, "Tense Error");
        assert_eq!(result.corrected, "Yesterday I went to the market");
    }

    #[tokio::test]
    async fn native_explanation_uses_dictionary() {
        let detector = rules_only_detector();
        let native = detector
            .native_explanation("Use 'have' with 'I', not 'has'", "Hindi")
            .await;
        assert_eq!(native, "'I' ke saath 'have' ka prayog karein, 'has' nahi");
    }

    #[tokio::test]
    async fn native_explanation_falls_back_to_english() {
        let detector = rules_only_detector();
        let native = detector
            .native_explanation("Use 'fewer' with countable nouns", "Marathi")
            .await;
        assert_eq!(native, "Use 'fewer' with countable nouns");
    }

    #[test]
    fn dictionary_lookup_is_case_insensitive_on_language() {
        assert!(cached_native_explanation("Use 'are' with 'they', not 'is'", "hindi").is_some());
        assert!(cached_native_explanation("Use 'are' with 'they', not 'is'", "Tamil").is_some());
        assert!(cached_native_explanation("no such phrase", "Hindi").is_none());
    }
}
