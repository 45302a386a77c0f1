//! Sliding-window chunk analysis with per-session duplicate suppression.
//!
//! Speech arrives as overlapping partial transcripts, so the same mistake
//! surfaces repeatedly; a learner must be corrected once per distinct error,
//! not once per frame. Each session keeps a bounded word window, a set of
//! already-flagged errors keyed by rule and original text, and the running
//! transcript for end-of-session stats.
//!
//! Locking is two-tier: the session map is a `DashMap`, each session body sits
//! behind its own async mutex. The mutex is never held across a detector
//! await; the analyzer snapshots what it needs, detects, then re-locks to
//! claim the suppression key. `HashSet::insert` returning false is the losing
//! side of a race between overlapping frames.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::detector::{self, ErrorResult, GrammarDetector};
use crate::error::EngineResult;
use crate::rules;

/// Words retained in the sliding window.
const WINDOW_CAPACITY: usize = 10;
/// Window tail length re-checked once a chunk itself comes back clean.
const WINDOW_TAIL: usize = 5;

const DEFAULT_NATIVE_LANGUAGE: &str = "Hindi";

struct AnalysisSession {
    window: VecDeque<String>,
    flagged: HashSet<String>,
    transcript: String,
    native_language: String,
}

impl AnalysisSession {
    fn new(native_language: String) -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_CAPACITY),
            flagged: HashSet::new(),
            transcript: String::new(),
            native_language,
        }
    }

    fn push_words(&mut self, text: &str) {
        for word in text.split_whitespace() {
            if self.window.len() == WINDOW_CAPACITY {
                self.window.pop_front();
            }
            self.window.push_back(word.to_string());
        }
    }

    fn tail(&self, len: usize) -> String {
        let skip = self.window.len().saturating_sub(len);
        self.window
            .iter()
            .skip(skip)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn suppression_key(error: &ErrorResult) -> String {
    format!("{}:{}", error.rule_id, error.original)
}

/// One analyzed chunk that produced an error.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub chunk_text: String,
    pub error: ErrorResult,
    /// Word offset into the session transcript at detection time.
    pub word_position: usize,
    /// Always true for reports from `analyze_chunk`, which suppresses known
    /// keys outright. Interim advisories set false for already-flagged keys.
    pub is_new: bool,
}

/// End-of-session summary.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub word_count: usize,
    pub error_count: usize,
    pub error_rate: f64,
    pub full_transcript: String,
    pub errors_detected: Vec<String>,
}

/// Per-session transcript analysis over a shared detector.
pub struct ChunkAnalyzer {
    detector: Arc<GrammarDetector>,
    sessions: DashMap<String, Arc<Mutex<AnalysisSession>>>,
}

impl ChunkAnalyzer {
    pub fn new(detector: Arc<GrammarDetector>) -> Self {
        Self {
            detector,
            sessions: DashMap::new(),
        }
    }

    /// Explicitly begin a session with the learner's language. Any existing
    /// state under the same id is discarded.
    pub fn start_session(&self, session_id: &str, native_language: &str) {
        self.sessions.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(AnalysisSession::new(native_language.to_string()))),
        );
        tracing::info!(
            target: "vaani::analyzer",
            session_id,
            native_language,
            "session started"
        );
    }

    pub fn end_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
        tracing::info!(target: "vaani::analyzer", session_id, "session ended");
    }

    fn session(&self, session_id: &str) -> Arc<Mutex<AnalysisSession>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AnalysisSession::new(
                    DEFAULT_NATIVE_LANGUAGE.to_string(),
                )))
            })
            .value()
            .clone()
    }

    /// Analyze one authoritative transcript chunk. Returns a report only for
    /// errors not yet flagged in this session.
    pub async fn analyze_chunk(
        &self,
        session_id: &str,
        text: &str,
        is_final: bool,
    ) -> EngineResult<Option<ChunkReport>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let session = self.session(session_id);
        let (native_language, word_position, tail) = {
            let mut guard = session.lock().await;
            if is_final {
                if !guard.transcript.is_empty() {
                    guard.transcript.push(' ');
                }
                guard.transcript.push_str(text);
            }
            guard.push_words(text);
            (
                guard.native_language.clone(),
                guard.window.len(),
                guard.tail(WINDOW_TAIL),
            )
        };

        // Chunk itself first. A suppressed hit falls through to the window
        // check, since the recombined tail may carry a distinct error.
        if text.split_whitespace().count() >= 2 {
            if let Some(error) = self.detector.detect(text, &native_language).await? {
                if Self::mark_new(&session, &error).await {
                    return Ok(Some(ChunkReport {
                        chunk_text: text.to_string(),
                        error,
                        word_position,
                        is_new: true,
                    }));
                }
            }
        }

        // A chunk that reported nothing new can still complete an error
        // spanning the chunk boundary; re-check the window tail.
        if word_position >= 3 && tail != text {
            if let Some(error) = self.detector.detect(&tail, &native_language).await? {
                if Self::mark_new(&session, &error).await {
                    return Ok(Some(ChunkReport {
                        chunk_text: tail,
                        error,
                        word_position,
                        is_new: true,
                    }));
                }
            }
        }

        Ok(None)
    }

    async fn mark_new(session: &Arc<Mutex<AnalysisSession>>, error: &ErrorResult) -> bool {
        let mut guard = session.lock().await;
        guard.flagged.insert(suppression_key(error))
    }

    /// Advisory rules-only pass over an interim (non-final) span. Nothing is
    /// marked as flagged, so the eventual final chunk still reports the error
    /// as new. Only suffix phrases are checked, since the front of an interim
    /// span was already covered by earlier frames.
    pub async fn analyze_interim(&self, session_id: &str, text: &str) -> Vec<ChunkReport> {
        let text = text.trim();
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() < 2 {
            return Vec::new();
        }
        let Some(session) = self.sessions.get(session_id).map(|e| e.value().clone()) else {
            return Vec::new();
        };
        let (native_language, flagged) = {
            let guard = session.lock().await;
            (guard.native_language.clone(), guard.flagged.clone())
        };

        let mut reports = Vec::new();
        let start = words.len().saturating_sub(WINDOW_TAIL);
        for i in start..words.len() {
            let phrase = words[i..].join(" ");
            if phrase.len() < 4 {
                continue;
            }
            let Some((rule, corrected)) = rules::detect_error(&phrase) else {
                continue;
            };
            let native = detector::cached_native_explanation(rule.explanation, &native_language)
                .unwrap_or(rule.explanation)
                .to_string();
            let error = ErrorResult {
                original: phrase.clone(),
                corrected,
                error_type: rule.error_type.to_string(),
                explanation_english: rule.explanation.to_string(),
                explanation_native: native,
                rule_id: rule.id.to_string(),
                confidence: detector::INTERIM_CONFIDENCE,
            };
            let is_new = !flagged.contains(&suppression_key(&error));
            reports.push(ChunkReport {
                chunk_text: phrase,
                error,
                word_position: words.len(),
                is_new,
            });
            break;
        }
        reports
    }

    /// Forget flagged errors but keep transcript and window, so the same
    /// mistake can be corrected again after an explicit reset.
    pub async fn reset_error_tracking(&self, session_id: &str) {
        if let Some(session) = self.sessions.get(session_id).map(|e| e.value().clone()) {
            session.lock().await.flagged.clear();
        }
    }

    pub async fn error_count(&self, session_id: &str) -> usize {
        match self.sessions.get(session_id).map(|e| e.value().clone()) {
            Some(session) => session.lock().await.flagged.len(),
            None => 0,
        }
    }

    pub async fn full_transcript(&self, session_id: &str) -> Option<String> {
        let session = self.sessions.get(session_id).map(|e| e.value().clone())?;
        let guard = session.lock().await;
        Some(guard.transcript.clone())
    }

    pub async fn session_stats(&self, session_id: &str) -> Option<SessionStats> {
        let session = self.sessions.get(session_id).map(|e| e.value().clone())?;
        let guard = session.lock().await;
        let word_count = guard.transcript.split_whitespace().count();
        let error_count = guard.flagged.len();
        let error_rate = if word_count == 0 {
            0.0
        } else {
            error_count as f64 / word_count as f64 * 100.0
        };
        let mut errors_detected: Vec<String> = guard.flagged.iter().cloned().collect();
        errors_detected.sort();
        Some(SessionStats {
            session_id: session_id.to_string(),
            word_count,
            error_count,
            error_rate,
            full_transcript: guard.transcript.clone(),
            errors_detected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::INTERIM_CONFIDENCE;
    use crate::llm::LlmRouter;

    fn analyzer() -> ChunkAnalyzer {
        let router = Arc::new(LlmRouter::new(Vec::new()));
        ChunkAnalyzer::new(Arc::new(GrammarDetector::new(router, 5)))
    }

    #[tokio::test]
    async fn repeated_error_is_reported_once() {
        let a = analyzer();
        a.start_session("s1", "Hindi");

        let first = a
            .analyze_chunk("s1", "I has a book today", true)
            .await
            .expect("analyze")
            .expect("error");
        assert!(first.is_new);
        assert_eq!(first.error.rule_id, "I_HAS");

        let second = a
            .analyze_chunk("s1", "I has a book today", true)
            .await
            .expect("analyze");
        assert!(second.is_none(), "same error in same session is suppressed");
        assert_eq!(a.error_count("s1").await, 1);
    }

    #[tokio::test]
    async fn suppressed_chunk_still_checks_window_tail() {
        let a = analyzer();
        a.start_session("s1", "Hindi");

        let first = a
            .analyze_chunk("s1", "we was late", true)
            .await
            .expect("analyze")
            .expect("error");
        assert_eq!(first.error.rule_id, "WE_WAS");
        assert_eq!(first.chunk_text, "we was late");

        // The repeated chunk is suppressed at chunk level, but the window
        // tail recombines into a distinct key and is still examined.
        let second = a
            .analyze_chunk("s1", "we was late", true)
            .await
            .expect("analyze")
            .expect("tail error");
        assert!(second.is_new);
        assert_eq!(second.error.rule_id, "WE_WAS");
        assert_eq!(second.chunk_text, "was late we was late");
    }

    #[tokio::test]
    async fn sessions_do_not_share_suppression() {
        let a = analyzer();
        a.start_session("s1", "Hindi");
        a.start_session("s2", "Tamil");

        let r1 = a.analyze_chunk("s1", "they is here", true).await.expect("analyze");
        let r2 = a.analyze_chunk("s2", "they is here", true).await.expect("analyze");
        assert!(r1.expect("error").is_new);
        assert!(r2.expect("error").is_new);
    }

    #[tokio::test]
    async fn window_is_capped() {
        let a = analyzer();
        a.start_session("s1", "Hindi");
        for i in 0..6 {
            let chunk = format!("word{} and word{}", i, i + 100);
            let _ = a.analyze_chunk("s1", &chunk, true).await.expect("analyze");
        }
        let session = a.sessions.get("s1").map(|e| e.value().clone()).expect("session");
        assert_eq!(session.lock().await.window.len(), WINDOW_CAPACITY);
    }

    #[tokio::test]
    async fn reset_allows_reflagging() {
        let a = analyzer();
        a.start_session("s1", "Hindi");
        let _ = a.analyze_chunk("s1", "we was late", true).await.expect("analyze");
        assert_eq!(a.error_count("s1").await, 1);

        a.reset_error_tracking("s1").await;
        assert_eq!(a.error_count("s1").await, 0);

        let again = a
            .analyze_chunk("s1", "we was late", true)
            .await
            .expect("analyze")
            .expect("error");
        assert!(again.is_new, "reset clears suppression");
    }

    #[tokio::test]
    async fn unknown_session_is_created_lazily() {
        let a = analyzer();
        let report = a
            .analyze_chunk("fresh", "I has a pen", true)
            .await
            .expect("analyze")
            .expect("error");
        assert!(report.is_new);
        assert_eq!(a.full_transcript("fresh").await.as_deref(), Some("I has a pen"));
    }

    #[tokio::test]
    async fn interim_is_advisory_only() {
        let a = analyzer();
        a.start_session("s1", "Hindi");

        let interim = a.analyze_interim("s1", "so basically I has").await;
        assert_eq!(interim.len(), 1);
        assert_eq!(interim[0].error.rule_id, "I_HAS");
        assert_eq!(interim[0].error.confidence, INTERIM_CONFIDENCE);
        assert!(interim[0].is_new);

        // The final chunk still reports the error as new.
        let report = a
            .analyze_chunk("s1", "I has a car", true)
            .await
            .expect("analyze")
            .expect("error");
        assert!(report.is_new);
    }

    #[tokio::test]
    async fn interim_requires_existing_session() {
        let a = analyzer();
        assert!(a.analyze_interim("ghost", "I has a book").await.is_empty());
    }

    #[tokio::test]
    async fn stats_summarize_the_session() {
        let a = analyzer();
        a.start_session("s1", "Hindi");
        let _ = a.analyze_chunk("s1", "I has a book", true).await.expect("analyze");

        // 1 error over 4 words: rate is a percentage.
        let stats = a.session_stats("s1").await.expect("stats");
        assert_eq!(stats.word_count, 4);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.error_rate, 25.0);
        assert_eq!(stats.errors_detected, vec!["I_HAS:I has a book".to_string()]);

        let _ = a.analyze_chunk("s1", "it is fine", true).await.expect("analyze");
        let stats = a.session_stats("s1").await.expect("stats");
        assert_eq!(stats.word_count, 7);
        assert_eq!(stats.full_transcript, "I has a book it is fine");

        a.end_session("s1");
        assert!(a.session_stats("s1").await.is_none());
    }
}
