//! Deepgram bridge for speech-to-text and text-to-speech.
//!
//! Thin HTTP client over the prerecorded listen endpoint (nova-2) and the
//! aura speak endpoint. Without a credential every call fails fast with a
//! speech error; the session layer treats TTS failures as soft and still
//! delivers the text correction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

const LISTEN_URL: &str =
    "https://api.deepgram.com/v1/listen?model=nova-2&language=en&punctuate=true&interim_results=true";
const SPEAK_URL: &str = "https://api.deepgram.com/v1/speak?model=aura-asteria-en";

/// One transcription outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub confidence: f64,
    pub is_final: bool,
}

#[derive(Deserialize)]
struct ListenResponse {
    #[serde(default)]
    results: Option<ListenResults>,
    #[serde(default)]
    metadata: Option<ListenMetadata>,
}

#[derive(Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
struct ListenMetadata {
    #[serde(default)]
    is_final: bool,
}

pub struct SpeechClient {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl SpeechClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { api_key, client }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> EngineResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| EngineError::Speech("no speech credential configured".to_string()))
    }

    /// Transcribe a WAV buffer.
    pub async fn transcribe(&self, audio: Vec<u8>) -> EngineResult<TranscriptResult> {
        let key = self.key()?;
        let response = self
            .client
            .post(LISTEN_URL)
            .header("Authorization", format!("Token {key}"))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await
            .map_err(|e| EngineError::Speech(format!("listen request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Speech(format!("listen HTTP {status}: {body}")));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Speech(format!("malformed listen response: {e}")))?;

        let alternative = parsed
            .results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .ok_or_else(|| EngineError::Speech("listen response had no transcript".to_string()))?;

        Ok(TranscriptResult {
            text: alternative.transcript,
            confidence: alternative.confidence,
            is_final: parsed.metadata.map(|m| m.is_final).unwrap_or(true),
        })
    }

    /// Synthesize speech for a correction or nudge. Returns raw audio bytes.
    pub async fn text_to_speech(&self, text: &str) -> EngineResult<Vec<u8>> {
        let key = self.key()?;
        let response = self
            .client
            .post(SPEAK_URL)
            .header("Authorization", format!("Token {key}"))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| EngineError::Speech(format!("speak request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Speech(format!("speak HTTP {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Speech(format!("speak body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_fails_fast() {
        let client = SpeechClient::new(None);
        assert!(!client.is_configured());
        assert!(matches!(
            client.transcribe(vec![0u8; 16]).await,
            Err(EngineError::Speech(_))
        ));
        assert!(matches!(
            client.text_to_speech("hello").await,
            Err(EngineError::Speech(_))
        ));
    }

    #[test]
    fn listen_response_parses_nested_shape() {
        let raw = r#"{
            "metadata": {"is_final": true},
            "results": {"channels": [{"alternatives": [
                {"transcript": "I has a book", "confidence": 0.97}
            ]}]}
        }"#;
        let parsed: ListenResponse = serde_json::from_str(raw).expect("parse");
        let alt = parsed
            .results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .expect("alternative");
        assert_eq!(alt.transcript, "I has a book");
        assert!(parsed.metadata.expect("metadata").is_final);
    }
}
