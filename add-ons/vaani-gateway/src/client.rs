//! Per-connection WebSocket session: read pump, write pump, and the message
//! handlers that drive the coaching loop.
//!
//! Each connection owns its session state; shared services (analyzer,
//! detector, personas, speech) arrive through `AppState`. Outbound frames go
//! through a bounded channel so a slow client sheds load by dropping frames
//! instead of stalling detection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use vaani_core::ErrorResult;

use crate::AppState;

const OUTBOUND_CAPACITY: usize = 256;
const PING_PERIOD: Duration = Duration::from_secs(54);

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Connection parameters supplied at upgrade time.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_native_language")]
    pub native_language: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

fn default_native_language() -> String {
    "Hindi".to_string()
}

fn default_mode() -> String {
    "General".to_string()
}

/// Wire envelope shared by both directions.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
struct StartSessionPayload {
    #[serde(default)]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ThinkingPausePayload {
    #[serde(default)]
    pause_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct AudioPayload {
    #[serde(default)]
    audio: String,
}

struct Client {
    id: u64,
    info: ClientInfo,
    state: AppState,
    outbound: mpsc::Sender<String>,
    session_id: String,
    error_count: usize,
}

/// Drive one WebSocket connection to completion.
pub async fn run(socket: WebSocket, info: ClientInfo, state: AppState) {
    let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    let (sink, stream) = socket.split();
    let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);

    state.hub.register(id).await;
    tracing::info!(
        target: "vaani::client",
        client_id = id,
        user_id = %info.user_id,
        mode = %info.mode,
        "connection opened"
    );

    let writer = tokio::spawn(write_pump(sink, rx));

    let mut client = Client {
        id,
        info,
        state: state.clone(),
        outbound,
        session_id: String::new(),
        error_count: 0,
    };
    read_pump(&mut client, stream).await;

    if !client.session_id.is_empty() {
        state.analyzer.end_session(&client.session_id);
    }
    state.hub.unregister(id).await;
    writer.abort();
    tracing::info!(target: "vaani::client", client_id = id, "connection closed");
}

async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<String>) {
    let mut ping = tokio::time::interval(PING_PERIOD);
    ping.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn read_pump(client: &mut Client, mut stream: SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(
                    target: "vaani::client",
                    client_id = client.id,
                    error = %e,
                    "read error"
                );
                return;
            }
        };
        match message {
            Message::Text(text) => client.dispatch(&text).await,
            Message::Close(_) => return,
            // Pings are answered by axum; binary audio is not part of the
            // protocol, audio travels base64-encoded inside JSON frames.
            _ => {}
        }
    }
}

impl Client {
    async fn dispatch(&mut self, raw: &str) {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    error = %e,
                    "unparseable frame dropped"
                );
                return;
            }
        };
        match envelope.kind.as_str() {
            "audio" => self.handle_audio(envelope.payload).await,
            "transcript" => self.handle_transcript(envelope.payload).await,
            "interim_transcript" => self.handle_interim(envelope.payload).await,
            "start_session" => self.handle_start_session(envelope.payload).await,
            "end_session" => self.handle_end_session().await,
            "thinking_pause" => self.handle_thinking_pause(envelope.payload).await,
            other => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    kind = other,
                    "unknown message type dropped"
                );
            }
        }
    }

    /// Base64 audio frame: transcribe, then treat like a transcript frame.
    async fn handle_audio(&mut self, payload: Value) {
        let Ok(audio) = serde_json::from_value::<AudioPayload>(payload) else {
            return;
        };
        if !self.state.speech.is_configured() {
            tracing::debug!(
                target: "vaani::client",
                client_id = self.id,
                "audio frame ignored, speech service not configured"
            );
            return;
        }
        let bytes = match BASE64.decode(audio.audio.as_bytes()) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    error = %e,
                    "audio frame was not valid base64"
                );
                return;
            }
        };
        match self.state.speech.transcribe(bytes).await {
            Ok(result) => {
                self.analyze_and_report(&result.text, result.is_final).await;
            }
            Err(e) => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    error = %e,
                    "transcription failed"
                );
            }
        }
    }

    /// Authoritative transcript from the client's own STT path.
    async fn handle_transcript(&mut self, payload: Value) {
        let Ok(transcript) = serde_json::from_value::<TranscriptPayload>(payload) else {
            return;
        };
        if transcript.text.trim().is_empty() {
            return;
        }

        let result = self
            .state
            .detector
            .detect(&transcript.text, &self.info.native_language)
            .await;
        match result {
            Ok(Some(error)) if transcript.is_final => {
                if self
                    .state
                    .personas
                    .should_interrupt(&self.info.mode, error.confidence)
                {
                    self.send_interruption(&error, &transcript.text).await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    error = %e,
                    "detection failed"
                );
            }
        }
    }

    /// Streaming transcript frames: final chunks go through the analyzer
    /// (with duplicate suppression), interim ones get an advisory pass only.
    /// Interim hits never become interruptions; they are not recorded in the
    /// suppression set, so interrupting here would double up once the final
    /// chunk confirms the same error.
    async fn handle_interim(&mut self, payload: Value) {
        let Ok(transcript) = serde_json::from_value::<TranscriptPayload>(payload) else {
            return;
        };
        if transcript.text.trim().is_empty() {
            return;
        }

        if transcript.is_final {
            self.analyze_and_report(&transcript.text, true).await;
        } else {
            let advisories = self
                .state
                .analyzer
                .analyze_interim(&self.session_id, &transcript.text)
                .await;
            self.send_event(
                "interim_update",
                json!({
                    "text": transcript.text,
                    "is_final": false,
                    "advisories": advisories,
                    "timestamp": Utc::now().timestamp_millis(),
                }),
            );
        }
    }

    async fn analyze_and_report(&mut self, text: &str, is_final: bool) {
        let result = self
            .state
            .analyzer
            .analyze_chunk(&self.session_id, text, is_final)
            .await;
        match result {
            Ok(Some(report)) => {
                if report.is_new
                    && self
                        .state
                        .personas
                        .should_interrupt(&self.info.mode, report.error.confidence)
                {
                    self.send_interruption(&report.error, text).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    error = %e,
                    "chunk analysis failed"
                );
            }
        }
    }

    async fn handle_start_session(&mut self, payload: Value) {
        let Ok(start) = serde_json::from_value::<StartSessionPayload>(payload) else {
            return;
        };
        if !self.session_id.is_empty() {
            self.state.analyzer.end_session(&self.session_id);
        }
        self.session_id = start.session_id;
        self.error_count = 0;
        self.state
            .analyzer
            .start_session(&self.session_id, &self.info.native_language);

        self.send_event(
            "session_started",
            json!({
                "session_id": self.session_id,
                "mode": self.info.mode,
                "opening": self.state.personas.opening_message(&self.info.mode),
                "message": "Session started successfully",
            }),
        );
    }

    async fn handle_end_session(&mut self) {
        let stats = self.state.analyzer.session_stats(&self.session_id).await;
        self.send_event(
            "session_ended",
            json!({
                "session_id": self.session_id,
                "error_count": self.error_count,
                "stats": stats,
                "message": "Session ended successfully",
            }),
        );
        self.state.analyzer.end_session(&self.session_id);
        self.session_id.clear();
        self.error_count = 0;
    }

    async fn handle_thinking_pause(&mut self, payload: Value) {
        let Ok(pause) = serde_json::from_value::<ThinkingPausePayload>(payload) else {
            return;
        };

        if let Some(message) = self
            .state
            .personas
            .nudge_message(&self.info.mode, pause.pause_duration_ms)
        {
            self.send_event(
                "nudge",
                json!({
                    "message": message,
                    "duration": pause.pause_duration_ms,
                }),
            );
        }
    }

    async fn send_interruption(&mut self, error: &ErrorResult, original_text: &str) {
        self.error_count += 1;
        let message = self.state.personas.interruption_message(
            &self.info.mode,
            &self.info.native_language,
            error,
        );

        // TTS covers the native-language explanation only, and is
        // best-effort; the text correction must go out regardless.
        let audio = match self
            .state
            .speech
            .text_to_speech(&error.explanation_native)
            .await
        {
            Ok(bytes) => BASE64.encode(bytes),
            Err(e) => {
                tracing::warn!(
                    target: "vaani::client",
                    client_id = self.id,
                    error = %e,
                    "TTS failed, sending text-only interruption"
                );
                String::new()
            }
        };

        self.send_event(
            "interruption",
            json!({
                "error": error,
                "audio": audio,
                "timestamp": Utc::now().timestamp_millis(),
                "latency_ms": self.state.config.target_latency_ms,
                "text": original_text,
                "message": message,
            }),
        );
    }

    /// Non-blocking send; a full or closed channel drops the frame.
    fn send_event(&self, kind: &str, payload: Value) {
        let frame = json!({ "type": kind, "payload": payload }).to_string();
        if let Err(e) = self.outbound.try_send(frame) {
            tracing::warn!(
                target: "vaani::client",
                client_id = self.id,
                kind,
                error = %e,
                "outbound frame dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_type_and_payload() {
        let raw = r#"{"type": "transcript", "payload": {"text": "I has a book", "is_final": true}}"#;
        let envelope: Envelope = serde_json::from_str(raw).expect("parse");
        assert_eq!(envelope.kind, "transcript");
        let payload: TranscriptPayload =
            serde_json::from_value(envelope.payload).expect("payload");
        assert_eq!(payload.text, "I has a book");
        assert!(payload.is_final);
    }

    #[test]
    fn envelope_payload_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"type": "end_session"}"#).expect("parse");
        assert_eq!(envelope.kind, "end_session");
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn client_info_defaults() {
        let info: ClientInfo = serde_json::from_str("{}").expect("parse");
        assert_eq!(info.user_id, "anonymous");
        assert_eq!(info.native_language, "Hindi");
        assert_eq!(info.mode, "General");
    }

    #[test]
    fn transcript_payload_tolerates_missing_fields() {
        let payload: TranscriptPayload = serde_json::from_str(r#"{"text": "hello"}"#).expect("parse");
        assert!(!payload.is_final);
    }

    #[tokio::test]
    async fn interim_then_final_interrupts_exactly_once() {
        use std::sync::Arc;
        use vaani_core::{ChunkAnalyzer, GrammarDetector, LlmRouter, PersonaRegistry};

        // Same pipeline the handlers drive: interim frames get an advisory
        // pass and never interrupt; only analyze_chunk reports are gated
        // into interruptions.
        let router = Arc::new(LlmRouter::new(Vec::new()));
        let analyzer = ChunkAnalyzer::new(Arc::new(GrammarDetector::new(router, 5)));
        let personas = PersonaRegistry::new();
        analyzer.start_session("s1", "Hindi");

        let mut interruptions = 0;

        let advisories = analyzer.analyze_interim("s1", "I has a book").await;
        assert!(!advisories.is_empty(), "interim pass still surfaces the advisory");

        // The matching final chunk carries the same error key.
        if let Some(report) = analyzer
            .analyze_chunk("s1", "I has a book", true)
            .await
            .expect("analyze")
        {
            if report.is_new && personas.should_interrupt("General", report.error.confidence) {
                interruptions += 1;
            }
        }
        assert_eq!(
            interruptions, 1,
            "one error key must produce one interruption per session"
        );
    }
}
