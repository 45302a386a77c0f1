//! Axum-based gateway for the coaching engine: REST endpoints for grammar
//! checks and persona metadata, plus the /ws/practice WebSocket where live
//! sessions run.

mod client;
mod hub;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaani_core::{
    ChunkAnalyzer, EngineConfig, GrammarDetector, LlmRouter, PersonaRegistry, SpeechClient,
};

use client::ClientInfo;
use hub::Hub;

const SUPPORTED_LANGUAGES: [&str; 9] = [
    "Hindi",
    "Tamil",
    "Telugu",
    "Marathi",
    "Punjabi",
    "Bengali",
    "Gujarati",
    "Kannada",
    "Malayalam",
];

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub detector: Arc<GrammarDetector>,
    pub analyzer: Arc<ChunkAnalyzer>,
    pub personas: Arc<PersonaRegistry>,
    pub speech: Arc<SpeechClient>,
    pub hub: Hub,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(EngineConfig::from_env());
    let router = Arc::new(LlmRouter::from_config(&config));
    tracing::info!(
        providers = router.provider_count(),
        speech = config.deepgram_api_key.is_some(),
        "engine configured"
    );

    let detector = Arc::new(GrammarDetector::new(Arc::clone(&router), config.min_llm_words));
    let analyzer = Arc::new(ChunkAnalyzer::new(Arc::clone(&detector)));
    let personas = Arc::new(PersonaRegistry::new());
    let speech = Arc::new(SpeechClient::new(config.deepgram_api_key.clone()));

    let state = AppState {
        config,
        detector,
        analyzer,
        personas,
        speech,
        hub: Hub::spawn(),
    };

    let app = build_app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("vaani gateway listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }
}

fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/check-grammar", post(check_grammar))
        .route("/api/v1/interview-modes", get(interview_modes))
        .route("/api/v1/languages", get(languages))
        .route("/api/v1/personas/:mode", get(persona_card))
        .route("/ws/practice", get(ws_practice))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "active_connections": state.hub.count().await,
    }))
}

#[derive(Deserialize)]
struct CheckGrammarRequest {
    text: String,
    #[serde(default = "default_language")]
    native_language: String,
}

fn default_language() -> String {
    "Hindi".to_string()
}

async fn check_grammar(
    State(state): State<AppState>,
    Json(request): Json<CheckGrammarRequest>,
) -> Response {
    match state
        .detector
        .detect(&request.text, &request.native_language)
        .await
    {
        Ok(Some(result)) => Json(json!({ "has_error": true, "result": result })).into_response(),
        Ok(None) => Json(json!({
            "has_error": false,
            "message": "No grammar errors detected",
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(target: "vaani::api", error = %e, "grammar check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn interview_modes(State(state): State<AppState>) -> Json<serde_json::Value> {
    let modes: Vec<serde_json::Value> = state
        .personas
        .all()
        .iter()
        .map(|p| state.personas.persona_card(p.mode))
        .collect();
    Json(json!({ "modes": modes }))
}

async fn languages() -> Json<serde_json::Value> {
    Json(json!({ "languages": SUPPORTED_LANGUAGES }))
}

async fn persona_card(
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> Response {
    if !state.personas.is_valid_mode(&mode) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown interview mode '{mode}'") })),
        )
            .into_response();
    }
    Json(state.personas.persona_card(&mode)).into_response()
}

async fn ws_practice(
    ws: WebSocketUpgrade,
    Query(info): Query<ClientInfo>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| client::run(socket, info, state))
}
