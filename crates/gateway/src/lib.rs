//! HTTP API gateway for Chatline.
//!
//! Exposes two endpoints:
//! - `POST /chat`: one conversational turn, always answered with a reply
//! - `GET /health`: engine readiness
//!
//! Built on Axum. The engine loads in the background, so `/health` answers
//! from the moment the listener is bound.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use chatline_config::{AppConfig, GatewayConfig};
use chatline_core::message::{ChatReply, ConversationContext, HistoryEntry};
use chatline_dialogue::ChatOrchestrator;
use chatline_engine::{EngineService, Readiness, load_engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    engine: Arc<EngineService>,
    orchestrator: ChatOrchestrator,
}

impl GatewayState {
    pub fn new(engine: Arc<EngineService>, config: &AppConfig) -> Self {
        let orchestrator = ChatOrchestrator::new(engine.clone(), &config.generation);
        Self {
            engine,
            orchestrator,
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS restricted to `allowed_origins`
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    // Credentials cannot be combined with a wildcard origin.
    if allowed_origins.iter().any(|origin| origin.trim() == "*") {
        warn!("CORS allows any origin; credentials are disabled");
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Start the gateway HTTP server.
///
/// The engine load is spawned before the listener binds and never blocks it.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let engine = Arc::new(EngineService::new(config.engine.model.clone()));
    let loader_config = config.clone();
    engine.spawn_load(async move { load_engine(&loader_config).await });

    let state = Arc::new(GatewayState::new(engine, &config));
    let app = build_router(state, &config.gateway);

    info!(
        addr = %addr,
        model = %config.engine.model,
        backend = %config.engine.backend,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    context: Vec<HistoryEntry>,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Json<ChatReply> {
    let context = ConversationContext::from_entries(payload.message, payload.context);
    Json(state.orchestrator.respond(&context).await)
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    model_loaded: bool,
    engine: Readiness,
    model: String,
    timestamp: DateTime<Utc>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let readiness = state.engine.readiness();
    Json(HealthResponse {
        status: if readiness.is_ready() { "healthy" } else { "loading" }.into(),
        model_loaded: readiness.is_ready(),
        engine: readiness,
        model: state.engine.model().to_string(),
        timestamp: Utc::now(),
    })
}
