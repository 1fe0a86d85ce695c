//! HTTP chat surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer one message from the notes |
//! | `GET`  | `/health` | Health check (returns version and index size) |
//!
//! `POST /chat` takes `{ "message": "...", "history": [...] }`. The history
//! is accepted for chat front-ends that send it, but never used for
//! retrieval. The response is `{ "answer": "...", "sources": [...] }`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! The code is [`RagError::code`]: `bad_request` (400), `index_not_found`
//! (404), `retrieval_unavailable` (503), `generation_unavailable` (502),
//! `embedding_failed` (502), `configuration` (500), `malformed_path` (500),
//! `storage_failed` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser chat page
//! can be served from anywhere.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use notequery_core::pipeline::{RagPipeline, SourceRef};
use notequery_core::RagError;

use crate::config::Config;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<RagPipeline>,
}

pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
}

pub async fn run_server(config: &Config, pipeline: RagPipeline) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(pipeline));

    println!("Chat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::EmptyQuestion => StatusCode::BAD_REQUEST,
            RagError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            RagError::RetrievalUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RagError::GenerationUnavailable(_) | RagError::Embedding(_) => StatusCode::BAD_GATEWAY,
            RagError::Configuration(_) | RagError::MalformedPath { .. } | RagError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let code = err.code();
        if status.is_server_error() {
            tracing::error!(code, error = %err, "chat request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    entries: Option<usize>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let entries = state.pipeline.index().info().await.ok().map(|i| i.entries);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entries,
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    history: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let answer = state.pipeline.ask(&req.message).await?;
    let sources = answer.sources();
    Ok(Json(ChatResponse {
        answer: answer.text,
        sources,
    }))
}
