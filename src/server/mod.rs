//! HTTP surface: `POST /api/ai` and `GET /health`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::GenerationService;
use crate::domain::{
    ErrorResponseBody, GENERATION_FAILED_MESSAGE, GenerateRequestBody, GenerateResponseBody,
    LlmError, UNSUPPORTED_MODEL_MESSAGE,
};

pub const API_PATH: &str = "/api/ai";
pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct AppState {
    service: Arc<GenerationService>,
}

impl AppState {
    pub fn new(service: GenerationService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(API_PATH, post(generate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// The body is read as JSON whatever its content type.
async fn generate(
    State(state): State<AppState>,
    payload: Bytes,
) -> Result<Json<GenerateResponseBody>, ApiError> {
    let body: GenerateRequestBody = serde_json::from_slice(&payload)
        .map_err(|err| ApiError::MalformedBody(err.to_string()))?;
    let service = Arc::clone(&state.service);

    // Provider adapters use a blocking HTTP client.
    let outcome = tokio::task::spawn_blocking(move || {
        service.generate(
            body.prompt.as_deref().unwrap_or_default(),
            body.model.as_deref(),
        )
    })
    .await
    .map_err(|err| LlmError::internal(format!("generation task failed: {err}")))??;

    Ok(Json(outcome.into()))
}

#[derive(Debug)]
pub enum ApiError {
    MalformedBody(String),
    Generation(LlmError),
}

impl From<LlmError> for ApiError {
    fn from(error: LlmError) -> Self {
        Self::Generation(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::MalformedBody(details) => {
                error!(%details, "request body is not valid JSON");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponseBody::with_details(GENERATION_FAILED_MESSAGE, details),
                )
            }
            Self::Generation(LlmError::Validation { message }) => {
                (StatusCode::BAD_REQUEST, ErrorResponseBody::new(message))
            }
            Self::Generation(error @ LlmError::UnsupportedModel { .. }) => {
                warn!(%error, "rejected unsupported model");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponseBody::with_details(UNSUPPORTED_MODEL_MESSAGE, error.to_string()),
                )
            }
            Self::Generation(error) => {
                error!(%error, category = ?error.category(), "AI generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponseBody::with_details(GENERATION_FAILED_MESSAGE, error.to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub struct HttpServer {
    addr: SocketAddr,
    state: AppState,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (listener, app) = self.prepare().await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server terminated with an error")?;
        info!("HTTP server stopped");
        Ok(())
    }

    async fn prepare(self) -> Result<(tokio::net::TcpListener, Router)> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        let local_addr = listener.local_addr().context("failed to read bound address")?;
        info!(addr = %local_addr, "HTTP server listening");
        Ok((listener, build_router(self.state)))
    }
}
