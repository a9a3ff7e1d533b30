//! HTTP routes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use stockrag_core::{Pipeline, SilentProgress, require_query};
use stockrag_shared::{PipelineState, StockRagError};
use tracing::warn;

use crate::render;

/// Shared server state. Holds only the immutable pipeline.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

/// Build the router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask_form))
        .route("/api/ask", post(ask_json))
        .route("/health", get(health_check))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> &'static str {
    "OK"
}

async fn index() -> Html<String> {
    Html(render::form_page(None, ""))
}

async fn ask_form(State(state): State<AppState>, Form(request): Form<AskRequest>) -> Response {
    let Ok(query) = require_query(&request.query) else {
        return Html(render::form_page(Some("Please enter a question."), "")).into_response();
    };

    match state.pipeline.run(query, &SilentProgress).await {
        Ok(result) => Html(render::result_page(&result)).into_response(),
        Err(e) => {
            warn!(error = %e, "query failed");
            (
                StatusCode::BAD_GATEWAY,
                Html(render::error_page(query, &e.to_string())),
            )
                .into_response()
        }
    }
}

async fn ask_json(
    State(state): State<AppState>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<PipelineState>, ApiError> {
    let Json(request) = request?;
    let query = require_query(&request.query)?;

    let result = state.pipeline.run(query, &SilentProgress).await.inspect_err(|e| {
        warn!(error = %e, "query failed");
    })?;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error body: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<StockRagError> for ApiError {
    fn from(error: StockRagError) -> Self {
        let status = match &error {
            StockRagError::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
