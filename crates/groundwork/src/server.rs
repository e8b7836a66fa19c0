//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/retrieve` | Ranked chunks visible to the caller |
//! | `POST` | `/ask` | Grounded answer with cited sources |
//!
//! Both `POST` routes take
//!
//! ```json
//! { "team_id": "T1", "user_id": "U1", "channel_id": "C1",
//!   "question": "How do teams reconcile commissions today?",
//!   "limit": 12, "self_check": true }
//! ```
//!
//! `query` is accepted as an alias of `question`; `channel_id`, `limit` and
//! `self_check` are optional.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "team_id is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `configuration` (500), `upstream` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

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
use tracing::{error, info};

use groundwork_core::models::{Answer, Principal, RankedChunk};
use groundwork_core::{Error, Pipeline};

use crate::config::Config;
use crate::context::AppContext;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Result count when a request gives no `limit`.
    pub default_limit: usize,
    /// Self-check setting when a request gives no `self_check`.
    pub default_self_check: bool,
}

impl AppState {
    pub fn from_config(pipeline: Arc<Pipeline>, config: &Config) -> Self {
        Self {
            pipeline,
            default_limit: config.retrieval.final_limit,
            default_self_check: config.generation.self_check,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/retrieve", post(handle_retrieve))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the server on `[server].bind` and run until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = AppContext::connect(config).await?;
    let state = AppState::from_config(ctx.pipeline.clone(), config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    println!("Groundwork server listening on http://{}", config.server.bind);

    let result = serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    ctx.close().await;
    result
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

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        error!(error = %err, "request failed");
        let (status, code) = match &err {
            Error::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream"),
            Error::Configuration(_) | Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ Requests ============

#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default, alias = "query")]
    pub question: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub self_check: Option<bool>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(bad_request(format!("{} is required", name))),
    }
}

impl QueryRequest {
    fn parts(&self, state: &AppState) -> Result<(Principal, &str, usize), AppError> {
        let team = required(&self.team_id, "team_id")?;
        let user = required(&self.user_id, "user_id")?;
        let question = required(&self.question, "question")?;

        let mut principal = Principal::new(team, user);
        if let Some(channel) = self.channel_id.as_deref().filter(|c| !c.trim().is_empty()) {
            principal = principal.with_channel(channel);
        }

        let limit = self.limit.unwrap_or(state.default_limit);
        if limit == 0 {
            return Err(bad_request("limit must be >= 1"));
        }
        Ok((principal, question, limit))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /retrieve ============

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<RankedChunk>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let (principal, query, limit) = req.parts(&state)?;
    let results = state.pipeline.retrieve(query, &principal, limit).await?;
    Ok(Json(RetrieveResponse { results }))
}

// ============ POST /ask ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Answer>, AppError> {
    let (principal, question, limit) = req.parts(&state)?;
    let self_check = req.self_check.unwrap_or(state.default_self_check);
    let answer = state
        .pipeline
        .ask(question, &principal, limit, self_check)
        .await?;
    Ok(Json(answer))
}
