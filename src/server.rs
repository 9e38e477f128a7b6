//! HTTP API.
//!
//! Every request that touches a database carries its own connection string;
//! the server opens a handle for the request, validates it, and closes it
//! when the response is ready. The analysis cache and the completion service
//! are shared by all requests.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/connect` | Validate a connection and list its tables and views |
//! | `POST` | `/catalog` | Full catalog grouped by schema |
//! | `POST` | `/analyze/{schema}/{item}` | Analyze one item (`_` = default schema) |
//! | `POST` | `/ask` | Answer a question in `summary` or `sql` mode |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Table 'x' not found in schema 'main'." } }
//! ```
//!
//! Codes: `bad_request` (400), `connection_failed` (400), `catalog_failed` (400),
//! `execution_failed` (400), `unsupported` (400), `not_found` (404),
//! `timeout` (408), `generation_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end on
//! another port can call the API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analyzer;
use crate::cache::AnalysisCache;
use crate::catalog::{self, Catalog};
use crate::config::Config;
use crate::error::ScoutError;
use crate::llm::{self, CompletionService};
use crate::models::{AnalysisRecord, AskResponse};
use crate::orchestrator::{self, Mode};
use crate::session::{self, Session};

/// Path segment that stands for the default schema in `/analyze`.
pub const DEFAULT_SCHEMA_SEGMENT: &str = "_";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    cache: Arc<AnalysisCache>,
    service: Arc<dyn CompletionService>,
}

/// Starts the HTTP server with the completion service named in the config.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = llm::create_service(&config.llm)?;
    run_server_with_service(config, service).await
}

/// Starts the HTTP server with an explicit completion service.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server_with_service(
    config: &Config,
    service: Arc<dyn CompletionService>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        cache: Arc::new(AnalysisCache::new(config.cache.dir.clone())),
        service,
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/connect", post(handle_connect))
        .route("/catalog", post(handle_catalog))
        .route("/analyze/{schema}/{item}", post(handle_analyze))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
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

/// Internal error type that converts into an Axum HTTP response.
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

impl From<ScoutError> for AppError {
    fn from(err: ScoutError) -> Self {
        let status = match &err {
            ScoutError::NotFound(_) => StatusCode::NOT_FOUND,
            ScoutError::Timeout(..) => StatusCode::REQUEST_TIMEOUT,
            ScoutError::Generation(_) => StatusCode::BAD_GATEWAY,
            ScoutError::Io(_) | ScoutError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ScoutError::Connection(_)
            | ScoutError::Catalog(_)
            | ScoutError::Execution { .. }
            | ScoutError::Analysis(_)
            | ScoutError::Unsupported(_)
            | ScoutError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ Request plumbing ============

/// Open a validated handle, run `f` with a session over it, then close it.
async fn with_session<T, F, Fut>(
    state: &AppState,
    connection_string: &str,
    f: F,
) -> Result<T, AppError>
where
    F: FnOnce(Session) -> Fut,
    Fut: std::future::Future<Output = Result<T, ScoutError>>,
{
    let (session, handle) = session::open(
        connection_string,
        state.service.clone(),
        state.cache.clone(),
        state.config.clone(),
    )
    .await?;
    let result = f(session).await;
    handle.close().await;
    result.map_err(AppError::from)
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

// ============ POST /connect, POST /catalog ============

#[derive(Deserialize)]
struct ConnectRequest {
    connection_string: String,
}

#[derive(Serialize)]
struct ConnectResponse {
    dialect: String,
    tables: Vec<String>,
}

async fn handle_connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AppError> {
    let response = with_session(&state, &req.connection_string, |session| async move {
        let catalog = catalog::discover(session.db.as_ref()).await?;
        Ok(ConnectResponse {
            dialect: session.db.dialect().name().to_string(),
            tables: catalog.items().iter().map(|i| i.full_name()).collect(),
        })
    })
    .await?;
    Ok(Json(response))
}

async fn handle_catalog(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<Catalog>, AppError> {
    let catalog = with_session(&state, &req.connection_string, |session| async move {
        catalog::discover(session.db.as_ref()).await
    })
    .await?;
    Ok(Json(catalog))
}

// ============ POST /analyze/{schema}/{item} ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    connection_string: String,
    #[serde(default)]
    force_rerun: bool,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Path((schema, item)): Path<(String, String)>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let schema = (schema != DEFAULT_SCHEMA_SEGMENT).then_some(schema);
    let force_rerun = req.force_rerun;
    let record = with_session(&state, &req.connection_string, |session| async move {
        analyzer::analyze_by_name(&session, schema.as_deref(), &item, force_rerun).await
    })
    .await?;
    Ok(Json(record))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    connection_string: String,
    question: String,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    force_rerun: bool,
}

fn default_mode() -> String {
    "summary".to_string()
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    // Reject an unknown mode before opening any connection.
    let mode: Mode = req.mode.parse()?;
    let question = req.question;
    let force_rerun = req.force_rerun;

    let response = with_session(&state, &req.connection_string, |session| async move {
        orchestrator::ask(&session, &question, mode, force_rerun).await
    })
    .await?;
    Ok(Json(response))
}
