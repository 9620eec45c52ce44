//! HTTP chat server.
//!
//! Exposes sessions over a small JSON API so a browser or script can
//! upload a document and hold a conversation about it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Create a session |
//! | `GET`    | `/sessions/{id}` | Session summary |
//! | `DELETE` | `/sessions/{id}` | Drop a session |
//! | `PUT`    | `/sessions/{id}/document?name=` | Upload a document (raw body) |
//! | `DELETE` | `/sessions/{id}/document` | Unload the document, keep the transcript |
//! | `POST`   | `/sessions/{id}/ask` | `{ "query": "..." }` → reply and context segment |
//! | `POST`   | `/sessions/{id}/reset` | Clear document and transcript |
//! | `GET`    | `/sessions/{id}/messages` | Transcript |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "timeout", "message": "generation service timed out after 30s" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `payload_too_large` (413), `unreadable_document` (422),
//! `rate_limited` (429), `invalid_state` (409),
//! `authentication_error` (502), `upstream_rejected` (502),
//! `invalid_response` (502), `service_unavailable` (503),
//! `too_many_sessions` (503), `timeout` (504).
//!
//! Malformed JSON and oversized bodies use the same shape as handler
//! errors.
//!
//! # Concurrency
//!
//! Each session sits behind its own async mutex, so one session handles
//! one request at a time while other sessions proceed independently.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use context_qa_core::error::RetrievalError;
use context_qa_core::models::ConversationTurn;

use crate::config::Config;
use crate::generation::{create_generator, GenerationError, GenerationService};
use crate::session::{ChatError, DocumentSummary, Session, SessionSettings, TurnOutcome};

type SessionHandle = Arc<Mutex<Session>>;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    settings: SessionSettings,
    max_sessions: usize,
    generator: Arc<dyn GenerationService>,
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl AppState {
    async fn session(&self, id: &str) -> Result<SessionHandle, AppError> {
        let id = parse_session_id(id)?;
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("no session with id: {}", id)))
    }
}

fn parse_session_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| bad_request(format!("invalid session id: {}", id)))
}

/// Starts the server with the generation service selected by the config.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let generator = create_generator(&config.generation)?;
    run_server_with_generator(config, generator).await
}

/// Starts the server with a caller-supplied generation service.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server_with_generator(
    config: &Config,
    generator: Arc<dyn GenerationService>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let service_name = generator.name().to_string();
    let app = build_router(config, generator);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, service = %service_name, "chat server listening");
    println!("Chat server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router without binding, for embedding in another server.
pub fn build_router(config: &Config, generator: Arc<dyn GenerationService>) -> Router {
    let state = AppState {
        settings: SessionSettings::from_config(config),
        max_sessions: config.server.max_sessions,
        generator,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route(
            "/sessions/{id}/document",
            put(handle_upload).delete(handle_unload),
        )
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/reset", post(handle_reset))
        .route("/sessions/{id}/messages", get(handle_messages))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
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
#[derive(Debug)]
struct AppError {
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

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            app_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                rejection.body_text(),
            )
        } else {
            bad_request(rejection.body_text())
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::UnreadableDocument(_) => {
                app_error(StatusCode::UNPROCESSABLE_ENTITY, "unreadable_document", message)
            }
            ChatError::Retrieval(RetrievalError::InvalidArgument(_)) => bad_request(message),
            ChatError::Retrieval(RetrievalError::InvalidState(_)) => {
                app_error(StatusCode::CONFLICT, "invalid_state", message)
            }
            ChatError::Generation(g) => match g {
                GenerationError::Authentication(_) => {
                    app_error(StatusCode::BAD_GATEWAY, "authentication_error", message)
                }
                GenerationError::RateLimited(_) => {
                    app_error(StatusCode::TOO_MANY_REQUESTS, "rate_limited", message)
                }
                GenerationError::ServiceUnavailable(_) => {
                    app_error(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
                }
                GenerationError::Timeout(_) => {
                    app_error(StatusCode::GATEWAY_TIMEOUT, "timeout", message)
                }
                GenerationError::Rejected { .. } => {
                    app_error(StatusCode::BAD_GATEWAY, "upstream_rejected", message)
                }
                GenerationError::InvalidResponse(_) => {
                    app_error(StatusCode::BAD_GATEWAY, "invalid_response", message)
                }
            },
        }
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

// ============ Sessions ============

#[derive(Serialize)]
struct SessionResponse {
    id: Uuid,
    created_at: DateTime<Utc>,
    document: Option<DocumentSummary>,
    turns: usize,
}

impl SessionResponse {
    fn from_session(session: &Session) -> Self {
        Self {
            id: session.id(),
            created_at: session.created_at(),
            document: session.document().map(|d| d.summary()),
            turns: session.history().len(),
        }
    }
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let mut sessions = state.sessions.write().await;
    if sessions.len() >= state.max_sessions {
        tracing::warn!(limit = state.max_sessions, "session limit reached");
        return Err(app_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "too_many_sessions",
            format!(
                "session limit of {} reached; delete a session first",
                state.max_sessions
            ),
        ));
    }
    let session = Session::new(state.settings.clone());
    let body = SessionResponse::from_session(&session);
    sessions.insert(session.id(), Arc::new(Mutex::new(session)));
    tracing::info!(session = %body.id, live = sessions.len(), "session created");
    Ok((StatusCode::CREATED, Json(body)))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state.session(&id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionResponse::from_session(&session)))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let uuid = parse_session_id(&id)?;
    match state.sessions.write().await.remove(&uuid) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(not_found(format!("no session with id: {}", id))),
    }
}

async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state.session(&id).await?;
    let mut session = handle.lock().await;
    session.reset();
    Ok(Json(SessionResponse::from_session(&session)))
}

// ============ Document ============

#[derive(Deserialize)]
struct UploadParams {
    name: Option<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<DocumentSummary>, AppError> {
    let body = body?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| bad_request("Content-Type header is required"))?
        .to_string();
    let name = params.name.unwrap_or_else(|| "document".to_string());

    let handle = state.session(&id).await?;
    let mut session = handle.lock().await;
    let doc = session.load_document(&name, &body, &content_type)?;
    Ok(Json(doc.summary()))
}

async fn handle_unload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let handle = state.session(&id).await?;
    handle.lock().await.clear_document();
    Ok(StatusCode::NO_CONTENT)
}

// ============ Ask ============

#[derive(Deserialize)]
struct AskRequest {
    query: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<TurnOutcome>, AppError> {
    let Json(req) = payload?;
    let handle = state.session(&id).await?;
    let mut session = handle.lock().await;
    let outcome = session.ask(state.generator.as_ref(), &req.query).await?;
    Ok(Json(outcome))
}

// ============ Messages ============

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<ConversationTurn>,
}

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let handle = state.session(&id).await?;
    let session = handle.lock().await;
    Ok(Json(MessagesResponse {
        messages: session.history().to_vec(),
    }))
}
