//! REST API Server for the teller agent
//!
//! Session lifecycle, streamed chat replies (Server-Sent Events), history
//! and logout. Sessions live in a [`SessionStore`]; each chat turn locks its
//! session for the duration of the turn.

use axum::{
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{
    redact_sensitive, redact_session, AuditEvent, AuditEventType, AuditLog, AuditSink,
};
use crate::config::AppConfig;
use crate::conversation::ConversationEngine;
use crate::error::TellerError;
use crate::rate_limit::RateLimiter;
use crate::reference::ReferenceData;
use crate::security::SecurityGate;
use crate::state::{InMemorySessionStore, SessionHandle, SessionStore};
use crate::Result;

pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub message: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::error(message.into()))).into_response()
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ConversationEngine>,
    pub store: Arc<dyn SessionStore>,
    pub audit: Arc<dyn AuditSink>,
    pub gate: SecurityGate,
    pub chat_limiter: RateLimiter,
    pub session_limiter: RateLimiter,
    pub stream_chunk_size: usize,
    /// Key rate limits on `x-forwarded-for` instead of the socket peer
    pub trust_proxy: bool,
}

impl ApiState {
    pub fn from_config(config: &AppConfig, audit: Arc<dyn AuditSink>) -> Result<Self> {
        let reference = match &config.reference_data_path {
            Some(path) => ReferenceData::from_json_file(path)?,
            None => ReferenceData::builtin(),
        };

        let engine = ConversationEngine::new(Arc::new(reference), audit.clone())
            .with_max_attempts(config.max_verification_attempts);

        Ok(Self {
            engine: Arc::new(engine),
            store: Arc::new(InMemorySessionStore::new()),
            audit,
            gate: SecurityGate::new(),
            chat_limiter: RateLimiter::new(config.rate_limit_window, config.chat_rate_limit),
            session_limiter: RateLimiter::new(config.rate_limit_window, config.session_rate_limit),
            stream_chunk_size: config.stream_chunk_size,
            trust_proxy: config.trust_proxy,
        })
    }
}

/// =============================
/// Error Responses
/// =============================

impl IntoResponse for TellerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TellerError::SessionNotFound(_) => (
                StatusCode::NOT_FOUND,
                "Session not found. Please create a new session".to_string(),
            ),
            TellerError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            TellerError::UuidError(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid session ID format".to_string(),
            ),
            TellerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            TellerError::ResponseRejected => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Response validation failed".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error = %redact_sensitive(&self.to_string()), "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %redact_sensitive(&self.to_string()), "Request rejected");
        }

        error_response(status, message)
    }
}

/// =============================
/// Helpers
/// =============================

/// Session ids are issued as lowercase hyphenated UUIDs; accept nothing else
fn parse_session_id(raw: &str) -> Result<Uuid> {
    let id = Uuid::parse_str(raw)?;
    if id.hyphenated().to_string() != raw {
        return Err(TellerError::InvalidRequest(
            "Invalid session ID format".to_string(),
        ));
    }
    Ok(id)
}

fn validate_message(message: &str) -> std::result::Result<(), String> {
    if message.is_empty() {
        return Err("Message is required".to_string());
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message exceeds maximum length of {}",
            MAX_MESSAGE_LENGTH
        ));
    }
    if message.contains('\0') {
        return Err("Message contains invalid characters".to_string());
    }
    Ok(())
}

/// Rate-limit key for a request: the socket peer, or, behind a trusted
/// proxy, the last `x-forwarded-for` hop (the one that proxy appended)
fn client_key(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(client) => client.to_string(),
        None => peer.ip().to_string(),
    }
}

fn check_rate(state: &ApiState, limiter: &RateLimiter, client: &str, endpoint: &str) -> Result<()> {
    if limiter.allow(client) {
        return Ok(());
    }

    state.audit.record(
        AuditEvent::new(AuditEventType::RateLimitExceeded)
            .failed()
            .details(serde_json::json!({ "endpoint": endpoint })),
    );

    Err(TellerError::RateLimited)
}

async fn find_session(state: &ApiState, session_id: Uuid) -> Result<SessionHandle> {
    state
        .store
        .get(session_id)
        .await?
        .ok_or_else(|| TellerError::SessionNotFound(redact_session(&session_id.to_string())))
}

/// Split on character boundaries into chunks of at most `size` characters
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// =============================
/// Health & Info Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Bank Customer Service Chatbot API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /api/health",
            "create_session": "POST /api/session",
            "send_message": "POST /api/chat/<session_id>",
            "get_history": "GET /api/session/<session_id>/history",
            "reset_verification": "POST /api/session/<session_id>/reset",
            "delete_session": "DELETE /api/session/<session_id>"
        }
    }))
}

/// =============================
/// Session Endpoints
/// =============================

async fn create_session(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response> {
    let client = client_key(&headers, peer, state.trust_proxy);
    check_rate(&state, &state.session_limiter, &client, "/api/session")?;

    let (session_id, handle) = state.store.create().await?;
    let created_at = handle.lock().await.created_at();

    info!(session = %redact_session(&session_id.to_string()), "New session created");
    state
        .audit
        .record(AuditEvent::new(AuditEventType::SessionCreated).session(session_id));

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id.to_string(),
            "created_at": created_at.to_rfc3339(),
        }))),
    )
        .into_response())
}

async fn get_history(State(state): State<ApiState>, Path(raw_id): Path<String>) -> Result<Response> {
    let session_id = parse_session_id(&raw_id)?;
    let handle = find_session(&state, session_id).await?;

    let session = handle.lock().await;
    let history = state.engine.get_history(&session);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id.to_string(),
            "history": history,
            "count": history.len(),
        }))),
    )
        .into_response())
}

async fn reset_session(State(state): State<ApiState>, Path(raw_id): Path<String>) -> Result<Response> {
    let session_id = parse_session_id(&raw_id)?;
    let handle = find_session(&state, session_id).await?;

    let mut session = handle.lock().await;
    state.engine.reset_verification(&mut session);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "message": "Verification reset successfully"
        }))),
    )
        .into_response())
}

async fn delete_session(State(state): State<ApiState>, Path(raw_id): Path<String>) -> Result<Response> {
    let session_id = parse_session_id(&raw_id)?;

    if !state.store.remove(session_id).await? {
        return Err(TellerError::SessionNotFound(redact_session(&session_id.to_string())));
    }

    info!(session = %redact_session(&session_id.to_string()), "Session deleted");
    state
        .audit
        .record(AuditEvent::new(AuditEventType::SessionDeleted).session(session_id));

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "message": "Session deleted successfully"
        }))),
    )
        .into_response())
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_post(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Response> {
    let message = req.message.ok_or_else(|| {
        TellerError::InvalidRequest("Request body must contain \"message\" field".to_string())
    })?;

    let client = client_key(&headers, peer, state.trust_proxy);
    run_chat(state, &raw_id, &client, message.trim()).await
}

async fn chat_get(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ChatQuery>,
) -> Result<Response> {
    let client = client_key(&headers, peer, state.trust_proxy);
    run_chat(state, &raw_id, &client, query.message.trim()).await
}

async fn run_chat(state: ApiState, raw_id: &str, client: &str, message: &str) -> Result<Response> {
    let session_id = parse_session_id(raw_id)?;
    check_rate(&state, &state.chat_limiter, client, "/api/chat")?;
    let handle = find_session(&state, session_id).await?;

    if let Err(reason) = validate_message(message) {
        state.audit.record(
            AuditEvent::new(AuditEventType::InvalidInput)
                .session(session_id)
                .failed()
                .details(serde_json::json!({ "reason": reason })),
        );
        return Err(TellerError::InvalidRequest(reason));
    }

    info!(
        session = %redact_session(&session_id.to_string()),
        length = message.chars().count(),
        "Processing message"
    );

    let reply = {
        let mut session = handle.lock().await;
        state.engine.process_message(&mut session, message)
    };

    if let Err(rejection) = state.gate.validate(&reply) {
        warn!(keyword = rejection.keyword, "Outgoing reply failed final validation");
        return Err(TellerError::ResponseRejected);
    }

    let events = chunk_text(&reply, state.stream_chunk_size)
        .into_iter()
        .map(|chunk| Event::default().data(serde_json::json!({ "text": chunk }).to_string()))
        .chain(std::iter::once(
            Event::default().data(serde_json::json!({ "done": true }).to_string()),
        ))
        .map(Ok::<Event, Infallible>);

    let mut response = Sse::new(futures::stream::iter(events)).into_response();
    response
        .headers_mut()
        .insert(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"));
    Ok(response)
}

/// =============================
/// Middleware
/// =============================

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-client-version"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/info", get(api_info))
        .route("/api/session", post(create_session))
        .route("/api/chat/:session_id", post(chat_post).get(chat_get))
        .route("/api/session/:session_id/history", get(get_history))
        .route("/api/session/:session_id/reset", post(reset_session))
        .route("/api/session/:session_id", axum::routing::delete(delete_session))
        .with_state(state)
        .layer(middleware::from_fn(security_headers))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Build the full application from configuration with a bounded in-memory audit log.
///
/// Rate limiting reads the peer address, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_app(config: &AppConfig) -> Result<Router> {
    let audit: Arc<dyn AuditSink> = Arc::new(AuditLog::with_capacity(config.audit_log_capacity));
    let state = ApiState::from_config(config, audit)?;
    Ok(create_router(state, &config.allowed_origins))
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", config.port);
    info!("Local: http://127.0.0.1:{}", config.port);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
