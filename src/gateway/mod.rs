//! Axum-based HTTP gateway: signup, signin, upload and download.
//!
//! Every protected route follows the same steps: pull the `token` cookie,
//! verify it statelessly, and treat the embedded username as the caller's
//! identity for the rest of the request. Stores are owned by [`AppState`]
//! and injected into handlers, so tests run against isolated instances.
//!
//! Limits:
//! - JSON bodies (signup/signin): 64KB
//! - Upload bodies: `gateway.max_upload_bytes` (10 MiB by default), rejected with 413
//! - Request timeout: `gateway.request_timeout_secs`

pub mod error;

pub use error::ApiError;

use crate::auth::{CredentialStore, IssuedToken, SessionKeys};
use crate::config::{AuthConfig, Config, GatewayConfig};
use crate::files::{BlobStore, FileRecord, FsBlobStore, MetadataStore};
use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tower_http::timeout::TimeoutLayer;

/// Maximum JSON request body size (64KB) for signup/signin.
pub const MAX_JSON_BODY_SIZE: usize = 65_536;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Multipart field holding the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Length of the generated secret when none is configured.
const GENERATED_SECRET_BYTES: usize = 32;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionKeys>,
    pub metadata: Arc<MetadataStore>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Build the stores and blob directory described by `config`.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let secret = session_secret(&config.auth);
    let sessions = SessionKeys::new(
        &secret,
        Duration::from_secs(config.auth.session_ttl_secs),
    )?;
    let credentials = CredentialStore::in_memory(config.auth.hash_rounds)?;
    let blobs = FsBlobStore::open_dir(config.storage.uploads_dir.clone())
        .await
        .with_context(|| {
            format!(
                "failed to prepare upload directory {}",
                config.storage.uploads_dir.display()
            )
        })?;

    Ok(AppState {
        credentials: Arc::new(credentials),
        sessions: Arc::new(sessions),
        metadata: Arc::new(MetadataStore::in_memory()),
        blobs: Arc::new(blobs),
    })
}

fn session_secret(auth: &AuthConfig) -> Vec<u8> {
    if let Some(secret) = auth.secret_key.as_deref() {
        return secret.as_bytes().to_vec();
    }
    tracing::warn!(
        "No session secret configured, generated a random key; sessions will not survive a restart"
    );
    let mut bytes = vec![0u8; GENERATED_SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Build the router with body limits and the request timeout applied.
pub fn router(state: AppState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/signup",
            post(handle_signup).layer(DefaultBodyLimit::max(MAX_JSON_BODY_SIZE)),
        )
        .route(
            "/signin",
            post(handle_signin).layer(DefaultBodyLimit::max(MAX_JSON_BODY_SIZE)),
        )
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(gateway.max_upload_bytes)),
        )
        .route("/files", get(handle_list))
        .route("/files/{filename}", get(handle_download))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs),
        ))
}

/// Bind, serve until ctrl-c, then drain in-flight requests.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = build_state(&config).await?;
    let app = router(state, &config.gateway);

    let listener =
        tokio::net::TcpListener::bind((config.gateway.host.as_str(), config.gateway.port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind {}:{}",
                    config.gateway.host, config.gateway.port
                )
            })?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        uploads_dir = %config.storage.uploads_dir.display(),
        session_ttl_secs = config.auth.session_ttl_secs,
        "filegate listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::warn!("ctrl-c received, shutting down");
}

// ══════════════════════════════════════════════════════════════════════════════
// SESSION EXTRACTION
// ══════════════════════════════════════════════════════════════════════════════

/// Find the session cookie value.
///
/// `Ok(None)` means no `token` cookie was sent. A `Cookie` header that isn't
/// visible ASCII, or a bare `token` without `=`, is a malformed request.
fn session_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    for value in headers.get_all(header::COOKIE) {
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("Malformed cookie header".into()))?;
        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((name, value)) if name.trim() == SESSION_COOKIE => {
                    let value = value.trim();
                    let value = value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(value);
                    return Ok(Some(value.to_string()));
                }
                None if pair == SESSION_COOKIE => {
                    return Err(ApiError::BadRequest("Malformed session cookie".into()));
                }
                _ => {}
            }
        }
    }
    Ok(None)
}

/// Validate the session cookie and return the authenticated username.
fn require_session(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = session_token(headers)?.ok_or(ApiError::Unauthorized)?;
    let claims = state.sessions.verify(&token)?;
    Ok(claims.username)
}

fn session_cookie(issued: &IssuedToken, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={}; Expires={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        issued.token,
        issued.expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        ttl.as_secs()
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Request body for signup and signin.
#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

fn parse_credentials(
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<CredentialsBody, ApiError> {
    body.map(|Json(b)| b).map_err(|e| {
        tracing::debug!(error = %e, "Rejected credentials payload");
        ApiError::BadRequest("Invalid request payload".into())
    })
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %e, "Blocking task failed");
    ApiError::Internal("Internal error".into())
}

/// GET /health: always public
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /signup: create an account.
async fn handle_signup(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_credentials(body)?;
    let username = body.username.trim().to_string();

    let credentials = Arc::clone(&state.credentials);
    tokio::task::spawn_blocking(move || credentials.register(&body.username, &body.password))
        .await
        .map_err(join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "registered",
            "username": username,
        })),
    ))
}

/// POST /signin: verify credentials and set the session cookie.
async fn handle_signin(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_credentials(body)?;

    let credentials = Arc::clone(&state.credentials);
    let verified =
        tokio::task::spawn_blocking(move || credentials.verify(&body.username, &body.password))
            .await
            .map_err(join_error)?;
    let username = match verified {
        Ok(username) => username,
        Err(e) => {
            tracing::debug!(reason = %e, "Sign-in rejected");
            return Err(e.into());
        }
    };

    let issued = state.sessions.issue(&username)?;
    tracing::info!(
        username = %username,
        expires_at = %issued.expires_at.to_rfc3339(),
        "Session issued"
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&issued, state.sessions.ttl()))],
        Json(serde_json::json!({
            "status": "authenticated",
            "username": username,
            "expires_at": issued.expires_at,
        })),
    ))
}

/// POST /upload: store the multipart `file` field under its declared name.
async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let username = require_session(&state, &headers)?;
    let mut multipart = multipart.map_err(|e| {
        ApiError::BadRequest(format!("Could not parse multipart form: {}", e.body_text()))
    })?;

    let (filename, bytes) = read_file_field(&mut multipart).await?;
    let size = bytes.len();
    state.blobs.put(&filename, bytes).await?;

    let record = FileRecord {
        filename,
        uploaded_at: Utc::now(),
        uploader: username,
    };
    if let Some(previous) = state.metadata.put(record.clone()) {
        tracing::info!(
            filename = %record.filename,
            previous_uploader = %previous.uploader,
            "Replacing existing upload"
        );
    }
    tracing::info!(
        filename = %record.filename,
        uploader = %record.uploader,
        bytes = size,
        "File uploaded"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let declared = field
            .file_name()
            .ok_or_else(|| ApiError::BadRequest("Uploaded file has no filename".into()))?;
        let filename = upload_filename(declared)?;
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((filename, bytes));
    }
    Err(ApiError::BadRequest("Could not get uploaded file".into()))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge;
    }
    ApiError::BadRequest(format!("Could not parse multipart form: {}", err.body_text()))
}

/// Reduce a client-declared filename to a safe storage key: the final path
/// component, without control characters, never `.` or `..`.
fn upload_filename(declared: &str) -> Result<String, ApiError> {
    let base = declared
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if !crate::files::blob::is_flat_name(base) || base.chars().any(char::is_control) {
        return Err(ApiError::BadRequest(format!(
            "Invalid filename: {declared:?}"
        )));
    }
    Ok(base.to_string())
}

/// GET /files: list upload metadata.
async fn handle_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(serde_json::json!({ "files": state.metadata.list() })))
}

/// GET /files/{filename}: stream a stored file to any authenticated caller.
async fn handle_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let accessor = require_session(&state, &headers)?;
    let record = state
        .metadata
        .get(&filename)
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;

    tracing::info!(
        filename = %record.filename,
        accessor = %accessor,
        accessed_at = %Utc::now().to_rfc3339(),
        "File accessed"
    );

    let blob = state.blobs.open(&record.filename).await?;
    let content_type = mime_guess::from_path(&record.filename)
        .first_or_octet_stream()
        .to_string();
    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_LENGTH, blob.len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&record.filename),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(blob.reader));
    Ok((StatusCode::OK, headers, body).into_response())
}

fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{ascii}\"")
}
