// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Server - HTTP server for receiving mirrored files
//
// Every route answers with either its own payload or a JSON
// `{"error": <code>}` body. Error responses close the connection.

use axum::{
    body::{self, Body},
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use wireless_copy_core::{
    protocol::{
        self, parse_bearer, AUTH_HEADER, AUTH_PATH, DEFAULT_SCHEME, INFO_PATH, INFO_PATH_PARAM,
        LAST_EDIT_PARAM, LOGOUT_PATH, OVERWRITE_PARAM, UPLOAD_PATH, UPLOAD_PATH_PARAM,
    },
    AppError, AuthResponse, ErrorBody, ErrorCode, InfoResponse, ServerSettings,
};

use crate::auth::TokenAuthority;
use crate::receive::{self, ReceiveError};

/// Largest secret accepted by `/auth/`
const MAX_SECRET_BYTES: usize = 64 * 1024;

/// Server state shared across handlers
pub struct ServerState {
    /// Active bearer tokens
    pub tokens: TokenAuthority,
    /// Destination root for uploads
    pub root_dir: PathBuf,
}

impl ServerState {
    pub fn new(settings: &ServerSettings) -> Self {
        Self {
            tokens: TokenAuthority::new(settings.authentication_key.clone()),
            root_dir: settings.root_dir.clone(),
        }
    }
}

/// Handler failures, rendered as `{"error": <code>}`
#[derive(Debug)]
pub struct ApiError(pub ErrorCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(ErrorBody { error: self.0 })).into_response();
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

/// Decoded query string in request order.
///
/// A repeated key resolves to its first value.
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    fn extract(
        query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    ) -> Result<Self, ApiError> {
        match query {
            Ok(Query(pairs)) => Ok(Self(pairs)),
            Err(e) => {
                tracing::debug!("Rejected query string: {}", e);
                Err(ApiError(ErrorCode::InvalidParams))
            }
        }
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Create the Axum router for the mirror server
pub fn create_router(state: Arc<ServerState>) -> Router {
    let protected = Router::new()
        .route(INFO_PATH, get(info_handler))
        .route(UPLOAD_PATH, put(upload_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route(AUTH_PATH, post(auth_handler))
        .route(LOGOUT_PATH, get(logout_handler))
        .merge(protected)
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
        .with_state(state)
}

/// Bearer token from the designated header, falling back to `Authorization`
fn presented_token(headers: &HeaderMap) -> Option<String> {
    [AUTH_HEADER, "Authorization"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_bearer)
        .map(str::to_string)
}

/// Reject requests whose token is not in the active set
async fn require_token(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = presented_token(request.headers()).ok_or(ApiError(ErrorCode::Unauthorized))?;
    if !state.tokens.validate(&token).await {
        return Err(ApiError(ErrorCode::Unauthorized));
    }
    Ok(next.run(request).await)
}

/// Exchange the shared secret for a bearer token
async fn auth_handler(
    State(state): State<Arc<ServerState>>,
    body: Body,
) -> Result<Response, ApiError> {
    let bytes = body::to_bytes(body, MAX_SECRET_BYTES)
        .await
        .map_err(|_| ApiError(ErrorCode::Unauthorized))?;
    let secret = String::from_utf8_lossy(&bytes);

    let token = state
        .tokens
        .issue(&secret)
        .await
        .map_err(|_| ApiError(ErrorCode::Unauthorized))?;

    let mut response = Json(AuthResponse {
        token,
        auth_type: DEFAULT_SCHEME.to_string(),
    })
    .into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    Ok(response)
}

/// Report size and modification time of an existing file
async fn info_handler(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = QueryParams::extract(query)?;
    let rel = params
        .first(INFO_PATH_PARAM)
        .ok_or(ApiError(ErrorCode::MissingParams))?;
    let path = receive::resolve_destination(&state.root_dir, rel)
        .ok_or(ApiError(ErrorCode::InvalidParams))?;

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(StatusCode::NO_CONTENT.into_response()),
    };

    let last_edited = metadata
        .modified()
        .map(protocol::epoch_seconds)
        .unwrap_or(0.0);

    Ok(Json(InfoResponse {
        error: ErrorCode::AlreadyExists,
        file_size: metadata.len(),
        last_edited,
    })
    .into_response())
}

/// Revoke the presented token; always succeeds
async fn logout_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> StatusCode {
    if let Some(token) = presented_token(&headers) {
        state.tokens.revoke(&token).await;
    }
    StatusCode::NO_CONTENT
}

/// Store the request body at `path`
async fn upload_handler(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let params = QueryParams::extract(query)?;
    let (Some(rel), Some(last_edit), Some(overwrite)) = (
        params.first(UPLOAD_PATH_PARAM),
        params.first(LAST_EDIT_PARAM),
        params.first(OVERWRITE_PARAM),
    ) else {
        return Err(ApiError(ErrorCode::MissingParams));
    };

    let declared: u64 = headers
        .get(header::CONTENT_LENGTH)
        .ok_or(ApiError(ErrorCode::MissingParams))?
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or(ApiError(ErrorCode::InvalidParams))?;

    let last_edit =
        protocol::parse_last_edit(last_edit).ok_or(ApiError(ErrorCode::InvalidParams))?;
    let dest = receive::resolve_destination(&state.root_dir, rel)
        .ok_or(ApiError(ErrorCode::InvalidParams))?;

    let mut stream = body.into_data_stream();
    let report = receive::receive_file(
        &dest,
        protocol::overwrite_allowed(overwrite),
        last_edit,
        declared,
        &mut stream,
    )
    .await
    .map_err(|e| match e {
        ReceiveError::AlreadyExists => {
            tracing::info!("Kept existing {}", rel);
            ApiError(ErrorCode::AlreadyExists)
        }
        ReceiveError::Io(e) => {
            tracing::error!("Failed to store {}: {}", dest.display(), e);
            ApiError(ErrorCode::InternalError)
        }
    })?;

    tracing::info!("File received: {} ({} bytes)", dest.display(), report.written);
    Ok(StatusCode::NO_CONTENT)
}

async fn not_found_handler() -> ApiError {
    ApiError(ErrorCode::EndpointNotFound)
}

/// Serve the router on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<(), AppError> {
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Network(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Start the HTTP server
pub async fn start_server(settings: &ServerSettings) -> Result<(), AppError> {
    let state = Arc::new(ServerState::new(settings));
    let addr = format!("{}:{}", settings.bind_address(), settings.port);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Network(format!("Failed to bind to {}: {}", addr, e)))?;
    let local: SocketAddr = listener.local_addr()?;

    if settings.server_address.trim().is_empty() {
        match local_ip_address::local_ip() {
            Ok(ip) => tracing::info!(
                "Starting server. Reachable from localhost and from {}:{}",
                ip,
                local.port()
            ),
            Err(_) => tracing::info!(
                "Starting server. Reachable from localhost and your LAN address on port {}",
                local.port()
            ),
        }
    } else {
        tracing::info!("Starting server. Server address: {}", local);
    }
    tracing::info!("Storing files under {}", settings.root_dir.display());

    serve(listener, state).await
}
