// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - HTTP client for mirroring files
//
// One MirrorClient holds one bearer token for the lifetime of a session.
// Uploads stream the file from disk; nothing is buffered whole.

use crate::progress::{ProgressSampler, ProgressSink};
use futures::StreamExt;
use humansize::{format_size, DECIMAL};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use std::{path::Path, sync::Arc, time::Duration};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use wireless_copy_core::{
    protocol::{
        self, AUTH_HEADER, AUTH_PATH, CHUNK_SIZE, INFO_PATH, INFO_PATH_PARAM, LAST_EDIT_PARAM,
        LOGOUT_PATH, OVERWRITE_PARAM, SYSTYPE_PARAM, UPLOAD_PATH, UPLOAD_PATH_PARAM,
    },
    AppError, AuthResponse, ClientSettings, ErrorBody, ErrorCode, FileDescriptor, InfoResponse,
    RemoteFileInfo, TransferOutcome,
};

/// Why a single upload did not complete
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("File already exists on the server")]
    AlreadyExists,

    #[error("Token rejected by the server")]
    Unauthorized,

    #[error("Server rejected the upload ({status})")]
    Rejected { status: u16, code: Option<ErrorCode> },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// A refusal to overwrite is a skip; anything else is a failure
    pub fn outcome(&self) -> TransferOutcome {
        match self {
            TransferError::AlreadyExists => TransferOutcome::Skipped,
            _ => TransferOutcome::Failed,
        }
    }
}

/// Client for one mirroring session against one server
pub struct MirrorClient {
    http_client: Client,
    base_url: String,
    /// `<scheme> <token>` once authenticated
    authorization: Option<String>,
    progress_interval: Duration,
}

impl MirrorClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, AppError> {
        let http_client = Client::builder()
            // No total timeout; large files can take arbitrarily long
            .connect_timeout(settings.connect_timeout())
            .read_timeout(settings.read_timeout())
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: normalize_endpoint(&settings.endpoint),
            authorization: None,
            progress_interval: crate::progress::DEFAULT_PROGRESS_INTERVAL,
        })
    }

    /// Change how often upload progress is reported
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.authorization.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Some(value) => builder.header(AUTH_HEADER, value),
            None => builder,
        }
    }

    /// Exchange the shared secret for a bearer token
    pub async fn authenticate(&mut self, secret: &str) -> Result<(), AppError> {
        let response = self
            .http_client
            .post(self.url(AUTH_PATH))
            .body(secret.to_string())
            .send()
            .await
            .map_err(|e| network_error("Authentication request failed", e))?;

        match response.status() {
            StatusCode::OK => {
                let auth: AuthResponse = response.json().await.map_err(|e| {
                    AppError::Serialization(format!("Failed to parse token: {}", e))
                })?;
                tracing::debug!("Authenticated with {} scheme", auth.auth_type);
                self.authorization = Some(auth.header_value());
                Ok(())
            }
            StatusCode::FORBIDDEN => Err(AppError::Unauthorized(
                "the server rejected the authentication key".to_string(),
            )),
            _ => Err(protocol_error(response).await),
        }
    }

    /// Size and mtime of `rel_path` on the server, or None if absent
    pub async fn file_info(&self, rel_path: &str) -> Result<Option<RemoteFileInfo>, AppError> {
        let response = self
            .authorized(self.http_client.get(self.url(INFO_PATH)))
            .query(&[
                (INFO_PATH_PARAM, rel_path),
                (SYSTYPE_PARAM, protocol::system_type()),
            ])
            .send()
            .await
            .map_err(|e| network_error("Info request failed", e))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => {
                let info: InfoResponse = response.json().await.map_err(|e| {
                    AppError::Serialization(format!("Failed to parse file info: {}", e))
                })?;
                Ok(Some(RemoteFileInfo::from(&info)))
            }
            StatusCode::FORBIDDEN => Err(AppError::Unauthorized(
                "token rejected by the server".to_string(),
            )),
            _ => Err(protocol_error(response).await),
        }
    }

    /// Stream `source` to the server as `file.rel_path`
    pub async fn upload(
        &self,
        file: &FileDescriptor,
        source: &Path,
        allow_overwrite: bool,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<TransferOutcome, TransferError> {
        let handle = File::open(source).await?;
        let size = handle.metadata().await?.len();
        if size != file.size {
            tracing::debug!(
                "{} changed size since the scan ({} -> {})",
                file.rel_path,
                file.size,
                size
            );
        }

        let mut sampler =
            ProgressSampler::new(sink, self.progress_interval, format_size(size, DECIMAL));
        let stream = ReaderStream::with_capacity(handle, CHUNK_SIZE).inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                sampler.record(chunk.len());
            }
        });

        let last_edit = protocol::format_last_edit(file.mtime);
        let response = self
            .authorized(self.http_client.put(self.url(UPLOAD_PATH)))
            .query(&[
                (UPLOAD_PATH_PARAM, file.rel_path.as_str()),
                (LAST_EDIT_PARAM, last_edit.as_str()),
                (OVERWRITE_PARAM, protocol::overwrite_flag(allow_overwrite)),
                (SYSTYPE_PARAM, protocol::system_type()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(Body::wrap_stream(stream))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Sent {} ({} bytes)", file.rel_path, size);
            return Ok(TransferOutcome::Uploaded);
        }

        let code = error_code(response).await;
        tracing::debug!("Upload of {} refused: {} {:?}", file.rel_path, status, code);
        match status {
            StatusCode::CONFLICT => Err(TransferError::AlreadyExists),
            StatusCode::FORBIDDEN => Err(TransferError::Unauthorized),
            _ => Err(TransferError::Rejected {
                status: status.as_u16(),
                code,
            }),
        }
    }

    /// Revoke the session token. The token is dropped locally either way.
    pub async fn logout(&mut self) -> Result<(), AppError> {
        let Some(authorization) = self.authorization.take() else {
            return Ok(());
        };

        let response = self
            .http_client
            .get(self.url(LOGOUT_PATH))
            .header(AUTH_HEADER, authorization)
            .send()
            .await
            .map_err(|e| network_error("Logout request failed", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(protocol_error(response).await)
        }
    }
}

/// Base URL without a trailing slash; a bare `host:port` gets `http://`
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn network_error(context: &str, e: reqwest::Error) -> AppError {
    if e.is_connect() {
        AppError::Network(format!("{}: cannot connect ({})", context, e))
    } else if e.is_timeout() {
        AppError::Network(format!("{}: timed out", context))
    } else {
        AppError::Network(format!("{}: {}", context, e))
    }
}

async fn error_code(response: Response) -> Option<ErrorCode> {
    response.json::<ErrorBody>().await.ok().map(|body| body.error)
}

async fn protocol_error(response: Response) -> AppError {
    let status = response.status().as_u16();
    AppError::Protocol {
        status,
        code: error_code(response).await,
    }
}
