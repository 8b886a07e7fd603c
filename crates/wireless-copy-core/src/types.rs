// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Core - Type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session-wide rule applied when a local file collides with a remote one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Ask the user for every collision
    #[default]
    Prompt,
    /// Never replace a remote file
    SkipExisting,
    /// Always replace the remote file
    AlwaysOverwrite,
    /// Replace only when size or modification time differ
    OverwriteIfChanged,
}

impl OverwritePolicy {
    /// Numeric code used by the env file and the `--overwrite` flag
    pub fn code(&self) -> u8 {
        match self {
            Self::Prompt => 0,
            Self::SkipExisting => 1,
            Self::AlwaysOverwrite => 2,
            Self::OverwriteIfChanged => 3,
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => write!(f, "prompt"),
            Self::SkipExisting => write!(f, "skip"),
            Self::AlwaysOverwrite => write!(f, "always"),
            Self::OverwriteIfChanged => write!(f, "if-changed"),
        }
    }
}

impl FromStr for OverwritePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "prompt" => Ok(Self::Prompt),
            "1" | "skip" | "skip-existing" => Ok(Self::SkipExisting),
            "2" | "always" | "always-overwrite" => Ok(Self::AlwaysOverwrite),
            "3" | "if-changed" | "overwrite-if-changed" => Ok(Self::OverwriteIfChanged),
            other => Err(AppError::InvalidConfig(format!(
                "unknown overwrite policy '{}' (expected 0-3, prompt, skip, always or if-changed)",
                other
            ))),
        }
    }
}

/// A local file selected for transfer
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    /// Path relative to the source root, `/`-separated
    pub rel_path: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time in seconds since the epoch
    pub mtime: f64,
}

/// What the server reports about an existing remote file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteFileInfo {
    pub size: u64,
    pub mtime: f64,
}

/// Per-file result of a session, used for reporting only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded,
    Skipped,
    Failed,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploaded => write!(f, "uploaded"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Application error codes carried in `{"error": ...}` bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    MissingParams,
    InvalidParams,
    AlreadyExists,
    EndpointNotFound,
    InternalError,
}

impl ErrorCode {
    /// HTTP status paired with this code
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 403,
            Self::MissingParams | Self::InvalidParams => 400,
            Self::AlreadyExists => 409,
            Self::EndpointNotFound => 404,
            Self::InternalError => 500,
        }
    }
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
}

/// Successful `/auth/` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    /// Scheme the client must put in front of the token
    pub auth_type: String,
}

impl AuthResponse {
    /// Value for the bearer header, `"<scheme> <token>"`
    pub fn header_value(&self) -> String {
        format!("{} {}", self.auth_type, self.token)
    }
}

/// `/info/` response for a file that exists on the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Always `already_exists`; kept for wire compatibility
    pub error: ErrorCode,
    pub file_size: u64,
    pub last_edited: f64,
}

impl From<&InfoResponse> for RemoteFileInfo {
    fn from(info: &InfoResponse) -> Self {
        RemoteFileInfo {
            size: info.file_size,
            mtime: info.last_edited,
        }
    }
}

/// Error types for the application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server returned {code:?} ({status})")]
    Protocol { status: u16, code: Option<ErrorCode> },

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileIo(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
