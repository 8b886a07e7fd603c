// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Core - Shared logic for the client and the server
//
// This crate provides:
// - Wire types, error codes and AppError
// - Protocol constants and header/parameter helpers
// - SettingsLoader for the env file and environment variables
// - ConflictResolver for name collisions
// - Source tree scanning and extension filtering
//
// Networking lives in the server and client crates.

pub mod conflict;
pub mod protocol;
pub mod scan;
pub mod settings;
pub mod types;

// Re-export commonly used items
pub use conflict::{ConfirmPrompt, ConflictResolver, Resolution};
pub use scan::{scan_directory, ExtensionFilter};
pub use settings::{ClientSettings, ServerSettings, SettingsLoader};
pub use types::{
    AppError, AuthResponse, ErrorBody, ErrorCode, FileDescriptor, InfoResponse, OverwritePolicy,
    RemoteFileInfo, TransferOutcome,
};
