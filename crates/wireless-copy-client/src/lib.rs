// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - Sending side
//
// MirrorClient speaks the HTTP protocol; SessionOrchestrator decides what
// to send. Console rendering lives in output.rs and prompt.rs.

pub mod client;
pub mod output;
pub mod progress;
pub mod prompt;
pub mod session;

pub use client::{MirrorClient, TransferError};
pub use progress::{ProgressSampler, ProgressSink};
pub use prompt::ConsolePrompt;
pub use session::{SessionObserver, SessionOrchestrator, SessionReport};
