// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - Interactive overwrite confirmation

use chrono::{DateTime, Local};
use console::{style, Term};
use humansize::{format_size, DECIMAL};
use tokio::runtime::{Handle, RuntimeFlavor};
use wireless_copy_core::{protocol::whole_seconds, ConfirmPrompt, FileDescriptor, RemoteFileInfo};

/// Asks on the terminal before replacing a remote file
pub struct ConsolePrompt {
    term: Term,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmPrompt for ConsolePrompt {
    fn confirm_overwrite(&self, local: &FileDescriptor, remote: &RemoteFileInfo) -> bool {
        let (remote_date, local_date) = (format_mtime(remote.mtime), format_mtime(local.mtime));
        let (remote_size, local_size) = (
            format_size(remote.size, DECIMAL),
            format_size(local.size, DECIMAL),
        );
        let dates_differ = whole_seconds(remote.mtime) != whole_seconds(local.mtime);
        let sizes_differ = remote.size != local.size;

        let lines = [
            format!("{} already exists on the server", style(&local.rel_path).bold()),
            format!(
                "  Remote: {}  {}",
                highlight(&remote_date, dates_differ),
                highlight(&remote_size, sizes_differ)
            ),
            format!(
                "  Local:  {}  {}",
                highlight(&local_date, dates_differ),
                highlight(&local_size, sizes_differ)
            ),
        ];
        for line in lines {
            if self.term.write_line(&line).is_err() {
                return false;
            }
        }

        if self.term.write_str("Overwrite? (y/N) ").is_err() {
            return false;
        }
        match blocking(|| self.term.read_line()) {
            Ok(answer) => is_affirmative(&answer),
            Err(e) => {
                tracing::debug!("Could not read answer: {}", e);
                false
            }
        }
    }
}

/// Run a blocking terminal read without stalling other tasks.
///
/// `block_in_place` is only allowed on the multi-threaded runtime; elsewhere
/// the closure runs inline.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn highlight(value: &str, differs: bool) -> String {
    if differs {
        style(value).yellow().bold().to_string()
    } else {
        value.to_string()
    }
}

/// Local time as `%Y-%m-%d %H:%M:%S`
pub fn format_mtime(mtime: f64) -> String {
    DateTime::from_timestamp(whole_seconds(mtime), 0)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
