// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - Console status lines

use crate::progress::ProgressSink;
use crate::session::{SessionObserver, SessionReport};
use console::{style, Term};
use humansize::{format_size, DECIMAL};
use wireless_copy_core::{AppError, FileDescriptor, TransferOutcome};

/// Prints one styled line per file event
pub struct ConsoleObserver {
    term: Term,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn line(&self, text: String) {
        // The progress line may still be on screen
        let _ = self.term.clear_line();
        let _ = self.term.write_line(&text);
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionObserver for ConsoleObserver {
    fn file_started(&self, file: &FileDescriptor) {
        self.line(format!("{} {}", style("Uploading").blue(), file.rel_path));
    }

    fn file_finished(&self, file: &FileDescriptor, outcome: TransferOutcome) {
        let text = match outcome {
            TransferOutcome::Uploaded => format!(
                "{} {}",
                style("Successful file copy:").green(),
                file.rel_path
            ),
            TransferOutcome::Skipped => format!(
                "{} {}",
                style("Skipped file copy:").black().bright(),
                file.rel_path
            ),
            TransferOutcome::Failed => {
                format!("{} {}", style("Failed file copy:").red(), file.rel_path)
            }
        };
        self.line(text);
    }

    fn logout_failed(&self, error: &AppError) {
        self.line(format!("{} {}", style("Logout failed:").yellow(), error));
    }
}

/// Rewrites a single `<n> uploaded [Total: <size>]` line in place
pub struct ConsoleProgress {
    term: Term,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn observe(&self, bytes_so_far: u64, total_label: &str) {
        let _ = self.term.clear_line();
        let _ = self
            .term
            .write_str(&progress_line(bytes_so_far, total_label));
    }
}

pub fn progress_line(bytes_so_far: u64, total_label: &str) -> String {
    format!(
        "{} uploaded [Total: {}]",
        format_size(bytes_so_far, DECIMAL),
        total_label
    )
}

/// One-line tally printed when the session ends
pub fn summary_line(report: &SessionReport) -> String {
    format!(
        "{} uploaded, {} skipped, {} failed",
        report.count(TransferOutcome::Uploaded),
        report.count(TransferOutcome::Skipped),
        report.count(TransferOutcome::Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let line = progress_line(1500, "3 kB");
        assert!(line.starts_with("1.5"));
        assert!(line.ends_with(" uploaded [Total: 3 kB]"));
    }

    #[test]
    fn test_summary_line() {
        let report = SessionReport {
            outcomes: vec![
                ("a.txt".into(), TransferOutcome::Uploaded),
                ("b.txt".into(), TransferOutcome::Skipped),
                ("c.txt".into(), TransferOutcome::Uploaded),
            ],
            logout_error: None,
        };
        assert_eq!(summary_line(&report), "2 uploaded, 1 skipped, 0 failed");
    }
}
