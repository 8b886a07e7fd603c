// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - Session orchestration
//
// A session authenticates once, walks the source tree sequentially and
// logs out exactly once, whatever happened to the individual files.

use crate::client::MirrorClient;
use crate::progress::{NoProgress, ProgressSink};
use std::sync::Arc;
use std::time::Duration;
use wireless_copy_core::{
    scan_directory, AppError, ClientSettings, ConflictResolver, FileDescriptor, OverwritePolicy,
    Resolution, TransferOutcome,
};

/// Notified as each file is processed
pub trait SessionObserver: Send + Sync {
    fn file_started(&self, _file: &FileDescriptor) {}
    fn file_finished(&self, _file: &FileDescriptor, _outcome: TransferOutcome) {}
    fn logout_failed(&self, _error: &AppError) {}
}

/// Observer that ignores every event
pub struct SilentObserver;

impl SessionObserver for SilentObserver {}

/// What happened to each file, in processing order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub outcomes: Vec<(String, TransferOutcome)>,
    pub logout_error: Option<String>,
}

impl SessionReport {
    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn outcome_of(&self, rel_path: &str) -> Option<TransferOutcome> {
        self.outcomes
            .iter()
            .find(|(path, _)| path == rel_path)
            .map(|(_, outcome)| *outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.count(TransferOutcome::Failed) > 0
    }
}

/// Drives one mirroring run from authentication to logout
pub struct SessionOrchestrator {
    settings: ClientSettings,
    resolver: ConflictResolver,
    observer: Box<dyn SessionObserver>,
    progress: Arc<dyn ProgressSink>,
    progress_interval: Option<Duration>,
}

impl SessionOrchestrator {
    pub fn new(settings: ClientSettings, resolver: ConflictResolver) -> Self {
        Self {
            settings,
            resolver,
            observer: Box::new(SilentObserver),
            progress: Arc::new(NoProgress),
            progress_interval: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Run the session.
    ///
    /// Fails only when the source tree cannot be read or authentication
    /// is refused; per-file problems end up in the report.
    pub async fn run(&self) -> Result<SessionReport, AppError> {
        let files = scan_directory(&self.settings.source_dir)?;
        tracing::debug!(
            "Found {} files under {}",
            files.len(),
            self.settings.source_dir.display()
        );

        let mut client = MirrorClient::new(&self.settings)?;
        if let Some(interval) = self.progress_interval {
            client = client.with_progress_interval(interval);
        }
        client
            .authenticate(&self.settings.authentication_key)
            .await?;

        let mut report = SessionReport::default();
        for file in &files {
            let Some(suffix) = self.settings.allowed_extensions.matching(&file.rel_path) else {
                tracing::debug!("Ignoring {}: extension not allowed", file.rel_path);
                continue;
            };
            tracing::debug!("{} matched allowed suffix {:?}", file.rel_path, suffix);

            self.observer.file_started(file);
            let outcome = self.mirror_file(&client, file).await;
            self.observer.file_finished(file, outcome);
            report.outcomes.push((file.rel_path.clone(), outcome));
        }

        if let Err(e) = client.logout().await {
            tracing::warn!("Logout failed: {}", e);
            self.observer.logout_failed(&e);
            report.logout_error = Some(e.to_string());
        }

        Ok(report)
    }

    async fn mirror_file(&self, client: &MirrorClient, file: &FileDescriptor) -> TransferOutcome {
        let remote = match client.file_info(&file.rel_path).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("Could not query {}: {}", file.rel_path, e);
                return TransferOutcome::Failed;
            }
        };

        let allow_overwrite = match remote {
            None => self.resolver.policy() == OverwritePolicy::AlwaysOverwrite,
            Some(remote) => match self.resolver.resolve(&remote, file) {
                Resolution::Overwrite => true,
                Resolution::Skip => return TransferOutcome::Skipped,
            },
        };

        let source = self.settings.source_dir.join(&file.rel_path);
        match client
            .upload(file, &source, allow_overwrite, self.progress.clone())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let outcome = e.outcome();
                if outcome == TransferOutcome::Failed {
                    tracing::warn!("Upload of {} failed: {}", file.rel_path, e);
                } else {
                    tracing::debug!("Upload of {} declined: {}", file.rel_path, e);
                }
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_queries() {
        let report = SessionReport {
            outcomes: vec![
                ("a.txt".into(), TransferOutcome::Uploaded),
                ("b.txt".into(), TransferOutcome::Failed),
            ],
            logout_error: None,
        };
        assert_eq!(report.outcome_of("b.txt"), Some(TransferOutcome::Failed));
        assert_eq!(report.outcome_of("c.txt"), None);
        assert!(report.has_failures());
        assert_eq!(report.count(TransferOutcome::Skipped), 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        // Nothing listens on the discard port
        let settings = ClientSettings {
            authentication_key: "abc123".into(),
            endpoint: "127.0.0.1:9".into(),
            source_dir: dir.path().to_path_buf(),
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let resolver = ConflictResolver::new(
            OverwritePolicy::SkipExisting,
            Box::new(|_: &FileDescriptor, _: &wireless_copy_core::RemoteFileInfo| false),
        );

        let result = SessionOrchestrator::new(settings, resolver).run().await;
        assert!(matches!(result, Err(AppError::Network(_))));
    }
}
