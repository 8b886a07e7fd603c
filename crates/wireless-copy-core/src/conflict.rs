// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Core - Conflict resolution
//
// Decides the fate of a local file whose name already exists on the server.

use crate::protocol::whole_seconds;
use crate::types::{FileDescriptor, OverwritePolicy, RemoteFileInfo};

/// Outcome of a collision check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Upload with the overwrite flag set
    Overwrite,
    /// Leave the remote file alone and send nothing
    Skip,
}

/// Asks whether a remote file should be replaced
pub trait ConfirmPrompt: Send + Sync {
    fn confirm_overwrite(&self, local: &FileDescriptor, remote: &RemoteFileInfo) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&FileDescriptor, &RemoteFileInfo) -> bool + Send + Sync,
{
    fn confirm_overwrite(&self, local: &FileDescriptor, remote: &RemoteFileInfo) -> bool {
        self(local, remote)
    }
}

/// True when size or mtime differ.
///
/// Times are compared in whole seconds because the server truncates
/// `last_edit` before storing it.
pub fn has_changed(remote: &RemoteFileInfo, local: &FileDescriptor) -> bool {
    remote.size != local.size || whole_seconds(remote.mtime) != whole_seconds(local.mtime)
}

/// Applies one overwrite policy to every collision in a session
pub struct ConflictResolver {
    policy: OverwritePolicy,
    prompt: Box<dyn ConfirmPrompt>,
}

impl ConflictResolver {
    pub fn new(policy: OverwritePolicy, prompt: Box<dyn ConfirmPrompt>) -> Self {
        Self { policy, prompt }
    }

    pub fn policy(&self) -> OverwritePolicy {
        self.policy
    }

    /// Decide what to do with `local` given that `remote` already exists
    pub fn resolve(&self, remote: &RemoteFileInfo, local: &FileDescriptor) -> Resolution {
        let overwrite = match self.policy {
            OverwritePolicy::OverwriteIfChanged => has_changed(remote, local),
            OverwritePolicy::SkipExisting => false,
            OverwritePolicy::AlwaysOverwrite => true,
            OverwritePolicy::Prompt => self.prompt.confirm_overwrite(local, remote),
        };

        tracing::debug!(
            "Collision on {} under {}: {}",
            local.rel_path,
            self.policy,
            if overwrite { "overwrite" } else { "skip" }
        );

        if overwrite {
            Resolution::Overwrite
        } else {
            Resolution::Skip
        }
    }
}
