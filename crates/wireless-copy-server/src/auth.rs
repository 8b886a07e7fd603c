// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Server - Token authority
//
// Tokens live only in process memory and are valid until revoked.

use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// Bytes of OS entropy behind every token
const TOKEN_BYTES: usize = 32;

/// Rejected `/auth/` attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("authentication key mismatch")]
pub struct Unauthorized;

/// Issues, validates and revokes bearer tokens
pub struct TokenAuthority {
    secret: String,
    active: RwLock<HashSet<String>>,
}

/// Short prefix safe to put in logs
fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

impl TokenAuthority {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            active: RwLock::new(HashSet::new()),
        }
    }

    /// Exchange the shared secret for a fresh token.
    ///
    /// Both sides are trimmed before the exact comparison.
    pub async fn issue(&self, presented: &str) -> Result<String, Unauthorized> {
        if presented.trim() != self.secret.trim() {
            tracing::warn!("Rejected authentication attempt");
            return Err(Unauthorized);
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let mut active = self.active.write().await;
        active.insert(token.clone());
        tracing::debug!(
            "Issued token {}… ({} active)",
            token_prefix(&token),
            active.len()
        );

        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> bool {
        self.active.read().await.contains(token)
    }

    /// Remove `token` from the active set; absent tokens are ignored
    pub async fn revoke(&self, token: &str) {
        if self.active.write().await.remove(token) {
            tracing::debug!("Revoked token {}…", token_prefix(token));
        }
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_issue_then_validate_until_revoked() {
        let authority = TokenAuthority::new("abc123");
        let token = authority.issue("abc123").await.unwrap();

        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(authority.validate(&token).await);

        authority.revoke(&token).await;
        assert!(!authority.validate(&token).await);
    }

    #[tokio::test]
    async fn test_secret_is_trimmed() {
        let authority = TokenAuthority::new(" abc123\n");
        assert!(authority.issue("abc123\r\n").await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_secret_is_unauthorized() {
        let authority = TokenAuthority::new("abc123");
        assert_eq!(authority.issue("abc124").await, Err(Unauthorized));
        assert_eq!(authority.issue("").await, Err(Unauthorized));
        assert_eq!(authority.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let authority = TokenAuthority::new("abc123");
        let token = authority.issue("abc123").await.unwrap();

        authority.revoke(&token).await;
        authority.revoke(&token).await;
        authority.revoke("never-issued").await;
        assert_eq!(authority.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let authority = TokenAuthority::new("abc123");
        let a = authority.issue("abc123").await.unwrap();
        let b = authority.issue("abc123").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(authority.active_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issue_and_revoke() {
        let authority = Arc::new(TokenAuthority::new("abc123"));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let authority = authority.clone();
            handles.push(tokio::spawn(async move {
                let token = authority.issue("abc123").await.unwrap();
                assert!(authority.validate(&token).await);
                authority.revoke(&token).await;
                token
            }));
        }

        let mut kept = Vec::new();
        for _ in 0..8 {
            kept.push(authority.issue("abc123").await.unwrap());
        }
        for handle in handles {
            let token = handle.await.unwrap();
            assert!(!authority.validate(&token).await);
        }

        assert_eq!(authority.active_count().await, kept.len());
    }
}
