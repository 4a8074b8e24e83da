//! Revocation ledger
//!
//! Single source of truth for whether an issued token may still be honored.
//! Every protected request checks it; rotation, sign-out and tamper handling
//! append to it. Records are never deleted.

pub mod journal;
pub mod store;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::types::{Result, TurnstileError};

pub use journal::JournalRevocationStore;
pub use store::{MemoryRevocationStore, RevocationRecord, RevocationStore};

/// Prefix of IDs minted for tokens whose own ID could not be read.
pub const UNKNOWN_ID_PREFIX: &str = "unknown-";

/// A fresh placeholder ID for a token that could not be parsed.
///
/// The raw value is still revoked under it.
pub fn unknown_token_id() -> String {
    format!("{UNKNOWN_ID_PREFIX}{}", Uuid::new_v4())
}

/// A token to revoke: its ID and the exact value that was presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationTarget {
    pub token_id: String,
    pub token_value: String,
}

impl RevocationTarget {
    pub fn new(token_id: impl Into<String>, token_value: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            token_value: token_value.into(),
        }
    }

    /// Target for bearer material whose ID is unknown.
    pub fn unknown(token_value: impl Into<String>) -> Self {
        Self::new(unknown_token_id(), token_value)
    }
}

/// Token validity ledger over a pluggable store.
#[derive(Clone)]
pub struct RevocationLedger {
    store: Arc<dyn RevocationStore>,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store }
    }

    /// Ledger over a process-local store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRevocationStore::new()))
    }

    /// True iff neither the ID nor the value has been revoked.
    pub async fn is_valid(&self, token_id: &str, token_value: &str) -> Result<bool> {
        Ok(!self.store.contains(token_id, token_value).await?)
    }

    /// Revoke one token.
    ///
    /// Returns true if this call recorded the token ID; revoking an
    /// already-revoked token is a no-op that returns false.
    pub async fn revoke(&self, token_id: &str, token_value: &str) -> Result<bool> {
        let claimed = self
            .store
            .append(RevocationRecord::new(token_id, token_value))
            .await?;

        if claimed {
            info!(token_id = %token_id, "Token revoked");
        }
        Ok(claimed)
    }

    /// Revoke an access/refresh pair; both must land or the call fails.
    ///
    /// Returns true only when this call was the first to record the refresh
    /// token's ID, so of two rotations racing on the same pair exactly one
    /// sees `true`.
    pub async fn revoke_pair(
        &self,
        access: &RevocationTarget,
        refresh: &RevocationTarget,
    ) -> Result<bool> {
        let claims = self.claim_all(&[access.clone(), refresh.clone()]).await?;
        Ok(claims.get(1).copied().unwrap_or(false))
    }

    /// Revoke every target concurrently.
    ///
    /// Each failed revocation is retried once. If any target still fails the
    /// whole call fails, so callers never proceed with a half-revoked set.
    pub async fn revoke_all(&self, targets: &[RevocationTarget]) -> Result<()> {
        self.claim_all(targets).await.map(|_| ())
    }

    /// Per-target claim outcomes, in order.
    async fn claim_all(&self, targets: &[RevocationTarget]) -> Result<Vec<bool>> {
        let attempts = targets.iter().map(|target| self.revoke_with_retry(target));
        let mut claims = Vec::with_capacity(targets.len());
        let mut failures = Vec::new();
        for outcome in join_all(attempts).await {
            match outcome {
                Ok(claimed) => claims.push(claimed),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            return Ok(claims);
        }

        error!(
            failed = failures.len(),
            total = targets.len(),
            "Revocation incomplete after retry"
        );
        Err(TurnstileError::Storage(format!(
            "{} of {} revocations failed: {}",
            failures.len(),
            targets.len(),
            failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        )))
    }

    async fn revoke_with_retry(&self, target: &RevocationTarget) -> Result<bool> {
        match self.revoke(&target.token_id, &target.token_value).await {
            Ok(claimed) => Ok(claimed),
            Err(err) => {
                warn!(token_id = %target.token_id, error = %err, "Revocation failed, retrying");
                self.revoke(&target.token_id, &target.token_value).await
            }
        }
    }

    /// Number of records in the ledger.
    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }
}
