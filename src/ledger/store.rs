//! Revocation record storage
//!
//! The ledger only needs two things from storage: a membership test keyed by
//! either token ID or raw token value, and an append that is durable by the
//! time it returns.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};

use crate::types::Result;

/// One invalidated token.
///
/// Presence of either field in the ledger invalidates the token for good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRecord {
    pub token_id: String,
    pub token_value: String,
    pub disabled_at: DateTime<Utc>,
}

impl RevocationRecord {
    pub fn new(token_id: impl Into<String>, token_value: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            token_value: token_value.into(),
            disabled_at: Utc::now(),
        }
    }
}

/// Backing storage for the revocation ledger.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    /// True if either key appears in any stored record.
    async fn contains(&self, token_id: &str, token_value: &str) -> Result<bool>;

    /// Durably store a record.
    ///
    /// Returns true only for the call that first records the token ID, so
    /// two racing appends of the same ID see exactly one `true`. Nothing is
    /// written when both keys are already present.
    async fn append(&self, record: RevocationRecord) -> Result<bool>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;
}

/// Membership index over both record keys.
#[derive(Debug, Default)]
pub(crate) struct RevocationIndex {
    ids: DashSet<String>,
    values: DashSet<String>,
    records: AtomicUsize,
}

impl RevocationIndex {
    pub(crate) fn contains(&self, token_id: &str, token_value: &str) -> bool {
        self.ids.contains(token_id) || self.values.contains(token_value)
    }

    pub(crate) fn covers(&self, record: &RevocationRecord) -> bool {
        self.ids.contains(&record.token_id) && self.values.contains(&record.token_value)
    }

    /// Add both keys; true iff the token ID was not yet indexed.
    pub(crate) fn insert(&self, record: &RevocationRecord) -> bool {
        let new_value = self.values.insert(record.token_value.clone());
        let new_id = self.ids.insert(record.token_id.clone());
        if new_id || new_value {
            self.records.fetch_add(1, Ordering::Relaxed);
        }
        new_id
    }

    pub(crate) fn len(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }
}

/// Process-local store. Records do not survive a restart; dev mode only.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    index: RevocationIndex,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn contains(&self, token_id: &str, token_value: &str) -> Result<bool> {
        Ok(self.index.contains(token_id, token_value))
    }

    async fn append(&self, record: RevocationRecord) -> Result<bool> {
        Ok(self.index.insert(&record))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_by_either_key() {
        let store = MemoryRevocationStore::new();
        store
            .append(RevocationRecord::new("id-1", "value-1"))
            .await
            .unwrap();

        assert!(store.contains("id-1", "other").await.unwrap());
        assert!(store.contains("other", "value-1").await.unwrap());
        assert!(!store.contains("id-2", "value-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let store = MemoryRevocationStore::new();
        assert!(store.append(RevocationRecord::new("a", "b")).await.unwrap());
        assert!(!store.append(RevocationRecord::new("a", "b")).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);

        // Same value under a new sentinel id still adds the id
        assert!(store.append(RevocationRecord::new("c", "b")).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 2);

        // A known id with a new value records the value but claims nothing
        assert!(!store.append(RevocationRecord::new("a", "d")).await.unwrap());
        assert!(store.contains("x", "d").await.unwrap());
    }

    #[tokio::test]
    async fn test_racing_appends_claim_once() {
        let store = std::sync::Arc::new(MemoryRevocationStore::new());
        let attempts = (0..16).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append(RevocationRecord::new("jti-1", format!("value-{}", i % 2)))
                    .await
                    .unwrap()
            })
        });

        let claimed = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|outcome| *outcome.as_ref().unwrap())
            .count();
        assert_eq!(claimed, 1);
    }

    #[test]
    fn test_empty_store_revokes_nothing() {
        let store = MemoryRevocationStore::new();
        let revoked = tokio_test::assert_ok!(tokio_test::block_on(store.contains("id", "value")));
        assert!(!revoked);
        assert_eq!(tokio_test::block_on(store.len()).unwrap(), 0);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = RevocationRecord::new("id", "value");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tokenId"], "id");
        assert_eq!(json["tokenValue"], "value");
        assert!(json["disabledAt"].is_string());
    }
}
