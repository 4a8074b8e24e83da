//! Single-use, time-boxed server key pairs for key agreement.
//!
//! A client asks for a public key, receives an opaque handle with it, and
//! later presents the handle together with its own public key and a sealed
//! field. The private half lives here until it is consumed once or expires,
//! whichever comes first.
//!
//! # Concurrency
//!
//! All mutation (insert, consume, evict) happens under one async mutex that
//! guards both the key map and the expiry index, so a handle can never be
//! handed out twice and the index never drifts from the map.
//!
//! # Eviction
//!
//! Expired entries are removed proactively by a sweeper task that exists only
//! while the store is non-empty. It is spawned on the empty to non-empty
//! transition, sleeps until the nearest expiry (capped at
//! `max_sweep_interval`), and exits once the store is empty again. A consume
//! that empties the store cancels it directly.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use p384::SecretKey;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::agreement::{generate_private_key, public_key_bytes};
use crate::types::AuthError;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the ephemeral key store.
#[derive(Debug, Clone)]
pub struct EphemeralKeyConfig {
    /// How long a handle stays consumable
    pub ttl: Duration,

    /// Upper bound on how long the sweeper sleeps between passes
    pub max_sweep_interval: Duration,
}

impl Default for EphemeralKeyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),                // 2 minutes
            max_sweep_interval: Duration::from_secs(120), // never sleep longer than one TTL
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A handle and public key handed to a client.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    /// Opaque handle naming the stored private key
    pub handle: Uuid,

    /// Raw 96-byte P-384 public key
    pub public_key: Vec<u8>,

    /// Time left before the handle expires
    pub expires_in: Duration,
}

/// Private key awaiting its single consumption.
struct EphemeralKeyRecord {
    private_key: SecretKey,
    created_at: Instant,
    expires_at: Instant,
}

struct Sweeper {
    /// Dropping this cancels the task
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<Uuid, EphemeralKeyRecord>,
    expiry: BTreeSet<(Instant, Uuid)>,
    sweeper: Option<Sweeper>,
}

impl StoreState {
    fn insert(&mut self, handle: Uuid, record: EphemeralKeyRecord) {
        self.expiry.insert((record.expires_at, handle));
        self.entries.insert(handle, record);
    }

    fn take(&mut self, handle: &Uuid) -> Option<EphemeralKeyRecord> {
        let record = self.entries.remove(handle)?;
        self.expiry.remove(&(record.expires_at, *handle));
        Some(record)
    }

    /// Remove every entry whose expiry is at or before `now`.
    fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(&(expires_at, handle)) = self.expiry.first() {
            if expires_at > now {
                break;
            }
            self.expiry.pop_first();
            if self.entries.remove(&handle).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    fn next_wake(&self, now: Instant, cap: Duration) -> Option<Instant> {
        let &(earliest, _) = self.expiry.first()?;
        Some(earliest.min(now + cap))
    }

    fn cancel_sweeper(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            drop(sweeper.cancel);
            // The task notices the closed channel on its next poll
            drop(sweeper.task);
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct StoreCounters {
    issued: AtomicU64,
    consumed: AtomicU64,
    evicted: AtomicU64,
}

/// Snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EphemeralKeyStats {
    pub live: usize,
    pub issued: u64,
    pub consumed: u64,
    pub evicted: u64,
    pub sweeper_running: bool,
}

// =============================================================================
// Store
// =============================================================================

struct Inner {
    state: Mutex<StoreState>,
    config: EphemeralKeyConfig,
    counters: StoreCounters,
}

/// Store of single-use server private keys.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct EphemeralKeyStore {
    inner: Arc<Inner>,
}

impl EphemeralKeyStore {
    /// Create an empty store.
    pub fn new(config: EphemeralKeyConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState::default()),
                config,
                counters: StoreCounters::default(),
            }),
        }
    }

    /// Create a store with the default two-minute TTL.
    pub fn with_defaults() -> Self {
        Self::new(EphemeralKeyConfig::default())
    }

    /// Generate a key pair, keep the private half, return its handle and
    /// the public half.
    ///
    /// Must be called from within a Tokio runtime: the first entry into an
    /// empty store spawns the sweeper.
    pub async fn request(&self) -> IssuedKey {
        let private_key = generate_private_key();
        let public_key = public_key_bytes(&private_key);
        let handle = Uuid::new_v4();
        let ttl = self.inner.config.ttl;

        let now = Instant::now();
        let record = EphemeralKeyRecord {
            private_key,
            created_at: now,
            expires_at: now + ttl,
        };

        let mut state = self.inner.state.lock().await;
        state.insert(handle, record);
        if state.sweeper.is_none() {
            state.sweeper = Some(spawn_sweeper(Arc::downgrade(&self.inner)));
            debug!(live = state.entries.len(), "Ephemeral key sweeper started");
        }
        drop(state);

        self.inner.counters.issued.fetch_add(1, Ordering::Relaxed);
        debug!(handle = %handle, "Issued ephemeral key");

        IssuedKey {
            handle,
            public_key,
            expires_in: ttl,
        }
    }

    /// Remove and return the private key for `handle`.
    ///
    /// Missing, expired and already-consumed handles all yield
    /// [`AuthError::NotFound`].
    pub async fn consume(&self, handle: &Uuid) -> Result<SecretKey, AuthError> {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;
        let record = state.take(handle);
        if state.entries.is_empty() {
            state.cancel_sweeper();
        }
        drop(state);

        let Some(record) = record else {
            debug!(handle = %handle, "Ephemeral key not found");
            return Err(AuthError::NotFound("key handle"));
        };

        if record.expires_at <= now {
            self.inner.counters.evicted.fetch_add(1, Ordering::Relaxed);
            debug!(handle = %handle, "Ephemeral key expired before use");
            return Err(AuthError::NotFound("key handle"));
        }

        self.inner.counters.consumed.fetch_add(1, Ordering::Relaxed);
        debug!(
            handle = %handle,
            age_ms = now.duration_since(record.created_at).as_millis() as u64,
            "Consumed ephemeral key"
        );
        Ok(record.private_key)
    }

    /// Number of unconsumed entries, expired-but-unswept included.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get store statistics.
    pub async fn stats(&self) -> EphemeralKeyStats {
        let state = self.inner.state.lock().await;
        EphemeralKeyStats {
            live: state.entries.len(),
            issued: self.inner.counters.issued.load(Ordering::Relaxed),
            consumed: self.inner.counters.consumed.load(Ordering::Relaxed),
            evicted: self.inner.counters.evicted.load(Ordering::Relaxed),
            sweeper_running: state.sweeper.is_some(),
        }
    }
}

impl Default for EphemeralKeyStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Sweeper
// =============================================================================

fn spawn_sweeper(inner: Weak<Inner>) -> Sweeper {
    let (cancel, cancelled) = oneshot::channel();
    let task = tokio::spawn(run_sweeper(inner, cancelled));
    Sweeper { cancel, task }
}

/// True once our `Sweeper` has been dropped from the state.
///
/// Only meaningful while the state lock is held, since that is where the
/// sender is dropped.
fn is_cancelled(cancelled: &mut oneshot::Receiver<()>) -> bool {
    !matches!(
        cancelled.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    )
}

async fn run_sweeper(inner: Weak<Inner>, mut cancelled: oneshot::Receiver<()>) {
    loop {
        let deadline = {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut state = inner.state.lock().await;
            if is_cancelled(&mut cancelled) {
                return;
            }
            match state.next_wake(Instant::now(), inner.config.max_sweep_interval) {
                Some(deadline) => deadline,
                None => {
                    state.sweeper = None;
                    return;
                }
            }
        };

        tokio::select! {
            _ = &mut cancelled => return,
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut state = inner.state.lock().await;
        if is_cancelled(&mut cancelled) {
            return;
        }

        let evicted = state.evict_expired(Instant::now());
        if evicted > 0 {
            inner
                .counters
                .evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            info!(evicted, remaining = state.entries.len(), "Evicted expired ephemeral keys");
        }

        if state.entries.is_empty() {
            // Dropping our own handle closes the channel we hold the
            // receiving end of; nothing else is waiting on it.
            state.sweeper = None;
            debug!("Ephemeral key sweeper stopped");
            return;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::agreement::encode_public_key;

    fn store(ttl_secs: u64, cap_secs: u64) -> EphemeralKeyStore {
        EphemeralKeyStore::new(EphemeralKeyConfig {
            ttl: Duration::from_secs(ttl_secs),
            max_sweep_interval: Duration::from_secs(cap_secs),
        })
    }

    /// Let the sweeper task run after a clock advance.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_request_returns_matching_public_key() {
        let store = EphemeralKeyStore::with_defaults();
        let issued = store.request().await;
        assert_eq!(issued.public_key.len(), 96);
        assert_eq!(issued.expires_in, Duration::from_secs(120));

        let private_key = store.consume(&issued.handle).await.unwrap();
        assert_eq!(encode_public_key(&private_key.public_key()), issued.public_key);
    }

    #[tokio::test]
    async fn test_handle_is_single_use() {
        let store = EphemeralKeyStore::with_defaults();
        let issued = store.request().await;

        assert!(store.consume(&issued.handle).await.is_ok());
        for _ in 0..3 {
            assert_eq!(
                store.consume(&issued.handle).await.unwrap_err(),
                AuthError::NotFound("key handle")
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let store = EphemeralKeyStore::with_defaults();
        assert!(store.consume(&Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_consume_hands_out_once() {
        let store = EphemeralKeyStore::with_defaults();
        let issued = store.request().await;

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let handle = issued.handle;
            tasks.push(tokio::spawn(async move { store.consume(&handle).await.is_ok() }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_sweeper_lifecycle_follows_occupancy() {
        let store = EphemeralKeyStore::with_defaults();
        assert!(!store.stats().await.sweeper_running);

        let a = store.request().await;
        let b = store.request().await;
        assert!(store.stats().await.sweeper_running);

        store.consume(&a.handle).await.unwrap();
        assert!(store.stats().await.sweeper_running);

        store.consume(&b.handle).await.unwrap();
        let stats = store.stats().await;
        assert!(!stats.sweeper_running);
        assert_eq!(stats.live, 0);

        // Restarts on the next insert
        store.request().await;
        assert!(store.stats().await.sweeper_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_handle_unconsumable_without_new_requests() {
        let store = store(120, 120);
        let issued = store.request().await;

        tokio::time::advance(Duration::from_secs(121)).await;
        settle().await;

        let stats = store.stats().await;
        assert_eq!(stats.live, 0, "sweeper should have evicted the entry");
        assert_eq!(stats.evicted, 1);
        assert!(!stats.sweeper_running);

        assert!(store.consume(&issued.handle).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_expiry_order() {
        let store = store(10, 120);
        let first = store.request().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        let second = store.request().await;

        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        let stats = store.stats().await;
        assert_eq!(stats.live, 1);
        assert!(stats.sweeper_running);
        assert!(store.consume(&first.handle).await.is_err());
        assert!(store.consume(&second.handle).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_after_expiry_is_not_found() {
        let store = store(1, 120);
        let issued = store.request().await;

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(
            store.consume(&issued.handle).await.unwrap_err(),
            AuthError::NotFound("key handle")
        );
        assert_eq!(store.stats().await.consumed, 0);
    }

    #[test]
    fn test_evict_expired_is_ordered() {
        let base = Instant::now();
        let mut state = StoreState::default();
        for offset in [30u64, 10, 20] {
            state.insert(
                Uuid::new_v4(),
                EphemeralKeyRecord {
                    private_key: generate_private_key(),
                    created_at: base,
                    expires_at: base + Duration::from_secs(offset),
                },
            );
        }

        assert_eq!(state.evict_expired(base + Duration::from_secs(15)), 1);
        assert_eq!(state.evict_expired(base + Duration::from_secs(20)), 1);
        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.expiry.len(), 1);
        assert_eq!(
            state.next_wake(base, Duration::from_secs(5)),
            Some(base + Duration::from_secs(5))
        );
        assert_eq!(
            state.next_wake(base, Duration::from_secs(500)),
            Some(base + Duration::from_secs(30))
        );
    }
}
