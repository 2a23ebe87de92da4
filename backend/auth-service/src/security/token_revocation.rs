/// Token Revocation Registry
///
/// Tracks tokens that must be rejected before their natural expiry.
///
/// ## Entries
///
/// - **Token**: keyed by token id, used on logout
/// - **Principal**: keyed by principal id, rejects every token of that
///   principal issued before the revocation instant (password change,
///   compromise)
///
/// Each entry carries `until`, the instant after which every token it covers
/// has expired anyway. Entries are purged lazily on insert once the registry
/// grows past a high-water mark, and by the periodic sweeper. Neither path
/// removes an entry before its `until`. After a lazy purge the mark moves to
/// twice the surviving size, so live entries are not rescanned on every insert.
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::models::RevocationEntry;

/// Entry count above which inserts trigger a purge
const DEFAULT_PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug)]
pub struct RevocationRegistry {
    tokens: DashMap<String, RevocationEntry>,
    principals: DashMap<String, RevocationEntry>,
    purge_threshold: usize,
    /// Entry count at which the next insert purges
    high_water: AtomicUsize,
}

impl Default for RevocationRegistry {
    fn default() -> Self {
        Self::with_purge_threshold(DEFAULT_PURGE_THRESHOLD)
    }
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purge_threshold(purge_threshold: usize) -> Self {
        Self {
            tokens: DashMap::new(),
            principals: DashMap::new(),
            purge_threshold,
            high_water: AtomicUsize::new(purge_threshold),
        }
    }

    /// Revoke a single token until `until` (normally the token's expiry)
    ///
    /// Revoking an already revoked token keeps the later `until`.
    pub fn revoke(&self, token_id: &str, until: DateTime<Utc>, now: DateTime<Utc>) {
        self.maybe_purge(now);
        Self::upsert(&self.tokens, token_id, RevocationEntry { revoked_at: now, until });
        tracing::info!(token_id = %token_id, until = %until, "Token revoked");
    }

    /// Revoke every token of a principal issued before `revoked_at`
    pub fn revoke_principal(
        &self,
        principal_id: &str,
        revoked_at: DateTime<Utc>,
        until: DateTime<Utc>,
    ) {
        self.maybe_purge(revoked_at);
        self.principals
            .entry(principal_id.to_string())
            .and_modify(|entry| {
                entry.revoked_at = entry.revoked_at.max(revoked_at);
                entry.until = entry.until.max(until);
            })
            .or_insert(RevocationEntry { revoked_at, until });
        tracing::warn!(principal_id = %principal_id, "All tokens revoked for principal");
    }

    /// Whether a token must be rejected
    ///
    /// Matches either an entry for the token id, or a principal entry whose
    /// revocation instant is after the token's issue time.
    pub fn is_revoked(
        &self,
        token_id: &str,
        principal_id: &str,
        issued_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(entry) = self.tokens.get(token_id) {
            if !entry.is_expired(now) {
                return true;
            }
        }
        if let Some(entry) = self.principals.get(principal_id) {
            if !entry.is_expired(now) && issued_at < entry.revoked_at {
                return true;
            }
        }
        false
    }

    /// Drop entries whose `until` has passed, returning how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.len();
        self.tokens.retain(|_, entry| !entry.is_expired(now));
        self.principals.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired revocation entries");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.tokens.len() + self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.principals.is_empty()
    }

    /// Periodically purge expired entries on the runtime
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.purge_expired(Utc::now());
            }
        })
    }

    fn maybe_purge(&self, now: DateTime<Utc>) {
        if self.len() < self.high_water.load(Ordering::Relaxed) {
            return;
        }
        self.purge_expired(now);
        let next = self.purge_threshold.max(self.len().saturating_mul(2));
        self.high_water.store(next, Ordering::Relaxed);
    }

    /// Entry count that triggers the next lazy purge
    pub fn purge_mark(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    fn upsert(map: &DashMap<String, RevocationEntry>, key: &str, entry: RevocationEntry) {
        map.entry(key.to_string())
            .and_modify(|existing| existing.until = existing.until.max(entry.until))
            .or_insert(entry);
    }
}
