//! Response nonce tracking for replay detection.
//!
//! Opt-in. A signed response stays valid for the whole clock-skew window, so
//! without this cache a captured response can be replayed inside that window.
//! Entries are keyed by nonce and expire with the window they were accepted in.

use std::collections::HashMap;
use std::sync::RwLock;

/// Entries are pruned on insert once the cache grows past this size.
const PRUNE_THRESHOLD: usize = 4096;

/// Set of response nonces accepted inside the replay window.
///
/// Thread-safe. A poisoned lock is recovered rather than propagated; the map
/// holds no invariant a panicking writer could break.
#[derive(Debug, Default)]
pub struct NonceCache {
    // nonce -> expiration timestamp
    seen: RwLock<HashMap<String, i64>>,
}

impl NonceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce` unless it is already present.
    ///
    /// Returns `true` if the nonce is fresh, `false` on a replay. `now` is
    /// used to drop expired entries once the cache is large.
    pub fn check_and_record(&self, nonce: &str, expires_at: i64, now: i64) -> bool {
        let mut seen = self.seen.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = seen.get(nonce) {
            if *existing >= now {
                return false;
            }
        }

        if seen.len() >= PRUNE_THRESHOLD {
            seen.retain(|_, expires| *expires >= now);
        }
        seen.insert(nonce.to_string(), expires_at);
        true
    }

    /// Remove entries that expired before `before`. Returns how many went.
    pub fn cleanup_expired(&self, before: i64) -> usize {
        let mut seen = self.seen.write().unwrap_or_else(|e| e.into_inner());
        let start = seen.len();
        seen.retain(|_, expires| *expires >= before);
        start - seen.len()
    }

    /// Whether `nonce` is currently recorded.
    pub fn contains(&self, nonce: &str) -> bool {
        self.seen
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(nonce)
    }

    /// Number of recorded nonces.
    pub fn len(&self) -> usize {
        self.seen.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
