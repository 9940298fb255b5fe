//! In-process decision cache

use super::DecisionCache;
use moka::sync::Cache;
use moka::Expiry;
use std::fmt;
use std::time::{Duration, Instant};

/// Upper bound on stored decisions
const MAX_CACHE_ENTRIES: u64 = 1_024;

/// Per-entry TTL taken from the stored value
struct EntryTtl;

impl Expiry<String, (bool, Duration)> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(bool, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &(bool, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// `DecisionCache` backed by a `moka` cache
///
/// Each entry carries the TTL it was written with.
#[derive(Clone)]
pub struct MemoryDecisionCache {
    entries: Cache<String, (bool, Duration)>,
}

impl MemoryDecisionCache {
    pub fn new() -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .expire_after(EntryTtl)
            .build();
        Self { entries }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryDecisionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryDecisionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDecisionCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl DecisionCache for MemoryDecisionCache {
    fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).map(|(value, _)| value)
    }

    fn set(&self, key: &str, value: bool, ttl: Duration) {
        if ttl.is_zero() {
            self.entries.invalidate(key);
            return;
        }
        if Instant::now().checked_add(ttl).is_none() {
            tracing::warn!(key, ?ttl, "TTL overflows the clock, entry not stored");
            return;
        }
        self.entries.insert(key.to_string(), (value, ttl));
    }
}
