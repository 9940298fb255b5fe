//! Decision cache
//!
//! A small key/value store with per-entry TTL. The connection manager keeps a
//! single boolean in it, under [`OVERRIDE_MAIN_SERVER_KEY`], recording that the
//! last successful connect went to the backup server. Entries are advisory:
//! losing one only costs a failed connect to the primary.

mod memory;

pub use memory::MemoryDecisionCache;

use std::sync::Arc;
use std::time::Duration;

/// Key under which the manager stores its server preference
pub const OVERRIDE_MAIN_SERVER_KEY: &str = "overrideMainServer";

/// Shared boolean store with expiry
pub trait DecisionCache: Send + Sync {
    /// Current value, or `None` when absent or expired
    fn get(&self, key: &str) -> Option<bool>;

    /// Store `value` for `ttl`
    fn set(&self, key: &str, value: bool, ttl: Duration);
}

impl<T: DecisionCache + ?Sized> DecisionCache for Arc<T> {
    fn get(&self, key: &str) -> Option<bool> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: bool, ttl: Duration) {
        (**self).set(key, value, ttl)
    }
}
