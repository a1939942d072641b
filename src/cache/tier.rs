//! Cache Tier Module
//!
//! The storage capability every backend provides: raw text in, raw text out.

use std::collections::HashMap;

// == Cache Tier ==
/// A single storage backend.
///
/// Tiers know nothing about policies or timers; repositories own those. A
/// backend that cannot serve a request reports a miss or does nothing; only
/// `set` tells the caller whether the value was stored.
pub trait CacheTier: Send + Sync {
    /// Human-readable tier kind, used in log lines.
    const KIND: &'static str;

    /// Reads the raw text stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value. Returns
    /// `false` when the value could not be stored.
    fn set(&self, key: &str, value: &str) -> bool;

    /// Deletes `key`. Absent keys are ignored.
    fn remove(&self, key: &str);

    /// Deletes every entry.
    fn clear(&self);

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry.
    fn entries(&self) -> HashMap<String, String>;
}
