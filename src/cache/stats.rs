//! Cache Statistics Module
//!
//! Tracks where composite repositories serve reads from and how often they
//! migrate.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time copy of a composite repository's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads served by the memory tier
    pub memory_hits: u64,
    /// Reads served by the disk tier
    pub disk_hits: u64,
    /// Reads found in neither tier
    pub misses: u64,
    /// Completed migrations
    pub migrations: u64,
    /// Entries moved to disk across all migrations
    pub migrated_entries: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Tier Stats ==
/// Live counters, updated without locking.
#[derive(Debug, Default)]
pub struct TierStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    migrations: AtomicU64,
    migrated_entries: AtomicU64,
}

impl TierStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one migration that moved `entries` entries.
    pub fn record_migration(&self, entries: usize) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
        self.migrated_entries
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            migrations: self.migrations.load(Ordering::Relaxed),
            migrated_entries: self.migrated_entries.load(Ordering::Relaxed),
        }
    }
}
