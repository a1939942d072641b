//! Legacy tiered repository.
//!
//! Older call sites talk to a memcache-style memory tier backed by a local
//! disk cache. Behaviour matches [`crate::cache::TieredRepository`]: writes go
//! to the memcache tier, and each tick clears the local tier before moving the
//! memcache contents onto it.

use crate::cache::composite::{CompositeKind, CompositeRepository};
use crate::cache::{FileSystemTier, MemoryTier};

/// Labels of [`LegacyTieredRepository`].
#[derive(Debug)]
pub struct MemcacheRoundRobin;

impl CompositeKind for MemcacheRoundRobin {
    const KIND: &'static str = "Legacy Tiered";
    const FRONT: &'static str = "Memcache";
    const BACK: &'static str = "LocalCache";
}

// == Legacy Tiered Repository ==
pub type LegacyTieredRepository = CompositeRepository<MemcacheRoundRobin>;

impl LegacyTieredRepository {
    pub fn memcache(&self) -> &MemoryTier {
        self.tiers().front()
    }

    pub fn local_cache(&self) -> &FileSystemTier {
        self.tiers().back()
    }

    /// One round-robin step. See [`CompositeRepository::migrate`].
    pub fn move_from_memcache(&self) -> usize {
        self.migrate()
    }
}
