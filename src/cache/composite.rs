//! Two-tier composition shared by the tiered repositories.
//!
//! Writes land in the front tier; the back tier is only filled by
//! [`TierPair::migrate`]. Reads hold the gate shared across the whole
//! front-then-back lookup and every mutation holds it exclusively, so a reader
//! sees a migration either not started or finished.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::cache::codec::Decoded;
use crate::cache::repository::{json_value, number_value};
use crate::cache::stats::{CacheStats, TierStats};
use crate::cache::{CachePolicy, CacheRepository, CacheTier, FileSystemTier, MemoryTier};
use crate::tasks::{ResetTimer, Scheduler};

/// Which tier served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hit {
    Front,
    Back,
}

/// Outcome of one migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Migration {
    /// Entries now on the back tier
    pub(crate) moved: usize,
    /// Entries the back tier refused; still on the front tier
    pub(crate) kept: usize,
}

#[derive(Debug)]
pub(crate) struct TierPair<F, B> {
    front: F,
    back: B,
    gate: RwLock<()>,
    stats: TierStats,
}

impl<F: CacheTier, B: CacheTier> TierPair<F, B> {
    pub(crate) fn new(front: F, back: B) -> Self {
        Self {
            front,
            back,
            gate: RwLock::new(()),
            stats: TierStats::new(),
        }
    }

    pub(crate) fn front(&self) -> &F {
        &self.front
    }

    pub(crate) fn back(&self) -> &B {
        &self.back
    }

    /// Reads `key` from the front tier, then the back tier. Each tier's text
    /// goes through its own decoder; a front value its decoder rejects falls
    /// through to the back tier. Back hits are not copied forward.
    pub(crate) fn lookup<R>(
        &self,
        key: &str,
        from_front: impl FnOnce(String) -> Option<R>,
        from_back: impl FnOnce(String) -> Option<R>,
    ) -> Option<(R, Hit)> {
        let _gate = self.gate.read();

        if let Some(value) = self.front.get(key).and_then(from_front) {
            self.stats.record_memory_hit();
            return Some((value, Hit::Front));
        }
        if let Some(value) = self.back.get(key).and_then(from_back) {
            self.stats.record_disk_hit();
            return Some((value, Hit::Back));
        }

        self.stats.record_miss();
        None
    }

    pub(crate) fn set(&self, key: &str, value: &str) -> bool {
        let _gate = self.gate.write();
        self.front.set(key, value)
    }

    pub(crate) fn remove(&self, key: &str) {
        let _gate = self.gate.write();
        self.back.remove(key);
        self.front.remove(key);
    }

    pub(crate) fn clear(&self) {
        let _gate = self.gate.write();
        self.front.clear();
        self.back.clear();
    }

    pub(crate) fn is_clear(&self) -> bool {
        let _gate = self.gate.read();
        self.front.is_empty() && self.back.is_empty()
    }

    /// Replaces the back tier's contents with the front tier's. Entries the
    /// back tier accepts leave the front tier; entries it refuses stay there.
    /// Does nothing when the front tier is empty, leaving the previous batch
    /// on the back tier.
    pub(crate) fn migrate(&self) -> Option<Migration> {
        let _gate = self.gate.write();
        if self.front.is_empty() {
            return None;
        }

        self.back.clear();
        let mut migration = Migration::default();
        for (key, value) in self.front.entries() {
            if self.back.set(&key, &value) {
                self.front.remove(&key);
                migration.moved += 1;
            } else {
                migration.kept += 1;
            }
        }

        self.stats.record_migration(migration.moved);
        Some(migration)
    }

    /// Every entry of both tiers; the front tier wins on shared keys.
    pub(crate) fn entries(&self) -> HashMap<String, String> {
        let _gate = self.gate.read();
        let mut all = self.back.entries();
        all.extend(self.front.entries());
        all
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

// == Composite Repository ==
/// Log labels of a composite repository flavour.
pub trait CompositeKind: fmt::Debug + Send + Sync + 'static {
    /// Repository kind in log lines.
    const KIND: &'static str;
    /// Name of the memory tier in log lines.
    const FRONT: &'static str;
    /// Name of the disk tier in log lines.
    const BACK: &'static str;
}

/// A memory tier backed by a disk tier. Writes go to memory; every tick of
/// the policy's timer moves the whole memory tier to disk, replacing the
/// previous batch there. Reads check memory, then disk; a disk hit is served
/// from disk and is not copied back into memory.
#[derive(Debug)]
pub struct CompositeRepository<K: CompositeKind> {
    name: String,
    policy: CachePolicy,
    disabled: bool,
    tiers: TierPair<MemoryTier, FileSystemTier>,
    reset: ResetTimer,
    kind: PhantomData<K>,
}

impl<K: CompositeKind> CompositeRepository<K> {
    /// Creates the repository with its disk tier under `root` and registers
    /// the migration timer for `policy`.
    pub fn new(
        name: impl Into<String>,
        policy: CachePolicy,
        root: impl Into<PathBuf>,
        scheduler: &dyn Scheduler,
    ) -> Arc<Self> {
        let name = name.into();
        let disk = FileSystemTier::new(root, &name);
        let repo = Arc::new(Self {
            tiers: TierPair::new(MemoryTier::new(), disk),
            disabled: policy.is_disabled(),
            policy,
            name,
            reset: ResetTimer::new(),
            kind: PhantomData,
        });
        debug!(
            "Register {} Cache Repository '{}' with policy: {}",
            K::KIND,
            repo.name,
            policy
        );

        let weak = Arc::downgrade(&repo);
        repo.reset.register(
            &repo.name,
            policy,
            scheduler,
            Arc::new(move || {
                if let Some(repo) = weak.upgrade() {
                    repo.on_reset_timer();
                }
            }),
        );
        repo
    }

    pub(crate) fn tiers(&self) -> &TierPair<MemoryTier, FileSystemTier> {
        &self.tiers
    }

    pub fn stats(&self) -> CacheStats {
        self.tiers.stats()
    }

    pub fn is_reset_active(&self) -> bool {
        self.reset.is_active()
    }

    /// Moves every memory entry to disk now. Returns how many entries moved;
    /// zero when memory was empty and disk was left untouched. Entries the
    /// disk tier cannot store stay in memory for the next migration.
    pub fn migrate(&self) -> usize {
        let Some(migration) = self.tiers.migrate() else {
            return 0;
        };
        debug!(
            "Moved {} key(s) from {}({}) to {}({})",
            migration.moved,
            K::FRONT,
            self.name,
            K::BACK,
            self.name
        );
        if migration.kept > 0 {
            warn!(
                "Kept {} key(s) in {}({}) that {}({}) could not store",
                migration.kept,
                K::FRONT,
                self.name,
                K::BACK,
                self.name
            );
        }
        migration.moved
    }

    /// Periodic migration.
    pub fn on_reset_timer(&self) {
        self.migrate();
    }

    fn log_lookup<R>(&self, what: &str, key: &str, found: Option<(R, Hit)>) -> Option<R> {
        match found {
            Some((value, Hit::Front)) => {
                trace!("Found {} in {} for {}", what, K::FRONT, key);
                Some(value)
            }
            Some((value, Hit::Back)) => {
                trace!("Found {} in {} for {}", what, K::BACK, key);
                Some(value)
            }
            None => {
                trace!("No {} found for {}", what, key);
                None
            }
        }
    }

    fn check_enabled(&self, action: &str) -> bool {
        if self.disabled {
            warn!(
                "{} Cache Repository '{}' is disabled, not {}",
                K::KIND,
                self.name,
                action
            );
        }
        !self.disabled
    }
}

impl<K: CompositeKind> CacheRepository for CompositeRepository<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn get(&self, key: &str) -> Option<String> {
        if !self.check_enabled("getting") {
            return None;
        }
        let found = self.tiers.lookup(key, Some, Some);
        self.log_lookup("value", key, found)
    }

    fn set(&self, key: &str, value: &str) -> Option<String> {
        if !self.check_enabled("setting") {
            return None;
        }
        trace!("Setting cached value for {}", key);
        self.tiers.set(key, value).then(|| value.to_string())
    }

    fn remove_key(&self, key: &str) {
        trace!("Removing key {}", key);
        self.tiers.remove(key);
    }

    fn clear(&self) {
        debug!("Clearing {}", self.name);
        self.tiers.clear();
    }

    fn is_cache_clear(&self) -> bool {
        self.tiers.is_clear()
    }

    fn kill_reset(&self) {
        debug!("Kill reset timer of {}", self.name);
        self.reset.kill();
    }

    fn all_cached_values(&self) -> HashMap<String, String> {
        self.tiers.entries()
    }

    /// Memory values must decode strictly; disk values are read with the raw
    /// fallback. Without `fallback_raw`, a raw disk value is coerced to `T`
    /// (see [`Decoded::coerce`]) or treated as a miss.
    fn get_json_with<T: DeserializeOwned>(&self, key: &str, fallback_raw: bool) -> Option<Decoded<T>> {
        if !self.check_enabled("getting") {
            return None;
        }
        let name = self.name.as_str();
        let found = self.tiers.lookup(
            key,
            |raw| json_value::<T>(name, key, raw, false),
            |raw| json_value::<T>(name, key, raw, true),
        );
        match self.log_lookup("JSON value", key, found)? {
            Decoded::Raw(raw) if !fallback_raw => Decoded::<T>::Raw(raw).coerce().map(Decoded::Parsed),
            decoded => Some(decoded),
        }
    }

    /// Same tier rules as `get_json_with`; raw text never coerces to a number.
    fn get_number_with(&self, key: &str, fallback_raw: bool) -> Option<Decoded<f64>> {
        if !self.check_enabled("getting") {
            return None;
        }
        let name = self.name.as_str();
        let found = self.tiers.lookup(
            key,
            |raw| number_value(name, key, raw, false),
            |raw| number_value(name, key, raw, true),
        );
        match self.log_lookup("number value", key, found)? {
            Decoded::Raw(_) if !fallback_raw => None,
            decoded => Some(decoded),
        }
    }
}
