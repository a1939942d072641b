//! Cache Repository Module
//!
//! The contract shared by every repository, and the single-tier
//! implementation used for the plain memory and file system stores.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::cache::codec::{decode_json, decode_number, encode_json, encode_number, Decoded};
use crate::cache::{CachePolicy, CacheTier, FileSystemTier, MemoryTier};
use crate::tasks::{ResetTimer, Scheduler};

// == Cache Repository ==
/// Read/write contract of a named cache store.
///
/// No operation fails towards the caller: a miss, a parse failure without
/// fallback, an I/O failure and a disabled store all read as `None`. Write
/// operations return the written value, or `None` when nothing was written.
///
/// The `get_or_set*` family is read-then-write and not atomic; two callers
/// racing on the same key may both write, and the last write wins.
pub trait CacheRepository: Send + Sync {
    /// Store name; also the directory name of any disk tier.
    fn name(&self) -> &str;

    fn policy(&self) -> CachePolicy;

    /// True when the policy is `DoNotCache`.
    fn is_disabled(&self) -> bool;

    /// Reads raw text.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes raw text. Returns `None` when the store is disabled.
    fn set(&self, key: &str, value: &str) -> Option<String>;

    /// Deletes `key` from every owned tier. Absent keys are ignored.
    fn remove_key(&self, key: &str);

    /// Empties every owned tier now, independent of the timer.
    fn clear(&self);

    /// True iff every owned tier is empty.
    fn is_cache_clear(&self) -> bool;

    /// Stops the periodic callback for good. Idempotent.
    fn kill_reset(&self);

    /// Snapshot of every cached entry.
    fn all_cached_values(&self) -> HashMap<String, String>;

    /// Reads and decodes JSON. With `fallback_raw`, text that does not decode
    /// comes back as [`Decoded::Raw`] instead of a miss.
    fn get_json_with<T: DeserializeOwned>(&self, key: &str, fallback_raw: bool) -> Option<Decoded<T>>
    where
        Self: Sized,
    {
        let raw = self.get(key)?;
        json_value(self.name(), key, raw, fallback_raw)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        self.get_json_with(key, false).and_then(Decoded::parsed)
    }

    fn get_json_or_raw<T: DeserializeOwned>(&self, key: &str) -> Option<Decoded<T>>
    where
        Self: Sized,
    {
        self.get_json_with(key, true)
    }

    /// Reads and parses a number; see [`crate::cache::codec::parse_number`].
    fn get_number_with(&self, key: &str, fallback_raw: bool) -> Option<Decoded<f64>>
    where
        Self: Sized,
    {
        let raw = self.get(key)?;
        number_value(self.name(), key, raw, fallback_raw)
    }

    fn get_number(&self, key: &str) -> Option<f64>
    where
        Self: Sized,
    {
        self.get_number_with(key, false).and_then(Decoded::parsed)
    }

    fn get_number_or_raw(&self, key: &str) -> Option<Decoded<f64>>
    where
        Self: Sized,
    {
        self.get_number_with(key, true)
    }

    /// Encodes `value` as JSON and writes it.
    fn set_json<T: Serialize>(&self, key: &str, value: T) -> Option<T>
    where
        Self: Sized,
    {
        if self.is_disabled() {
            warn!("Cache Repository '{}' is disabled, not setting", self.name());
            return None;
        }
        let Some(text) = encode_json(&value) else {
            warn!("Cache value '{}' could not be encoded as JSON, not setting", key);
            return None;
        };
        self.set(key, &text).map(|_| value)
    }

    fn set_number(&self, key: &str, value: f64) -> Option<f64>
    where
        Self: Sized,
    {
        self.set(key, &encode_number(value)).map(|_| value)
    }

    /// Returns the cached text, or writes and returns `value` on a miss.
    fn get_or_set(&self, key: &str, value: &str) -> Option<String>
    where
        Self: Sized,
    {
        if let Some(cached) = self.get(key) {
            trace!("Cache value '{}' found, skipping write", key);
            return Some(cached);
        }
        trace!("Cache value '{}' not found, writing", key);
        self.set(key, value)
    }

    fn get_or_set_json<T: Serialize + DeserializeOwned>(&self, key: &str, value: T) -> Option<T>
    where
        Self: Sized,
    {
        if let Some(cached) = self.get_json::<T>(key) {
            trace!("Cache value '{}' JSON found, skipping write", key);
            return Some(cached);
        }
        trace!("Cache value '{}' JSON not found, writing", key);
        self.set_json(key, value)
    }

    /// Like [`CacheRepository::get_or_set`]; a stored value that is not a
    /// number is overwritten.
    fn get_or_set_number(&self, key: &str, value: f64) -> Option<f64>
    where
        Self: Sized,
    {
        if let Some(Decoded::Parsed(cached)) = self.get_number_or_raw(key) {
            trace!("Cache value '{}' number found, skipping write", key);
            return Some(cached);
        }
        trace!("Cache value '{}' number not found, writing", key);
        self.set_number(key, value)
    }
}

pub(crate) fn json_value<T: DeserializeOwned>(
    repo: &str,
    key: &str,
    raw: String,
    fallback_raw: bool,
) -> Option<Decoded<T>> {
    let decoded = decode_json(raw, fallback_raw);
    if !matches!(decoded, Some(Decoded::Parsed(_))) {
        warn!(
            "Cache value '{}' in '{}' JSON parse failed, fallback_raw: {}",
            key, repo, fallback_raw
        );
    }
    decoded
}

pub(crate) fn number_value(
    repo: &str,
    key: &str,
    raw: String,
    fallback_raw: bool,
) -> Option<Decoded<f64>> {
    let decoded = decode_number(raw, fallback_raw);
    if !matches!(decoded, Some(Decoded::Parsed(_))) {
        warn!(
            "Cache value '{}' in '{}' number parse failed, fallback_raw: {}",
            key, repo, fallback_raw
        );
    }
    decoded
}

// == Tier Repository ==
/// A repository over a single tier whose periodic callback flushes the whole
/// tier. Every key shares the one clock; there is no per-key expiry.
#[derive(Debug)]
pub struct TierRepository<T: CacheTier> {
    name: String,
    policy: CachePolicy,
    disabled: bool,
    tier: T,
    reset: ResetTimer,
}

/// Repository kept in process memory.
pub type MemoryRepository = TierRepository<MemoryTier>;

/// Repository kept on local disk.
pub type FileSystemRepository = TierRepository<FileSystemTier>;

impl MemoryRepository {
    pub fn new(name: impl Into<String>, policy: CachePolicy, scheduler: &dyn Scheduler) -> Arc<Self> {
        Self::with_tier(name, policy, MemoryTier::new(), scheduler)
    }
}

impl FileSystemRepository {
    /// Creates the repository with its directory under `root`.
    pub fn new(
        name: impl Into<String>,
        policy: CachePolicy,
        root: impl Into<PathBuf>,
        scheduler: &dyn Scheduler,
    ) -> Arc<Self> {
        let name = name.into();
        let tier = FileSystemTier::new(root, &name);
        Self::with_tier(name, policy, tier, scheduler)
    }
}

impl<T: CacheTier + 'static> TierRepository<T> {
    /// Wraps `tier` and registers the reset timer for `policy`.
    pub fn with_tier(
        name: impl Into<String>,
        policy: CachePolicy,
        tier: T,
        scheduler: &dyn Scheduler,
    ) -> Arc<Self> {
        let repo = Arc::new(Self {
            name: name.into(),
            policy,
            disabled: policy.is_disabled(),
            tier,
            reset: ResetTimer::new(),
        });
        debug!(
            "Register {} Cache Repository '{}' with policy: {}",
            T::KIND,
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

    /// The underlying tier.
    pub fn tier(&self) -> &T {
        &self.tier
    }

    /// Whether the periodic callback is still installed.
    pub fn is_reset_active(&self) -> bool {
        self.reset.is_active()
    }

    /// Whole-store flush run by the periodic callback.
    pub fn on_reset_timer(&self) {
        if !self.tier.is_empty() {
            debug!("Reset {} Cache Repository '{}'", T::KIND, self.name);
            self.tier.clear();
        }
    }
}

impl<T: CacheTier> CacheRepository for TierRepository<T> {
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
        if self.disabled {
            warn!("{} Cache Repository '{}' is disabled, not getting", T::KIND, self.name);
            return None;
        }

        let value = self.tier.get(key);
        if value.is_some() {
            trace!("{} Cache Value '{}' found", T::KIND, key);
        } else {
            trace!("{} Cache Value '{}' not found", T::KIND, key);
        }
        value
    }

    fn set(&self, key: &str, value: &str) -> Option<String> {
        if self.disabled {
            warn!("{} Cache Repository '{}' is disabled, not setting", T::KIND, self.name);
            return None;
        }

        trace!("Set {} Cache Value '{}'", T::KIND, key);
        self.tier.set(key, value).then(|| value.to_string())
    }

    fn remove_key(&self, key: &str) {
        trace!("Remove {} Cache Value '{}'", T::KIND, key);
        self.tier.remove(key);
    }

    fn clear(&self) {
        debug!("Clear {} Cache Repository '{}'", T::KIND, self.name);
        self.tier.clear();
    }

    fn is_cache_clear(&self) -> bool {
        self.tier.is_empty()
    }

    fn kill_reset(&self) {
        debug!("Kill reset timer of {} Cache Repository '{}'", T::KIND, self.name);
        self.reset.kill();
    }

    fn all_cached_values(&self) -> HashMap<String, String> {
        self.tier.entries()
    }
}
