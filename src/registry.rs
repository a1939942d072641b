//! Repository Registry
//!
//! One repository instance per store name for the whole process. Call sites
//! ask the registry for a store by name instead of holding their own statics;
//! tests build a fresh registry instead of sharing the global one.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{
    CachePolicy, CacheRepository, CacheStats, FileSystemRepository, LegacyTieredRepository,
    MemoryRepository, TieredRepository,
};
use crate::error::{CacheError, Result};
use crate::tasks::Scheduler;

/// Longest accepted store name.
pub const MAX_STORE_NAME_LENGTH: usize = 128;

// == Store Kind ==
/// Kind of repository registered under a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Disk,
    Tiered,
    Legacy,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Disk => "disk",
            StoreKind::Tiered => "tiered",
            StoreKind::Legacy => "legacy",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "disk" => Ok(StoreKind::Disk),
            "tiered" => Ok(StoreKind::Tiered),
            "legacy" => Ok(StoreKind::Legacy),
            other => Err(format!("unknown store kind '{}'", other)),
        }
    }
}

// == Registered Repository ==
/// A registered store, typed by kind.
#[derive(Debug, Clone)]
pub enum RegisteredRepository {
    Memory(Arc<MemoryRepository>),
    Disk(Arc<FileSystemRepository>),
    Tiered(Arc<TieredRepository>),
    Legacy(Arc<LegacyTieredRepository>),
}

impl RegisteredRepository {
    pub fn kind(&self) -> StoreKind {
        match self {
            RegisteredRepository::Memory(_) => StoreKind::Memory,
            RegisteredRepository::Disk(_) => StoreKind::Disk,
            RegisteredRepository::Tiered(_) => StoreKind::Tiered,
            RegisteredRepository::Legacy(_) => StoreKind::Legacy,
        }
    }

    /// The untyped repository contract.
    pub fn repository(&self) -> &dyn CacheRepository {
        match self {
            RegisteredRepository::Memory(repo) => &**repo,
            RegisteredRepository::Disk(repo) => &**repo,
            RegisteredRepository::Tiered(repo) => &**repo,
            RegisteredRepository::Legacy(repo) => &**repo,
        }
    }

    /// Hit and migration counters; composites only.
    pub fn stats(&self) -> Option<CacheStats> {
        match self {
            RegisteredRepository::Tiered(repo) => Some(repo.stats()),
            RegisteredRepository::Legacy(repo) => Some(repo.stats()),
            RegisteredRepository::Memory(_) | RegisteredRepository::Disk(_) => None,
        }
    }

    /// Runs a migration now; composites only. Returns the number of moved entries.
    pub fn migrate(&self) -> Option<usize> {
        match self {
            RegisteredRepository::Tiered(repo) => Some(repo.move_all_keys_to_file_system()),
            RegisteredRepository::Legacy(repo) => Some(repo.move_from_memcache()),
            RegisteredRepository::Memory(_) | RegisteredRepository::Disk(_) => None,
        }
    }
}

// == Cache Registry ==
pub struct CacheRegistry {
    root: PathBuf,
    scheduler: Arc<dyn Scheduler>,
    stores: RwLock<HashMap<String, RegisteredRepository>>,
}

impl CacheRegistry {
    /// Creates an empty registry whose disk tiers live under `root`.
    pub fn new(root: impl Into<PathBuf>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            root: root.into(),
            scheduler,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn memory(&self, name: &str, policy: CachePolicy) -> Result<Arc<MemoryRepository>> {
        match self.get_or_create(name, StoreKind::Memory, policy)? {
            RegisteredRepository::Memory(repo) => Ok(repo),
            other => Err(mismatch(name, other.kind(), StoreKind::Memory)),
        }
    }

    pub fn file_system(&self, name: &str, policy: CachePolicy) -> Result<Arc<FileSystemRepository>> {
        match self.get_or_create(name, StoreKind::Disk, policy)? {
            RegisteredRepository::Disk(repo) => Ok(repo),
            other => Err(mismatch(name, other.kind(), StoreKind::Disk)),
        }
    }

    pub fn tiered(&self, name: &str, policy: CachePolicy) -> Result<Arc<TieredRepository>> {
        match self.get_or_create(name, StoreKind::Tiered, policy)? {
            RegisteredRepository::Tiered(repo) => Ok(repo),
            other => Err(mismatch(name, other.kind(), StoreKind::Tiered)),
        }
    }

    pub fn legacy_tiered(&self, name: &str, policy: CachePolicy) -> Result<Arc<LegacyTieredRepository>> {
        match self.get_or_create(name, StoreKind::Legacy, policy)? {
            RegisteredRepository::Legacy(repo) => Ok(repo),
            other => Err(mismatch(name, other.kind(), StoreKind::Legacy)),
        }
    }

    /// Returns the store registered under `name`, creating it with `policy`
    /// if there is none. An existing store keeps the policy it was created
    /// with; its timer is never registered twice.
    pub fn get_or_create(
        &self,
        name: &str,
        kind: StoreKind,
        policy: CachePolicy,
    ) -> Result<RegisteredRepository> {
        validate_store_name(name)?;

        if let Some(existing) = self.stores.read().get(name) {
            return Self::reuse(name, existing, kind, policy);
        }

        let mut stores = self.stores.write();
        if let Some(existing) = stores.get(name) {
            return Self::reuse(name, existing, kind, policy);
        }

        let scheduler = self.scheduler.as_ref();
        let repo = match kind {
            StoreKind::Memory => {
                RegisteredRepository::Memory(MemoryRepository::new(name, policy, scheduler))
            }
            StoreKind::Disk => RegisteredRepository::Disk(FileSystemRepository::new(
                name,
                policy,
                &self.root,
                scheduler,
            )),
            StoreKind::Tiered => RegisteredRepository::Tiered(TieredRepository::new(
                name,
                policy,
                &self.root,
                scheduler,
            )),
            StoreKind::Legacy => RegisteredRepository::Legacy(LegacyTieredRepository::new(
                name,
                policy,
                &self.root,
                scheduler,
            )),
        };

        info!("Registered {} store '{}' with policy {}", kind, name, policy);
        stores.insert(name.to_string(), repo.clone());
        Ok(repo)
    }

    fn reuse(
        name: &str,
        existing: &RegisteredRepository,
        kind: StoreKind,
        policy: CachePolicy,
    ) -> Result<RegisteredRepository> {
        if existing.kind() != kind {
            return Err(mismatch(name, existing.kind(), kind));
        }
        let current = existing.repository().policy();
        if current != policy {
            debug!(
                "Store '{}' already registered with policy {}, ignoring {}",
                name, current, policy
            );
        }
        Ok(existing.clone())
    }

    pub fn get(&self, name: &str) -> Option<RegisteredRepository> {
        self.stores.read().get(name).cloned()
    }

    /// Registered store names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }

    /// Stops the periodic callback of every registered store.
    pub fn kill_all(&self) {
        for repo in self.stores.read().values() {
            repo.repository().kill_reset();
        }
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("root", &self.root)
            .field("scheduler", &self.scheduler)
            .field("stores", &self.names())
            .finish()
    }
}

fn mismatch(name: &str, existing: StoreKind, requested: StoreKind) -> CacheError {
    CacheError::KindMismatch {
        name: name.to_string(),
        existing: existing.as_str(),
        requested: requested.as_str(),
    }
}

/// Store names double as directory names.
pub fn validate_store_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_STORE_NAME_LENGTH
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidStoreName(name.to_string()))
    }
}

// == Process-wide Registry ==
static GLOBAL: OnceCell<CacheRegistry> = OnceCell::new();

/// Installs the process-wide registry. The first call wins; later calls get
/// the already-installed registry and `registry` is dropped.
pub fn init_global(registry: CacheRegistry) -> &'static CacheRegistry {
    let mut installed_now = false;
    let installed = GLOBAL.get_or_init(|| {
        installed_now = true;
        registry
    });
    if !installed_now {
        debug!("Global cache registry already initialized");
    }
    installed
}

/// The process-wide registry, if [`init_global`] has been called.
pub fn global() -> Option<&'static CacheRegistry> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTier;
    use crate::tasks::ManualScheduler;
    use std::time::Duration;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ManualScheduler, CacheRegistry) {
        let root = TempDir::new().unwrap();
        let scheduler = ManualScheduler::new();
        let registry = CacheRegistry::new(root.path(), Arc::new(scheduler.clone()));
        (root, scheduler, registry)
    }

    #[test]
    fn test_same_name_returns_same_instance() {
        let (_root, _, registry) = registry();

        let first = registry.tiered("UsernameCacheRepo", CachePolicy::StaleAfterFifteenMinutes).unwrap();
        let second = registry.tiered("UsernameCacheRepo", CachePolicy::StaleAfterFifteenMinutes).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_second_policy_is_ignored() {
        let (_root, scheduler, registry) = registry();

        let repo = registry.memory("Store", CachePolicy::StaleAfterFiveSeconds).unwrap();
        let again = registry.memory("Store", CachePolicy::DoNotCache).unwrap();

        assert_eq!(again.policy(), CachePolicy::StaleAfterFiveSeconds);
        assert!(!again.is_disabled());
        assert_eq!(scheduler.active_timers(), 1);

        repo.set("k", "v");
        scheduler.advance(Duration::from_secs(5));
        assert!(repo.is_cache_clear());
    }

    #[test]
    fn test_kind_mismatch() {
        let (_root, _, registry) = registry();
        registry.memory("Store", CachePolicy::NoReset).unwrap();

        let err = registry.tiered("Store", CachePolicy::NoReset).unwrap_err();
        assert!(matches!(
            err,
            CacheError::KindMismatch {
                existing: "memory",
                requested: "tiered",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_store_names() {
        let (_root, _, registry) = registry();

        for name in ["", ".", "..", "a/b", "a\\b", "with space", &"x".repeat(129)] {
            assert!(
                matches!(
                    registry.memory(name, CachePolicy::NoReset),
                    Err(CacheError::InvalidStoreName(_))
                ),
                "{name:?}"
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_and_kill_all() {
        let (root, scheduler, registry) = registry();
        let tiered = registry.tiered("B", CachePolicy::StaleAfterOneMinute).unwrap();
        registry.legacy_tiered("A", CachePolicy::StaleAfterOneMinute).unwrap();
        registry.file_system("C", CachePolicy::StaleAfterOneMinute).unwrap();

        assert_eq!(registry.names(), vec!["A", "B", "C"]);
        assert_eq!(registry.get("B").map(|r| r.kind()), Some(StoreKind::Tiered));
        assert!(registry.get("missing").is_none());
        assert!(root.path().join("C").is_dir());

        tiered.set("k", "v");
        registry.kill_all();
        scheduler.advance(Duration::from_secs(120));
        assert_eq!(tiered.memory_tier().len(), 1);
    }

    #[test]
    fn test_registered_repository_dispatch() {
        let (_root, _, registry) = registry();
        let repo = registry
            .get_or_create("T", StoreKind::Tiered, CachePolicy::NoReset)
            .unwrap();

        repo.repository().set("k", "v");
        assert_eq!(repo.migrate(), Some(1));
        assert_eq!(repo.repository().get("k").as_deref(), Some("v"));
        assert_eq!(repo.stats().map(|s| s.disk_hits), Some(1));

        let memory = registry
            .get_or_create("M", StoreKind::Memory, CachePolicy::NoReset)
            .unwrap();
        assert_eq!(memory.migrate(), None);
        assert!(memory.stats().is_none());
    }

    #[test]
    fn test_global_registry_first_init_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let scheduler: Arc<dyn Scheduler> = Arc::new(ManualScheduler::new());

        let installed = init_global(CacheRegistry::new(first.path(), scheduler.clone()));
        let again = init_global(CacheRegistry::new(second.path(), scheduler));

        assert!(std::ptr::eq(installed, again));
        assert_eq!(global().map(|r| r.root()), Some(first.path()));
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("Tiered".parse::<StoreKind>(), Ok(StoreKind::Tiered));
        assert_eq!("disk".parse::<StoreKind>(), Ok(StoreKind::Disk));
        assert!("redis".parse::<StoreKind>().is_err());
    }
}
