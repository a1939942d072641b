//! Memory-backed-by-file-system repository.
//!
//! Writes go to memory. Every tick of the policy's timer moves the whole
//! memory tier to disk, replacing the previous batch there. Reads check
//! memory, then disk; a disk hit is served from disk and is not copied back
//! into memory.

use crate::cache::composite::{CompositeKind, CompositeRepository};
use crate::cache::{FileSystemTier, MemoryTier};

/// Labels of [`TieredRepository`].
#[derive(Debug)]
pub struct MemoryBackedByFileSystem;

impl CompositeKind for MemoryBackedByFileSystem {
    const KIND: &'static str = "MemoryBackedByFileSystem";
    const FRONT: &'static str = "MemoryCache";
    const BACK: &'static str = "FileSystemCache";
}

// == Tiered Repository ==
pub type TieredRepository = CompositeRepository<MemoryBackedByFileSystem>;

impl TieredRepository {
    /// The memory tier, for inspection.
    pub fn memory_tier(&self) -> &MemoryTier {
        self.tiers().front()
    }

    /// The file system tier, for inspection.
    pub fn file_system_tier(&self) -> &FileSystemTier {
        self.tiers().back()
    }

    /// Moves every memory entry to disk now. See [`CompositeRepository::migrate`].
    pub fn move_all_keys_to_file_system(&self) -> usize {
        self.migrate()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachePolicy, CacheRepository, CacheTier, Decoded};
    use crate::tasks::ManualScheduler;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        scheduler: ManualScheduler,
        repo: Arc<TieredRepository>,
    }

    fn tiered(name: &str, policy: CachePolicy) -> Fixture {
        let root = TempDir::new().unwrap();
        let scheduler = ManualScheduler::new();
        let repo = TieredRepository::new(name, policy, root.path(), &scheduler);
        Fixture {
            _root: root,
            scheduler,
            repo,
        }
    }

    #[test]
    fn test_set_writes_memory_only() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);

        f.repo.set("y", "1");
        assert_eq!(f.repo.memory_tier().get("y").as_deref(), Some("1"));
        assert!(f.repo.file_system_tier().is_empty());
        assert_eq!(f.repo.get("y").as_deref(), Some("1"));
        assert_eq!(f.repo.stats().memory_hits, 1);
    }

    #[test]
    fn test_migration_on_tick() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set("y", "1");

        f.scheduler.advance(Duration::from_secs(59));
        assert_eq!(f.repo.memory_tier().len(), 1);

        f.scheduler.advance(Duration::from_secs(1));
        assert_eq!(f.repo.get("y").as_deref(), Some("1"));
        assert!(f.repo.memory_tier().is_empty());
        assert_eq!(f.repo.file_system_tier().len(), 1);
        assert_eq!(f.repo.stats().disk_hits, 1);
    }

    #[test]
    fn test_disk_hits_are_not_promoted() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set("y", "1");
        f.scheduler.advance(Duration::from_secs(60));

        for _ in 0..3 {
            assert_eq!(f.repo.get("y").as_deref(), Some("1"));
        }
        assert!(f.repo.memory_tier().is_empty());

        f.repo.file_system_tier().clear();
        assert_eq!(f.repo.get("y"), None);
    }

    #[test]
    fn test_next_migration_replaces_disk_batch() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set("a", "1");
        f.scheduler.advance(Duration::from_secs(60));

        f.repo.set("b", "2");
        f.scheduler.advance(Duration::from_secs(60));

        assert_eq!(f.repo.get("a"), None);
        assert_eq!(f.repo.get("b").as_deref(), Some("2"));
        assert_eq!(f.repo.file_system_tier().len(), 1);
    }

    #[test]
    fn test_idle_tick_keeps_disk_batch() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set("a", "1");
        f.scheduler.advance(Duration::from_secs(180));

        assert_eq!(f.repo.get("a").as_deref(), Some("1"));
        assert_eq!(f.repo.stats().migrations, 1);
    }

    #[test]
    fn test_typed_reads_across_tiers() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set_json("list", vec![1, 2, 3]);
        f.repo.set_number("count", 5.0);
        f.repo.set("name", "bob");
        f.scheduler.advance(Duration::from_secs(60));

        assert_eq!(f.repo.get_json::<Vec<u32>>("list"), Some(vec![1, 2, 3]));
        assert_eq!(f.repo.get_number("count"), Some(5.0));

        // Raw disk text: coerced when T holds a string, a miss otherwise.
        assert_eq!(f.repo.get_json::<String>("name"), Some("bob".to_string()));
        assert_eq!(f.repo.get_json::<Vec<u32>>("name"), None);
        assert_eq!(
            f.repo.get_json_or_raw::<Vec<u32>>("name"),
            Some(Decoded::Raw("bob".to_string()))
        );
        assert_eq!(f.repo.get_number("name"), None);
        assert_eq!(
            f.repo.get_number_or_raw("name"),
            Some(Decoded::Raw("bob".to_string()))
        );
    }

    #[test]
    fn test_unparseable_memory_value_falls_back_to_disk() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set_number("n", 1.0);
        f.scheduler.advance(Duration::from_secs(60));
        f.repo.set("n", "garbage");

        assert_eq!(f.repo.get_number("n"), Some(1.0));
        assert_eq!(f.repo.get("n").as_deref(), Some("garbage"));
    }

    #[test]
    fn test_remove_clear_and_is_cache_clear() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set("a", "1");
        f.scheduler.advance(Duration::from_secs(60));
        f.repo.set("a", "2");
        f.repo.set("b", "3");

        f.repo.remove_key("a");
        assert_eq!(f.repo.get("a"), None);
        assert_eq!(f.repo.memory_tier().get("a"), None);
        assert_eq!(f.repo.file_system_tier().get("a"), None);
        assert!(!f.repo.is_cache_clear());

        f.repo.clear();
        assert!(f.repo.is_cache_clear());
        assert!(f.repo.memory_tier().is_empty());
        assert!(f.repo.file_system_tier().is_empty());
    }

    #[test]
    fn test_kill_reset_stops_migration() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        f.repo.set("a", "1");

        f.repo.kill_reset();
        f.scheduler.advance(Duration::from_secs(600));

        assert_eq!(f.repo.memory_tier().get("a").as_deref(), Some("1"));
        assert!(f.repo.file_system_tier().is_empty());
        assert!(!f.repo.is_reset_active());
    }

    #[test]
    fn test_manual_migration() {
        let f = tiered("Repo", CachePolicy::NoReset);
        assert_eq!(f.repo.move_all_keys_to_file_system(), 0);

        f.repo.set("a", "1");
        f.repo.set("b", "2");
        assert_eq!(f.repo.move_all_keys_to_file_system(), 2);
        assert_eq!(f.repo.all_cached_values().len(), 2);
        assert_eq!(f.scheduler.active_timers(), 0);
    }

    #[test]
    fn test_disabled_tiered_repository() {
        let f = tiered("Repo", CachePolicy::DoNotCache);

        assert_eq!(f.repo.set("a", "1"), None);
        assert_eq!(f.repo.set_json("j", 1), None);
        assert_eq!(f.repo.get("a"), None);
        assert_eq!(f.repo.get_json::<u32>("j"), None);
        assert!(f.repo.is_cache_clear());
    }

    #[test]
    fn test_long_key_survives_migration() {
        let f = tiered("Repo", CachePolicy::StaleAfterOneMinute);
        let key = "a-".repeat(64);
        f.repo.set(&key, "1");

        f.scheduler.advance(Duration::from_secs(60));

        assert_eq!(f.repo.get(&key).as_deref(), Some("1"));
        assert!(f.repo.memory_tier().is_empty());
        assert_eq!(f.repo.file_system_tier().len(), 1);
        assert_eq!(f.repo.all_cached_values().get(&key).map(String::as_str), Some("1"));
    }

    #[test]
    fn test_unwritable_disk_keeps_memory_entries() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let scheduler = ManualScheduler::new();
        let repo = TieredRepository::new("Repo", CachePolicy::StaleAfterOneMinute, &blocker, &scheduler);
        repo.set("a", "1");

        scheduler.advance(Duration::from_secs(60));

        assert_eq!(repo.get("a").as_deref(), Some("1"));
        assert_eq!(repo.memory_tier().len(), 1);
        assert_eq!(repo.stats().migrated_entries, 0);
        assert_eq!(repo.move_all_keys_to_file_system(), 0);
    }
}
