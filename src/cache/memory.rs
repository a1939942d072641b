//! Memory Tier Module
//!
//! Process-local key/value storage with no per-key expiry.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::cache::CacheTier;

// == Memory Tier ==
/// In-memory map from key to raw text.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTier {
    /// Creates an empty memory tier.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheTier for MemoryTier {
    const KIND: &'static str = "Memory";

    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.entries.lock().insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn entries(&self) -> HashMap<String, String> {
        self.entries.lock().clone()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tier_new() {
        let tier = MemoryTier::new();
        assert_eq!(tier.len(), 0);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_memory_tier_set_get_overwrite() {
        let tier = MemoryTier::new();

        tier.set("key1", "value1");
        assert_eq!(tier.get("key1").as_deref(), Some("value1"));

        tier.set("key1", "value2");
        assert_eq!(tier.get("key1").as_deref(), Some("value2"));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_memory_tier_remove_absent_is_noop() {
        let tier = MemoryTier::new();
        tier.set("key1", "value1");

        tier.remove("missing");
        tier.remove("key1");
        tier.remove("key1");

        assert!(tier.is_empty());
        assert_eq!(tier.get("key1"), None);
    }

    #[test]
    fn test_memory_tier_clear_and_entries() {
        let tier = MemoryTier::new();
        tier.set("a", "1");
        tier.set("b", "2");

        let entries = tier.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["a"], "1");

        tier.clear();
        assert!(tier.is_empty());
        assert!(tier.entries().is_empty());
    }
}
