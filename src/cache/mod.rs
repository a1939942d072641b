//! Cache Module
//!
//! Policy-driven cache repositories over a memory tier, a disk tier, and
//! compositions of the two with timer-driven migration.

pub mod codec;
mod composite;
mod disk;
mod legacy;
mod memory;
mod policy;
mod repository;
mod stats;
mod tier;
mod tiered;


// Re-export public types
pub use codec::Decoded;
pub use composite::{CompositeKind, CompositeRepository};
pub use disk::{default_cache_root, FileSystemTier, DEFAULT_CACHE_ROOT};
pub use legacy::{LegacyTieredRepository, MemcacheRoundRobin};
pub use memory::MemoryTier;
pub use policy::{CachePolicy, Refresh};
pub use repository::{CacheRepository, FileSystemRepository, MemoryRepository, TierRepository};
pub use stats::{CacheStats, TierStats};
pub use tier::CacheTier;
pub use tiered::{MemoryBackedByFileSystem, TieredRepository};
