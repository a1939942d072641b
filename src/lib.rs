//! Tiered Cache - policy-driven key/value caching over memory and disk
//!
//! Named cache repositories whose contents are flushed, or migrated from
//! memory to disk, on a timer chosen by their policy.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod tasks;

pub use api::AppState;
pub use cache::{
    CachePolicy, CacheRepository, Decoded, FileSystemRepository, LegacyTieredRepository,
    MemoryRepository, TieredRepository,
};
pub use config::Config;
pub use registry::{CacheRegistry, RegisteredRepository, StoreKind};
pub use tasks::{ManualScheduler, Scheduler, TokioScheduler};
