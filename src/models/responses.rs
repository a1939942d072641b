//! Response DTOs for the cache admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CachePolicy, CacheStats};
use crate::registry::{RegisteredRepository, StoreKind};

/// Response body for the GET operation (GET /stores/:store/get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored text
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for the SET operation (PUT /stores/:store/set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /stores/:store/del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// One registered store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub name: String,
    pub kind: StoreKind,
    pub policy: CachePolicy,
    pub is_cache_clear: bool,
}

impl StoreSummary {
    pub fn of(repo: &RegisteredRepository) -> Self {
        let contract = repo.repository();
        Self {
            name: contract.name().to_string(),
            kind: repo.kind(),
            policy: contract.policy(),
            is_cache_clear: contract.is_cache_clear(),
        }
    }
}

/// Response body for the store listing (GET /stores)
#[derive(Debug, Clone, Serialize)]
pub struct StoresResponse {
    pub stores: Vec<StoreSummary>,
}

/// Response body for the stats endpoint (GET /stores/:store/stats)
///
/// `stats` is only present for tiered stores.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub store: StoreSummary,
    /// Number of cached entries across all tiers
    pub total_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
    /// Hit rate (hits / (hits + misses))
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
}

impl StatsResponse {
    pub fn of(repo: &RegisteredRepository) -> Self {
        let stats = repo.stats();
        Self {
            store: StoreSummary::of(repo),
            total_entries: repo.repository().all_cached_values().len(),
            hit_rate: stats.as_ref().map(CacheStats::hit_rate),
            stats,
        }
    }
}

/// Response body for POST /stores/:store/clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub store: String,
}

impl ClearResponse {
    pub fn new(store: impl Into<String>) -> Self {
        let store = store.into();
        Self {
            message: format!("Store '{}' cleared", store),
            store,
        }
    }
}

/// Response body for POST /stores/:store/migrate
#[derive(Debug, Clone, Serialize)]
pub struct MigrateResponse {
    pub store: String,
    /// Entries moved to disk; zero when the memory tier was empty
    pub moved: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
