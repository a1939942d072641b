//! API Handlers
//!
//! HTTP request handlers for each cache admin endpoint.
//!
//! Repository calls may touch the disk tier, so handlers run them on tokio's
//! blocking pool through [`blocking`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, MigrateResponse, SetRequest,
    SetResponse, StatsResponse, StoreSummary, StoresResponse,
};
use crate::registry::{CacheRegistry, RegisteredRepository};
use crate::tasks::Scheduler;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Every store the server exposes
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    /// Creates a new AppState over an existing registry.
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }

    /// Creates a registry at the configured root and registers the
    /// configured stores on it.
    pub fn from_config(config: &Config, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        let registry = CacheRegistry::new(&config.cache_root, scheduler);
        for spec in &config.stores {
            registry.get_or_create(&spec.name, spec.kind, spec.policy)?;
        }
        Ok(Self::new(Arc::new(registry)))
    }

    fn store(&self, name: &str) -> Result<RegisteredRepository> {
        self.registry
            .get(name)
            .ok_or_else(|| CacheError::StoreNotFound(name.to_string()))
    }
}

/// Runs `work` on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        warn!("Repository task failed: {}", e);
        CacheError::Internal(e.to_string())
    })
}

/// Handler for PUT /stores/:store/set
///
/// Writes raw text to the store's memory tier. A store that cannot write
/// the value answers with an internal error.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(store): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let repo = state.store(&store)?;
    if repo.repository().is_disabled() {
        warn!("Rejected set of '{}' on disabled store '{}'", req.key, store);
        return Err(CacheError::StoreDisabled(store));
    }

    let SetRequest { key, value } = req;
    let (key, stored) = blocking(move || {
        let stored = repo.repository().set(&key, &value).is_some();
        (key, stored)
    })
    .await?;
    if !stored {
        return Err(CacheError::Internal(format!(
            "could not store '{}' in '{}'",
            key, store
        )));
    }

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /stores/:store/get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((store, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let repo = state.store(&store)?;
    let (key, value) = blocking(move || {
        let value = repo.repository().get(&key);
        (key, value)
    })
    .await?;
    let value = value.ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /stores/:store/del/:key
///
/// Succeeds whether or not the key was cached.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((store, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let repo = state.store(&store)?;
    let key = blocking(move || {
        repo.repository().remove_key(&key);
        key
    })
    .await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /stores/:store/clear
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(store): Path<String>,
) -> Result<Json<ClearResponse>> {
    let repo = state.store(&store)?;
    blocking(move || repo.repository().clear()).await?;
    debug!("Cleared store '{}' on request", store);

    Ok(Json(ClearResponse::new(store)))
}

/// Handler for POST /stores/:store/migrate
///
/// Runs a memory-to-disk migration now. Only tiered stores migrate.
pub async fn migrate_handler(
    State(state): State<AppState>,
    Path(store): Path<String>,
) -> Result<Json<MigrateResponse>> {
    let repo = state.store(&store)?;
    let kind = repo.kind();
    let moved = blocking(move || repo.migrate()).await?.ok_or_else(|| {
        CacheError::InvalidRequest(format!(
            "Store '{}' is a {} store and does not migrate",
            store, kind
        ))
    })?;

    Ok(Json(MigrateResponse { store, moved }))
}

/// Handler for GET /stores
pub async fn list_stores_handler(State(state): State<AppState>) -> Result<Json<StoresResponse>> {
    let registry = state.registry.clone();
    let stores = blocking(move || {
        registry
            .names()
            .iter()
            .filter_map(|name| registry.get(name))
            .map(|repo| StoreSummary::of(&repo))
            .collect::<Vec<_>>()
    })
    .await?;

    Ok(Json(StoresResponse { stores }))
}

/// Handler for GET /stores/:store/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(store): Path<String>,
) -> Result<Json<StatsResponse>> {
    let repo = state.store(&store)?;
    let stats = blocking(move || StatsResponse::of(&repo)).await?;
    Ok(Json(stats))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::registry::StoreKind;
    use crate::tasks::ManualScheduler;
    use tempfile::TempDir;

    fn state() -> (TempDir, AppState) {
        let root = TempDir::new().unwrap();
        let registry = CacheRegistry::new(root.path(), Arc::new(ManualScheduler::new()));
        registry.tiered("tiered", CachePolicy::StaleAfterOneMinute).unwrap();
        registry.memory("memory", CachePolicy::StaleAfterOneMinute).unwrap();
        registry.memory("off", CachePolicy::DoNotCache).unwrap();
        (root, AppState::new(Arc::new(registry)))
    }

    fn set_request(key: &str, value: &str) -> Json<SetRequest> {
        Json(SetRequest {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn path(store: &str, key: &str) -> Path<(String, String)> {
        Path((store.to_string(), key.to_string()))
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (_root, state) = state();

        let result = set_handler(
            State(state.clone()),
            Path("tiered".to_string()),
            set_request("test_key", "test_value"),
        )
        .await;
        assert!(result.is_ok());

        let response = get_handler(State(state), path("tiered", "test_key")).await.unwrap();
        assert_eq!(response.value, "test_value");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (_root, state) = state();

        let result = get_handler(State(state), path("memory", "nonexistent")).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_store() {
        let (_root, state) = state();

        let result = get_handler(State(state.clone()), path("nope", "k")).await;
        assert!(matches!(result, Err(CacheError::StoreNotFound(_))));

        let result = clear_handler(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(CacheError::StoreNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_on_disabled_store() {
        let (_root, state) = state();

        let result = set_handler(State(state), Path("off".to_string()), set_request("k", "v")).await;
        assert!(matches!(result, Err(CacheError::StoreDisabled(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (_root, state) = state();
        set_handler(State(state.clone()), Path("memory".to_string()), set_request("gone", "v"))
            .await
            .unwrap();

        let result = delete_handler(State(state.clone()), path("memory", "gone")).await;
        assert!(result.is_ok());
        let result = delete_handler(State(state.clone()), path("memory", "never-set")).await;
        assert!(result.is_ok());

        let result = get_handler(State(state), path("memory", "gone")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_migrate_and_stats() {
        let (_root, state) = state();
        set_handler(State(state.clone()), Path("tiered".to_string()), set_request("a", "1"))
            .await
            .unwrap();

        let response = migrate_handler(State(state.clone()), Path("tiered".to_string()))
            .await
            .unwrap();
        assert_eq!(response.moved, 1);

        get_handler(State(state.clone()), path("tiered", "a")).await.unwrap();
        let stats = stats_handler(State(state.clone()), Path("tiered".to_string()))
            .await
            .unwrap();
        assert_eq!(stats.store.kind, StoreKind::Tiered);
        assert_eq!(stats.stats.as_ref().map(|s| s.disk_hits), Some(1));

        let result = migrate_handler(State(state), Path("memory".to_string())).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_list_stores_and_clear() {
        let (_root, state) = state();
        set_handler(State(state.clone()), Path("memory".to_string()), set_request("k", "v"))
            .await
            .unwrap();

        let listing = list_stores_handler(State(state.clone())).await.unwrap();
        let names: Vec<&str> = listing.stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["memory", "off", "tiered"]);
        assert!(!listing.stores[0].is_cache_clear);

        clear_handler(State(state.clone()), Path("memory".to_string())).await.unwrap();
        let listing = list_stores_handler(State(state)).await.unwrap();
        assert!(listing.stores[0].is_cache_clear);
    }

    #[tokio::test]
    async fn test_state_from_config() {
        let root = TempDir::new().unwrap();
        let config = Config {
            server_port: 0,
            cache_root: root.path().to_path_buf(),
            stores: crate::config::parse_store_specs("a=5s:memory,b=never"),
        };

        let state = AppState::from_config(&config, Arc::new(ManualScheduler::new())).unwrap();
        assert_eq!(state.registry.names(), vec!["a", "b"]);
        assert!(root.path().join("b").is_dir());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
