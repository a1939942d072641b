//! Configuration Module
//!
//! Handles loading server configuration and the stores to register at startup
//! from environment variables.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::cache::{default_cache_root, CachePolicy};
use crate::registry::StoreKind;

/// Store list used when `CACHE_STORES` is unset.
pub const DEFAULT_STORES: &str = "default=1m";

/// A store to register at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    pub name: String,
    pub policy: CachePolicy,
    pub kind: StoreKind,
}

impl StoreSpec {
    /// Parses `name=policy[:kind]`; the kind defaults to tiered.
    pub fn parse(entry: &str) -> Result<Self, String> {
        let (name, rest) = entry
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in store entry '{}'", entry))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing store name in '{}'", entry));
        }

        let (policy, kind) = match rest.split_once(':') {
            Some((policy, kind)) => (policy, kind.parse::<StoreKind>()?),
            None => (rest, StoreKind::Tiered),
        };

        Ok(Self {
            name: name.to_string(),
            policy: policy.parse()?,
            kind,
        })
    }
}

/// Parses a comma-separated store list. Malformed entries are skipped.
pub fn parse_store_specs(list: &str) -> Vec<StoreSpec> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match StoreSpec::parse(entry) {
            Ok(spec) => Some(spec),
            Err(e) => {
                warn!("Skipping store entry '{}': {}", entry, e);
                None
            }
        })
        .collect()
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Directory under which every disk tier gets its own subdirectory
    pub cache_root: PathBuf,
    /// Stores registered at startup
    pub stores: Vec<StoreSpec>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_ROOT` - Disk tier root (default: platform cache root)
    /// - `CACHE_STORES` - Comma-separated `name=policy[:kind]` list (default: `default=1m`)
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cache_root: env::var("CACHE_ROOT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_root),
            stores: parse_store_specs(
                &env::var("CACHE_STORES").unwrap_or_else(|_| DEFAULT_STORES.to_string()),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_root: default_cache_root(),
            stores: parse_store_specs(DEFAULT_STORES),
        }
    }
}
