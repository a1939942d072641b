//! File System Tier Module
//!
//! One file per key under `<root>/<store name>/`. The tier is a best-effort
//! overflow store: I/O failures are logged and reported as misses.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use crate::cache::codec::{
    key_from_storage_key, storage_key, storage_key_sidecar, STORAGE_KEY_SUFFIX,
};
use crate::cache::CacheTier;
use crate::error::DiskError;

/// Cache root used when none is configured.
#[cfg(not(windows))]
pub const DEFAULT_CACHE_ROOT: &str = "/var/cache/tiered-cache";

/// Cache root used when none is configured.
#[cfg(windows)]
pub const DEFAULT_CACHE_ROOT: &str = "C:/TieredCache/Persistence";

/// Platform cache root.
pub fn default_cache_root() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_ROOT)
}

// == File System Tier ==
/// Disk-backed tier storing each value verbatim in its own file.
#[derive(Debug, Clone)]
pub struct FileSystemTier {
    root: PathBuf,
    dir: PathBuf,
}

impl FileSystemTier {
    /// Creates the tier for store `name` under `root` and provisions its directory.
    pub fn new(root: impl Into<PathBuf>, name: &str) -> Self {
        let root = root.into();
        let dir = root.join(name);
        let tier = Self { root, dir };
        if let Err(err) = tier.provision() {
            warn!("{}", err);
        }
        tier
    }

    /// Directory holding this store's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Root shared by every store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provision(&self) -> Result<(), DiskError> {
        for path in [&self.root, &self.dir] {
            if !path.is_dir() {
                fs::create_dir_all(path).map_err(|source| DiskError::Provision {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(storage_key(key))
    }

    fn try_get(&self, key: &str) -> Result<Option<String>, DiskError> {
        self.provision()?;
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DiskError::Read { path, source }),
        }
    }

    /// Sidecar path for keys too long to name their own file.
    fn sidecar_for(&self, key: &str) -> Option<PathBuf> {
        storage_key_sidecar(&storage_key(key)).map(|name| self.dir.join(name))
    }

    fn try_set(&self, key: &str, value: &str) -> Result<(), DiskError> {
        self.provision()?;
        if let Some(sidecar) = self.sidecar_for(key) {
            fs::write(&sidecar, key).map_err(|source| DiskError::Write {
                path: sidecar,
                source,
            })?;
        }
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| DiskError::Write { path, source })
    }

    fn try_remove(&self, key: &str) -> Result<(), DiskError> {
        self.provision()?;
        let sidecar = self.sidecar_for(key);
        for path in std::iter::once(self.path_for(key)).chain(sidecar) {
            match fs::remove_file(&path) {
                Err(source) if source.kind() != ErrorKind::NotFound => {
                    return Err(DiskError::Remove { path, source });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn try_clear(&self) -> Result<(), DiskError> {
        match fs::remove_dir_all(&self.dir) {
            Err(source) if source.kind() != ErrorKind::NotFound => {
                return Err(DiskError::Remove {
                    path: self.dir.clone(),
                    source,
                });
            }
            _ => {}
        }
        self.provision()
    }

    fn try_len(&self) -> Result<usize, DiskError> {
        self.provision()?;
        let entries = fs::read_dir(&self.dir).map_err(|source| DiskError::List {
            path: self.dir.clone(),
            source,
        })?;
        Ok(entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.ends_with(STORAGE_KEY_SUFFIX))
            })
            .count())
    }

    /// Original key of a stored value file.
    fn key_of(&self, file_name: &str) -> Option<String> {
        if let Some(key) = key_from_storage_key(file_name) {
            return Some(key);
        }
        let sidecar = self.dir.join(storage_key_sidecar(file_name)?);
        match fs::read_to_string(&sidecar) {
            Ok(key) => Some(key),
            Err(source) => {
                warn!("{}", DiskError::Read { path: sidecar, source });
                None
            }
        }
    }

    fn try_entries(&self) -> Result<HashMap<String, String>, DiskError> {
        self.provision()?;
        let listing = fs::read_dir(&self.dir).map_err(|source| DiskError::List {
            path: self.dir.clone(),
            source,
        })?;

        let mut entries = HashMap::new();
        for entry in listing.flatten() {
            let file_name = entry.file_name();
            let Some(key) = file_name.to_str().and_then(|name| self.key_of(name)) else {
                continue;
            };
            let path = entry.path();
            match fs::read_to_string(&path) {
                Ok(value) => {
                    entries.insert(key, value);
                }
                // Deleted between listing and reading.
                Err(source) if source.kind() == ErrorKind::NotFound => {}
                Err(source) => warn!("{}", DiskError::Read { path, source }),
            }
        }
        Ok(entries)
    }
}

impl CacheTier for FileSystemTier {
    const KIND: &'static str = "FileSystem";

    fn get(&self, key: &str) -> Option<String> {
        self.try_get(key).unwrap_or_else(|err| {
            warn!("{}", err);
            None
        })
    }

    fn set(&self, key: &str, value: &str) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(err) => {
                warn!("{}", err);
                false
            }
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.try_remove(key) {
            warn!("{}", err);
        }
    }

    fn clear(&self) {
        trace!("Clearing cache directory {}", self.dir.display());
        if let Err(err) = self.try_clear() {
            warn!("{}", err);
        }
    }

    fn len(&self) -> usize {
        self.try_len().unwrap_or_else(|err| {
            warn!("{}", err);
            0
        })
    }

    fn entries(&self) -> HashMap<String, String> {
        self.try_entries().unwrap_or_else(|err| {
            warn!("{}", err);
            HashMap::new()
        })
    }
}
