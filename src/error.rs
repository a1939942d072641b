//! Error types for the cache crate
//!
//! Cache operations never fail towards their caller. `DiskError` exists so the
//! disk tier can log what went wrong before collapsing it to a miss;
//! `CacheError` is only used by the registry and the HTTP surface.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Disk Error Enum ==
/// I/O failure inside the file system tier.
#[derive(Error, Debug)]
pub enum DiskError {
    /// Cache root or store directory could not be created
    #[error("failed to provision cache directory {path}: {source}")]
    Provision {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cached value could not be read
    #[error("failed to read cached value {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cached value could not be written
    #[error("failed to write cached value {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cached value or store directory could not be removed
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store directory could not be enumerated
    #[error("failed to list cache directory {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// == Cache Error Enum ==
/// Error type for the registry and the HTTP admin API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in the store
    #[error("Key not found: {0}")]
    NotFound(String),

    /// No store registered under this name
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// Store policy is `disabled`, nothing can be written
    #[error("Store is disabled: {0}")]
    StoreDisabled(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store name cannot be used as a directory name
    #[error("Invalid store name: {0:?}")]
    InvalidStoreName(String),

    /// Name already registered as a different kind of repository
    #[error("Store '{name}' is already registered as {existing}, not {requested}")]
    KindMismatch {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) | CacheError::StoreNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::StoreDisabled(_) | CacheError::KindMismatch { .. } => StatusCode::CONFLICT,
            CacheError::InvalidRequest(_) | CacheError::InvalidStoreName(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for registry and API code.
pub type Result<T> = std::result::Result<T, CacheError>;
