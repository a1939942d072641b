//! API Module
//!
//! HTTP handlers and routing for the cache admin REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stores` - List registered stores
//! - `GET /stores/:store/stats` - Store summary and tier counters
//! - `PUT /stores/:store/set` - Store a key-value pair
//! - `GET /stores/:store/get/:key` - Retrieve a value by key
//! - `DELETE /stores/:store/del/:key` - Delete a key
//! - `POST /stores/:store/clear` - Empty every tier of a store
//! - `POST /stores/:store/migrate` - Move a tiered store's memory tier to disk

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
