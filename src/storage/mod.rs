//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - storage_edges(item_id, item_type, artifact, backend, present, ...)
//! - collection_members(collection_id, item_id, item_type, position)
//! - collection_rollups(collection_id, counts, status, computed_at)

pub mod schema;
pub mod sqlite;

pub use sqlite::{EdgeStore, StoreStats};
