//! # Vaultmap - Storage Presence Tracker
//!
//! Tracks which storage backend holds which artifact of which item.
//!
//! Vaultmap provides:
//! - A per-item presence matrix of artifacts across heterogeneous backends
//! - Atomic last-write-wins upserts keyed by (item, artifact, backend)
//! - Durability classification computed live from current edges
//! - Cached collection-level rollups refreshed on demand
//! - A sync monitor surfacing in-flight, failed, and stuck migrations
//! - SQLite-backed storage with an HTTP query service and CLI

pub mod item;
pub mod edge;
pub mod presence;
pub mod monitor;
pub mod storage;
pub mod query;
pub mod server;
pub mod config;


// Re-exports for convenient access
pub use item::{ItemKind, ItemRef};
pub use edge::{Artifact, Backend, EdgeFilter, EdgeUpsert, StorageEdge, SyncState};
pub use presence::{CollectionPresenceSummary, Durability, ItemPresenceSummary};
pub use monitor::{SyncCounts, SyncFilter, SyncMonitor, SyncStatusRecord};
pub use query::PresenceEngine;
pub use storage::EdgeStore;

/// Result type alias for Vaultmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Vaultmap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for transient store contention a caller may retry after backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
