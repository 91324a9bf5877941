//! Storage edges - presence facts linking items to backends
//!
//! One edge records whether a given backend currently holds a given
//! artifact of a given item, plus where, how big, and how its last
//! replication went. The full matrix for an item is at most
//! artifact count x backend count edges; missing rows mean "absent".

use crate::item::{ItemKind, ItemRef};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The two artifacts every item decomposes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    /// Structured record: title, description, timestamps, ownership
    Metadata,
    /// Binary payload: image bytes, video file, document body
    Asset,
}

impl Artifact {
    /// Get the string representation of the artifact
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Metadata => "metadata",
            Artifact::Asset => "asset",
        }
    }

    /// Get both artifacts
    pub fn all() -> &'static [Artifact] {
        &[Artifact::Metadata, Artifact::Asset]
    }
}

impl FromStr for Artifact {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "metadata" => Ok(Artifact::Metadata),
            "asset" => Ok(Artifact::Asset),
            _ => Err(Error::Validation(format!("Unknown artifact: {}", s))),
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The storage backends an artifact can live on.
///
/// Variants are declared in ascending durability order; only
/// [`Backend::PermanentLedger`] counts toward durability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Relational store holding structured records; fast, transient
    TransientRelational,
    /// Blob store holding binary payloads; fast, transient
    TransientBlob,
    /// Append-style permanent store; slow, durable
    PermanentLedger,
}

impl Backend {
    /// Get the string representation of the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::TransientRelational => "transient-relational",
            Backend::TransientBlob => "transient-blob",
            Backend::PermanentLedger => "permanent-ledger",
        }
    }

    /// Get all backends
    pub fn all() -> &'static [Backend] {
        &[
            Backend::TransientRelational,
            Backend::TransientBlob,
            Backend::PermanentLedger,
        ]
    }

    /// Check if presence on this backend counts as durable
    pub fn is_permanent(&self) -> bool {
        matches!(self, Backend::PermanentLedger)
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transient-relational" => Ok(Backend::TransientRelational),
            "transient-blob" => Ok(Backend::TransientBlob),
            "permanent-ledger" => Ok(Backend::PermanentLedger),
            _ => Err(Error::Validation(format!("Unknown backend: {}", s))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Replication lifecycle state of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No replication in flight
    Idle,
    /// Copy toward this backend is in progress; location is not yet authoritative
    Migrating,
    /// Last replication attempt failed; see sync_error
    Failed,
}

impl SyncState {
    /// Get the string representation of the sync state
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Migrating => "migrating",
            SyncState::Failed => "failed",
        }
    }

    /// Get all sync states
    pub fn all() -> &'static [SyncState] {
        &[SyncState::Idle, SyncState::Migrating, SyncState::Failed]
    }

    /// Check if this state represents a sync needing operator attention
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Migrating | SyncState::Failed)
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(SyncState::Idle),
            "migrating" => Ok(SyncState::Migrating),
            "failed" => Ok(SyncState::Failed),
            _ => Err(Error::Validation(format!("Unknown sync state: {}", s))),
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stored presence fact.
///
/// Uniquely identified by (item_id, item_kind, artifact, backend);
/// everything else is mutable payload overwritten on upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEdge {
    pub item_id: Uuid,
    #[serde(rename = "itemType")]
    pub item_kind: ItemKind,
    pub artifact: Artifact,
    pub backend: Backend,
    /// Whether the backend currently holds the artifact
    pub present: bool,
    /// Backend-specific locator (path, URL, ledger reference)
    pub location: Option<String>,
    /// Integrity hash of the stored bytes, if the writer computed one
    pub content_hash: Option<String>,
    pub size_bytes: Option<i64>,
    pub sync_state: SyncState,
    /// Failure detail from the last replication attempt
    pub sync_error: Option<String>,
    /// When this edge last completed a transition into idle
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageEdge {
    /// The item this edge belongs to
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_id, self.item_kind)
    }
}

/// The field set one upsert carries.
///
/// An upsert always describes the whole edge: fields left at their
/// defaults (absent, false, idle) overwrite whatever was stored before.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeUpsert {
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    pub artifact: Artifact,
    pub backend: Backend,
    pub present: bool,
    pub location: Option<String>,
    pub content_hash: Option<String>,
    pub size_bytes: Option<i64>,
    pub sync_state: SyncState,
    pub sync_error: Option<String>,
}

impl EdgeUpsert {
    /// Create an upsert for one cell of the presence matrix
    pub fn new(item: ItemRef, artifact: Artifact, backend: Backend) -> Self {
        Self {
            item_id: item.id,
            item_kind: item.kind,
            artifact,
            backend,
            present: false,
            location: None,
            content_hash: None,
            size_bytes: None,
            sync_state: SyncState::Idle,
            sync_error: None,
        }
    }

    /// Set the presence flag
    pub fn with_present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }

    /// Set the backend-specific locator
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the content hash
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// Set the stored size in bytes
    pub fn with_size_bytes(mut self, size: i64) -> Self {
        self.size_bytes = Some(size);
        self
    }

    /// Set the sync state
    pub fn with_sync_state(mut self, state: SyncState) -> Self {
        self.sync_state = state;
        self
    }

    /// Set the sync error detail
    pub fn with_sync_error(mut self, error: impl Into<String>) -> Self {
        self.sync_error = Some(error.into());
        self
    }

    /// The item this upsert targets
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_id, self.item_kind)
    }

    /// Check field constraints before any write happens.
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.size_bytes {
            if size < 0 {
                return Err(Error::Validation(format!(
                    "Invalid sizeBytes: must be non-negative, got {}",
                    size
                )));
            }
        }
        Ok(())
    }
}

/// Conjunctive filter over stored edges. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub item_id: Option<Uuid>,
    pub item_kind: Option<ItemKind>,
    pub artifact: Option<Artifact>,
    pub backend: Option<Backend>,
    pub sync_state: Option<SyncState>,
}

impl EdgeFilter {
    /// Check if no conditions are set
    pub fn is_empty(&self) -> bool {
        self.item_id.is_none()
            && self.item_kind.is_none()
            && self.artifact.is_none()
            && self.backend.is_none()
            && self.sync_state.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_roundtrip() {
        for artifact in Artifact::all() {
            let parsed: Artifact = artifact.as_str().parse().unwrap();
            assert_eq!(*artifact, parsed);
        }
    }

    #[test]
    fn test_backend_roundtrip() {
        for backend in Backend::all() {
            let parsed: Backend = backend.as_str().parse().unwrap();
            assert_eq!(*backend, parsed);
        }
    }

    #[test]
    fn test_sync_state_roundtrip() {
        for state in SyncState::all() {
            let parsed: SyncState = state.as_str().parse().unwrap();
            assert_eq!(*state, parsed);
        }
    }

    #[test]
    fn test_backend_rejects_unknown() {
        let err = Backend::from_str("not-a-backend").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(Backend::from_str("Permanent-Ledger").is_err());
    }

    #[test]
    fn test_only_ledger_is_permanent() {
        assert!(Backend::PermanentLedger.is_permanent());
        assert!(!Backend::TransientRelational.is_permanent());
        assert!(!Backend::TransientBlob.is_permanent());
    }

    #[test]
    fn test_active_sync_states() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Migrating.is_active());
        assert!(SyncState::Failed.is_active());
    }

    #[test]
    fn test_upsert_defaults() {
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Image);
        let upsert = EdgeUpsert::new(item, Artifact::Asset, Backend::TransientBlob);

        assert!(!upsert.present);
        assert_eq!(upsert.sync_state, SyncState::Idle);
        assert!(upsert.location.is_none());
        assert!(upsert.validate().is_ok());
    }

    #[test]
    fn test_upsert_rejects_negative_size() {
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Video);
        let upsert = EdgeUpsert::new(item, Artifact::Asset, Backend::TransientBlob)
            .with_size_bytes(-1);

        let err = upsert.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_filter_empty_only_without_conditions() {
        assert!(EdgeFilter::default().is_empty());

        let filter = EdgeFilter {
            backend: Some(Backend::PermanentLedger),
            ..Default::default()
        };
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_edge_wire_names() {
        let item = ItemRef::new(Uuid::nil(), ItemKind::Image);
        let edge = StorageEdge {
            item_id: item.id,
            item_kind: item.kind,
            artifact: Artifact::Metadata,
            backend: Backend::PermanentLedger,
            present: true,
            location: Some("ledger://vault/0".to_string()),
            content_hash: None,
            size_bytes: Some(512),
            sync_state: SyncState::Idle,
            sync_error: None,
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["itemType"], "image");
        assert_eq!(json["backend"], "permanent-ledger");
        assert_eq!(json["syncState"], "idle");
        assert_eq!(json["sizeBytes"], 512);
        assert!(json["lastSyncedAt"].is_null());
    }
}
