//! Presence summaries - reducing edge facts into durability status
//!
//! Everything here is pure computation over edges already read from the
//! store. Summaries are derived on demand and never persisted, except
//! for collection rollups which the engine caches explicitly.
//!
//! Durability rules:
//! - An artifact counts only through `present = true` edges.
//! - Only the permanent ledger backend counts toward durability.
//! - `fully-durable` needs both artifacts on the ledger; one gives
//!   `partially-durable`; none gives `transient-only`.
//! - `unknown` marks a summary whose underlying read failed; unknown
//!   members are excluded from collection percentages entirely.

use crate::edge::{Artifact, Backend, StorageEdge};
use crate::item::{ItemKind, ItemRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall durability classification of an item or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Durability {
    /// Both artifacts present on the permanent ledger
    FullyDurable,
    /// Exactly one artifact present on the permanent ledger
    PartiallyDurable,
    /// No artifact on the permanent ledger
    TransientOnly,
    /// Underlying presence read failed; nothing is claimed
    Unknown,
}

impl Durability {
    /// Get the string representation of the durability status
    pub fn as_str(&self) -> &'static str {
        match self {
            Durability::FullyDurable => "fully-durable",
            Durability::PartiallyDurable => "partially-durable",
            Durability::TransientOnly => "transient-only",
            Durability::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for Durability {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "fully-durable" => Ok(Durability::FullyDurable),
            "partially-durable" => Ok(Durability::PartiallyDurable),
            "transient-only" => Ok(Durability::TransientOnly),
            "unknown" => Ok(Durability::Unknown),
            _ => Err(crate::Error::Validation(format!(
                "Unknown durability status: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which backends hold one artifact of one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPresence {
    pub relational: bool,
    pub blob: bool,
    pub ledger: bool,
}

impl ArtifactPresence {
    /// Mark the artifact present on a backend
    pub fn record(&mut self, backend: Backend) {
        match backend {
            Backend::TransientRelational => self.relational = true,
            Backend::TransientBlob => self.blob = true,
            Backend::PermanentLedger => self.ledger = true,
        }
    }

    /// Check presence on a backend
    pub fn on(&self, backend: Backend) -> bool {
        match backend {
            Backend::TransientRelational => self.relational,
            Backend::TransientBlob => self.blob,
            Backend::PermanentLedger => self.ledger,
        }
    }

    /// Check presence on any backend
    pub fn anywhere(&self) -> bool {
        self.relational || self.blob || self.ledger
    }
}

/// Per-item presence matrix plus overall durability status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPresenceSummary {
    pub item_id: Uuid,
    #[serde(rename = "itemType")]
    pub item_kind: ItemKind,
    pub metadata: ArtifactPresence,
    pub asset: ArtifactPresence,
    pub status: Durability,
}

impl ItemPresenceSummary {
    /// Reduce the edges of one item into its presence summary.
    ///
    /// The caller supplies the edges belonging to `item`; absent cells
    /// of the matrix simply contribute nothing.
    pub fn from_edges(item: ItemRef, edges: &[StorageEdge]) -> Self {
        let mut metadata = ArtifactPresence::default();
        let mut asset = ArtifactPresence::default();

        for edge in edges {
            if !edge.present {
                continue;
            }
            match edge.artifact {
                Artifact::Metadata => metadata.record(edge.backend),
                Artifact::Asset => asset.record(edge.backend),
            }
        }

        let status = match (metadata.ledger, asset.ledger) {
            (true, true) => Durability::FullyDurable,
            (false, false) => Durability::TransientOnly,
            _ => Durability::PartiallyDurable,
        };

        Self {
            item_id: item.id,
            item_kind: item.kind,
            metadata,
            asset,
            status,
        }
    }

    /// Degraded summary for an item whose edge read failed.
    pub fn unknown(item: ItemRef) -> Self {
        Self {
            item_id: item.id,
            item_kind: item.kind,
            metadata: ArtifactPresence::default(),
            asset: ArtifactPresence::default(),
            status: Durability::Unknown,
        }
    }
}

/// Collection-level durability rollup.
///
/// `computed_at` is `None` only on the zero-valued placeholder returned
/// for a collection nobody has refreshed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPresenceSummary {
    pub collection_id: Uuid,
    pub total_items: u64,
    pub fully_durable_items: u64,
    pub unknown_items: u64,
    pub completeness_percentage: u8,
    pub any_ledger_presence: bool,
    pub status: Durability,
    pub computed_at: Option<DateTime<Utc>>,
}

impl CollectionPresenceSummary {
    /// Roll member statuses up into one collection summary.
    ///
    /// Unknown members are excluded from both sides of the percentage
    /// and never count toward ledger presence.
    pub fn from_statuses(
        collection_id: Uuid,
        statuses: &[Durability],
        computed_at: DateTime<Utc>,
    ) -> Self {
        let total = statuses.len() as u64;
        let unknown = statuses
            .iter()
            .filter(|s| matches!(s, Durability::Unknown))
            .count() as u64;
        let fully_durable = statuses
            .iter()
            .filter(|s| matches!(s, Durability::FullyDurable))
            .count() as u64;
        let countable = total - unknown;

        let completeness_percentage = if countable > 0 {
            ((fully_durable as f64 / countable as f64) * 100.0).round() as u8
        } else {
            0
        };

        let any_ledger_presence = statuses
            .iter()
            .any(|s| matches!(s, Durability::FullyDurable | Durability::PartiallyDurable));

        let status = if total > 0 && countable == 0 {
            Durability::Unknown
        } else if countable > 0 && fully_durable == countable {
            Durability::FullyDurable
        } else if any_ledger_presence {
            Durability::PartiallyDurable
        } else {
            Durability::TransientOnly
        };

        Self {
            collection_id,
            total_items: total,
            fully_durable_items: fully_durable,
            unknown_items: unknown,
            completeness_percentage,
            any_ledger_presence,
            status,
            computed_at: Some(computed_at),
        }
    }

    /// Zero-valued summary for a collection with no cached rollup.
    pub fn empty(collection_id: Uuid) -> Self {
        Self {
            collection_id,
            total_items: 0,
            fully_durable_items: 0,
            unknown_items: 0,
            completeness_percentage: 0,
            any_ledger_presence: false,
            status: Durability::TransientOnly,
            computed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::SyncState;

    fn sample_item() -> ItemRef {
        ItemRef::new(Uuid::new_v4(), ItemKind::Image)
    }

    fn sample_edge(item: ItemRef, artifact: Artifact, backend: Backend, present: bool) -> StorageEdge {
        StorageEdge {
            item_id: item.id,
            item_kind: item.kind,
            artifact,
            backend,
            present,
            location: None,
            content_hash: None,
            size_bytes: None,
            sync_state: SyncState::Idle,
            sync_error: None,
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_transient_only_without_ledger_edges() {
        let item = sample_item();
        let edges = vec![
            sample_edge(item, Artifact::Metadata, Backend::TransientRelational, true),
            sample_edge(item, Artifact::Asset, Backend::TransientBlob, true),
        ];

        let summary = ItemPresenceSummary::from_edges(item, &edges);
        assert_eq!(summary.status, Durability::TransientOnly);
        assert!(summary.metadata.on(Backend::TransientRelational));
        assert!(summary.asset.on(Backend::TransientBlob));
        assert!(!summary.metadata.on(Backend::PermanentLedger));
        assert!(!summary.asset.on(Backend::PermanentLedger));
    }

    #[test]
    fn test_artifact_presence_tracks_backends_independently() {
        let mut presence = ArtifactPresence::default();
        assert!(!presence.anywhere());

        presence.record(Backend::TransientBlob);
        assert!(presence.on(Backend::TransientBlob));
        assert!(!presence.on(Backend::TransientRelational));
        assert!(!presence.on(Backend::PermanentLedger));

        presence.record(Backend::PermanentLedger);
        assert!(presence.on(Backend::PermanentLedger));
        assert!(presence.anywhere());
    }

    #[test]
    fn test_partially_durable_with_one_ledger_artifact() {
        let item = sample_item();
        let edges = vec![
            sample_edge(item, Artifact::Metadata, Backend::PermanentLedger, true),
            sample_edge(item, Artifact::Asset, Backend::TransientBlob, true),
        ];

        let summary = ItemPresenceSummary::from_edges(item, &edges);
        assert_eq!(summary.status, Durability::PartiallyDurable);
    }

    #[test]
    fn test_fully_durable_with_both_ledger_artifacts() {
        let item = sample_item();
        let edges = vec![
            sample_edge(item, Artifact::Metadata, Backend::PermanentLedger, true),
            sample_edge(item, Artifact::Asset, Backend::PermanentLedger, true),
            sample_edge(item, Artifact::Metadata, Backend::TransientRelational, true),
        ];

        let summary = ItemPresenceSummary::from_edges(item, &edges);
        assert_eq!(summary.status, Durability::FullyDurable);
    }

    #[test]
    fn test_absent_edges_contribute_nothing() {
        let item = sample_item();
        let edges = vec![
            sample_edge(item, Artifact::Metadata, Backend::PermanentLedger, false),
            sample_edge(item, Artifact::Asset, Backend::PermanentLedger, false),
        ];

        let summary = ItemPresenceSummary::from_edges(item, &edges);
        assert_eq!(summary.status, Durability::TransientOnly);
        assert!(!summary.metadata.anywhere());
        assert!(!summary.asset.anywhere());
    }

    #[test]
    fn test_no_edges_means_transient_only() {
        let item = sample_item();
        let summary = ItemPresenceSummary::from_edges(item, &[]);
        assert_eq!(summary.status, Durability::TransientOnly);
    }

    #[test]
    fn test_unknown_summary_claims_nothing() {
        let item = sample_item();
        let summary = ItemPresenceSummary::unknown(item);
        assert_eq!(summary.status, Durability::Unknown);
        assert!(!summary.metadata.anywhere());
        assert!(!summary.asset.anywhere());
    }

    #[test]
    fn test_collection_mixed_membership() {
        let statuses = vec![
            Durability::FullyDurable,
            Durability::FullyDurable,
            Durability::PartiallyDurable,
            Durability::TransientOnly,
        ];
        let summary =
            CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &statuses, Utc::now());

        assert_eq!(summary.total_items, 4);
        assert_eq!(summary.fully_durable_items, 2);
        assert_eq!(summary.completeness_percentage, 50);
        assert!(summary.any_ledger_presence);
        assert_eq!(summary.status, Durability::PartiallyDurable);
    }

    #[test]
    fn test_collection_all_durable() {
        let statuses = vec![Durability::FullyDurable; 3];
        let summary =
            CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &statuses, Utc::now());

        assert_eq!(summary.completeness_percentage, 100);
        assert_eq!(summary.status, Durability::FullyDurable);
    }

    #[test]
    fn test_empty_collection_reports_zero_percent() {
        let summary = CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &[], Utc::now());

        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.completeness_percentage, 0);
        assert!(!summary.any_ledger_presence);
        assert_eq!(summary.status, Durability::TransientOnly);
    }

    #[test]
    fn test_unknown_members_excluded_from_percentage() {
        let statuses = vec![
            Durability::FullyDurable,
            Durability::Unknown,
            Durability::Unknown,
        ];
        let summary =
            CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &statuses, Utc::now());

        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.unknown_items, 2);
        assert_eq!(summary.fully_durable_items, 1);
        assert_eq!(summary.completeness_percentage, 100);
        assert_eq!(summary.status, Durability::FullyDurable);
    }

    #[test]
    fn test_collection_all_unknown() {
        let statuses = vec![Durability::Unknown; 2];
        let summary =
            CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &statuses, Utc::now());

        assert_eq!(summary.completeness_percentage, 0);
        assert_eq!(summary.status, Durability::Unknown);
        assert!(!summary.any_ledger_presence);
    }

    #[test]
    fn test_percentage_rounds_to_nearest() {
        let one_of_three = vec![
            Durability::FullyDurable,
            Durability::TransientOnly,
            Durability::TransientOnly,
        ];
        let summary =
            CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &one_of_three, Utc::now());
        assert_eq!(summary.completeness_percentage, 33);

        let two_of_three = vec![
            Durability::FullyDurable,
            Durability::FullyDurable,
            Durability::TransientOnly,
        ];
        let summary =
            CollectionPresenceSummary::from_statuses(Uuid::new_v4(), &two_of_three, Utc::now());
        assert_eq!(summary.completeness_percentage, 67);
    }

    #[test]
    fn test_empty_placeholder_has_no_timestamp() {
        let summary = CollectionPresenceSummary::empty(Uuid::new_v4());
        assert!(summary.computed_at.is_none());
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.status, Durability::TransientOnly);
    }
}
