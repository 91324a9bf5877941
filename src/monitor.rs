//! Sync monitoring - operator view over in-flight and failed migrations
//!
//! The monitor is strictly read-only. It surfaces stuck migrations but
//! never retries, cancels, or remediates them; remediation happens
//! outside and records its outcome through the ordinary upsert path.

use crate::edge::{Backend, StorageEdge, SyncState};
use crate::item::ItemKind;
use crate::storage::EdgeStore;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minutes after which a still-migrating edge counts as stuck.
pub const DEFAULT_STUCK_THRESHOLD_MINUTES: i64 = 30;

/// Conjunctive filter over active syncs. An empty filter matches all of them.
#[derive(Debug, Clone, Default)]
pub struct SyncFilter {
    /// Restrict to one active state; `idle` is rejected as a filter value
    pub sync_state: Option<SyncState>,
    pub backend: Option<Backend>,
    pub item_kind: Option<ItemKind>,
    pub stuck_only: bool,
}

/// One active sync enriched with elapsed-time diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusRecord {
    #[serde(flatten)]
    pub edge: StorageEdge,
    /// Whole seconds since the edge last changed state
    pub duration_since_last_transition: i64,
    pub is_stuck: bool,
}

impl SyncStatusRecord {
    /// Enrich one edge against the clock.
    ///
    /// Only migrating edges can be stuck; a failed edge already reached
    /// a terminal state no matter how old it is.
    pub fn from_edge(edge: StorageEdge, now: DateTime<Utc>, stuck_threshold: Duration) -> Self {
        let elapsed = now.signed_duration_since(edge.updated_at);
        let is_stuck = edge.sync_state == SyncState::Migrating && elapsed > stuck_threshold;

        Self {
            duration_since_last_transition: elapsed.num_seconds().max(0),
            is_stuck,
            edge,
        }
    }
}

/// Aggregate counts over one filtered set of active syncs.
///
/// The breakdown maps always carry every backend and item kind,
/// zeros included, so consumers never key-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCounts {
    pub total: u64,
    pub migrating: u64,
    pub failed: u64,
    pub stuck: u64,
    pub by_backend: BTreeMap<Backend, u64>,
    #[serde(rename = "byItemType")]
    pub by_item_kind: BTreeMap<ItemKind, u64>,
}

impl SyncCounts {
    /// Tally a set of already-enriched records.
    pub fn tally(records: &[SyncStatusRecord]) -> Self {
        let mut counts = Self {
            total: records.len() as u64,
            migrating: 0,
            failed: 0,
            stuck: 0,
            by_backend: Backend::all().iter().map(|b| (*b, 0)).collect(),
            by_item_kind: ItemKind::all().iter().map(|k| (*k, 0)).collect(),
        };

        for record in records {
            match record.edge.sync_state {
                SyncState::Migrating => counts.migrating += 1,
                SyncState::Failed => counts.failed += 1,
                SyncState::Idle => {}
            }
            if record.is_stuck {
                counts.stuck += 1;
            }
            *counts.by_backend.entry(record.edge.backend).or_insert(0) += 1;
            *counts.by_item_kind.entry(record.edge.item_kind).or_insert(0) += 1;
        }

        counts
    }
}

/// Read-only monitor over the edge store.
pub struct SyncMonitor<'a> {
    store: &'a EdgeStore,
    stuck_threshold: Duration,
}

impl<'a> SyncMonitor<'a> {
    /// Create a monitor with the default 30-minute stuck threshold
    pub fn new(store: &'a EdgeStore) -> Self {
        Self {
            store,
            stuck_threshold: Duration::minutes(DEFAULT_STUCK_THRESHOLD_MINUTES),
        }
    }

    /// Override the stuck threshold
    pub fn with_stuck_threshold(mut self, threshold: Duration) -> Self {
        self.stuck_threshold = threshold;
        self
    }

    /// List active syncs matching the filter, enriched and tallied.
    ///
    /// Counts cover exactly the returned records, including the
    /// stuck-only narrowing.
    pub fn list_active(&self, filter: &SyncFilter) -> Result<(Vec<SyncStatusRecord>, SyncCounts)> {
        if filter.sync_state == Some(SyncState::Idle) {
            return Err(Error::Validation(
                "Invalid syncState filter: must be one of migrating, failed".to_string(),
            ));
        }

        let edges =
            self.store
                .active_sync_edges(filter.sync_state, filter.backend, filter.item_kind)?;
        let now = Utc::now();

        let mut records: Vec<SyncStatusRecord> = edges
            .into_iter()
            .map(|edge| SyncStatusRecord::from_edge(edge, now, self.stuck_threshold))
            .collect();

        if filter.stuck_only {
            records.retain(|r| r.is_stuck);
        }

        let counts = SyncCounts::tally(&records);
        Ok((records, counts))
    }
}
