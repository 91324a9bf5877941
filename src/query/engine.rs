//! Presence aggregation engine
//!
//! Composes store reads with the pure reduction rules:
//! - Item presence, computed fresh from current edges on every call
//! - Collection presence, live or served from the explicit rollup cache
//! - Batch presence for page-sized sets of items
//!
//! Read paths degrade instead of failing: an item whose edges cannot be
//! read reports status unknown, and a collection without a cached rollup
//! reports the zero-valued placeholder. Only the refresh path, which
//! writes, surfaces errors.

use crate::Result;
use crate::item::ItemRef;
use crate::presence::{CollectionPresenceSummary, Durability, ItemPresenceSummary};
use crate::storage::EdgeStore;
use chrono::Utc;
use uuid::Uuid;

/// Aggregation engine over the edge store
pub struct PresenceEngine<'a> {
    store: &'a EdgeStore,
}

impl<'a> PresenceEngine<'a> {
    /// Create a new presence engine
    pub fn new(store: &'a EdgeStore) -> Self {
        Self { store }
    }

    /// Compute one item's presence summary from its current edges.
    ///
    /// An item with no edges yields a valid transient-only summary.
    pub fn item_presence(&self, item: ItemRef) -> Result<ItemPresenceSummary> {
        let edges = self.store.edges_of_item(item)?;
        Ok(ItemPresenceSummary::from_edges(item, &edges))
    }

    /// Compute presence for a batch of items.
    ///
    /// Each entry degrades independently: a failed read yields an
    /// unknown summary for that item, never an error for the batch.
    pub fn batch_presence(&self, items: &[ItemRef]) -> Vec<ItemPresenceSummary> {
        items
            .iter()
            .map(|item| match self.item_presence(*item) {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!("presence read failed for item {}: {}", item, e);
                    ItemPresenceSummary::unknown(*item)
                }
            })
            .collect()
    }

    /// Compute a collection rollup live from its members' current edges.
    ///
    /// Membership lookup failure is an error; per-member presence
    /// failures degrade that member to unknown and keep going.
    pub fn collection_presence_live(&self, collection_id: Uuid) -> Result<CollectionPresenceSummary> {
        let members = self.store.collection_members(collection_id)?;

        let mut statuses = Vec::with_capacity(members.len());
        for item in members {
            match self.item_presence(item) {
                Ok(summary) => statuses.push(summary.status),
                Err(e) => {
                    tracing::warn!("presence read failed for member {}: {}", item, e);
                    statuses.push(Durability::Unknown);
                }
            }
        }

        Ok(CollectionPresenceSummary::from_statuses(
            collection_id,
            &statuses,
            Utc::now(),
        ))
    }

    /// Read the cached rollup for a collection.
    ///
    /// Never recomputes. A collection nobody has refreshed yet gets the
    /// zero-valued placeholder with no computed_at timestamp.
    pub fn collection_presence_cached(&self, collection_id: Uuid) -> Result<CollectionPresenceSummary> {
        Ok(self
            .store
            .cached_rollup(collection_id)?
            .unwrap_or_else(|| CollectionPresenceSummary::empty(collection_id)))
    }

    /// Recompute one collection's rollup and persist it to the cache
    pub fn refresh_collection(&self, collection_id: Uuid) -> Result<CollectionPresenceSummary> {
        let summary = self.collection_presence_live(collection_id)?;
        self.store.store_rollup(&summary)?;
        tracing::debug!(
            "refreshed rollup for collection {}: {} items, {}% durable",
            collection_id,
            summary.total_items,
            summary.completeness_percentage
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{Artifact, Backend, EdgeUpsert, SyncState};
    use crate::item::ItemKind;

    fn present(item: ItemRef, artifact: Artifact, backend: Backend) -> EdgeUpsert {
        EdgeUpsert::new(item, artifact, backend).with_present(true)
    }

    fn make_fully_durable(store: &EdgeStore, item: ItemRef) {
        store
            .upsert_edge(&present(item, Artifact::Metadata, Backend::PermanentLedger))
            .unwrap();
        store
            .upsert_edge(&present(item, Artifact::Asset, Backend::PermanentLedger))
            .unwrap();
    }

    #[test]
    fn test_item_presence_progression_to_fully_durable() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Image);

        store
            .upsert_edge(&present(item, Artifact::Metadata, Backend::TransientRelational))
            .unwrap();
        assert_eq!(
            engine.item_presence(item).unwrap().status,
            Durability::TransientOnly
        );

        store
            .upsert_edge(&present(item, Artifact::Asset, Backend::PermanentLedger))
            .unwrap();
        assert_eq!(
            engine.item_presence(item).unwrap().status,
            Durability::PartiallyDurable
        );

        store
            .upsert_edge(&present(item, Artifact::Metadata, Backend::PermanentLedger))
            .unwrap();
        let summary = engine.item_presence(item).unwrap();
        assert_eq!(summary.status, Durability::FullyDurable);
        assert!(summary.metadata.relational);
        assert!(summary.metadata.ledger);
        assert!(summary.asset.ledger);
        assert!(!summary.asset.blob);
    }

    #[test]
    fn test_item_without_edges_is_transient_only() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Document);

        let summary = engine.item_presence(item).unwrap();
        assert_eq!(summary.status, Durability::TransientOnly);
        assert!(!summary.metadata.anywhere());
    }

    #[test]
    fn test_reads_see_latest_write() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Image);

        make_fully_durable(&store, item);
        assert_eq!(
            engine.item_presence(item).unwrap().status,
            Durability::FullyDurable
        );

        // Ledger copy marked absent again: live read reflects it at once
        store
            .upsert_edge(&EdgeUpsert::new(item, Artifact::Asset, Backend::PermanentLedger))
            .unwrap();
        assert_eq!(
            engine.item_presence(item).unwrap().status,
            Durability::PartiallyDurable
        );
    }

    #[test]
    fn test_batch_presence_keeps_input_order() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let durable = ItemRef::new(Uuid::new_v4(), ItemKind::Image);
        let bare = ItemRef::new(Uuid::new_v4(), ItemKind::Note);

        make_fully_durable(&store, durable);

        let summaries = engine.batch_presence(&[bare, durable]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].item_id, bare.id);
        assert_eq!(summaries[0].status, Durability::TransientOnly);
        assert_eq!(summaries[1].status, Durability::FullyDurable);
    }

    #[test]
    fn test_live_collection_rollup() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let collection = Uuid::new_v4();

        let items: Vec<ItemRef> = (0..4)
            .map(|i| {
                let item = ItemRef::new(Uuid::new_v4(), ItemKind::Image);
                store.link_member(collection, item, i).unwrap();
                item
            })
            .collect();

        make_fully_durable(&store, items[0]);
        make_fully_durable(&store, items[1]);
        store
            .upsert_edge(&present(items[2], Artifact::Metadata, Backend::PermanentLedger))
            .unwrap();
        store
            .upsert_edge(&present(items[3], Artifact::Asset, Backend::TransientBlob))
            .unwrap();

        let summary = engine.collection_presence_live(collection).unwrap();
        assert_eq!(summary.total_items, 4);
        assert_eq!(summary.fully_durable_items, 2);
        assert_eq!(summary.completeness_percentage, 50);
        assert_eq!(summary.status, Durability::PartiallyDurable);
        assert!(summary.any_ledger_presence);
        assert!(summary.computed_at.is_some());
    }

    #[test]
    fn test_cached_read_misses_until_refreshed() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let collection = Uuid::new_v4();
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Image);

        store.link_member(collection, item, 0).unwrap();
        make_fully_durable(&store, item);

        // Nothing cached yet: zero-valued placeholder, not an error
        let miss = engine.collection_presence_cached(collection).unwrap();
        assert_eq!(miss.total_items, 0);
        assert!(miss.computed_at.is_none());

        let refreshed = engine.refresh_collection(collection).unwrap();
        assert_eq!(refreshed.total_items, 1);
        assert_eq!(refreshed.completeness_percentage, 100);

        let cached = engine.collection_presence_cached(collection).unwrap();
        assert_eq!(cached.status, Durability::FullyDurable);
        assert_eq!(cached.computed_at, refreshed.computed_at);
    }

    #[test]
    fn test_cache_is_stale_until_next_refresh() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let collection = Uuid::new_v4();
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Video);

        store.link_member(collection, item, 0).unwrap();
        make_fully_durable(&store, item);
        engine.refresh_collection(collection).unwrap();

        // Ledger copies withdrawn after the refresh
        store
            .upsert_edge(&EdgeUpsert::new(item, Artifact::Metadata, Backend::PermanentLedger))
            .unwrap();
        store
            .upsert_edge(&EdgeUpsert::new(item, Artifact::Asset, Backend::PermanentLedger))
            .unwrap();

        // Cached read still says fully durable; live read does not
        let cached = engine.collection_presence_cached(collection).unwrap();
        assert_eq!(cached.status, Durability::FullyDurable);
        let live = engine.collection_presence_live(collection).unwrap();
        assert_eq!(live.status, Durability::TransientOnly);

        let refreshed = engine.refresh_collection(collection).unwrap();
        assert_eq!(refreshed.status, Durability::TransientOnly);
        assert_eq!(
            engine.collection_presence_cached(collection).unwrap().status,
            Durability::TransientOnly
        );
    }

    #[test]
    fn test_refresh_of_empty_collection() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let collection = Uuid::new_v4();

        let summary = engine.refresh_collection(collection).unwrap();
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.completeness_percentage, 0);
        assert_eq!(summary.status, Durability::TransientOnly);

        // The refresh persisted a real (zero-member) rollup
        let cached = engine.collection_presence_cached(collection).unwrap();
        assert!(cached.computed_at.is_some());
    }

    #[test]
    fn test_migrating_edge_does_not_count_presence() {
        let store = EdgeStore::open_in_memory().unwrap();
        let engine = PresenceEngine::new(&store);
        let item = ItemRef::new(Uuid::new_v4(), ItemKind::Image);

        // In-flight copy: row exists, present still false
        store
            .upsert_edge(
                &EdgeUpsert::new(item, Artifact::Asset, Backend::PermanentLedger)
                    .with_sync_state(SyncState::Migrating),
            )
            .unwrap();

        let summary = engine.item_presence(item).unwrap();
        assert_eq!(summary.status, Durability::TransientOnly);
        assert!(!summary.asset.ledger);
    }
}
