use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::edge::{Artifact, Backend, EdgeFilter, EdgeUpsert, StorageEdge};
use crate::item::ItemRef;
use crate::monitor::{SyncCounts, SyncFilter, SyncMonitor, SyncStatusRecord};
use crate::presence::{CollectionPresenceSummary, ItemPresenceSummary};
use crate::query::PresenceEngine;
use crate::server::AppState;
use crate::storage::StoreStats;
use crate::{Error, Result};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type Rejection = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto a response status.
///
/// Validation never touched the store, busy/locked is worth a retry,
/// anything else is on us.
fn reject(e: Error) -> Rejection {
    let status = match &e {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ========== Edges ==========

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertEdgeBody {
    pub item_id: String,
    pub item_type: String,
    pub artifact: String,
    pub backend: String,
    pub present: Option<bool>,
    pub location: Option<String>,
    pub content_hash: Option<String>,
    pub size_bytes: Option<i64>,
    pub sync_state: Option<String>,
    pub sync_error: Option<String>,
}

impl UpsertEdgeBody {
    /// Parse the raw wire fields into a typed upsert
    fn into_upsert(self) -> Result<EdgeUpsert> {
        let item = ItemRef::parse(&self.item_id, &self.item_type)?;
        let artifact: Artifact = self.artifact.parse()?;
        let backend: Backend = self.backend.parse()?;

        let mut upsert = EdgeUpsert::new(item, artifact, backend)
            .with_present(self.present.unwrap_or(false));
        if let Some(location) = self.location {
            upsert = upsert.with_location(location);
        }
        if let Some(hash) = self.content_hash {
            upsert = upsert.with_content_hash(hash);
        }
        if let Some(size) = self.size_bytes {
            upsert = upsert.with_size_bytes(size);
        }
        if let Some(state) = self.sync_state {
            upsert = upsert.with_sync_state(state.parse()?);
        }
        if let Some(error) = self.sync_error {
            upsert = upsert.with_sync_error(error);
        }
        Ok(upsert)
    }
}

pub async fn upsert_edge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertEdgeBody>,
) -> std::result::Result<Json<StorageEdge>, Rejection> {
    let upsert = body.into_upsert().map_err(reject)?;

    let store = state.store.lock().await;
    let edge = store.upsert_edge(&upsert).map_err(reject)?;
    Ok(Json(edge))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeListParams {
    pub item_id: Option<String>,
    pub item_type: Option<String>,
    pub artifact: Option<String>,
    pub backend: Option<String>,
    pub sync_state: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePage {
    pub edges: Vec<StorageEdge>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

pub async fn list_edges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EdgeListParams>,
) -> std::result::Result<Json<EdgePage>, Rejection> {
    let mut filter = EdgeFilter::default();
    if let Some(id) = &params.item_id {
        let id = Uuid::parse_str(id)
            .map_err(|_| Error::Validation(format!("Invalid item id (expected UUID): {}", id)))
            .map_err(reject)?;
        filter.item_id = Some(id);
    }
    if let Some(kind) = &params.item_type {
        filter.item_kind = Some(kind.parse().map_err(reject)?);
    }
    if let Some(artifact) = &params.artifact {
        filter.artifact = Some(artifact.parse().map_err(reject)?);
    }
    if let Some(backend) = &params.backend {
        filter.backend = Some(backend.parse().map_err(reject)?);
    }
    if let Some(sync_state) = &params.sync_state {
        filter.sync_state = Some(sync_state.parse().map_err(reject)?);
    }

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    let store = state.store.lock().await;
    let edges = store.list_edges(&filter, limit, offset).map_err(reject)?;
    let total = store.count_edges(&filter).map_err(reject)?;

    Ok(Json(EdgePage {
        edges,
        total,
        limit,
        offset,
    }))
}

// ========== Item Presence ==========

#[derive(Deserialize)]
pub struct PresenceParams {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

pub async fn item_presence(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PresenceParams>,
) -> std::result::Result<Json<ItemPresenceSummary>, Rejection> {
    let item = ItemRef::parse(&params.id, &params.item_type).map_err(reject)?;

    let store = state.store.lock().await;
    let engine = PresenceEngine::new(&store);
    let summary = match engine.item_presence(item) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("degrading presence read for {}: {}", item, e);
            ItemPresenceSummary::unknown(item)
        }
    };

    Ok(Json(summary))
}

#[derive(Deserialize)]
pub struct BatchPresenceBody {
    pub items: Vec<BatchPresenceEntry>,
}

#[derive(Deserialize)]
pub struct BatchPresenceEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

pub async fn batch_presence(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchPresenceBody>,
) -> std::result::Result<Json<Vec<ItemPresenceSummary>>, Rejection> {
    let items = body
        .items
        .iter()
        .map(|entry| ItemRef::parse(&entry.id, &entry.item_type))
        .collect::<Result<Vec<_>>>()
        .map_err(reject)?;

    let store = state.store.lock().await;
    let engine = PresenceEngine::new(&store);
    Ok(Json(engine.batch_presence(&items)))
}

// ========== Collection Presence ==========

fn parse_collection_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id)
        .map_err(|_| Error::Validation(format!("Invalid collection id (expected UUID): {}", id)))
}

pub async fn collection_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<Json<CollectionPresenceSummary>, Rejection> {
    let collection_id = parse_collection_id(&id).map_err(reject)?;

    let store = state.store.lock().await;
    let engine = PresenceEngine::new(&store);
    let summary = match engine.collection_presence_cached(collection_id) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("degrading collection read for {}: {}", collection_id, e);
            CollectionPresenceSummary::empty(collection_id)
        }
    };

    Ok(Json(summary))
}

pub async fn refresh_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<Json<CollectionPresenceSummary>, Rejection> {
    let collection_id = parse_collection_id(&id).map_err(reject)?;

    let store = state.store.lock().await;
    let engine = PresenceEngine::new(&store);
    let summary = engine.refresh_collection(collection_id).map_err(reject)?;
    Ok(Json(summary))
}

// ========== Sync Status ==========

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusParams {
    #[serde(rename = "state")]
    pub sync_state: Option<String>,
    pub backend: Option<String>,
    pub item_type: Option<String>,
    pub stuck_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusPage {
    pub records: Vec<SyncStatusRecord>,
    pub counts: SyncCounts,
    pub limit: usize,
    pub offset: usize,
}

pub async fn sync_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SyncStatusParams>,
) -> std::result::Result<Json<SyncStatusPage>, Rejection> {
    let mut filter = SyncFilter {
        stuck_only: params.stuck_only.unwrap_or(false),
        ..Default::default()
    };
    if let Some(sync_state) = &params.sync_state {
        filter.sync_state = Some(sync_state.parse().map_err(reject)?);
    }
    if let Some(backend) = &params.backend {
        filter.backend = Some(backend.parse().map_err(reject)?);
    }
    if let Some(kind) = &params.item_type {
        filter.item_kind = Some(kind.parse().map_err(reject)?);
    }

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    let store = state.store.lock().await;
    let monitor = SyncMonitor::new(&store).with_stuck_threshold(state.stuck_threshold);
    let (records, counts) = monitor.list_active(&filter).map_err(reject)?;

    // Counts cover the whole filtered set; only the records are paged
    let records: Vec<SyncStatusRecord> = records.into_iter().skip(offset).take(limit).collect();

    Ok(Json(SyncStatusPage {
        records,
        counts,
        limit,
        offset,
    }))
}

// ========== Stats ==========

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<StoreStats>, Rejection> {
    let store = state.store.lock().await;
    let stats = store.stats().map_err(reject)?;
    Ok(Json(stats))
}
