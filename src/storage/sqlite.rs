//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::{Error, Result};
use crate::edge::{Artifact, Backend, EdgeFilter, EdgeUpsert, StorageEdge, SyncState};
use crate::item::{ItemKind, ItemRef};
use crate::presence::{CollectionPresenceSummary, Durability};
use super::schema;

const EDGE_COLUMNS: &str = "item_id, item_type, artifact, backend, present, location, \
     content_hash, size_bytes, sync_state, sync_error, last_synced_at, created_at, updated_at";

/// SQLite-backed store for storage edges and collection rollups
pub struct EdgeStore {
    conn: Connection,
}

impl EdgeStore {
    /// Open a database file (creates directories and file if needed)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        // Bounded wait before a concurrent writer surfaces SQLITE_BUSY
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Edge Operations ==========

    /// Insert or update one edge atomically and return the stored row.
    ///
    /// One statement end to end: either the whole field set lands or
    /// nothing does, and concurrent writers on the same key serialize
    /// to a clean last-write-wins. `last_synced_at` is touched only on
    /// a transition into idle; nothing else ever preserves old payload.
    pub fn upsert_edge(&self, upsert: &EdgeUpsert) -> Result<StorageEdge> {
        upsert.validate()?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .query_row(
                r#"
                INSERT INTO storage_edges
                    (item_id, item_type, artifact, backend, present, location,
                     content_hash, size_bytes, sync_state, sync_error,
                     last_synced_at, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?11)
                ON CONFLICT(item_id, item_type, artifact, backend) DO UPDATE SET
                    present = excluded.present,
                    location = excluded.location,
                    content_hash = excluded.content_hash,
                    size_bytes = excluded.size_bytes,
                    sync_state = excluded.sync_state,
                    sync_error = excluded.sync_error,
                    last_synced_at = CASE
                        WHEN excluded.sync_state = 'idle' AND storage_edges.sync_state <> 'idle'
                        THEN excluded.updated_at
                        ELSE storage_edges.last_synced_at
                    END,
                    updated_at = excluded.updated_at
                RETURNING item_id, item_type, artifact, backend, present, location,
                          content_hash, size_bytes, sync_state, sync_error,
                          last_synced_at, created_at, updated_at
                "#,
                params![
                    upsert.item_id.to_string(),
                    upsert.item_kind.as_str(),
                    upsert.artifact.as_str(),
                    upsert.backend.as_str(),
                    upsert.present,
                    upsert.location,
                    upsert.content_hash,
                    upsert.size_bytes,
                    upsert.sync_state.as_str(),
                    upsert.sync_error,
                    now,
                ],
                |row| self.row_to_edge(row),
            )
            .map_err(Into::into)
    }

    /// List edges matching a filter, newest first, paginated
    pub fn list_edges(
        &self,
        filter: &EdgeFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StorageEdge>> {
        let (where_clause, filter_params) = build_edge_filter(filter);
        let sql = format!(
            "SELECT {} FROM storage_edges{} ORDER BY updated_at DESC, id DESC LIMIT {} OFFSET {}",
            EDGE_COLUMNS, where_clause, limit, offset
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let edges = stmt
            .query_map(params_from_iter(filter_params), |row| self.row_to_edge(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Count edges matching a filter
    pub fn count_edges(&self, filter: &EdgeFilter) -> Result<usize> {
        let (where_clause, filter_params) = build_edge_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM storage_edges{}", where_clause);

        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(filter_params), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get every edge of one item, the input to presence aggregation
    pub fn edges_of_item(&self, item: ItemRef) -> Result<Vec<StorageEdge>> {
        let sql = format!(
            "SELECT {} FROM storage_edges WHERE item_id = ?1 AND item_type = ?2 ORDER BY artifact, backend",
            EDGE_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let edges = stmt
            .query_map(params![item.id.to_string(), item.kind.as_str()], |row| {
                self.row_to_edge(row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Get edges with an active sync state (migrating or failed), oldest first
    pub fn active_sync_edges(
        &self,
        state: Option<SyncState>,
        backend: Option<Backend>,
        kind: Option<ItemKind>,
    ) -> Result<Vec<StorageEdge>> {
        let mut clauses = vec!["sync_state IN ('migrating', 'failed')".to_string()];
        let mut filter_params: Vec<String> = Vec::new();

        if let Some(state) = state {
            filter_params.push(state.as_str().to_string());
            clauses.push(format!("sync_state = ?{}", filter_params.len()));
        }
        if let Some(backend) = backend {
            filter_params.push(backend.as_str().to_string());
            clauses.push(format!("backend = ?{}", filter_params.len()));
        }
        if let Some(kind) = kind {
            filter_params.push(kind.as_str().to_string());
            clauses.push(format!("item_type = ?{}", filter_params.len()));
        }

        let sql = format!(
            "SELECT {} FROM storage_edges WHERE {} ORDER BY updated_at ASC, id ASC",
            EDGE_COLUMNS,
            clauses.join(" AND ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let edges = stmt
            .query_map(params_from_iter(filter_params), |row| self.row_to_edge(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Helper to convert a row to a StorageEdge
    fn row_to_edge(&self, row: &rusqlite::Row) -> rusqlite::Result<StorageEdge> {
        let id_str: String = row.get(0)?;
        let kind_str: String = row.get(1)?;
        let artifact_str: String = row.get(2)?;
        let backend_str: String = row.get(3)?;
        let state_str: String = row.get(8)?;
        let last_synced: Option<String> = row.get(10)?;
        let created: String = row.get(11)?;
        let updated: String = row.get(12)?;

        let item_id = Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let item_kind: ItemKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let artifact: Artifact = artifact_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let backend: Backend = backend_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let sync_state: SyncState = state_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StorageEdge {
            item_id,
            item_kind,
            artifact,
            backend,
            present: row.get(4)?,
            location: row.get(5)?,
            content_hash: row.get(6)?,
            size_bytes: row.get(7)?,
            sync_state,
            sync_error: row.get(9)?,
            last_synced_at: last_synced.map(|s| parse_timestamp(10, &s)).transpose()?,
            created_at: parse_timestamp(11, &created)?,
            updated_at: parse_timestamp(12, &updated)?,
        })
    }

    // ========== Collection Membership ==========

    /// Mirror one membership fact from the surrounding system
    pub fn link_member(&self, collection_id: Uuid, item: ItemRef, position: i64) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO collection_members (collection_id, item_id, item_type, position)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(collection_id, item_id, item_type) DO UPDATE SET
                position = excluded.position
            "#,
            params![
                collection_id.to_string(),
                item.id.to_string(),
                item.kind.as_str(),
                position,
            ],
        )?;
        Ok(())
    }

    /// Get the members of a collection in position order
    pub fn collection_members(&self, collection_id: Uuid) -> Result<Vec<ItemRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, item_type FROM collection_members WHERE collection_id = ?1 ORDER BY position, id",
        )?;

        let members = stmt
            .query_map([collection_id.to_string()], |row| {
                let id_str: String = row.get(0)?;
                let kind_str: String = row.get(1)?;

                let id = Uuid::parse_str(&id_str).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let kind: ItemKind = kind_str.parse().map_err(|e: Error| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;

                Ok(ItemRef::new(id, kind))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    // ========== Rollup Cache ==========

    /// Get the cached rollup for a collection, if one was ever computed
    pub fn cached_rollup(&self, collection_id: Uuid) -> Result<Option<CollectionPresenceSummary>> {
        self.conn
            .query_row(
                r#"
                SELECT collection_id, total_items, fully_durable_items, unknown_items,
                       completeness_percentage, any_ledger_presence, status, computed_at
                FROM collection_rollups WHERE collection_id = ?1
                "#,
                [collection_id.to_string()],
                |row| self.row_to_rollup(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or replace the cached rollup for a collection
    pub fn store_rollup(&self, summary: &CollectionPresenceSummary) -> Result<()> {
        let computed_at = summary.computed_at.unwrap_or_else(Utc::now);

        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO collection_rollups
                (collection_id, total_items, fully_durable_items, unknown_items,
                 completeness_percentage, any_ledger_presence, status, computed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                summary.collection_id.to_string(),
                summary.total_items as i64,
                summary.fully_durable_items as i64,
                summary.unknown_items as i64,
                summary.completeness_percentage as i64,
                summary.any_ledger_presence,
                summary.status.as_str(),
                computed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Helper to convert a row to a CollectionPresenceSummary
    fn row_to_rollup(&self, row: &rusqlite::Row) -> rusqlite::Result<CollectionPresenceSummary> {
        let id_str: String = row.get(0)?;
        let total: i64 = row.get(1)?;
        let fully_durable: i64 = row.get(2)?;
        let unknown: i64 = row.get(3)?;
        let percentage: i64 = row.get(4)?;
        let status_str: String = row.get(6)?;
        let computed: String = row.get(7)?;

        let collection_id = Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status: Durability = status_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(CollectionPresenceSummary {
            collection_id,
            total_items: total as u64,
            fully_durable_items: fully_durable as u64,
            unknown_items: unknown as u64,
            completeness_percentage: percentage as u8,
            any_ledger_presence: row.get(5)?,
            status,
            computed_at: Some(parse_timestamp(7, &computed)?),
        })
    }

    // ========== Stats ==========

    /// Count edges with present = true
    pub fn count_present_edges(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM storage_edges WHERE present = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count distinct tracked items
    pub fn count_tracked_items(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT item_id || '/' || item_type) FROM storage_edges",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let collections: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT collection_id) FROM collection_members",
            [],
            |row| row.get(0),
        )?;
        let cached_rollups: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM collection_rollups", [], |row| {
                    row.get(0)
                })?;

        Ok(StoreStats {
            edges: self.count_edges(&EdgeFilter::default())?,
            present_edges: self.count_present_edges()?,
            tracked_items: self.count_tracked_items()?,
            collections: collections as usize,
            cached_rollups: cached_rollups as usize,
        })
    }

    /// Shift an edge's updated_at into the past (for stuck-detection tests)
    #[cfg(test)]
    pub fn backdate_edge(&self, edge: &StorageEdge, by: chrono::Duration) -> Result<()> {
        let updated = edge.updated_at - by;
        self.conn.execute(
            r#"
            UPDATE storage_edges SET updated_at = ?1
            WHERE item_id = ?2 AND item_type = ?3 AND artifact = ?4 AND backend = ?5
            "#,
            params![
                updated.to_rfc3339(),
                edge.item_id.to_string(),
                edge.item_kind.as_str(),
                edge.artifact.as_str(),
                edge.backend.as_str(),
            ],
        )?;
        Ok(())
    }
}

/// Build a WHERE clause plus its positional params from an edge filter.
///
/// Every filterable column is TEXT, so params stay a uniform Vec<String>.
fn build_edge_filter(filter: &EdgeFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut filter_params = Vec::new();

    if let Some(id) = filter.item_id {
        filter_params.push(id.to_string());
        clauses.push(format!("item_id = ?{}", filter_params.len()));
    }
    if let Some(kind) = filter.item_kind {
        filter_params.push(kind.as_str().to_string());
        clauses.push(format!("item_type = ?{}", filter_params.len()));
    }
    if let Some(artifact) = filter.artifact {
        filter_params.push(artifact.as_str().to_string());
        clauses.push(format!("artifact = ?{}", filter_params.len()));
    }
    if let Some(backend) = filter.backend {
        filter_params.push(backend.as_str().to_string());
        clauses.push(format!("backend = ?{}", filter_params.len()));
    }
    if let Some(state) = filter.sync_state {
        filter_params.push(state.as_str().to_string());
        clauses.push(format!("sync_state = ?{}", filter_params.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_clause, filter_params)
}

/// Parse an RFC 3339 timestamp read from a TEXT column
fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub edges: usize,
    pub present_edges: usize,
    pub tracked_items: usize,
    pub collections: usize,
    pub cached_rollups: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Edges: {}", self.edges)?;
        writeln!(f, "  Present edges: {}", self.present_edges)?;
        writeln!(f, "  Tracked items: {}", self.tracked_items)?;
        writeln!(f, "  Collections: {}", self.collections)?;
        writeln!(f, "  Cached rollups: {}", self.cached_rollups)
    }
}
