//! Database schema definitions

/// SQL to create the storage_edges table
///
/// The composite UNIQUE constraint is what makes the upsert atomic:
/// one row per (item, artifact, backend) cell of the presence matrix.
pub const CREATE_EDGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS storage_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id TEXT NOT NULL,
    item_type TEXT NOT NULL,
    artifact TEXT NOT NULL,
    backend TEXT NOT NULL,
    present INTEGER NOT NULL DEFAULT 0,
    location TEXT,
    content_hash TEXT,
    size_bytes INTEGER,
    sync_state TEXT NOT NULL DEFAULT 'idle',
    sync_error TEXT,
    last_synced_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(item_id, item_type, artifact, backend)
)
"#;

/// SQL to create the collection_members table
///
/// Local mirror of collection membership owned by the surrounding
/// system; rollups walk it, nothing here mutates it besides the
/// explicit link call.
pub const CREATE_MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS collection_members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    item_type TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    UNIQUE(collection_id, item_id, item_type)
)
"#;

/// SQL to create the collection_rollups cache table
pub const CREATE_ROLLUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS collection_rollups (
    collection_id TEXT PRIMARY KEY,
    total_items INTEGER NOT NULL,
    fully_durable_items INTEGER NOT NULL,
    unknown_items INTEGER NOT NULL,
    completeness_percentage INTEGER NOT NULL,
    any_ledger_presence INTEGER NOT NULL,
    status TEXT NOT NULL,
    computed_at TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_edges_item ON storage_edges(item_id, item_type)",
    "CREATE INDEX IF NOT EXISTS idx_edges_backend_present ON storage_edges(backend, present)",
    "CREATE INDEX IF NOT EXISTS idx_edges_sync_state ON storage_edges(sync_state)",
    "CREATE INDEX IF NOT EXISTS idx_members_collection ON collection_members(collection_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_members_item ON collection_members(item_id, item_type)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_EDGES_TABLE,
        CREATE_MEMBERS_TABLE,
        CREATE_ROLLUPS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
