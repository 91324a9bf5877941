//! Vaultmap CLI - Command-line interface for the storage presence tracker

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use vaultmap::config::{self, VaultmapConfig};
use vaultmap::monitor::{DEFAULT_STUCK_THRESHOLD_MINUTES, SyncFilter, SyncMonitor};
use vaultmap::presence::{ArtifactPresence, CollectionPresenceSummary};
use vaultmap::query::PresenceEngine;
use vaultmap::storage::EdgeStore;
use vaultmap::{EdgeFilter, EdgeUpsert, ItemRef, StorageEdge};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "vaultmap")]
#[command(version = "0.0.1")]
#[command(about = "Storage presence tracker - per-item artifact placement across backends")]
#[command(long_about = r#"
Vaultmap tracks which storage backend currently holds which artifact of
each item, and rolls those facts up into durability summaries:
  • Atomic edge upserts keyed by (item, artifact, backend)
  • Item-level presence computed live from current edges
  • Collection-level rollups served from an explicitly refreshed cache
  • A sync monitor surfacing in-flight, failed, and stuck migrations

Example usage:
  vaultmap upsert --item 6f9619ff-8b86-d011-b42d-00c04fc964ff --kind image \
      --artifact asset --backend permanent-ledger --present
  vaultmap presence --item 6f9619ff-8b86-d011-b42d-00c04fc964ff --kind image
  vaultmap syncs --stuck-only
  vaultmap serve --port 7070
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: vaultmap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file and prepare the database directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP query service
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Record one presence fact (atomic insert-or-update)
    Upsert {
        /// Item id (UUID)
        #[arg(short, long)]
        item: String,

        /// Item type (image, video, note, document, audio)
        #[arg(short, long)]
        kind: String,

        /// Artifact (metadata, asset)
        #[arg(short, long)]
        artifact: String,

        /// Backend (transient-relational, transient-blob, permanent-ledger)
        #[arg(short, long)]
        backend: String,

        /// Mark the artifact present at that backend
        #[arg(short, long)]
        present: bool,

        /// Backend-specific locator
        #[arg(short, long)]
        location: Option<String>,

        /// Content hash of the stored bytes
        #[arg(long)]
        hash: Option<String>,

        /// Stored size in bytes
        #[arg(long)]
        size: Option<i64>,

        /// Sync state (idle, migrating, failed)
        #[arg(short, long)]
        state: Option<String>,

        /// Failure detail from the last replication attempt
        #[arg(long)]
        error: Option<String>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// List stored edges with optional filters
    Edges {
        /// Filter by item id (UUID)
        #[arg(short, long)]
        item: Option<String>,

        /// Filter by item type
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by artifact
        #[arg(short, long)]
        artifact: Option<String>,

        /// Filter by backend
        #[arg(short, long)]
        backend: Option<String>,

        /// Filter by sync state
        #[arg(short, long)]
        state: Option<String>,

        /// Maximum number of rows
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Show one item's presence summary, computed live
    Presence {
        /// Item id (UUID)
        #[arg(short, long)]
        item: String,

        /// Item type
        #[arg(short, long)]
        kind: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Show a collection's durability rollup
    Collection {
        /// Collection id (UUID)
        #[arg(short, long)]
        id: String,

        /// Compute live from current edges instead of reading the cache
        #[arg(long, conflicts_with = "refresh")]
        live: bool,

        /// Recompute the rollup and persist it to the cache
        #[arg(long)]
        refresh: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Mirror one collection membership fact
    Link {
        /// Collection id (UUID)
        #[arg(short, long)]
        collection: String,

        /// Item id (UUID)
        #[arg(short, long)]
        item: String,

        /// Item type
        #[arg(short, long)]
        kind: String,

        /// Position within the collection
        #[arg(short, long, default_value = "0")]
        position: i64,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// List active syncs with stuck detection and aggregate counts
    Syncs {
        /// Filter by active state (migrating, failed)
        #[arg(short, long)]
        state: Option<String>,

        /// Filter by backend
        #[arg(short, long)]
        backend: Option<String>,

        /// Filter by item type
        #[arg(short, long)]
        kind: Option<String>,

        /// Only syncs stuck past the threshold
        #[arg(long)]
        stuck_only: bool,

        /// Stuck threshold in minutes
        #[arg(short, long)]
        threshold: Option<i64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Show store statistics
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config_file = cli.config.clone();
    let config = config::load_config(config_file.as_deref())?;

    match cli.command {
        Commands::Init { force } => {
            let path = config_file.unwrap_or_else(config::default_config_path);
            let database = config::default_database_path_in(Path::new("."));

            let starter = VaultmapConfig {
                database: Some(database.to_string_lossy().to_string()),
                port: Some(config::DEFAULT_PORT),
                stuck_threshold_minutes: Some(DEFAULT_STUCK_THRESHOLD_MINUTES),
            };
            config::write_config(&path, &starter, force)?;
            config::ensure_db_dir(&database)?;

            println!("✅ Wrote {}", path.display());
            println!("🗄️  Database will live at {:?}", database);
        }

        Commands::Serve { port, database } => {
            let database = resolve_database(database, config.as_ref());
            let port = port
                .or_else(|| config.as_ref().and_then(|c| c.port))
                .unwrap_or(config::DEFAULT_PORT);
            let threshold = resolve_threshold(None, config.as_ref());

            println!("🚀 Starting vaultmap query service");
            println!("🗄️  Database: {:?}", database);

            let rt = tokio::runtime::Runtime::new()
                .context("Failed to create tokio runtime")?;
            rt.block_on(vaultmap::server::start_server(port, database, threshold))?;
        }

        Commands::Upsert {
            item,
            kind,
            artifact,
            backend,
            present,
            location,
            hash,
            size,
            state,
            error,
            database,
        } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;

            let item = ItemRef::parse(&item, &kind)?;
            let mut upsert = EdgeUpsert::new(item, artifact.parse()?, backend.parse()?)
                .with_present(present);
            if let Some(location) = location {
                upsert = upsert.with_location(location);
            }
            if let Some(hash) = hash {
                upsert = upsert.with_content_hash(hash);
            }
            if let Some(size) = size {
                upsert = upsert.with_size_bytes(size);
            }
            if let Some(state) = state {
                upsert = upsert.with_sync_state(state.parse()?);
            }
            if let Some(error) = error {
                upsert = upsert.with_sync_error(error);
            }

            let edge = store.upsert_edge(&upsert)?;
            println!("✅ Edge recorded:");
            print_edge(&edge);
        }

        Commands::Edges {
            item,
            kind,
            artifact,
            backend,
            state,
            limit,
            offset,
            format,
            database,
        } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;

            let mut filter = EdgeFilter::default();
            if let Some(item) = &item {
                filter.item_id = Some(parse_uuid(item, "item id")?);
            }
            if let Some(kind) = &kind {
                filter.item_kind = Some(kind.parse()?);
            }
            if let Some(artifact) = &artifact {
                filter.artifact = Some(artifact.parse()?);
            }
            if let Some(backend) = &backend {
                filter.backend = Some(backend.parse()?);
            }
            if let Some(state) = &state {
                filter.sync_state = Some(state.parse()?);
            }

            let edges = store.list_edges(&filter, limit, offset)?;
            let total = store.count_edges(&filter)?;

            if format == "json" {
                let page = serde_json::json!({ "edges": edges, "total": total });
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else if edges.is_empty() {
                if filter.is_empty() {
                    println!("∅ No edges recorded yet.");
                } else {
                    println!("∅ No edges match the given filters.");
                }
            } else {
                println!("🔍 Showing {} of {} edges:", edges.len(), total);
                for edge in &edges {
                    print_edge(edge);
                }
            }
        }

        Commands::Presence {
            item,
            kind,
            format,
            database,
        } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;
            let engine = PresenceEngine::new(&store);

            let item = ItemRef::parse(&item, &kind)?;
            let summary = engine.item_presence(item)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("📦 {}", item);
                println!("   Status: {}", summary.status);
                print_artifact_row("metadata", &summary.metadata);
                print_artifact_row("asset", &summary.asset);
            }
        }

        Commands::Collection {
            id,
            live,
            refresh,
            format,
            database,
        } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;
            let engine = PresenceEngine::new(&store);

            let collection_id = parse_uuid(&id, "collection id")?;
            let summary = if refresh {
                println!("🔄 Refreshing rollup for {}...", collection_id);
                engine.refresh_collection(collection_id)?
            } else if live {
                engine.collection_presence_live(collection_id)?
            } else {
                engine.collection_presence_cached(collection_id)?
            };

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_collection(&summary);
            }
        }

        Commands::Link {
            collection,
            item,
            kind,
            position,
            database,
        } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;

            let collection_id = parse_uuid(&collection, "collection id")?;
            let item = ItemRef::parse(&item, &kind)?;
            store.link_member(collection_id, item, position)?;

            println!(
                "✅ Linked {} into collection {} at position {}",
                item, collection_id, position
            );
        }

        Commands::Syncs {
            state,
            backend,
            kind,
            stuck_only,
            threshold,
            format,
            database,
        } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;

            let mut filter = SyncFilter {
                stuck_only,
                ..Default::default()
            };
            if let Some(state) = &state {
                filter.sync_state = Some(state.parse()?);
            }
            if let Some(backend) = &backend {
                filter.backend = Some(backend.parse()?);
            }
            if let Some(kind) = &kind {
                filter.item_kind = Some(kind.parse()?);
            }

            let monitor = SyncMonitor::new(&store)
                .with_stuck_threshold(resolve_threshold(threshold, config.as_ref()));
            let (records, counts) = monitor.list_active(&filter)?;

            if format == "json" {
                let page = serde_json::json!({ "records": records, "counts": counts });
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else if records.is_empty() {
                println!("✅ No active syncs.");
            } else {
                println!(
                    "🔄 {} active syncs ({} migrating, {} failed, {} stuck)",
                    counts.total, counts.migrating, counts.failed, counts.stuck
                );
                for record in &records {
                    let stuck = if record.is_stuck { " [STUCK]" } else { "" };
                    println!(
                        "- {} {}/{} -> {} ({} since last transition){}",
                        record.edge.sync_state,
                        record.edge.item(),
                        record.edge.artifact,
                        record.edge.backend,
                        format_elapsed(record.duration_since_last_transition),
                        stuck
                    );
                    if let Some(error) = &record.edge.sync_error {
                        println!("  ⚠️  {}", error);
                    }
                }
            }
        }

        Commands::Stats { format, database } => {
            let database = resolve_database(database, config.as_ref());
            let store = EdgeStore::open(&database)?;
            let stats = store.stats()?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("📊 Vaultmap Statistics ({:?})", database);
                println!("------------------------------------");
                println!("{}", stats);
            }
        }
    }

    Ok(())
}

/// Pick the database path: flag beats config file beats default location
fn resolve_database(flag: Option<PathBuf>, config: Option<&VaultmapConfig>) -> PathBuf {
    flag.or_else(|| config.and_then(|c| c.database.as_ref().map(PathBuf::from)))
        .unwrap_or_else(|| config::default_database_path_in(Path::new(".")))
}

/// Pick the stuck threshold: flag beats config file beats the 30-minute default
fn resolve_threshold(flag: Option<i64>, config: Option<&VaultmapConfig>) -> chrono::Duration {
    let minutes = flag
        .or_else(|| config.and_then(|c| c.stuck_threshold_minutes))
        .unwrap_or(DEFAULT_STUCK_THRESHOLD_MINUTES);
    chrono::Duration::minutes(minutes)
}

fn parse_uuid(value: &str, what: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| anyhow::anyhow!("invalid {} (expected UUID): {}", what, value))
}

fn print_edge(edge: &StorageEdge) {
    let presence = if edge.present { "present" } else { "absent" };
    println!(
        "- {}/{} @ {} [{}] state={}",
        edge.item(),
        edge.artifact,
        edge.backend,
        presence,
        edge.sync_state
    );
    if let Some(location) = &edge.location {
        println!("  Location: {}", location);
    }
    if let Some(size) = edge.size_bytes {
        println!("  Size: {} bytes", size);
    }
    if let Some(error) = &edge.sync_error {
        println!("  ⚠️  {}", error);
    }
}

fn print_artifact_row(name: &str, presence: &ArtifactPresence) {
    println!(
        "   {:<9} relational={} blob={} ledger={}",
        name,
        yes_no(presence.relational),
        yes_no(presence.blob),
        yes_no(presence.ledger)
    );
}

fn print_collection(summary: &CollectionPresenceSummary) {
    println!("🗂️  Collection {}", summary.collection_id);
    println!("   Status: {}", summary.status);
    println!(
        "   Items: {} total, {} fully durable, {} unknown",
        summary.total_items, summary.fully_durable_items, summary.unknown_items
    );
    println!("   Completeness: {}%", summary.completeness_percentage);
    println!(
        "   Any ledger presence: {}",
        yes_no(summary.any_ledger_presence)
    );
    match &summary.computed_at {
        Some(at) => println!("   Computed at: {}", at.to_rfc3339()),
        None => println!("   Computed at: never (run with --refresh to populate the cache)"),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn format_elapsed(seconds: i64) -> String {
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m {}s", minutes, seconds % 60);
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_scales_units() {
        assert_eq!(format_elapsed(0), "0s");
        assert_eq!(format_elapsed(59), "59s");
        assert_eq!(format_elapsed(60), "1m 0s");
        assert_eq!(format_elapsed(1801), "30m 1s");
        assert_eq!(format_elapsed(3599), "59m 59s");
        assert_eq!(format_elapsed(3600), "1h 0m");
        assert_eq!(format_elapsed(7384), "2h 3m");
    }

    #[test]
    fn test_database_resolution_prefers_flag() {
        let config = VaultmapConfig {
            database: Some("from-config.db".to_string()),
            ..Default::default()
        };

        let resolved = resolve_database(Some(PathBuf::from("from-flag.db")), Some(&config));
        assert_eq!(resolved, PathBuf::from("from-flag.db"));

        let resolved = resolve_database(None, Some(&config));
        assert_eq!(resolved, PathBuf::from("from-config.db"));

        let resolved = resolve_database(None, None);
        assert_eq!(resolved, config::default_database_path_in(Path::new(".")));
    }

    #[test]
    fn test_threshold_resolution_prefers_flag() {
        let config = VaultmapConfig {
            stuck_threshold_minutes: Some(10),
            ..Default::default()
        };

        assert_eq!(
            resolve_threshold(Some(5), Some(&config)),
            chrono::Duration::minutes(5)
        );
        assert_eq!(
            resolve_threshold(None, Some(&config)),
            chrono::Duration::minutes(10)
        );
        assert_eq!(
            resolve_threshold(None, None),
            chrono::Duration::minutes(DEFAULT_STUCK_THRESHOLD_MINUTES)
        );
    }
}
