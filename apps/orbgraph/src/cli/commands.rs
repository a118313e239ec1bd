//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use orbgraph_core::{
    Backend, Dsn, GraphFilter, GraphSnapshot, Services, SqliteDb, Store, StoreError,
    export_graph, import_graph,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum snapshot file size for `load` (500 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), StoreError> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(StoreError::Invalid(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, StoreError> {
    let canonical = path.canonicalize().map_err(|e| {
        StoreError::Invalid(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(StoreError::Invalid(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// The snapshot file for graph `uid` inside `dir`.
///
/// UIDs that would escape `dir` are rejected.
fn snapshot_path(dir: &Path, uid: &str) -> Result<PathBuf, StoreError> {
    let file = format!("{}.json", uid);
    let bare = Path::new(&file).file_name().and_then(|f| f.to_str()) == Some(file.as_str());
    if uid.is_empty() || !bare {
        return Err(StoreError::Invalid(format!(
            "graph uid {:?} is not usable as a file name",
            uid
        )));
    }
    Ok(dir.join(file))
}

fn open_store(dsn: &str) -> Result<Arc<Backend>, StoreError> {
    let store = Backend::open(dsn)?;
    tracing::debug!(dsn, engine = store.engine(), "store opened");
    Ok(Arc::new(store))
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(dsn: &str, host: &str, port: u16) -> Result<(), StoreError> {
    let store = open_store(dsn)?;

    println!("orbgraph server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:   {}", host);
    println!("  Port:   {}", port);
    println!("  DSN:    {}", dsn);
    println!("  Engine: {}", store.engine());
    println!();
    println!("Endpoints:");
    println!("  /v1/graphs                    - List or create graphs");
    println!("  /v1/graphs/{{uid}}              - Read, update or delete a graph");
    println!("  /v1/graphs/{{guid}}/nodes       - Nodes of a graph");
    println!("  /v1/graphs/{{guid}}/edges       - Edges of a graph");
    println!("  /health                       - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, store).await
}

// =============================================================================
// GRAPHS COMMAND
// =============================================================================

/// List graphs.
pub fn cmd_graphs(
    dsn: &str,
    json_mode: bool,
    label: Option<String>,
    offset: i64,
    limit: i64,
) -> Result<(), StoreError> {
    let store = open_store(dsn)?;
    let services = Services::new(Arc::clone(&store));
    let filter = GraphFilter {
        label,
        offset,
        limit,
        ..GraphFilter::default()
    };
    let page = services.graphs.find_graphs(&filter)?;

    if json_mode {
        let output = api::GraphsResponse::from(page);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if page.is_empty() {
        println!("No graphs ({} total)", page.total);
    } else {
        println!("{:<38} {:<20} {:>8} {:>8}", "UID", "LABEL", "NODES", "EDGES");
        for g in &page.items {
            println!(
                "{:<38} {:<20} {:>8} {:>8}",
                g.uid, g.label, g.nodes, g.edges
            );
        }
        println!();
        println!("Showing {} of {} graphs", page.len(), page.total);
    }

    store.close()
}

// =============================================================================
// DUMP COMMAND
// =============================================================================

/// Export graphs as `<output>/<uid>.json`.
pub fn cmd_dump(
    dsn: &str,
    json_mode: bool,
    graph: Option<&str>,
    output: &Path,
) -> Result<(), StoreError> {
    let store = open_store(dsn)?;
    let uids = match graph {
        Some(uid) => vec![uid.to_string()],
        None => Services::new(Arc::clone(&store))
            .graphs
            .find_graphs(&GraphFilter::default())?
            .items
            .into_iter()
            .map(|g| g.uid)
            .collect(),
    };

    std::fs::create_dir_all(output)?;
    let mut written = Vec::with_capacity(uids.len());
    for uid in &uids {
        let path = snapshot_path(output, uid)?;
        let snapshot = export_graph(&*store, uid)?;
        std::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?)?;
        tracing::info!(
            graph = %uid,
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            path = %path.display(),
            "graph dumped"
        );
        written.push(path);
    }

    if json_mode {
        let files: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
        let n = files.len();
        let output = serde_json::json!({ "files": files, "n": n });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for path in &written {
            println!("Wrote {}", path.display());
        }
        println!("Dumped {} graph(s) to {}", written.len(), output.display());
    }

    store.close()
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Import a snapshot file as a new graph.
pub fn cmd_load(dsn: &str, json_mode: bool, input: &Path) -> Result<(), StoreError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_SNAPSHOT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)?;
    let snapshot: GraphSnapshot = serde_json::from_slice(&data)?;

    let store = open_store(dsn)?;
    if matches!(Dsn::parse(dsn)?, Dsn::Memory | Dsn::Directory(_)) {
        tracing::warn!(dsn, "loading into an in-memory store; the graph is not persisted");
    }
    let graph = import_graph(&*store, &snapshot)?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        println!(
            "Loaded graph {}: {} nodes, {} edges",
            graph.uid, graph.nodes, graph.edges
        );
    }

    store.close()
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create or migrate the SQLite database named by `dsn`.
pub fn cmd_init(dsn: &str, json_mode: bool) -> Result<(), StoreError> {
    let Dsn::Sqlite(path) = Dsn::parse(dsn)? else {
        return Err(StoreError::Invalid(format!(
            "init needs a sqlite:// datasource, got {}",
            dsn
        )));
    };

    let db = SqliteDb::open(&path)?;
    let applied = db.applied_on_open().to_vec();
    let all = db.applied_migrations()?;

    if json_mode {
        let output = serde_json::json!({
            "path": db.path(),
            "applied": applied,
            "migrations": all,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if applied.is_empty() {
        println!("Database {} is up to date ({} migrations)", db.path(), all.len());
    } else {
        println!("Initialized database {}", db.path());
        for name in &applied {
            println!("  applied {}", name);
        }
    }

    db.close()
}
