//! # SQLite Engine
//!
//! Graphs, nodes and edges mapped onto three tables with JSON text
//! attribute columns. Requires SQLite's JSON1 functions (bundled).
//!
//! ## Schema
//!
//! Applied from embedded migration files in name order. Each file runs at
//! most once, inside its own transaction, and is recorded in the
//! `migrations` table.
//!
//! ## Transactions
//!
//! The connection sits behind a `Mutex`; a `SqliteTx` holds the lock from
//! `BEGIN` until `COMMIT`, or until it is dropped, which rolls back.

use super::{Store, Transaction};
use crate::primitives::{BUSY_TIMEOUT_MS, MIGRATIONS_TABLE, SQLITE_MEMORY_PATH, WEIGHTED_DIRECTED};
use crate::query::{EdgeSelection, NodeSelection, Page, limit_offset_clause};
use crate::types::attrs::{check_attrs, decode_attrs, encode_attrs, merge_attrs};
use crate::types::{check_weight, new_uid, now};
use crate::{
    Attrs, Edge, EdgeFilter, EdgeUpdate, Graph, GraphFilter, GraphUpdate, Node, NodeFilter,
    NodeUpdate, StoreError,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// =============================================================================
// MIGRATIONS
// =============================================================================

/// Embedded schema files as `(name, sql)`.
const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init.sql", include_str!("migrations/0001_init.sql")),
    ("0002_indexes.sql", include_str!("migrations/0002_indexes.sql")),
];

/// Apply every pending migration. Returns the names applied by this call.
fn migrate(conn: &mut Connection) -> Result<Vec<&'static str>, StoreError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (name TEXT PRIMARY KEY);",
        MIGRATIONS_TABLE
    ))?;

    let mut files = MIGRATIONS.to_vec();
    files.sort_by_key(|(name, _)| *name);

    let mut applied = Vec::new();
    for (name, sql) in files {
        if apply_migration(conn, name, sql)? {
            tracing::info!(migration = name, "applied migration");
            applied.push(name);
        }
    }
    Ok(applied)
}

fn apply_migration(conn: &mut Connection, name: &str, sql: &str) -> Result<bool, StoreError> {
    let tx = conn.transaction()?;
    let seen: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE name = ?1", MIGRATIONS_TABLE),
        [name],
        |row| row.get(0),
    )?;
    if seen > 0 {
        return Ok(false);
    }
    tx.execute_batch(sql)?;
    tx.execute(
        &format!("INSERT INTO {} (name) VALUES (?1)", MIGRATIONS_TABLE),
        [name],
    )?;
    tx.commit()?;
    Ok(true)
}

// =============================================================================
// DATABASE
// =============================================================================

/// The SQLite engine.
pub struct SqliteDb {
    path: String,
    conn: Mutex<Option<Connection>>,
    applied_on_open: Vec<&'static str>,
}

impl std::fmt::Debug for SqliteDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteDb {
    /// Open (creating if needed) the database at `path` and bring its
    /// schema up to date. `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let mut conn = if path == SQLITE_MEMORY_PATH {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };

        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;

        let applied = migrate(&mut conn)?;
        tracing::info!(
            path,
            journal_mode = %journal_mode,
            migrations_applied = applied.len(),
            "opened sqlite store"
        );

        Ok(Self {
            path: path.to_string(),
            conn: Mutex::new(Some(conn)),
            applied_on_open: applied,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Migrations this handle applied while opening; empty when the
    /// schema was already current.
    pub fn applied_on_open(&self) -> &[&'static str] {
        &self.applied_on_open
    }

    /// Names of the migrations recorded in this database, in order.
    pub fn applied_migrations(&self) -> Result<Vec<String>, StoreError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT name FROM {} ORDER BY name",
            MIGRATIONS_TABLE
        ))?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Internal("connection lock poisoned".to_string()))
    }
}

impl Store for SqliteDb {
    type Tx<'a> = SqliteTx<'a>;

    fn begin_tx(&self) -> Result<Self::Tx<'_>, StoreError> {
        let guard = self.lock()?;
        guard
            .as_ref()
            .ok_or(StoreError::Closed)?
            .execute_batch("BEGIN")?;
        tracing::trace!(path = %self.path, "begin transaction");
        Ok(SqliteTx {
            guard,
            finished: false,
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        if let Some(conn) = self.lock()?.take() {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
            tracing::info!(path = %self.path, "closed sqlite store");
        }
        Ok(())
    }
}

// =============================================================================
// ROW HELPERS
// =============================================================================

fn encode_time(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn decode_time(text: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    text.filter(|s| !s.is_empty())
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StoreError::Internal(format!("invalid timestamp {:?}: {}", s, e)))
        })
        .transpose()
}

fn count(n: i64) -> usize {
    usize::try_from(n).unwrap_or_default()
}

/// Report unique-key violations on insert as `ECONFLICT`. Other constraint
/// failures stay driver errors.
fn conflict_or(err: rusqlite::Error, message: impl FnOnce() -> String) -> StoreError {
    use rusqlite::ffi::{SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE};
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.extended_code,
                SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY
            ) =>
        {
            StoreError::Conflict(message())
        }
        _ => StoreError::Sqlite(err),
    }
}

/// Accumulates `AND`-joined conditions with their positional arguments.
#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<&'static str>,
    args: Vec<SqlValue>,
}

impl Conditions {
    fn push(&mut self, clause: &'static str, arg: impl Into<SqlValue>) {
        self.clauses.push(clause);
        self.args.push(arg.into());
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Accumulates `SET` assignments for a partial update.
#[derive(Debug, Default)]
struct Assignments {
    sets: Vec<String>,
    args: Vec<SqlValue>,
}

impl Assignments {
    fn set(&mut self, column: &str, arg: impl Into<SqlValue>) {
        self.sets.push(format!("{} = ?", column));
        self.args.push(arg.into());
    }

    /// Merge `update` into the stored `attrs` blob key by key.
    ///
    /// Uses `json_set` so untouched keys stay as stored. SQLite paths
    /// cannot quote a key containing `"`, so such updates rewrite the
    /// whole blob from `current` instead.
    fn merge_attrs(&mut self, current: &Attrs, update: &Attrs) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }
        if update.keys().any(|k| k.contains('"')) {
            let mut merged = current.clone();
            merge_attrs(&mut merged, update);
            self.set("attrs", encode_attrs(&merged)?);
            return Ok(());
        }

        let mut expr = String::from("json_set(attrs");
        for (key, value) in update {
            expr.push_str(", ?, json(?)");
            self.args.push(SqlValue::Text(format!("$.\"{}\"", key)));
            self.args.push(SqlValue::Text(serde_json::to_string(value)?));
        }
        expr.push(')');
        self.sets.push(format!("attrs = {}", expr));
        Ok(())
    }

    fn sql(&self) -> String {
        self.sets.join(", ")
    }
}

struct GraphRow {
    uid: String,
    label: String,
    attrs: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    nodes: i64,
    edges: i64,
    total: i64,
}

impl GraphRow {
    fn into_graph(self) -> Result<Graph, StoreError> {
        Ok(Graph {
            uid: self.uid,
            graph_type: WEIGHTED_DIRECTED.to_string(),
            label: self.label,
            attrs: decode_attrs(&self.attrs)?,
            nodes: count(self.nodes),
            edges: count(self.edges),
            created_at: decode_time(self.created_at)?,
            updated_at: decode_time(self.updated_at)?,
        })
    }
}

struct NodeRow {
    id: i64,
    uid: String,
    label: String,
    attrs: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    deg_out: i64,
    deg_in: i64,
    total: i64,
}

impl NodeRow {
    fn into_node(self) -> Result<Node, StoreError> {
        Ok(Node {
            id: self.id,
            uid: self.uid,
            label: self.label,
            attrs: decode_attrs(&self.attrs)?,
            deg_out: count(self.deg_out),
            deg_in: count(self.deg_in),
            created_at: decode_time(self.created_at)?,
            updated_at: decode_time(self.updated_at)?,
        })
    }
}

struct EdgeRow {
    uid: String,
    source: String,
    target: String,
    weight: f64,
    label: String,
    attrs: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    total: i64,
}

impl EdgeRow {
    fn into_edge(self) -> Result<Edge, StoreError> {
        Ok(Edge {
            uid: self.uid,
            source: self.source,
            target: self.target,
            weight: self.weight,
            label: self.label,
            attrs: decode_attrs(&self.attrs)?,
            created_at: decode_time(self.created_at)?,
            updated_at: decode_time(self.updated_at)?,
        })
    }
}

/// Turn a decoded page of rows into a [`Page`].
///
/// When the page is empty because the offset ran past the end, the window
/// count is unavailable and `fallback` counts the matches instead.
fn into_page<R, T>(
    rows: Vec<R>,
    offset: i64,
    total_of: impl Fn(&R) -> i64,
    convert: impl Fn(R) -> Result<T, StoreError>,
    fallback: impl FnOnce() -> Result<usize, StoreError>,
) -> Result<Page<T>, StoreError> {
    let total = match rows.first() {
        Some(row) => count(total_of(row)),
        None if offset > 0 => fallback()?,
        None => 0,
    };
    let items = rows.into_iter().map(convert).collect::<Result<Vec<_>, _>>()?;
    Ok(Page { items, total })
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// One SQLite transaction. Rolls back on drop unless committed.
pub struct SqliteTx<'a> {
    guard: MutexGuard<'a, Option<Connection>>,
    finished: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(conn) = self.guard.as_ref() {
            match conn.execute_batch("ROLLBACK") {
                Ok(()) => tracing::trace!("rolled back transaction"),
                Err(e) => tracing::warn!(error = %e, "rollback failed"),
            }
        }
    }
}

const GRAPH_COLUMNS: &str = "uid, label, attrs, created_at, updated_at,
    (SELECT COUNT(*) FROM nodes WHERE nodes.graph = graphs.uid),
    (SELECT COUNT(*) FROM edges WHERE edges.graph = graphs.uid),
    COUNT(*) OVER()";

const NODE_COLUMNS: &str = "n.id, n.uid, n.label, n.attrs, n.created_at, n.updated_at,
    (SELECT COUNT(*) FROM edges x WHERE x.graph = n.graph AND x.source = n.uid),
    (SELECT COUNT(*) FROM edges x WHERE x.graph = n.graph AND x.target = n.uid),
    COUNT(*) OVER()";

const EDGE_COLUMNS: &str = "e.uid, e.source, e.target, e.weight, e.label, e.attrs,
    e.created_at, e.updated_at, COUNT(*) OVER()";

const EDGE_FROM: &str = "edges e
    JOIN nodes s ON s.uid = e.source
    JOIN nodes t ON t.uid = e.target";

impl SqliteTx<'_> {
    fn conn(&self) -> Result<&Connection, StoreError> {
        self.guard.as_ref().ok_or(StoreError::Closed)
    }

    fn count_rows(&self, from: &str, cond: &Conditions) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {} {}", from, cond.where_sql());
        let n: i64 = self
            .conn()?
            .query_row(&sql, params_from_iter(cond.args.iter()), |row| row.get(0))?;
        Ok(count(n))
    }

    fn ensure_graph(&self, uid: &str) -> Result<(), StoreError> {
        self.conn()?
            .query_row("SELECT 1 FROM graphs WHERE uid = ?1", [uid], |_| Ok(()))
            .optional()?
            .ok_or_else(|| StoreError::graph_not_found(uid))
    }

    fn ensure_node(&self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        self.conn()?
            .query_row(
                "SELECT 1 FROM nodes WHERE graph = ?1 AND uid = ?2",
                [graph_uid, uid],
                |_| Ok(()),
            )
            .optional()?
            .ok_or_else(|| StoreError::node_not_found(uid))
    }

    fn query_graphs(
        &self,
        cond: &Conditions,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Graph>, StoreError> {
        let sql = format!(
            "SELECT {} FROM graphs {} ORDER BY uid {}",
            GRAPH_COLUMNS,
            cond.where_sql(),
            limit_offset_clause(limit, offset)
        );
        let mut stmt = self.conn()?.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(cond.args.iter()), |row| {
                Ok(GraphRow {
                    uid: row.get(0)?,
                    label: row.get(1)?,
                    attrs: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                    nodes: row.get(5)?,
                    edges: row.get(6)?,
                    total: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        into_page(
            rows,
            offset,
            |r| r.total,
            GraphRow::into_graph,
            || self.count_rows("graphs", cond),
        )
    }

    fn query_nodes(
        &self,
        cond: &Conditions,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Node>, StoreError> {
        let sql = format!(
            "SELECT {} FROM nodes n {} ORDER BY n.id {}",
            NODE_COLUMNS,
            cond.where_sql(),
            limit_offset_clause(limit, offset)
        );
        let mut stmt = self.conn()?.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(cond.args.iter()), |row| {
                Ok(NodeRow {
                    id: row.get(0)?,
                    uid: row.get(1)?,
                    label: row.get(2)?,
                    attrs: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                    deg_out: row.get(6)?,
                    deg_in: row.get(7)?,
                    total: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        into_page(
            rows,
            offset,
            |r| r.total,
            NodeRow::into_node,
            || self.count_rows("nodes n", cond),
        )
    }

    fn query_edges(
        &self,
        cond: &Conditions,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Edge>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY s.id, t.id {}",
            EDGE_COLUMNS,
            EDGE_FROM,
            cond.where_sql(),
            limit_offset_clause(limit, offset)
        );
        let mut stmt = self.conn()?.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(cond.args.iter()), |row| {
                Ok(EdgeRow {
                    uid: row.get(0)?,
                    source: row.get(1)?,
                    target: row.get(2)?,
                    weight: row.get(3)?,
                    label: row.get(4)?,
                    attrs: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                    total: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        into_page(
            rows,
            offset,
            |r| r.total,
            EdgeRow::into_edge,
            || self.count_rows(EDGE_FROM, cond),
        )
    }

    fn edge_between(
        &self,
        graph_uid: &str,
        source: &str,
        target: &str,
    ) -> Result<Option<Edge>, StoreError> {
        let mut cond = Conditions::default();
        cond.push("e.graph = ?", graph_uid.to_string());
        cond.push("e.source = ?", source.to_string());
        cond.push("e.target = ?", target.to_string());
        Ok(self.query_edges(&cond, 0, 0)?.items.into_iter().next())
    }

    fn run_update(
        &self,
        table: &str,
        mut set: Assignments,
        cond: Conditions,
    ) -> Result<usize, StoreError> {
        set.set("updated_at", encode_time(Some(now())));
        let sql = format!("UPDATE {} SET {} {}", table, set.sql(), cond.where_sql());
        let args = set.args.iter().chain(cond.args.iter());
        Ok(self.conn()?.execute(&sql, params_from_iter(args))?)
    }
}

impl Transaction for SqliteTx<'_> {
    // -------------------------------------------------------------------------
    // Graphs
    // -------------------------------------------------------------------------

    fn create_graph(&mut self, g: &mut Graph) -> Result<(), StoreError> {
        if g.graph_type.is_empty() {
            g.graph_type = WEIGHTED_DIRECTED.to_string();
        }
        if g.graph_type != WEIGHTED_DIRECTED {
            return Err(StoreError::Unsupported(format!(
                "unsupported graph type: {}",
                g.graph_type
            )));
        }
        check_attrs(&g.attrs)?;
        if g.uid.is_empty() {
            g.uid = new_uid();
        }

        let ts = Some(now());
        self.conn()?
            .execute(
                "INSERT INTO graphs (uid, label, attrs, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    g.uid,
                    g.label,
                    encode_attrs(&g.attrs)?,
                    encode_time(ts),
                    encode_time(ts)
                ],
            )
            .map_err(|e| conflict_or(e, || format!("graph {} already exists", g.uid)))?;

        g.nodes = 0;
        g.edges = 0;
        g.created_at = ts;
        g.updated_at = ts;
        Ok(())
    }

    fn find_graph_by_uid(&mut self, uid: &str) -> Result<Graph, StoreError> {
        let mut cond = Conditions::default();
        cond.push("uid = ?", uid.to_string());
        self.query_graphs(&cond, 0, 0)?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::graph_not_found(uid))
    }

    fn find_graphs(&mut self, filter: &GraphFilter) -> Result<Page<Graph>, StoreError> {
        if !filter.type_matches() {
            return Ok(Page::empty());
        }
        let mut cond = Conditions::default();
        if let Some(uid) = &filter.uid {
            cond.push("uid = ?", uid.clone());
        }
        if let Some(label) = &filter.label {
            cond.push("label = ?", label.clone());
        }
        self.query_graphs(&cond, filter.offset, filter.limit)
    }

    fn update_graph(&mut self, uid: &str, update: &GraphUpdate) -> Result<Graph, StoreError> {
        if let Some(attrs) = &update.attrs {
            check_attrs(attrs)?;
        }
        let current = self.find_graph_by_uid(uid)?;

        let mut set = Assignments::default();
        if let Some(label) = &update.label {
            set.set("label", label.clone());
        }
        if let Some(attrs) = &update.attrs {
            set.merge_attrs(&current.attrs, attrs)?;
        }
        let mut cond = Conditions::default();
        cond.push("uid = ?", uid.to_string());
        self.run_update("graphs", set, cond)?;

        self.find_graph_by_uid(uid)
    }

    fn delete_graph(&mut self, uid: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM edges WHERE graph = ?1", [uid])?;
        conn.execute("DELETE FROM nodes WHERE graph = ?1", [uid])?;
        conn.execute("DELETE FROM graphs WHERE uid = ?1", [uid])?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    fn create_node(&mut self, graph_uid: &str, n: &mut Node) -> Result<(), StoreError> {
        check_attrs(&n.attrs)?;
        self.ensure_graph(graph_uid)?;
        if n.uid.is_empty() {
            n.uid = new_uid();
        }

        let ts = Some(now());
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO nodes (uid, graph, label, attrs, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                n.uid,
                graph_uid,
                n.label,
                encode_attrs(&n.attrs)?,
                encode_time(ts),
                encode_time(ts)
            ],
        )
        .map_err(|e| conflict_or(e, || format!("node {} already exists", n.uid)))?;

        n.id = conn.last_insert_rowid();
        n.deg_out = 0;
        n.deg_in = 0;
        n.created_at = ts;
        n.updated_at = ts;
        Ok(())
    }

    fn find_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<Node, StoreError> {
        self.ensure_graph(graph_uid)?;
        let mut cond = Conditions::default();
        cond.push("n.graph = ?", graph_uid.to_string());
        cond.push("n.id = ?", id);
        self.query_nodes(&cond, 0, 0)?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::node_not_found(id))
    }

    fn find_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Node, StoreError> {
        self.ensure_graph(graph_uid)?;
        let mut cond = Conditions::default();
        cond.push("n.graph = ?", graph_uid.to_string());
        cond.push("n.uid = ?", uid.to_string());
        self.query_nodes(&cond, 0, 0)?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::node_not_found(uid))
    }

    fn find_nodes(
        &mut self,
        graph_uid: &str,
        filter: &NodeFilter,
    ) -> Result<Page<Node>, StoreError> {
        self.ensure_graph(graph_uid)?;
        let mut cond = Conditions::default();
        cond.push("n.graph = ?", graph_uid.to_string());
        match filter.selection() {
            NodeSelection::Id(id) => cond.push("n.id = ?", id),
            NodeSelection::Uid(uid) => cond.push("n.uid = ?", uid.to_string()),
            NodeSelection::Into(uid) => cond.push(
                "n.uid IN (SELECT source FROM edges WHERE graph = n.graph AND target = ?)",
                uid.to_string(),
            ),
            NodeSelection::OutOf(uid) => cond.push(
                "n.uid IN (SELECT target FROM edges WHERE graph = n.graph AND source = ?)",
                uid.to_string(),
            ),
            NodeSelection::All => {}
        }
        if let Some(label) = &filter.label {
            cond.push("n.label = ?", label.clone());
        }
        self.query_nodes(&cond, filter.offset, filter.limit)
    }

    fn update_node(
        &mut self,
        graph_uid: &str,
        id: i64,
        update: &NodeUpdate,
    ) -> Result<Node, StoreError> {
        if let Some(attrs) = &update.attrs {
            check_attrs(attrs)?;
        }
        let current = self.find_node_by_id(graph_uid, id)?;

        let mut set = Assignments::default();
        if let Some(label) = &update.label {
            set.set("label", label.clone());
        }
        if let Some(attrs) = &update.attrs {
            set.merge_attrs(&current.attrs, attrs)?;
        }
        let mut cond = Conditions::default();
        cond.push("graph = ?", graph_uid.to_string());
        cond.push("id = ?", id);
        self.run_update("nodes", set, cond)?;

        self.find_node_by_id(graph_uid, id)
    }

    fn delete_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<(), StoreError> {
        self.ensure_graph(graph_uid)?;
        let uid: String = self
            .conn()?
            .query_row(
                "SELECT uid FROM nodes WHERE graph = ?1 AND id = ?2",
                params![graph_uid, id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::node_not_found(id))?;
        self.delete_node_by_uid(graph_uid, &uid)
    }

    fn delete_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        self.ensure_graph(graph_uid)?;
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM edges WHERE graph = ?1 AND (source = ?2 OR target = ?2)",
            [graph_uid, uid],
        )?;
        let removed = conn.execute(
            "DELETE FROM nodes WHERE graph = ?1 AND uid = ?2",
            [graph_uid, uid],
        )?;
        if removed == 0 {
            return Err(StoreError::node_not_found(uid));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    fn create_edge(&mut self, graph_uid: &str, e: &mut Edge) -> Result<(), StoreError> {
        self.ensure_graph(graph_uid)?;
        if e.source == e.target {
            return Err(StoreError::Invalid(format!(
                "edge source and target must differ: {}",
                e.source
            )));
        }
        check_weight(e.weight)?;
        check_attrs(&e.attrs)?;
        self.ensure_node(graph_uid, &e.source)?;
        self.ensure_node(graph_uid, &e.target)?;

        if let Some(existing) = self.edge_between(graph_uid, &e.source, &e.target)? {
            *e = existing;
            return Ok(());
        }
        if e.uid.is_empty() {
            e.uid = new_uid();
        }

        let ts = Some(now());
        self.conn()?
            .execute(
                "INSERT INTO edges
                 (uid, graph, source, target, label, weight, attrs, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    e.uid,
                    graph_uid,
                    e.source,
                    e.target,
                    e.label,
                    e.weight,
                    encode_attrs(&e.attrs)?,
                    encode_time(ts),
                    encode_time(ts)
                ],
            )
            .map_err(|err| conflict_or(err, || format!("edge {} already exists", e.uid)))?;

        e.created_at = ts;
        e.updated_at = ts;
        Ok(())
    }

    fn find_edge_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Edge, StoreError> {
        self.ensure_graph(graph_uid)?;
        let mut cond = Conditions::default();
        cond.push("e.graph = ?", graph_uid.to_string());
        cond.push("e.uid = ?", uid.to_string());
        self.query_edges(&cond, 0, 0)?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::edge_not_found(uid))
    }

    fn find_edges(
        &mut self,
        graph_uid: &str,
        filter: &EdgeFilter,
    ) -> Result<Page<Edge>, StoreError> {
        self.ensure_graph(graph_uid)?;
        let mut cond = Conditions::default();
        cond.push("e.graph = ?", graph_uid.to_string());
        match filter.selection() {
            EdgeSelection::Between { source, target } => {
                cond.push("e.source = ?", source.to_string());
                cond.push("e.target = ?", target.to_string());
            }
            EdgeSelection::OutOf(source) => cond.push("e.source = ?", source.to_string()),
            EdgeSelection::Into(target) => cond.push("e.target = ?", target.to_string()),
            EdgeSelection::All => {}
        }
        if let Some(label) = &filter.label {
            cond.push("e.label = ?", label.clone());
        }
        self.query_edges(&cond, filter.offset, filter.limit)
    }

    fn update_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
        update: &EdgeUpdate,
    ) -> Result<Edge, StoreError> {
        if let Some(weight) = update.weight {
            check_weight(weight)?;
        }
        if let Some(attrs) = &update.attrs {
            check_attrs(attrs)?;
        }
        self.ensure_graph(graph_uid)?;
        self.ensure_node(graph_uid, source)?;
        self.ensure_node(graph_uid, target)?;
        let current = self
            .edge_between(graph_uid, source, target)?
            .ok_or_else(|| StoreError::edge_not_found(format!("{} -> {}", source, target)))?;

        let mut set = Assignments::default();
        if let Some(weight) = update.weight {
            set.set("weight", weight);
        }
        if let Some(label) = &update.label {
            set.set("label", label.clone());
        }
        if let Some(attrs) = &update.attrs {
            set.merge_attrs(&current.attrs, attrs)?;
        }
        let mut cond = Conditions::default();
        cond.push("graph = ?", graph_uid.to_string());
        cond.push("source = ?", source.to_string());
        cond.push("target = ?", target.to_string());
        self.run_update("edges", set, cond)?;

        self.edge_between(graph_uid, source, target)?
            .ok_or_else(|| StoreError::edge_not_found(format!("{} -> {}", source, target)))
    }

    fn delete_edge(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        self.ensure_graph(graph_uid)?;
        let removed = self.conn()?.execute(
            "DELETE FROM edges WHERE graph = ?1 AND uid = ?2",
            [graph_uid, uid],
        )?;
        if removed == 0 {
            return Err(StoreError::edge_not_found(uid));
        }
        Ok(())
    }

    fn delete_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
    ) -> Result<(), StoreError> {
        self.ensure_graph(graph_uid)?;
        self.ensure_node(graph_uid, source)?;
        self.ensure_node(graph_uid, target)?;
        let removed = self.conn()?.execute(
            "DELETE FROM edges WHERE graph = ?1 AND source = ?2 AND target = ?3",
            [graph_uid, source, target],
        )?;
        if removed == 0 {
            return Err(StoreError::edge_not_found(format!("{} -> {}", source, target)));
        }
        Ok(())
    }

    fn commit(mut self) -> Result<(), StoreError> {
        self.conn()?.execute_batch("COMMIT")?;
        self.finished = true;
        tracing::trace!("committed transaction");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
