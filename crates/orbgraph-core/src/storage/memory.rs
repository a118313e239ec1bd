//! # In-Memory Engine
//!
//! All graphs live in one `BTreeMap<uid, GraphState>` behind a single
//! `RwLock`. Reads take the shared lock for the duration of filter and
//! copy; writes take the exclusive lock for filter and mutate. Values
//! returned to callers are always owned copies.
//!
//! A transaction is only a handle on the open store. Each method is atomic
//! on its own; `commit` has nothing to flush.

use super::{Store, Transaction};
use crate::formats::snapshot::GraphSnapshot;
use crate::graph::{EdgeRecord, GraphState, NodeRecord};
use crate::primitives::{MEMORY_DSN, WEIGHTED_DIRECTED};
use crate::query::{self, Page};
use crate::types::attrs::{check_attrs, merge_attrs};
use crate::types::{check_weight, new_uid, now};
use crate::{
    Edge, EdgeFilter, EdgeUpdate, Graph, GraphFilter, GraphUpdate, Node, NodeFilter, NodeUpdate,
    StoreError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct MemoryState {
    closed: bool,
    graphs: BTreeMap<String, GraphState>,
}

/// The in-memory engine.
#[derive(Debug)]
pub struct MemoryDb {
    dsn: String,
    state: RwLock<MemoryState>,
}

impl MemoryDb {
    /// Open an empty, volatile store.
    pub fn open_in_memory() -> Self {
        Self::with_graphs(MEMORY_DSN.to_string(), BTreeMap::new())
    }

    /// Open a store pre-loaded from every snapshot file under `dir`.
    ///
    /// Files are read recursively in path order. A graph UID seen twice
    /// keeps the later file's contents. A node UID that another loaded
    /// graph already holds is `ECONFLICT`.
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        let mut graphs: BTreeMap<String, GraphState> = BTreeMap::new();
        for path in files {
            let bytes = std::fs::read(&path)?;
            let snapshot: GraphSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Internal(format!("cannot parse {}: {}", path.display(), e))
            })?;
            let state = snapshot.into_state()?;
            tracing::debug!(
                path = %path.display(),
                graph = %state.uid,
                nodes = state.node_count(),
                edges = state.edge_count(),
                "loaded graph snapshot"
            );
            if graphs.contains_key(&state.uid) {
                tracing::warn!(
                    graph = %state.uid,
                    path = %path.display(),
                    "duplicate graph uid, replacing"
                );
            }
            let taken = state.nodes().find(|n| {
                graphs
                    .iter()
                    .any(|(uid, g)| *uid != state.uid && g.contains_node_uid(&n.uid))
            });
            if let Some(n) = taken {
                return Err(StoreError::Conflict(format!(
                    "node {} in {} already exists",
                    n.uid,
                    path.display()
                )));
            }
            graphs.insert(state.uid.clone(), state);
        }

        tracing::info!(dir = %dir.display(), graphs = graphs.len(), "opened in-memory store");
        Ok(Self::with_graphs(dir.display().to_string(), graphs))
    }

    fn with_graphs(dsn: String, graphs: BTreeMap<String, GraphState>) -> Self {
        Self {
            dsn,
            state: RwLock::new(MemoryState {
                closed: false,
                graphs,
            }),
        }
    }

    /// The DSN this store was opened from.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        let guard = self
            .state
            .read()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))?;
        if guard.closed {
            return Err(StoreError::Closed);
        }
        Ok(guard)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        let guard = self
            .state
            .write()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))?;
        if guard.closed {
            return Err(StoreError::Closed);
        }
        Ok(guard)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

impl Store for MemoryDb {
    type Tx<'a> = MemoryTx<'a>;

    fn begin_tx(&self) -> Result<Self::Tx<'_>, StoreError> {
        drop(self.read()?);
        Ok(MemoryTx { db: self })
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))?;
        guard.closed = true;
        guard.graphs.clear();
        Ok(())
    }
}

/// Handle on an open [`MemoryDb`].
#[derive(Debug)]
pub struct MemoryTx<'a> {
    db: &'a MemoryDb,
}

fn graph<'g>(
    graphs: &'g BTreeMap<String, GraphState>,
    uid: &str,
) -> Result<&'g GraphState, StoreError> {
    graphs.get(uid).ok_or_else(|| StoreError::graph_not_found(uid))
}

fn graph_mut<'g>(
    graphs: &'g mut BTreeMap<String, GraphState>,
    uid: &str,
) -> Result<&'g mut GraphState, StoreError> {
    graphs
        .get_mut(uid)
        .ok_or_else(|| StoreError::graph_not_found(uid))
}

fn node_id(state: &GraphState, uid: &str) -> Result<i64, StoreError> {
    state
        .node_id_by_uid(uid)
        .ok_or_else(|| StoreError::node_not_found(uid))
}

impl Transaction for MemoryTx<'_> {
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

        let mut guard = self.db.write()?;
        if g.uid.is_empty() {
            g.uid = new_uid();
        }
        if guard.graphs.contains_key(&g.uid) {
            return Err(StoreError::Conflict(format!("graph {} already exists", g.uid)));
        }

        let ts = now();
        let mut state = GraphState::new(g.uid.clone(), g.label.clone(), g.attrs.clone());
        state.created_at = Some(ts);
        state.updated_at = Some(ts);
        *g = state.summary();
        guard.graphs.insert(g.uid.clone(), state);
        Ok(())
    }

    fn find_graph_by_uid(&mut self, uid: &str) -> Result<Graph, StoreError> {
        let guard = self.db.read()?;
        graph(&guard.graphs, uid).map(GraphState::summary)
    }

    fn find_graphs(&mut self, filter: &GraphFilter) -> Result<Page<Graph>, StoreError> {
        let guard = self.db.read()?;
        if let Some(uid) = filter.uid.as_deref() {
            return Ok(query::select_graphs(guard.graphs.get(uid), filter));
        }
        Ok(query::select_graphs(guard.graphs.values(), filter))
    }

    fn update_graph(&mut self, uid: &str, update: &GraphUpdate) -> Result<Graph, StoreError> {
        if let Some(attrs) = &update.attrs {
            check_attrs(attrs)?;
        }
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, uid)?;
        if let Some(label) = &update.label {
            state.label.clone_from(label);
        }
        if let Some(attrs) = &update.attrs {
            merge_attrs(&mut state.attrs, attrs);
        }
        state.updated_at = Some(now());
        Ok(state.summary())
    }

    fn delete_graph(&mut self, uid: &str) -> Result<(), StoreError> {
        self.db.write()?.graphs.remove(uid);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    fn create_node(&mut self, graph_uid: &str, n: &mut Node) -> Result<(), StoreError> {
        check_attrs(&n.attrs)?;
        let mut guard = self.db.write()?;
        graph(&guard.graphs, graph_uid)?;

        if n.uid.is_empty() {
            n.uid = new_uid();
        } else if guard.graphs.values().any(|g| g.contains_node_uid(&n.uid)) {
            return Err(StoreError::Conflict(format!("node {} already exists", n.uid)));
        }

        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        let ts = now();
        let record = NodeRecord {
            id: state.allocate_node_id(),
            uid: n.uid.clone(),
            label: n.label.clone(),
            attrs: n.attrs.clone(),
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        *n = state.node_view(&record);
        state.insert_node(record)
    }

    fn find_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<Node, StoreError> {
        let guard = self.db.read()?;
        let state = graph(&guard.graphs, graph_uid)?;
        state
            .node(id)
            .map(|n| state.node_view(n))
            .ok_or_else(|| StoreError::node_not_found(id))
    }

    fn find_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Node, StoreError> {
        let guard = self.db.read()?;
        let state = graph(&guard.graphs, graph_uid)?;
        let id = node_id(state, uid)?;
        state
            .node(id)
            .map(|n| state.node_view(n))
            .ok_or_else(|| StoreError::node_not_found(uid))
    }

    fn find_nodes(
        &mut self,
        graph_uid: &str,
        filter: &NodeFilter,
    ) -> Result<Page<Node>, StoreError> {
        let guard = self.db.read()?;
        let state = graph(&guard.graphs, graph_uid)?;
        Ok(query::select_nodes(state, filter))
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
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        let record = state
            .node_mut(id)
            .ok_or_else(|| StoreError::node_not_found(id))?;
        if let Some(label) = &update.label {
            record.label.clone_from(label);
        }
        if let Some(attrs) = &update.attrs {
            merge_attrs(&mut record.attrs, attrs);
        }
        record.updated_at = Some(now());
        let record = record.clone();
        Ok(state.node_view(&record))
    }

    fn delete_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<(), StoreError> {
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        state
            .remove_node(id)
            .map(drop)
            .ok_or_else(|| StoreError::node_not_found(id))
    }

    fn delete_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        let id = node_id(state, uid)?;
        state
            .remove_node(id)
            .map(drop)
            .ok_or_else(|| StoreError::node_not_found(uid))
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    fn create_edge(&mut self, graph_uid: &str, e: &mut Edge) -> Result<(), StoreError> {
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;

        if e.source == e.target {
            return Err(StoreError::Invalid(format!(
                "edge source and target must differ: {}",
                e.source
            )));
        }
        check_weight(e.weight)?;
        check_attrs(&e.attrs)?;
        let from = node_id(state, &e.source)?;
        let to = node_id(state, &e.target)?;

        if let Some(existing) = state.edge(from, to) {
            *e = state.edge_view(existing);
            return Ok(());
        }

        if e.uid.is_empty() {
            e.uid = new_uid();
        } else if state.contains_edge_uid(&e.uid) {
            return Err(StoreError::Conflict(format!("edge {} already exists", e.uid)));
        }

        let ts = now();
        let record = EdgeRecord {
            uid: e.uid.clone(),
            from,
            to,
            weight: e.weight,
            label: e.label.clone(),
            attrs: e.attrs.clone(),
            created_at: Some(ts),
            updated_at: Some(ts),
        };
        *e = state.edge_view(&record);
        state.insert_edge(record)
    }

    fn find_edge_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Edge, StoreError> {
        let guard = self.db.read()?;
        let state = graph(&guard.graphs, graph_uid)?;
        state
            .edge_by_uid(uid)
            .map(|e| state.edge_view(e))
            .ok_or_else(|| StoreError::edge_not_found(uid))
    }

    fn find_edges(
        &mut self,
        graph_uid: &str,
        filter: &EdgeFilter,
    ) -> Result<Page<Edge>, StoreError> {
        let guard = self.db.read()?;
        let state = graph(&guard.graphs, graph_uid)?;
        Ok(query::select_edges(state, filter))
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
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        let from = node_id(state, source)?;
        let to = node_id(state, target)?;
        let record = state
            .edge_mut(from, to)
            .ok_or_else(|| StoreError::edge_not_found(format!("{} -> {}", source, target)))?;
        if let Some(weight) = update.weight {
            record.weight = weight;
        }
        if let Some(label) = &update.label {
            record.label.clone_from(label);
        }
        if let Some(attrs) = &update.attrs {
            merge_attrs(&mut record.attrs, attrs);
        }
        record.updated_at = Some(now());
        let record = record.clone();
        Ok(state.edge_view(&record))
    }

    fn delete_edge(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        let (from, to) = state
            .edge_by_uid(uid)
            .map(|e| (e.from, e.to))
            .ok_or_else(|| StoreError::edge_not_found(uid))?;
        state.remove_edge(from, to);
        Ok(())
    }

    fn delete_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
    ) -> Result<(), StoreError> {
        let mut guard = self.db.write()?;
        let state = graph_mut(&mut guard.graphs, graph_uid)?;
        let from = node_id(state, source)?;
        let to = node_id(state, target)?;
        state
            .remove_edge(from, to)
            .map(drop)
            .ok_or_else(|| StoreError::edge_not_found(format!("{} -> {}", source, target)))
    }

    fn commit(self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
