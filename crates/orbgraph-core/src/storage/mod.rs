//! # Storage Engines
//!
//! The transactional CRUD contract and its two implementations:
//! - `MemoryDb`: map-backed, one reader/writer lock over the whole store
//! - `SqliteDb`: SQLite tables with JSON attribute columns
//!
//! `Backend` picks one of them from a datasource name (DSN) and
//! dispatches to it, so callers can stay non-generic.

mod memory;
mod sqlite;

pub use memory::{MemoryDb, MemoryTx};
pub use sqlite::{SqliteDb, SqliteTx};

use crate::primitives::{MEMORY_DSN, SQLITE_SCHEME};
use crate::query::Page;
use crate::{
    Edge, EdgeFilter, EdgeUpdate, Graph, GraphFilter, GraphUpdate, Node, NodeFilter, NodeUpdate,
    StoreError,
};
use std::path::PathBuf;

// =============================================================================
// CONTRACT
// =============================================================================

/// A store that hands out transactions.
pub trait Store: Send + Sync {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    /// Open a transaction. Fails with `StoreError::Closed` once the store is closed.
    fn begin_tx(&self) -> Result<Self::Tx<'_>, StoreError>;

    /// Close the store. Every later operation fails.
    fn close(&self) -> Result<(), StoreError>;
}

/// The scope of one logical storage operation.
///
/// Dropping a transaction without calling [`Transaction::commit`]
/// discards its writes where the engine supports it.
pub trait Transaction {
    // Graphs

    /// Insert `graph`, filling in its UID, type, counts and timestamps.
    fn create_graph(&mut self, graph: &mut Graph) -> Result<(), StoreError>;
    fn find_graph_by_uid(&mut self, uid: &str) -> Result<Graph, StoreError>;
    fn find_graphs(&mut self, filter: &GraphFilter) -> Result<Page<Graph>, StoreError>;
    fn update_graph(&mut self, uid: &str, update: &GraphUpdate) -> Result<Graph, StoreError>;
    /// Remove a graph with all of its nodes and edges. Succeeds when absent.
    fn delete_graph(&mut self, uid: &str) -> Result<(), StoreError>;

    // Nodes

    /// Insert `node` into graph `graph_uid`, filling in its ID, UID and timestamps.
    fn create_node(&mut self, graph_uid: &str, node: &mut Node) -> Result<(), StoreError>;
    fn find_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<Node, StoreError>;
    fn find_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Node, StoreError>;
    fn find_nodes(&mut self, graph_uid: &str, filter: &NodeFilter)
    -> Result<Page<Node>, StoreError>;
    fn update_node(
        &mut self,
        graph_uid: &str,
        id: i64,
        update: &NodeUpdate,
    ) -> Result<Node, StoreError>;
    /// Remove a node and every edge touching it.
    fn delete_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<(), StoreError>;
    fn delete_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError>;

    // Edges

    /// Insert `edge` into graph `graph_uid`.
    ///
    /// When the (source, target) pair is already linked this succeeds
    /// without writing and fills `edge` from the stored edge.
    fn create_edge(&mut self, graph_uid: &str, edge: &mut Edge) -> Result<(), StoreError>;
    fn find_edge_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Edge, StoreError>;
    fn find_edges(&mut self, graph_uid: &str, filter: &EdgeFilter)
    -> Result<Page<Edge>, StoreError>;
    fn update_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
        update: &EdgeUpdate,
    ) -> Result<Edge, StoreError>;
    fn delete_edge(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError>;
    fn delete_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
    ) -> Result<(), StoreError>;

    /// Make the transaction's writes durable.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// Run `f` inside one transaction and commit if it succeeds.
///
/// On error the transaction is dropped, which rolls it back, and the error
/// is returned unchanged.
pub fn in_tx<'s, S, T, F>(store: &'s S, f: F) -> Result<T, StoreError>
where
    S: Store,
    F: FnOnce(&mut S::Tx<'s>) -> Result<T, StoreError>,
{
    let mut tx = store.begin_tx()?;
    let out = f(&mut tx)?;
    tx.commit()?;
    Ok(out)
}

// =============================================================================
// DATASOURCE NAMES
// =============================================================================

/// A parsed datasource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dsn {
    /// `:memory:`, a volatile in-memory store.
    Memory,
    /// A directory of graph snapshots loaded into an in-memory store.
    Directory(PathBuf),
    /// `sqlite://<path>`; the path may be `:memory:`.
    Sqlite(String),
}

impl Dsn {
    pub fn parse(dsn: &str) -> Result<Self, StoreError> {
        let dsn = dsn.trim();
        if dsn.is_empty() {
            return Err(StoreError::Invalid("dsn required".to_string()));
        }
        if dsn == MEMORY_DSN {
            return Ok(Self::Memory);
        }
        match dsn.split_once("://") {
            Some((scheme, path)) if scheme == SQLITE_SCHEME => {
                if path.is_empty() {
                    return Err(StoreError::Invalid(format!("dsn {} has no path", dsn)));
                }
                Ok(Self::Sqlite(path.to_string()))
            }
            Some((scheme, _)) => Err(StoreError::Unsupported(format!(
                "unsupported datasource scheme: {}",
                scheme
            ))),
            None => Ok(Self::Directory(PathBuf::from(dsn))),
        }
    }
}

// =============================================================================
// BACKEND DISPATCH
// =============================================================================

/// The engine selected by a DSN.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryDb),
    Sqlite(SqliteDb),
}

impl Backend {
    /// Open the engine a DSN names.
    ///
    /// ```
    /// use orbgraph_core::storage::Backend;
    ///
    /// let store = Backend::open(":memory:").expect("open");
    /// assert!(matches!(store, Backend::Memory(_)));
    /// ```
    pub fn open(dsn: &str) -> Result<Self, StoreError> {
        match Dsn::parse(dsn)? {
            Dsn::Memory => Ok(Self::Memory(MemoryDb::open_in_memory())),
            Dsn::Directory(dir) => Ok(Self::Memory(MemoryDb::open_dir(dir)?)),
            Dsn::Sqlite(path) => Ok(Self::Sqlite(SqliteDb::open(&path)?)),
        }
    }

    /// Short engine name for logs and banners.
    pub fn engine(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

/// A transaction on whichever engine a [`Backend`] wraps.
pub enum BackendTx<'a> {
    Memory(MemoryTx<'a>),
    Sqlite(SqliteTx<'a>),
}

impl Store for Backend {
    type Tx<'a> = BackendTx<'a>;

    fn begin_tx(&self) -> Result<Self::Tx<'_>, StoreError> {
        match self {
            Self::Memory(db) => db.begin_tx().map(BackendTx::Memory),
            Self::Sqlite(db) => db.begin_tx().map(BackendTx::Sqlite),
        }
    }

    fn close(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(db) => db.close(),
            Self::Sqlite(db) => db.close(),
        }
    }
}

macro_rules! dispatch {
    ($tx:expr, $inner:ident => $call:expr) => {
        match $tx {
            BackendTx::Memory($inner) => $call,
            BackendTx::Sqlite($inner) => $call,
        }
    };
}

impl Transaction for BackendTx<'_> {
    fn create_graph(&mut self, graph: &mut Graph) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.create_graph(graph))
    }

    fn find_graph_by_uid(&mut self, uid: &str) -> Result<Graph, StoreError> {
        dispatch!(self, tx => tx.find_graph_by_uid(uid))
    }

    fn find_graphs(&mut self, filter: &GraphFilter) -> Result<Page<Graph>, StoreError> {
        dispatch!(self, tx => tx.find_graphs(filter))
    }

    fn update_graph(&mut self, uid: &str, update: &GraphUpdate) -> Result<Graph, StoreError> {
        dispatch!(self, tx => tx.update_graph(uid, update))
    }

    fn delete_graph(&mut self, uid: &str) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.delete_graph(uid))
    }

    fn create_node(&mut self, graph_uid: &str, node: &mut Node) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.create_node(graph_uid, node))
    }

    fn find_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<Node, StoreError> {
        dispatch!(self, tx => tx.find_node_by_id(graph_uid, id))
    }

    fn find_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Node, StoreError> {
        dispatch!(self, tx => tx.find_node_by_uid(graph_uid, uid))
    }

    fn find_nodes(
        &mut self,
        graph_uid: &str,
        filter: &NodeFilter,
    ) -> Result<Page<Node>, StoreError> {
        dispatch!(self, tx => tx.find_nodes(graph_uid, filter))
    }

    fn update_node(
        &mut self,
        graph_uid: &str,
        id: i64,
        update: &NodeUpdate,
    ) -> Result<Node, StoreError> {
        dispatch!(self, tx => tx.update_node(graph_uid, id, update))
    }

    fn delete_node_by_id(&mut self, graph_uid: &str, id: i64) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.delete_node_by_id(graph_uid, id))
    }

    fn delete_node_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.delete_node_by_uid(graph_uid, uid))
    }

    fn create_edge(&mut self, graph_uid: &str, edge: &mut Edge) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.create_edge(graph_uid, edge))
    }

    fn find_edge_by_uid(&mut self, graph_uid: &str, uid: &str) -> Result<Edge, StoreError> {
        dispatch!(self, tx => tx.find_edge_by_uid(graph_uid, uid))
    }

    fn find_edges(
        &mut self,
        graph_uid: &str,
        filter: &EdgeFilter,
    ) -> Result<Page<Edge>, StoreError> {
        dispatch!(self, tx => tx.find_edges(graph_uid, filter))
    }

    fn update_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
        update: &EdgeUpdate,
    ) -> Result<Edge, StoreError> {
        dispatch!(self, tx => tx.update_edge_between(graph_uid, source, target, update))
    }

    fn delete_edge(&mut self, graph_uid: &str, uid: &str) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.delete_edge(graph_uid, uid))
    }

    fn delete_edge_between(
        &mut self,
        graph_uid: &str,
        source: &str,
        target: &str,
    ) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.delete_edge_between(graph_uid, source, target))
    }

    fn commit(self) -> Result<(), StoreError> {
        dispatch!(self, tx => tx.commit())
    }
}
