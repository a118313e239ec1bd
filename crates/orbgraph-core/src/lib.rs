//! # orbgraph-core
//!
//! An embedded store for directed, weighted graphs.
//!
//! Graphs hold nodes and edges carrying labels and JSON-compatible
//! attribute maps. Two interchangeable engines sit behind one
//! transactional contract:
//! - `MemoryDb`: maps under a single reader/writer lock, optionally
//!   pre-loaded from a directory of snapshots
//! - `SqliteDb`: three SQLite tables with JSON attribute columns
//!
//! ## Invariants
//!
//! Both engines enforce the same rules:
//! - Graph UIDs and node UIDs are unique across the store
//! - No self-loops, and at most one edge per ordered (source, target) pair
//! - Deleting a node deletes every edge touching it
//! - Every returned value is an owned copy
//!
//! ## Usage
//!
//! ```
//! use orbgraph_core::{Backend, Edge, Graph, Node, NodeFilter, Services};
//! use std::sync::Arc;
//!
//! let services = Services::new(Arc::new(Backend::open(":memory:").expect("open")));
//! let mut graph = Graph::new().with_label("stars");
//! services.graphs.create_graph(&mut graph).expect("graph");
//!
//! for uid in ["alice", "orbgraph"] {
//!     let mut node = Node::new().with_uid(uid);
//!     services.nodes.create_node(&graph.uid, &mut node).expect("node");
//! }
//! let mut edge = Edge::new("alice", "orbgraph");
//! services.edges.create_edge(&graph.uid, &mut edge).expect("edge");
//!
//! let starred = NodeFilter {
//!     to: Some("orbgraph".to_string()),
//!     ..NodeFilter::default()
//! };
//! let page = services.nodes.find_nodes(&graph.uid, &starred).expect("find");
//! assert_eq!(page.items[0].uid, "alice");
//! ```
//!
//! The crate is synchronous. Async callers should run it on a blocking pool.

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod primitives;
pub mod query;
pub mod service;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use types::attrs::attrs;
pub use types::{
    AttrValue, Attrs, Edge, EdgeFilter, EdgeUpdate, ErrorCode, Graph, GraphFilter, GraphUpdate,
    Node, NodeFilter, NodeUpdate, StoreError,
};

pub use formats::{GraphSnapshot, SnapshotEdge, export_graph, import_graph};
pub use graph::GraphState;
pub use query::{Page, paginate};
pub use service::{EdgeService, GraphService, NodeService, Services};
pub use storage::{Backend, BackendTx, Dsn, MemoryDb, SqliteDb, Store, Transaction, in_tx};
