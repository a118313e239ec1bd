//! # Formats
//!
//! Serialized forms of graphs that live outside a store.

pub mod snapshot;

pub use snapshot::{GraphSnapshot, SnapshotEdge, export_graph, import_graph};
