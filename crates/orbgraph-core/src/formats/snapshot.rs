//! # Graph Snapshots
//!
//! A self-contained JSON document describing one graph:
//!
//! ```json
//! {
//!   "graph": {"uid": "stars", "label": "Stars"},
//!   "nodes": [{"id": 1, "uid": "alice"}, {"id": 2, "uid": "orbgraph"}],
//!   "edges": [{"uid": "e1", "source": 1, "target": 2, "weight": 1.0}]
//! }
//! ```
//!
//! Edge endpoints are graph-local node IDs. Snapshots are what a directory
//! DSN pre-loads, and what `export_graph` / `import_graph` move between
//! engines.

use crate::graph::{EdgeRecord, GraphState, NodeRecord};
use crate::primitives::WEIGHTED_DIRECTED;
use crate::storage::{Store, Transaction, in_tx};
use crate::types::{default_weight, new_uid};
use crate::{Attrs, EdgeFilter, Graph, Node, NodeFilter, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One graph with all of its nodes and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub graph: Graph,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

/// An edge whose endpoints are node IDs of the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    #[serde(default)]
    pub uid: String,
    pub source: i64,
    pub target: i64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "attributes", default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

fn check_type(graph: &Graph) -> Result<(), StoreError> {
    if graph.graph_type.is_empty() || graph.graph_type == WEIGHTED_DIRECTED {
        Ok(())
    } else {
        Err(StoreError::Unsupported(format!(
            "unsupported graph type: {}",
            graph.graph_type
        )))
    }
}

impl GraphSnapshot {
    /// Build an in-memory graph from this snapshot.
    ///
    /// - Nodes keep their IDs; a node without one (`id <= 0`) is numbered
    ///   after the largest explicit ID.
    /// - A node repeating an earlier UID or ID is skipped.
    /// - An edge repeating an earlier (source, target) pair is skipped.
    /// - A self-loop is `EINVALID`; an edge naming an unknown node ID is
    ///   `EINTERNAL`.
    pub fn into_state(self) -> Result<GraphState, StoreError> {
        check_type(&self.graph)?;
        let uid = if self.graph.uid.is_empty() {
            new_uid()
        } else {
            self.graph.uid
        };
        let mut state = GraphState::new(uid, self.graph.label, self.graph.attrs);
        state.created_at = self.graph.created_at;
        state.updated_at = self.graph.updated_at;

        let (numbered, unnumbered): (Vec<Node>, Vec<Node>) =
            self.nodes.into_iter().partition(|n| n.id > 0);
        for node in numbered.into_iter().chain(unnumbered) {
            if state.contains_node_uid(&node.uid) || state.node(node.id).is_some() {
                tracing::warn!(
                    graph = %state.uid,
                    node = %node.uid,
                    id = node.id,
                    "skipping duplicate node"
                );
                continue;
            }
            let id = if node.id > 0 {
                node.id
            } else {
                state.allocate_node_id()
            };
            state.insert_node(NodeRecord {
                id,
                uid: if node.uid.is_empty() { new_uid() } else { node.uid },
                label: node.label,
                attrs: node.attrs,
                created_at: node.created_at,
                updated_at: node.updated_at,
            })?;
        }

        for edge in self.edges {
            if edge.source != edge.target && state.edge(edge.source, edge.target).is_some() {
                tracing::warn!(
                    graph = %state.uid,
                    source = edge.source,
                    target = edge.target,
                    "skipping duplicate edge"
                );
                continue;
            }
            state.insert_edge(EdgeRecord {
                uid: if edge.uid.is_empty() { new_uid() } else { edge.uid },
                from: edge.source,
                to: edge.target,
                weight: edge.weight,
                label: edge.label,
                attrs: edge.attrs,
                created_at: None,
                updated_at: None,
            })?;
        }

        Ok(state)
    }
}

// =============================================================================
// ENGINE TRANSFER
// =============================================================================

/// Read graph `uid` with every node and edge out of `store`.
pub fn export_graph<S: Store>(store: &S, uid: &str) -> Result<GraphSnapshot, StoreError> {
    in_tx(store, |tx| {
        let graph = tx.find_graph_by_uid(uid)?;
        let nodes = tx.find_nodes(uid, &NodeFilter::default())?.items;
        let edges = tx.find_edges(uid, &EdgeFilter::default())?.items;

        let ids: BTreeMap<&str, i64> = nodes.iter().map(|n| (n.uid.as_str(), n.id)).collect();
        let id_of = |node_uid: &str| {
            ids.get(node_uid).copied().ok_or_else(|| {
                StoreError::Internal(format!("edge endpoint {} has no node", node_uid))
            })
        };
        let edges = edges
            .into_iter()
            .map(|e| {
                Ok(SnapshotEdge {
                    source: id_of(&e.source)?,
                    target: id_of(&e.target)?,
                    uid: e.uid,
                    weight: e.weight,
                    label: e.label,
                    attrs: e.attrs,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let nodes = nodes
            .into_iter()
            .map(|n| Node {
                deg_out: 0,
                deg_in: 0,
                ..n
            })
            .collect();

        Ok(GraphSnapshot {
            graph,
            nodes,
            edges,
        })
    })
}

/// Replay `snapshot` into `store` as one transaction and return the new graph.
///
/// The snapshot is normalized exactly as a directory load would normalize
/// it. UIDs are preserved; node IDs are assigned by the target engine.
pub fn import_graph<S: Store>(store: &S, snapshot: &GraphSnapshot) -> Result<Graph, StoreError> {
    let state = snapshot.clone().into_state()?;
    in_tx(store, |tx| {
        let mut graph = Graph::new()
            .with_uid(state.uid.clone())
            .with_label(state.label.clone())
            .with_attrs(state.attrs.clone());
        tx.create_graph(&mut graph)?;

        for node in state.nodes() {
            let mut created = Node::new()
                .with_uid(node.uid.clone())
                .with_label(node.label.clone())
                .with_attrs(node.attrs.clone());
            tx.create_node(&graph.uid, &mut created)?;
        }
        for edge in state.edges() {
            tx.create_edge(&graph.uid, &mut state.edge_view(edge))?;
        }

        tracing::info!(
            graph = %graph.uid,
            nodes = state.node_count(),
            edges = state.edge_count(),
            "imported graph snapshot"
        );
        tx.find_graph_by_uid(&graph.uid)
    })
}
