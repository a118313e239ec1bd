//! # Graph State
//!
//! The in-memory representation of one directed weighted graph.
//!
//! A `GraphState` owns its node and edge records and keeps three indices
//! consistent with them:
//! - outgoing adjacency (`from -> to -> edge`)
//! - incoming adjacency (`to -> {from}`)
//! - UID lookups for nodes and edges
//!
//! All maps are `BTreeMap`s, so iteration order (node ID, then target ID)
//! is deterministic. Removing a node removes every edge touching it.

use crate::primitives::{FIRST_NODE_ID, WEIGHTED_DIRECTED};
use crate::{Attrs, Edge, Graph, Node, StoreError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RECORDS
// =============================================================================

/// Stored form of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: i64,
    pub uid: String,
    pub label: String,
    pub attrs: Attrs,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Stored form of an edge. Endpoints are node IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub uid: String,
    pub from: i64,
    pub to: i64,
    pub weight: f64,
    pub label: String,
    pub attrs: Attrs,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// GRAPH STATE
// =============================================================================

/// One graph held by the in-memory engine.
#[derive(Debug, Clone)]
pub struct GraphState {
    pub uid: String,
    pub label: String,
    pub attrs: Attrs,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    nodes: BTreeMap<i64, NodeRecord>,
    outgoing: BTreeMap<i64, BTreeMap<i64, EdgeRecord>>,
    incoming: BTreeMap<i64, BTreeSet<i64>>,
    node_uids: BTreeMap<String, i64>,
    edge_uids: BTreeMap<String, (i64, i64)>,
    next_node_id: i64,
}

impl GraphState {
    /// Create an empty graph.
    #[must_use]
    pub fn new(uid: impl Into<String>, label: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            uid: uid.into(),
            label: label.into(),
            attrs,
            created_at: None,
            updated_at: None,
            nodes: BTreeMap::new(),
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
            node_uids: BTreeMap::new(),
            edge_uids: BTreeMap::new(),
            next_node_id: FIRST_NODE_ID,
        }
    }

    /// Owned domain view of this graph with live counts.
    pub fn summary(&self) -> Graph {
        Graph {
            uid: self.uid.clone(),
            graph_type: WEIGHTED_DIRECTED.to_string(),
            label: self.label.clone(),
            attrs: self.attrs.clone(),
            nodes: self.node_count(),
            edges: self.edge_count(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_uids.len()
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Hand out the next node ID. IDs are never reused.
    pub fn allocate_node_id(&mut self) -> i64 {
        let id = self.next_node_id;
        self.next_node_id = self.next_node_id.saturating_add(1);
        id
    }

    /// The ID the next `allocate_node_id` call will return.
    pub fn next_node_id(&self) -> i64 {
        self.next_node_id
    }

    /// Install a node record.
    ///
    /// Records carrying an ID at or past the allocation cursor move the
    /// cursor forward, so imported IDs never collide with later ones.
    pub fn insert_node(&mut self, record: NodeRecord) -> Result<(), StoreError> {
        if self.nodes.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!(
                "node id {} already exists in graph {}",
                record.id, self.uid
            )));
        }
        if self.node_uids.contains_key(&record.uid) {
            return Err(StoreError::Conflict(format!(
                "node {} already exists",
                record.uid
            )));
        }
        if record.id >= self.next_node_id {
            self.next_node_id = record.id.saturating_add(1);
        }
        self.node_uids.insert(record.uid.clone(), record.id);
        self.nodes.insert(record.id, record);
        Ok(())
    }

    pub fn node(&self, id: i64) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: i64) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(&id)
    }

    pub fn node_id_by_uid(&self, uid: &str) -> Option<i64> {
        self.node_uids.get(uid).copied()
    }

    pub fn contains_node_uid(&self, uid: &str) -> bool {
        self.node_uids.contains_key(uid)
    }

    /// All nodes in ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.nodes.values()
    }

    /// Nodes reachable from `id` over one outgoing edge.
    pub fn successors(&self, id: i64) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.outgoing
            .get(&id)
            .into_iter()
            .flat_map(|targets| targets.keys())
            .filter_map(|to| self.nodes.get(to))
    }

    /// Nodes with an edge into `id`.
    pub fn predecessors(&self, id: i64) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.incoming
            .get(&id)
            .into_iter()
            .flat_map(|sources| sources.iter())
            .filter_map(|from| self.nodes.get(from))
    }

    pub fn out_degree(&self, id: i64) -> usize {
        self.outgoing.get(&id).map_or(0, BTreeMap::len)
    }

    pub fn in_degree(&self, id: i64) -> usize {
        self.incoming.get(&id).map_or(0, BTreeSet::len)
    }

    /// Owned domain view of a node with degrees computed now.
    pub fn node_view(&self, record: &NodeRecord) -> Node {
        Node {
            id: record.id,
            uid: record.uid.clone(),
            label: record.label.clone(),
            attrs: record.attrs.clone(),
            deg_out: self.out_degree(record.id),
            deg_in: self.in_degree(record.id),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Remove a node together with every edge incident to it.
    pub fn remove_node(&mut self, id: i64) -> Option<NodeRecord> {
        let record = self.nodes.remove(&id)?;
        self.node_uids.remove(&record.uid);

        if let Some(targets) = self.outgoing.remove(&id) {
            for (to, edge) in targets {
                self.edge_uids.remove(&edge.uid);
                if let Some(sources) = self.incoming.get_mut(&to) {
                    sources.remove(&id);
                }
            }
        }
        if let Some(sources) = self.incoming.remove(&id) {
            for from in sources {
                if let Some(edge) = self.outgoing.get_mut(&from).and_then(|t| t.remove(&id)) {
                    self.edge_uids.remove(&edge.uid);
                }
            }
        }
        Some(record)
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    pub fn edge(&self, from: i64, to: i64) -> Option<&EdgeRecord> {
        self.outgoing.get(&from).and_then(|targets| targets.get(&to))
    }

    pub fn edge_mut(&mut self, from: i64, to: i64) -> Option<&mut EdgeRecord> {
        self.outgoing
            .get_mut(&from)
            .and_then(|targets| targets.get_mut(&to))
    }

    pub fn edge_by_uid(&self, uid: &str) -> Option<&EdgeRecord> {
        let (from, to) = self.edge_uids.get(uid)?;
        self.edge(*from, *to)
    }

    pub fn contains_edge_uid(&self, uid: &str) -> bool {
        self.edge_uids.contains_key(uid)
    }

    /// Install an edge record.
    ///
    /// Fails with `EINVALID` for self-loops, `EINTERNAL` for dangling
    /// endpoints and `ECONFLICT` when the pair or the UID is taken.
    pub fn insert_edge(&mut self, record: EdgeRecord) -> Result<(), StoreError> {
        if record.from == record.to {
            return Err(StoreError::Invalid(format!(
                "self-loop on node {} is not allowed",
                record.from
            )));
        }
        for endpoint in [record.from, record.to] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(StoreError::Internal(format!(
                    "edge {} references missing node {}",
                    record.uid, endpoint
                )));
            }
        }
        if self.edge(record.from, record.to).is_some() {
            return Err(StoreError::Conflict(format!(
                "edge {} -> {} already exists",
                record.from, record.to
            )));
        }
        if self.edge_uids.contains_key(&record.uid) {
            return Err(StoreError::Conflict(format!(
                "edge {} already exists",
                record.uid
            )));
        }

        self.edge_uids
            .insert(record.uid.clone(), (record.from, record.to));
        self.incoming
            .entry(record.to)
            .or_default()
            .insert(record.from);
        self.outgoing
            .entry(record.from)
            .or_default()
            .insert(record.to, record);
        Ok(())
    }

    pub fn remove_edge(&mut self, from: i64, to: i64) -> Option<EdgeRecord> {
        let edge = self.outgoing.get_mut(&from)?.remove(&to)?;
        if let Some(sources) = self.incoming.get_mut(&to) {
            sources.remove(&from);
        }
        self.edge_uids.remove(&edge.uid);
        Some(edge)
    }

    /// All edges ordered by (source ID, target ID).
    pub fn edges(&self) -> impl Iterator<Item = &EdgeRecord> + '_ {
        self.outgoing.values().flat_map(|targets| targets.values())
    }

    /// Edges leaving `id`, ordered by target ID.
    pub fn outgoing_edges(&self, id: i64) -> impl Iterator<Item = &EdgeRecord> + '_ {
        self.outgoing
            .get(&id)
            .into_iter()
            .flat_map(|targets| targets.values())
    }

    /// Edges entering `id`, ordered by source ID.
    pub fn incoming_edges(&self, id: i64) -> impl Iterator<Item = &EdgeRecord> + '_ {
        self.incoming
            .get(&id)
            .into_iter()
            .flat_map(|sources| sources.iter())
            .filter_map(move |from| self.edge(*from, id))
    }

    /// Owned domain view of an edge, endpoints rendered as node UIDs.
    pub fn edge_view(&self, record: &EdgeRecord) -> Edge {
        let uid_of = |id: i64| {
            self.nodes
                .get(&id)
                .map(|n| n.uid.clone())
                .unwrap_or_default()
        };
        Edge {
            uid: record.uid.clone(),
            source: uid_of(record.from),
            target: uid_of(record.to),
            weight: record.weight,
            label: record.label.clone(),
            attrs: record.attrs.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    fn node(state: &mut GraphState, uid: &str) -> i64 {
        let id = state.allocate_node_id();
        state
            .insert_node(NodeRecord {
                id,
                uid: uid.to_string(),
                label: String::new(),
                attrs: Attrs::new(),
                created_at: None,
                updated_at: None,
            })
            .expect("insert node");
        id
    }

    fn edge(state: &mut GraphState, uid: &str, from: i64, to: i64) -> Result<(), StoreError> {
        state.insert_edge(EdgeRecord {
            uid: uid.to_string(),
            from,
            to,
            weight: 1.0,
            label: String::new(),
            attrs: Attrs::new(),
            created_at: None,
            updated_at: None,
        })
    }

    #[test]
    fn node_ids_start_at_one_and_are_not_reused() {
        let mut g = GraphState::new("g", "", Attrs::new());
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        assert_eq!((a, b), (1, 2));

        g.remove_node(b);
        let c = node(&mut g, "c");
        assert_eq!(c, 3);
    }

    #[test]
    fn duplicate_node_uid_conflicts() {
        let mut g = GraphState::new("g", "", Attrs::new());
        node(&mut g, "a");
        let id = g.allocate_node_id();
        let err = g
            .insert_node(NodeRecord {
                id,
                uid: "a".to_string(),
                label: String::new(),
                attrs: Attrs::new(),
                created_at: None,
                updated_at: None,
            })
            .expect_err("duplicate uid");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn imported_ids_advance_the_cursor() {
        let mut g = GraphState::new("g", "", Attrs::new());
        g.insert_node(NodeRecord {
            id: 41,
            uid: "x".to_string(),
            label: String::new(),
            attrs: Attrs::new(),
            created_at: None,
            updated_at: None,
        })
        .expect("import");
        assert_eq!(g.next_node_id(), 42);
    }

    #[test]
    fn self_loop_is_invalid() {
        let mut g = GraphState::new("g", "", Attrs::new());
        let a = node(&mut g, "a");
        let err = edge(&mut g, "e", a, a).expect_err("self loop");
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn second_edge_for_pair_conflicts() {
        let mut g = GraphState::new("g", "", Attrs::new());
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        edge(&mut g, "e1", a, b).expect("first edge");
        let err = edge(&mut g, "e2", a, b).expect_err("same pair");
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn degrees_and_neighbours_follow_adjacency() {
        let mut g = GraphState::new("g", "", Attrs::new());
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        let c = node(&mut g, "c");
        edge(&mut g, "ab", a, b).expect("edge");
        edge(&mut g, "ac", a, c).expect("edge");
        edge(&mut g, "cb", c, b).expect("edge");

        assert_eq!(g.out_degree(a), 2);
        assert_eq!(g.in_degree(b), 2);
        let succ: Vec<_> = g.successors(a).map(|n| n.uid.as_str()).collect();
        assert_eq!(succ, vec!["b", "c"]);
        let pred: Vec<_> = g.predecessors(b).map(|n| n.uid.as_str()).collect();
        assert_eq!(pred, vec!["a", "c"]);
        let incoming: Vec<_> = g.incoming_edges(b).map(|e| e.uid.as_str()).collect();
        assert_eq!(incoming, vec!["ab", "cb"]);
    }

    #[test]
    fn removing_a_node_cascades_to_its_edges() {
        let mut g = GraphState::new("g", "", Attrs::new());
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        let c = node(&mut g, "c");
        edge(&mut g, "ab", a, b).expect("edge");
        edge(&mut g, "ba", b, a).expect("edge");
        edge(&mut g, "ac", a, c).expect("edge");

        g.remove_node(b).expect("node exists");

        assert_eq!(g.edge_count(), 1);
        assert!(g.edge_by_uid("ab").is_none());
        assert!(g.edge_by_uid("ba").is_none());
        assert_eq!(g.in_degree(a), 0);
        assert_eq!(g.out_degree(a), 1);
        assert!(!g.contains_node_uid("b"));
    }

    #[test]
    fn edge_view_renders_node_uids() {
        let mut g = GraphState::new("g", "", Attrs::new());
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        edge(&mut g, "ab", a, b).expect("edge");
        let record = g.edge_by_uid("ab").expect("edge").clone();
        let view = g.edge_view(&record);
        assert_eq!((view.source.as_str(), view.target.as_str()), ("a", "b"));
    }

    #[test]
    fn summary_reports_live_counts() {
        let mut g = GraphState::new("g", "L", Attrs::new());
        let a = node(&mut g, "a");
        let b = node(&mut g, "b");
        edge(&mut g, "ab", a, b).expect("edge");
        let s = g.summary();
        assert_eq!((s.nodes, s.edges), (2, 1));
        assert_eq!(s.graph_type, WEIGHTED_DIRECTED);
    }
}
