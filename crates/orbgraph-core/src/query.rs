//! # Query Module
//!
//! Filter resolution and pagination shared by both engines.
//!
//! - [`NodeFilter::selection`] and [`EdgeFilter::selection`] fix the
//!   precedence between filter fields once, for every engine.
//! - [`paginate`] and [`limit_offset_clause`] implement the same
//!   offset/limit rules in memory and in SQL.
//! - `select_*` resolve filters against an in-memory [`GraphState`].

use crate::graph::{EdgeRecord, GraphState, NodeRecord};
use crate::primitives::WEIGHTED_DIRECTED;
use crate::{Edge, EdgeFilter, Graph, GraphFilter, Node, NodeFilter};
use serde::{Deserialize, Serialize};

// =============================================================================
// PAGE
// =============================================================================

/// One page of a multi-result read.
///
/// `total` is the number of matches before offset/limit were applied;
/// `items` holds the matches after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Apply offset/limit to a full match list.
///
/// - `offset <= 0` skips nothing; `offset >= len` yields an empty page
/// - `limit <= 0` caps nothing; `limit >= remaining` caps nothing
pub fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> Page<T> {
    let total = items.len();
    let skip = usize::try_from(offset).unwrap_or(0);
    let take = if limit > 0 {
        usize::try_from(limit).unwrap_or(usize::MAX)
    } else {
        usize::MAX
    };
    Page {
        items: items.into_iter().skip(skip).take(take).collect(),
        total,
    }
}

/// Render offset/limit as a SQLite fragment.
///
/// Each value is emitted only when it is positive. SQLite has no bare
/// `OFFSET`, so an offset without a limit uses `LIMIT -1`.
pub fn limit_offset_clause(limit: i64, offset: i64) -> String {
    match (limit > 0, offset > 0) {
        (true, true) => format!("LIMIT {} OFFSET {}", limit, offset),
        (true, false) => format!("LIMIT {}", limit),
        (false, true) => format!("LIMIT -1 OFFSET {}", offset),
        (false, false) => String::new(),
    }
}

fn label_matches(wanted: Option<&str>, label: &str) -> bool {
    wanted.is_none_or(|w| w == label)
}

// =============================================================================
// FILTER PRECEDENCE
// =============================================================================

/// Primary key of a node search, after precedence is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSelection<'a> {
    /// A single node by graph-local ID.
    Id(i64),
    /// A single node by UID.
    Uid(&'a str),
    /// Nodes with an edge into the node with this UID.
    Into(&'a str),
    /// Nodes the node with this UID has an edge into.
    OutOf(&'a str),
    All,
}

impl NodeFilter {
    /// Resolve which field drives the search: `id`, `uid`, `to`, `from`, in that order.
    pub fn selection(&self) -> NodeSelection<'_> {
        if let Some(id) = self.id {
            NodeSelection::Id(id)
        } else if let Some(uid) = self.uid.as_deref() {
            NodeSelection::Uid(uid)
        } else if let Some(to) = self.to.as_deref() {
            NodeSelection::Into(to)
        } else if let Some(from) = self.from.as_deref() {
            NodeSelection::OutOf(from)
        } else {
            NodeSelection::All
        }
    }
}

/// Primary key of an edge search. Endpoints are node UIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSelection<'a> {
    Between { source: &'a str, target: &'a str },
    OutOf(&'a str),
    Into(&'a str),
    All,
}

impl EdgeFilter {
    pub fn selection(&self) -> EdgeSelection<'_> {
        match (self.source.as_deref(), self.target.as_deref()) {
            (Some(source), Some(target)) => EdgeSelection::Between { source, target },
            (Some(source), None) => EdgeSelection::OutOf(source),
            (None, Some(target)) => EdgeSelection::Into(target),
            (None, None) => EdgeSelection::All,
        }
    }
}

impl GraphFilter {
    /// Whether the type constraint can match anything at all.
    ///
    /// Every stored graph is `weighted_directed`.
    pub fn type_matches(&self) -> bool {
        self.graph_type
            .as_deref()
            .is_none_or(|t| t == WEIGHTED_DIRECTED)
    }
}

// =============================================================================
// IN-MEMORY RESOLUTION
// =============================================================================

/// Resolve a graph filter over graphs in UID order.
pub fn select_graphs<'a, I>(graphs: I, filter: &GraphFilter) -> Page<Graph>
where
    I: IntoIterator<Item = &'a GraphState>,
{
    if !filter.type_matches() {
        return Page::empty();
    }
    let matches: Vec<Graph> = graphs
        .into_iter()
        .filter(|g| filter.uid.as_deref().is_none_or(|uid| uid == g.uid))
        .filter(|g| label_matches(filter.label.as_deref(), &g.label))
        .map(GraphState::summary)
        .collect();
    paginate(matches, filter.offset, filter.limit)
}

/// Resolve a node filter against one graph.
///
/// Adjacency filters naming an unknown node match nothing.
pub fn select_nodes(state: &GraphState, filter: &NodeFilter) -> Page<Node> {
    let label = filter.label.as_deref();
    let keep = |n: &&NodeRecord| label_matches(label, &n.label);

    let matches: Vec<Node> = match filter.selection() {
        NodeSelection::Id(id) => state
            .node(id)
            .into_iter()
            .filter(keep)
            .map(|n| state.node_view(n))
            .collect(),
        NodeSelection::Uid(uid) => state
            .node_id_by_uid(uid)
            .and_then(|id| state.node(id))
            .into_iter()
            .filter(keep)
            .map(|n| state.node_view(n))
            .collect(),
        NodeSelection::Into(uid) => match state.node_id_by_uid(uid) {
            Some(id) => state
                .predecessors(id)
                .filter(keep)
                .map(|n| state.node_view(n))
                .collect(),
            None => Vec::new(),
        },
        NodeSelection::OutOf(uid) => match state.node_id_by_uid(uid) {
            Some(id) => state
                .successors(id)
                .filter(keep)
                .map(|n| state.node_view(n))
                .collect(),
            None => Vec::new(),
        },
        NodeSelection::All => state
            .nodes()
            .filter(keep)
            .map(|n| state.node_view(n))
            .collect(),
    };
    paginate(matches, filter.offset, filter.limit)
}

/// Resolve an edge filter against one graph.
pub fn select_edges(state: &GraphState, filter: &EdgeFilter) -> Page<Edge> {
    let label = filter.label.as_deref();
    let keep = |e: &&EdgeRecord| label_matches(label, &e.label);

    let matches: Vec<Edge> = match filter.selection() {
        EdgeSelection::Between { source, target } => {
            match (state.node_id_by_uid(source), state.node_id_by_uid(target)) {
                (Some(from), Some(to)) => state
                    .edge(from, to)
                    .into_iter()
                    .filter(keep)
                    .map(|e| state.edge_view(e))
                    .collect(),
                _ => Vec::new(),
            }
        }
        EdgeSelection::OutOf(source) => match state.node_id_by_uid(source) {
            Some(from) => state
                .outgoing_edges(from)
                .filter(keep)
                .map(|e| state.edge_view(e))
                .collect(),
            None => Vec::new(),
        },
        EdgeSelection::Into(target) => match state.node_id_by_uid(target) {
            Some(to) => state
                .incoming_edges(to)
                .filter(keep)
                .map(|e| state.edge_view(e))
                .collect(),
            None => Vec::new(),
        },
        EdgeSelection::All => state
            .edges()
            .filter(keep)
            .map(|e| state.edge_view(e))
            .collect(),
    };
    paginate(matches, filter.offset, filter.limit)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attrs;

    fn sample() -> GraphState {
        let mut g = GraphState::new("g", "", Attrs::new());
        for (uid, label) in [("a", "Repo"), ("b", "User"), ("c", "Repo")] {
            let id = g.allocate_node_id();
            g.insert_node(NodeRecord {
                id,
                uid: uid.to_string(),
                label: label.to_string(),
                attrs: Attrs::new(),
                created_at: None,
                updated_at: None,
            })
            .expect("node");
        }
        let edges = [("ba", 2, 1, "star"), ("bc", 2, 3, "fork"), ("ac", 1, 3, "star")];
        for (uid, from, to, label) in edges {
            g.insert_edge(EdgeRecord {
                uid: uid.to_string(),
                from,
                to,
                weight: 1.0,
                label: label.to_string(),
                attrs: Attrs::new(),
                created_at: None,
                updated_at: None,
            })
            .expect("edge");
        }
        g
    }

    fn uids<T>(page: &Page<T>, f: impl Fn(&T) -> &str) -> Vec<String> {
        page.items.iter().map(|x| f(x).to_string()).collect()
    }

    #[test]
    fn paginate_reports_total_before_slicing() {
        let page = paginate((0..10).collect(), 3, 4);
        assert_eq!(page.items, vec![3, 4, 5, 6]);
        assert_eq!(page.total, 10);
    }

    #[test]
    fn paginate_offset_past_end_is_empty() {
        let page = paginate(vec![1, 2], 2, 0);
        assert!(page.is_empty());
        assert_eq!(page.total, 2);
    }

    #[test]
    fn paginate_non_positive_values_are_ignored() {
        let page = paginate(vec![1, 2, 3], -5, -1);
        assert_eq!(page.items, vec![1, 2, 3]);
    }

    #[test]
    fn limit_offset_clause_only_emits_positive_values() {
        assert_eq!(limit_offset_clause(10, 5), "LIMIT 10 OFFSET 5");
        assert_eq!(limit_offset_clause(10, 0), "LIMIT 10");
        assert_eq!(limit_offset_clause(0, 5), "LIMIT -1 OFFSET 5");
        assert_eq!(limit_offset_clause(-1, -1), "");
    }

    #[test]
    fn node_filter_precedence() {
        let f = NodeFilter {
            id: Some(1),
            uid: Some("x".into()),
            to: Some("y".into()),
            ..NodeFilter::default()
        };
        assert_eq!(f.selection(), NodeSelection::Id(1));

        let f = NodeFilter {
            to: Some("y".into()),
            from: Some("z".into()),
            ..NodeFilter::default()
        };
        assert_eq!(f.selection(), NodeSelection::Into("y"));
    }

    #[test]
    fn select_nodes_by_id_applies_label() {
        let g = sample();
        let by_id = |label: &str| NodeFilter {
            id: Some(1),
            label: Some(label.into()),
            ..Default::default()
        };
        let hit = select_nodes(&g, &by_id("Repo"));
        assert_eq!(hit.total, 1);
        let miss = select_nodes(&g, &by_id("User"));
        assert_eq!(miss.total, 0);
    }

    #[test]
    fn select_nodes_into_and_out_of() {
        let g = sample();
        let into_c = select_nodes(
            &g,
            &NodeFilter {
                to: Some("c".into()),
                ..Default::default()
            },
        );
        assert_eq!(uids(&into_c, |n| &n.uid), vec!["a", "b"]);

        let from_b = select_nodes(
            &g,
            &NodeFilter {
                from: Some("b".into()),
                label: Some("Repo".into()),
                ..Default::default()
            },
        );
        assert_eq!(uids(&from_b, |n| &n.uid), vec!["a", "c"]);

        let unknown = select_nodes(
            &g,
            &NodeFilter {
                to: Some("nope".into()),
                ..Default::default()
            },
        );
        assert_eq!(unknown.total, 0);
    }

    #[test]
    fn select_nodes_reports_degrees() {
        let g = sample();
        let page = select_nodes(
            &g,
            &NodeFilter {
                uid: Some("b".into()),
                ..Default::default()
            },
        );
        assert_eq!((page.items[0].deg_out, page.items[0].deg_in), (2, 0));
    }

    #[test]
    fn select_edges_by_direction_honours_label() {
        let g = sample();
        let filter = |source: Option<&str>, target: Option<&str>, label: Option<&str>| EdgeFilter {
            source: source.map(String::from),
            target: target.map(String::from),
            label: label.map(String::from),
            ..Default::default()
        };

        let out_b = select_edges(&g, &filter(Some("b"), None, Some("star")));
        assert_eq!(uids(&out_b, |e| &e.uid), vec!["ba"]);

        let into_c = select_edges(&g, &filter(None, Some("c"), None));
        assert_eq!(uids(&into_c, |e| &e.uid), vec!["ac", "bc"]);

        let between = select_edges(&g, &filter(Some("a"), Some("c"), Some("fork")));
        assert!(between.is_empty());
    }

    #[test]
    fn select_edges_all_in_source_then_target_order() {
        let g = sample();
        let all = select_edges(&g, &EdgeFilter::default());
        assert_eq!(uids(&all, |e| &e.uid), vec!["ac", "ba", "bc"]);
    }

    #[test]
    fn select_graphs_rejects_foreign_types() {
        let g = sample();
        let f = GraphFilter {
            graph_type: Some("undirected".into()),
            ..Default::default()
        };
        assert!(select_graphs([&g], &f).is_empty());
        let f = GraphFilter {
            uid: Some("g".into()),
            ..Default::default()
        };
        assert_eq!(select_graphs([&g], &f).total, 1);
    }
}
