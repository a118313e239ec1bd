//! API Request/Response Types
//!
//! JSON bodies and query strings for the `/v1` REST API.

use orbgraph_core::primitives::DEFAULT_PAGE_LIMIT;
use orbgraph_core::{
    Edge, EdgeFilter, ErrorCode, Graph, GraphFilter, Node, NodeFilter, Page, StoreError,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH CHECK
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// LIST RESPONSES
// =============================================================================

/// One page of graphs; `n` counts every match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphsResponse {
    pub graphs: Vec<Graph>,
    pub n: usize,
}

impl From<Page<Graph>> for GraphsResponse {
    fn from(page: Page<Graph>) -> Self {
        Self {
            graphs: page.items,
            n: page.total,
        }
    }
}

/// One page of nodes; `n` counts every match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesResponse {
    pub nodes: Vec<Node>,
    pub n: usize,
}

impl From<Page<Node>> for NodesResponse {
    fn from(page: Page<Node>) -> Self {
        Self {
            nodes: page.items,
            n: page.total,
        }
    }
}

/// One page of edges; `n` counts every match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgesResponse {
    pub edges: Vec<Edge>,
    pub n: usize,
}

impl From<Page<Edge>> for EdgesResponse {
    fn from(page: Page<Edge>) -> Self {
        Self {
            edges: page.items,
            n: page.total,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: code.as_str().to_string(),
        }
    }
}

impl From<&StoreError> for ErrorResponse {
    fn from(e: &StoreError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

// =============================================================================
// QUERY STRINGS
// =============================================================================

/// Read an `offset`/`limit` value, ignoring anything that is not an integer.
fn lenient(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Resolve paging parameters: a positive offset applies, and the limit
/// falls back to [`DEFAULT_PAGE_LIMIT`] unless positive.
pub fn paging(offset: Option<&str>, limit: Option<&str>) -> (i64, i64) {
    let offset = lenient(offset).max(0);
    let limit = match lenient(limit) {
        l if l > 0 => l,
        _ => DEFAULT_PAGE_LIMIT,
    };
    (offset, limit)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `GET /v1/graphs` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphsQuery {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub graph_type: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl GraphsQuery {
    pub fn into_filter(self) -> GraphFilter {
        let (offset, limit) = paging(self.offset.as_deref(), self.limit.as_deref());
        GraphFilter {
            label: non_empty(self.label),
            graph_type: non_empty(self.graph_type),
            offset,
            limit,
            ..GraphFilter::default()
        }
    }
}

/// `GET /v1/graphs/{guid}/nodes` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodesQuery {
    pub label: Option<String>,
    /// Nodes with an edge into this node UID.
    pub to: Option<String>,
    /// Nodes with an edge from this node UID.
    pub from: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl NodesQuery {
    pub fn into_filter(self) -> NodeFilter {
        let (offset, limit) = paging(self.offset.as_deref(), self.limit.as_deref());
        NodeFilter {
            label: non_empty(self.label),
            to: non_empty(self.to),
            from: non_empty(self.from),
            offset,
            limit,
            ..NodeFilter::default()
        }
    }
}

/// `GET /v1/graphs/{guid}/edges` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgesQuery {
    pub source: Option<String>,
    pub target: Option<String>,
    pub label: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl EdgesQuery {
    pub fn into_filter(self) -> EdgeFilter {
        let (offset, limit) = paging(self.offset.as_deref(), self.limit.as_deref());
        EdgeFilter {
            source: non_empty(self.source),
            target: non_empty(self.target),
            label: non_empty(self.label),
            offset,
            limit,
        }
    }
}

/// The `?source=&target=` pair naming one edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairQuery {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}
