//! # Domain Model
//!
//! Value types exchanged between callers and the storage engines:
//! - Entities (`Graph`, `Node`, `Edge`)
//! - Query descriptors (`GraphFilter`, `NodeFilter`, `EdgeFilter`)
//! - Partial updates (`GraphUpdate`, `NodeUpdate`, `EdgeUpdate`)
//! - Error taxonomy (`StoreError`, `ErrorCode`)
//!
//! Every value handed out by an engine is an owned copy. Mutating it never
//! reaches stored state.

pub mod attrs;

pub use attrs::{AttrValue, Attrs};

use crate::primitives::DEFAULT_WEIGHT;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH
// =============================================================================

/// A named, attributed container of nodes and edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    /// Globally unique identifier. Generated on creation when empty.
    #[serde(default)]
    pub uid: String,
    /// Graph type; only `weighted_directed` is accepted.
    #[serde(rename = "type", default)]
    pub graph_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "attributes", default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    /// Number of nodes, computed at read time.
    #[serde(default)]
    pub nodes: usize,
    /// Number of edges, computed at read time.
    #[serde(default)]
    pub edges: usize,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Graph {
    /// Create an empty graph description with a generated UID on insert.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    #[must_use]
    pub fn with_type(mut self, graph_type: impl Into<String>) -> Self {
        self.graph_type = graph_type.into();
        self
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A vertex of a graph.
///
/// `id` is assigned by the owning graph and is only unique within it;
/// `uid` is unique across the whole store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "attributes", default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    /// Outgoing edge count, computed at read time.
    #[serde(default)]
    pub deg_out: usize,
    /// Incoming edge count, computed at read time.
    #[serde(default)]
    pub deg_in: usize,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed, weighted link between two nodes of the same graph.
///
/// `source` and `target` hold node UIDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub uid: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "attributes", default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) const fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

impl Edge {
    /// Create an edge from `source` to `target` (node UIDs) with the default weight.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            uid: String::new(),
            source: source.into(),
            target: target.into(),
            weight: DEFAULT_WEIGHT,
            label: String::new(),
            attrs: Attrs::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

// =============================================================================
// FILTERS
// =============================================================================

/// Narrows `find_graphs`. Absent fields are unconstrained.
///
/// `offset <= 0` skips nothing and `limit <= 0` caps nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphFilter {
    pub uid: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub graph_type: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

/// Narrows `find_nodes`.
///
/// Precedence is strict: `id`, then `uid`, then `to`, then `from`.
/// Only the first one set is used; `label` always applies on top.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeFilter {
    pub id: Option<i64>,
    pub uid: Option<String>,
    pub label: Option<String>,
    /// UID of a node; matches nodes with an edge into it.
    pub to: Option<String>,
    /// UID of a node; matches nodes it has an edge into.
    pub from: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

/// Narrows `find_edges`. `source` and `target` are node UIDs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeFilter {
    pub source: Option<String>,
    pub target: Option<String>,
    pub label: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

// =============================================================================
// UPDATES
// =============================================================================

/// Fields to change on a graph. `None` leaves a field unchanged and
/// `attrs` is merged key by key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub label: Option<String>,
    #[serde(rename = "attributes")]
    pub attrs: Option<Attrs>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub label: Option<String>,
    #[serde(rename = "attributes")]
    pub attrs: Option<Attrs>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeUpdate {
    pub weight: Option<f64>,
    pub label: Option<String>,
    #[serde(rename = "attributes")]
    pub attrs: Option<Attrs>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Stable classification of every store failure.
///
/// Callers branch on the code, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    Conflict,
    Invalid,
    Internal,
    Unsupported,
}

impl ErrorCode {
    /// The wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "ENOTFOUND",
            Self::Conflict => "ECONFLICT",
            Self::Invalid => "EINVALID",
            Self::Internal => "EINTERNAL",
            Self::Unsupported => "EUNSUPPORTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the storage engines and services.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Internal(String),

    #[error("database is closed")]
    Closed,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// The stable code of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Invalid(_) => ErrorCode::Invalid,
            Self::Unsupported(_) => ErrorCode::Unsupported,
            Self::Internal(_) | Self::Closed | Self::Sqlite(_) | Self::Json(_) | Self::Io(_) => {
                ErrorCode::Internal
            }
        }
    }

    pub(crate) fn graph_not_found(uid: &str) -> Self {
        Self::NotFound(format!("graph {} not found", uid))
    }

    pub(crate) fn node_not_found(key: impl fmt::Display) -> Self {
        Self::NotFound(format!("node {} not found", key))
    }

    pub(crate) fn edge_not_found(key: impl fmt::Display) -> Self {
        Self::NotFound(format!("edge {} not found", key))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Current UTC time truncated to whole seconds, the precision both engines store.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Edge weights must be finite; NaN and infinities are `EINVALID`.
pub(crate) fn check_weight(weight: f64) -> Result<(), StoreError> {
    if weight.is_finite() {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!(
            "edge weight {} is not a finite number",
            weight
        )))
    }
}

/// Fresh random UID for entities created without one.
pub(crate) fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}
