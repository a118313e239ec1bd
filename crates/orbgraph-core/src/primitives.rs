//! # Store Primitives
//!
//! Fixed constants shared by both storage engines, the service layer and
//! the outer adapters (CLI, HTTP).

// =============================================================================
// DATASOURCE NAMES
// =============================================================================

/// DSN selecting the volatile in-memory engine.
pub const MEMORY_DSN: &str = ":memory:";

/// URL scheme selecting the SQLite engine (`sqlite://<path>`).
pub const SQLITE_SCHEME: &str = "sqlite";

/// Path component that keeps a SQLite database in memory.
pub const SQLITE_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// DOMAIN DEFAULTS
// =============================================================================

/// The only graph type the store supports.
///
/// An empty type on creation is normalized to this value; any other value
/// is rejected with `EUNSUPPORTED`.
pub const WEIGHTED_DIRECTED: &str = "weighted_directed";

/// Weight given to an edge created without an explicit weight.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// First ID handed out by a graph to its nodes.
///
/// IDs increase monotonically from here and are never reused within a
/// graph, even after deletions.
pub const FIRST_NODE_ID: i64 = 1;

/// Page size used by the HTTP layer when the caller gives no limit.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

// =============================================================================
// SQL ENGINE
// =============================================================================

/// Table that records which embedded migrations have been applied.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// How long a SQLite connection waits on a locked database, in milliseconds.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;
