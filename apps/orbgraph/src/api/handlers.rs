//! API Handlers
//!
//! HTTP request handlers for the `/v1` endpoints. Store calls are
//! synchronous, so each one runs on tokio's blocking pool.

use super::AppState;
use super::types::*;
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orbgraph_core::{
    Edge, EdgeUpdate, ErrorCode, Graph, GraphUpdate, Node, NodeUpdate, StoreError,
};

// =============================================================================
// ERRORS
// =============================================================================

/// A failed request: a status plus the `{error, code}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new(ErrorCode::Invalid, msg),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for a store error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Invalid | ErrorCode::Unsupported => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = status_for(e.code());
        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        Self {
            status,
            body: ErrorResponse::from(&e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(StoreError::Internal(format!("store task failed: {}", e)).into()),
    }
}

fn parse_node_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 0 => Ok(id),
        _ => Err(ApiError::invalid("invalid node ID")),
    }
}

fn require_pair(pair: PairQuery) -> ApiResult<(String, String)> {
    if pair.source.is_empty() {
        return Err(ApiError::invalid("empty source node"));
    }
    if pair.target.is_empty() {
        return Err(ApiError::invalid("empty target node"));
    }
    Ok((pair.source, pair.target))
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// GRAPHS
// =============================================================================

pub async fn list_graphs_handler(
    State(state): State<AppState>,
    query: Result<Query<GraphsQuery>, QueryRejection>,
) -> ApiResult<Json<GraphsResponse>> {
    let filter = query?.0.into_filter();
    let page = blocking(move || state.services.graphs.find_graphs(&filter)).await?;
    Ok(Json(page.into()))
}

pub async fn create_graph_handler(
    State(state): State<AppState>,
    body: Result<Json<Graph>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Graph>)> {
    let Json(mut graph) = body?;
    let graph = blocking(move || {
        state.services.graphs.create_graph(&mut graph)?;
        Ok(graph)
    })
    .await?;
    tracing::info!(graph = %graph.uid, "graph created");
    Ok((StatusCode::CREATED, Json(graph)))
}

pub async fn get_graph_handler(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<Graph>> {
    let graph = blocking(move || state.services.graphs.find_graph_by_uid(&uid)).await?;
    Ok(Json(graph))
}

pub async fn update_graph_handler(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    body: Result<Json<GraphUpdate>, JsonRejection>,
) -> ApiResult<Json<Graph>> {
    let Json(update) = body?;
    let graph = blocking(move || state.services.graphs.update_graph(&uid, &update)).await?;
    Ok(Json(graph))
}

pub async fn delete_graph_handler(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(move || state.services.graphs.delete_graph(&uid)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// NODES
// =============================================================================

pub async fn list_nodes_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    query: Result<Query<NodesQuery>, QueryRejection>,
) -> ApiResult<Json<NodesResponse>> {
    let filter = query?.0.into_filter();
    let page = blocking(move || state.services.nodes.find_nodes(&guid, &filter)).await?;
    Ok(Json(page.into()))
}

pub async fn create_node_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    body: Result<Json<Node>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let Json(mut node) = body?;
    let node = blocking(move || {
        state.services.nodes.create_node(&guid, &mut node)?;
        Ok(node)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn get_node_handler(
    State(state): State<AppState>,
    Path((guid, id)): Path<(String, String)>,
) -> ApiResult<Json<Node>> {
    let id = parse_node_id(&id)?;
    let node = blocking(move || state.services.nodes.find_node_by_id(&guid, id)).await?;
    Ok(Json(node))
}

pub async fn get_node_by_uid_handler(
    State(state): State<AppState>,
    Path((guid, uid)): Path<(String, String)>,
) -> ApiResult<Json<Node>> {
    let node = blocking(move || state.services.nodes.find_node_by_uid(&guid, &uid)).await?;
    Ok(Json(node))
}

pub async fn update_node_handler(
    State(state): State<AppState>,
    Path((guid, id)): Path<(String, String)>,
    body: Result<Json<NodeUpdate>, JsonRejection>,
) -> ApiResult<Json<Node>> {
    let id = parse_node_id(&id)?;
    let Json(update) = body?;
    let node = blocking(move || state.services.nodes.update_node(&guid, id, &update)).await?;
    Ok(Json(node))
}

pub async fn delete_node_handler(
    State(state): State<AppState>,
    Path((guid, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let id = parse_node_id(&id)?;
    blocking(move || state.services.nodes.delete_node_by_id(&guid, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_node_by_uid_handler(
    State(state): State<AppState>,
    Path((guid, uid)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    blocking(move || state.services.nodes.delete_node_by_uid(&guid, &uid)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EDGES
// =============================================================================

pub async fn list_edges_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    query: Result<Query<EdgesQuery>, QueryRejection>,
) -> ApiResult<Json<EdgesResponse>> {
    let filter = query?.0.into_filter();
    let page = blocking(move || state.services.edges.find_edges(&guid, &filter)).await?;
    Ok(Json(page.into()))
}

/// Create an edge. Repeating an existing (source, target) pair returns the
/// stored edge unchanged.
pub async fn create_edge_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    body: Result<Json<Edge>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Edge>)> {
    let Json(mut edge) = body?;
    let edge = blocking(move || {
        state.services.edges.create_edge(&guid, &mut edge)?;
        Ok(edge)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn get_edge_handler(
    State(state): State<AppState>,
    Path((guid, uid)): Path<(String, String)>,
) -> ApiResult<Json<Edge>> {
    let edge = blocking(move || state.services.edges.find_edge_by_uid(&guid, &uid)).await?;
    Ok(Json(edge))
}

pub async fn update_edge_between_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    query: Result<Query<PairQuery>, QueryRejection>,
    body: Result<Json<EdgeUpdate>, JsonRejection>,
) -> ApiResult<Json<Edge>> {
    let (source, target) = require_pair(query?.0)?;
    let Json(update) = body?;
    let edge = blocking(move || {
        state
            .services
            .edges
            .update_edge_between(&guid, &source, &target, &update)
    })
    .await?;
    Ok(Json(edge))
}

pub async fn delete_edge_handler(
    State(state): State<AppState>,
    Path((guid, uid)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    blocking(move || state.services.edges.delete_edge(&guid, &uid)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_edge_between_handler(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    query: Result<Query<PairQuery>, QueryRejection>,
) -> ApiResult<StatusCode> {
    let (source, target) = require_pair(query?.0)?;
    blocking(move || {
        state
            .services
            .edges
            .delete_edge_between(&guid, &source, &target)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
