//! # orbgraph HTTP API Module
//!
//! The REST API over a [`Backend`], served with axum.
//!
//! ## Endpoints
//!
//! All resource routes live under `/v1`:
//!
//! - `GET|POST /graphs`, `GET|PATCH|DELETE /graphs/{guid}`
//! - `GET|POST /graphs/{guid}/nodes`, `GET|PATCH|DELETE /graphs/{guid}/nodes/{id}`
//! - `GET|DELETE /graphs/{guid}/nodes/uid/{uid}`
//! - `GET|POST /graphs/{guid}/edges`, `GET|DELETE /graphs/{guid}/edges/{uid}`
//! - `PATCH|DELETE /graphs/{guid}/edges?source=&target=`
//! - `GET /health` (also served at the root)
//!
//! ## Configuration (Environment Variables)
//!
//! - `ORBGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all
//!   (default: localhost only)

mod handlers;
mod types;

pub use handlers::{ApiError, status_for};
pub use types::{
    EdgesQuery, EdgesResponse, ErrorResponse, GraphsQuery, GraphsResponse, HealthResponse,
    NodesQuery, NodesResponse, PairQuery, paging,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use orbgraph_core::{Backend, Services, Store, StoreError};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the services over one store.
#[derive(Clone)]
pub struct AppState {
    pub services: Services<Backend>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<Backend>) -> Self {
        Self {
            services: Services::new(store),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from environment configuration.
///
/// Reads `ORBGRAPH_CORS_ORIGINS`:
/// - If "*": allows all origins
/// - If not set: localhost only
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("ORBGRAPH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (ORBGRAPH_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) if !trimmed.is_empty() => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Ok(_) => None,
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in ORBGRAPH_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No ORBGRAPH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/graphs",
            get(handlers::list_graphs_handler).post(handlers::create_graph_handler),
        )
        .route(
            "/graphs/{guid}",
            get(handlers::get_graph_handler)
                .patch(handlers::update_graph_handler)
                .delete(handlers::delete_graph_handler),
        )
        .route(
            "/graphs/{guid}/nodes",
            get(handlers::list_nodes_handler).post(handlers::create_node_handler),
        )
        .route(
            "/graphs/{guid}/nodes/{id}",
            get(handlers::get_node_handler)
                .patch(handlers::update_node_handler)
                .delete(handlers::delete_node_handler),
        )
        .route(
            "/graphs/{guid}/nodes/uid/{uid}",
            get(handlers::get_node_by_uid_handler).delete(handlers::delete_node_by_uid_handler),
        )
        .route(
            "/graphs/{guid}/edges",
            get(handlers::list_edges_handler)
                .post(handlers::create_edge_handler)
                .patch(handlers::update_edge_between_handler)
                .delete(handlers::delete_edge_between_handler),
        )
        .route(
            "/graphs/{guid}/edges/{uid}",
            get(handlers::get_edge_handler).delete(handlers::delete_edge_handler),
        )
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .nest("/v1", v1_routes())
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Serve the API on `addr` until ctrl-c, then close the store.
pub async fn run_server(addr: &str, store: Arc<Backend>) -> Result<(), StoreError> {
    let router = create_router(AppState::new(Arc::clone(&store)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(engine = store.engine(), "orbgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close()
}
