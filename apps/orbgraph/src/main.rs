//! # orbgraph
//!
//! The binary for the orbgraph graph store.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for graph maintenance
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/orbgraph (THE BINARY)        │
//! │                                              │
//! │      ┌─────────────┐    ┌─────────────┐      │
//! │      │    CLI      │    │  HTTP API   │      │
//! │      │   (clap)    │    │   (axum)    │      │
//! │      └──────┬──────┘    └──────┬──────┘      │
//! │             └─────────┬────────┘             │
//! │                       ▼                      │
//! │               ┌───────────────┐              │
//! │               │ orbgraph-core │              │
//! │               │ (THE ENGINE)  │              │
//! │               └───────────────┘              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server on a SQLite file
//! orbgraph --dsn sqlite://graphs.db serve --host 0.0.0.0 --port 8080
//!
//! # Maintenance
//! orbgraph --dsn sqlite://graphs.db init
//! orbgraph --dsn sqlite://graphs.db dump --output snapshots/
//! orbgraph --dsn sqlite://other.db load --input snapshots/stars.json
//! ```

use clap::Parser;
use orbgraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // ORBGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ORBGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "orbgraph=debug,orbgraph_core=debug,tower_http=debug"
    } else {
        "orbgraph=info,orbgraph_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(code = %e.code(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
   ___  _ __| |__   __ _ _ __ __ _ _ __ | |__
  / _ \| '__| '_ \ / _` | '__/ _` | '_ \| '_ \
 | (_) | |  | |_) | (_| | | | (_| | |_) | | | |
  \___/|_|  |_.__/ \__, |_|  \__,_| .__/|_| |_|
                   |___/          |_|

  orbgraph v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
