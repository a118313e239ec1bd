//! # orbgraph CLI Module
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `graphs` - List graphs
//! - `dump` - Write graph snapshots to a directory
//! - `load` - Import a graph snapshot
//! - `init` - Create or migrate a SQLite database

mod commands;

use clap::{Parser, Subcommand};
use orbgraph_core::StoreError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// orbgraph - a store for directed, weighted graphs.
#[derive(Parser, Debug)]
#[command(name = "orbgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Datasource: ":memory:", a snapshot directory, or "sqlite://<path>"
    #[arg(
        short = 'D',
        long,
        global = true,
        env = "ORBGRAPH_DSN",
        default_value = ":memory:"
    )]
    pub dsn: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// List graphs
    Graphs {
        /// Only graphs with this label
        #[arg(short, long)]
        label: Option<String>,

        /// Number of graphs to skip
        #[arg(long, default_value = "0")]
        offset: i64,

        /// Maximum number of graphs to show (0 for all)
        #[arg(long, default_value = "0")]
        limit: i64,
    },

    /// Write graph snapshots as <output>/<uid>.json
    Dump {
        /// Graph UID (default: every graph)
        #[arg(short, long)]
        graph: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a graph snapshot file
    Load {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Create a SQLite database or apply pending migrations
    Init,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), StoreError> {
    let dsn = cli.dsn.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Serve { host, port }) => cmd_serve(dsn, &host, port).await,
        Some(Commands::Graphs {
            label,
            offset,
            limit,
        }) => cmd_graphs(dsn, json_mode, label, offset, limit),
        Some(Commands::Dump { graph, output }) => {
            cmd_dump(dsn, json_mode, graph.as_deref(), &output)
        }
        Some(Commands::Load { input }) => cmd_load(dsn, json_mode, &input),
        Some(Commands::Init) => cmd_init(dsn, json_mode),
        None => cmd_graphs(dsn, json_mode, None, 0, 0),
    }
}
