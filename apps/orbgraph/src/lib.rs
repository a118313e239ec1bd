//! # orbgraph
//!
//! The REST API and CLI built on `orbgraph-core`.

pub mod api;
pub mod cli;
