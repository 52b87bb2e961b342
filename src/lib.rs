//! # graphee-rs
//!
//! Out-of-core graph processing: a blocked, on-disk sparse adjacency matrix
//! built from compressed edge-list files, and a budgeted power-iteration
//! PageRank computed over it.
//!
//! ## Key modules
//!
//! - [`config`]: immutable per-run configuration (vertex/slice/thread counts,
//!   RAM and sort-buffer limits).
//! - [`disk_matrix`]: builds and reads the blocked CSR tile files (Stage A
//!   shard-and-spill, Stage B per-block k-way merge).
//! - [`disk_vector`]: slice-backed dense vectors with swap and the matrix
//!   algebra PageRank needs (`column_sum`, `spmv_over`).
//! - [`pagerank`]: the power-iteration driver tying the two together.
//! - [`budget`]: the RAM accounting gate Stage B merges run under.
//! - [`codec`], [`common`]: on-disk payload framing and chunked compression.
//! - [`edge_source`]: background-thread gzip decompression for edge-list
//!   ingest.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use graphee_rs::budget::BudgetController;
//! use graphee_rs::config::GraphConfig;
//! use graphee_rs::pagerank::PageRank;
//!
//! let cfg = Arc::new(GraphConfig::new("web", 1_000_000, 8, 4, 4 << 30, 128 << 20).unwrap());
//! let budget = BudgetController::new(cfg.ram_limit_bytes);
//! let mut pr = PageRank::from_edge_list(cfg, "A", vec!["edges.gz".into()], budget, 0.85).unwrap();
//! let stats = pr.run(20).unwrap();
//! println!("sum={} variation={}", stats.sum_score, stats.variation);
//! ```

#![allow(clippy::too_many_arguments)]

pub mod budget;
pub mod codec;
pub mod common;
pub mod config;
pub mod csr;
pub mod dense_vector;
pub mod disk_matrix;
pub mod disk_vector;
pub mod edge_source;
pub mod error;
pub mod fsx;
pub mod pagerank;
pub mod progress;

pub use error::GraphError;
