//! Sqlrev core library.
//!
//! This crate exposes programmatic APIs for SQL static analysis, content
//! segmentation, remote workflow review, and multi-source report
//! aggregation. The HTTP layer on top of it is plain glue around the
//! functions in `review`.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `position`: Offset-to-line/column mapping and snippet extraction.
//! - `mask`: Comment/string masking that keeps offsets aligned.
//! - `rules`: The SQL rule engine.
//! - `segmenter`: Newline-aligned, size-bounded content partitioning.
//! - `normalize`: Producer-key canonicalization and issue normalization.
//! - `aggregate`: Cross-source dedupe and the fallback cascade.
//! - `summary`: Per-source status/metric summary derivation.
//! - `report`: Combined `{summary, issues}` assembly.
//! - `remote`: Sequential per-segment remote workflow client.
//! - `review`: Request validation, path classification, orchestration.
//! - `output`: Human/JSON printers for analyze/review results.
//! - `models`: Data models shared across the pipeline.
//! - `error`: Error taxonomy.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod mask;
pub mod models;
pub mod normalize;
pub mod output;
pub mod position;
pub mod remote;
pub mod report;
pub mod review;
pub mod rules;
pub mod segmenter;
pub mod summary;
