//! RSS ingestion engine.
//!
//! Polls a configured set of news feeds, filters entries by keyword policy,
//! skips anything already imported, and stores the survivors as draft posts
//! awaiting editorial review.
//!
//! - [`feed`] - feed registry, fetching, parsing and keyword filtering
//! - [`ingest`] - deduplication and the import pipeline
//! - [`scheduler`] - recurring timer and single-flight run coordination
//! - [`storage`] - SQLite-backed draft post store
//! - [`config`] - TOML configuration

pub mod config;
pub mod feed;
pub mod ingest;
pub mod scheduler;
pub mod storage;
pub mod util;
