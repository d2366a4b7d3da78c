//! Deduplication and the fetch → filter → dedup → store pipeline.

pub mod dedup;
mod pipeline;
mod types;

pub use pipeline::{ImportPipeline, PipelineOptions};
pub use types::{BatchSummary, FeedImportResult, ImportError};
