use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::util::UrlValidationError;

/// Caller errors for single-feed and ad-hoc imports.
///
/// Failures while fetching or storing a feed's entries never show up here;
/// they are recorded in [`FeedImportResult::errors`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unknown feed '{0}'")]
    UnknownFeed(String),

    #[error("feed name must not be empty")]
    EmptyFeedName,

    #[error("max_items must be greater than 0")]
    ZeroMaxItems,

    #[error("invalid feed url: {0}")]
    InvalidUrl(#[from] UrlValidationError),
}

/// Outcome of importing one feed.
///
/// `success` is false only when the feed itself could not be fetched or
/// parsed. Individual entries that fail to store are listed in `errors`
/// while the feed still counts as successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedImportResult {
    pub feed_name: String,
    pub success: bool,
    /// Draft posts created during this run.
    pub imported: usize,
    /// Entries filtered out or already imported.
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl FeedImportResult {
    pub(crate) fn new(feed_name: &str) -> Self {
        Self {
            feed_name: feed_name.to_string(),
            success: true,
            imported: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn failed(feed_name: &str, error: impl Into<String>) -> Self {
        Self {
            feed_name: feed_name.to_string(),
            success: false,
            imported: 0,
            skipped: 0,
            errors: vec![error.into()],
        }
    }
}

/// Roll-up of one batch across every enabled feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// The batch ran to completion. Degraded feeds are reported per feed.
    pub success: bool,
    pub total_feeds: usize,
    pub successful_feeds: usize,
    pub total_imported: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-feed results in registry order.
    pub results: Vec<FeedImportResult>,
}

impl BatchSummary {
    pub(crate) fn from_results(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: Vec<FeedImportResult>,
    ) -> Self {
        Self {
            success: true,
            total_feeds: results.len(),
            successful_feeds: results.iter().filter(|r| r.success).count(),
            total_imported: results.iter().map(|r| r.imported).sum(),
            started_at,
            finished_at,
            results,
        }
    }

    pub fn failed_feeds(&self) -> impl Iterator<Item = &FeedImportResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
