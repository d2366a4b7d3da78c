//! Draft post persistence.
//!
//! The ingestion engine talks to storage only through [`ArticleStore`];
//! [`Database`] is the SQLite implementation used by the binary and the
//! integration tests.

mod posts;
mod schema;
mod types;

use async_trait::async_trait;
use std::collections::BTreeMap;

pub use schema::Database;
pub use types::{ArticleId, DatabaseError, NewDraft, Post, PostStatus};

/// Persistence operations the ingestion engine needs from the post store.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Store `draft` with status draft.
    async fn create_draft_article(&self, draft: &NewDraft) -> Result<ArticleId, DatabaseError>;

    /// Whether a post with this source identity was imported before.
    async fn exists_by_source(
        &self,
        feed_name: &str,
        external_id: &str,
    ) -> Result<bool, DatabaseError>;

    /// Imported post counts keyed by source feed name.
    async fn count_by_source(&self) -> Result<BTreeMap<String, u64>, DatabaseError>;

    /// Delete all posts imported from `feed_name`, returning the number removed.
    async fn delete_by_source(&self, feed_name: &str) -> Result<u64, DatabaseError>;
}
