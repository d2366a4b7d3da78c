use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage failures surfaced by [`ArticleStore`](super::ArticleStore) implementations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Database is locked by another process")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A post with this `(source_feed_name, external_id)` already exists
    #[error("Post already imported: {feed}/{external_id}")]
    Duplicate { feed: String, external_id: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map a sqlx error, recognising SQLite lock conditions.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

pub type ArticleId = i64;

/// Publication state of a post. The ingestion engine only ever writes drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

/// A draft post derived from one feed entry, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDraft {
    pub source_feed_name: String,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub category: String,
    pub source_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Stored post row.
///
/// Posts written by editors carry no source; imported posts always do.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: ArticleId,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub category: String,
    pub status: String,
    pub source_feed_name: Option<String>,
    pub external_id: Option<String>,
    pub source_url: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

impl Post {
    pub fn status(&self) -> Option<PostStatus> {
        self.status.parse().ok()
    }
}
