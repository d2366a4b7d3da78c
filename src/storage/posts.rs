use async_trait::async_trait;
use std::collections::BTreeMap;

use super::schema::Database;
use super::types::{ArticleId, DatabaseError, NewDraft, Post, PostStatus};
use super::ArticleStore;

/// Maximum number of posts returned from any single listing query.
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Mutations
    // ========================================================================

    /// Insert a draft post, returning its id.
    ///
    /// The `(source_feed_name, external_id)` unique constraint turns a racing
    /// second insert into [`DatabaseError::Duplicate`] instead of a second row.
    pub async fn insert_draft(&self, draft: &NewDraft) -> Result<ArticleId, DatabaseError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO posts (title, body, excerpt, category, status,
                               source_feed_name, external_id, source_url,
                               published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&draft.title)
        .bind(&draft.body)
        .bind(&draft.excerpt)
        .bind(&draft.category)
        .bind(PostStatus::Draft.as_str())
        .bind(&draft.source_feed_name)
        .bind(&draft.external_id)
        .bind(&draft.source_url)
        .bind(draft.published_at.map(|dt| dt.timestamp()))
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(DatabaseError::Duplicate {
                    feed: draft.source_feed_name.clone(),
                    external_id: draft.external_id.clone(),
                })
            }
            Err(e) => Err(DatabaseError::from_sqlx(e)),
        }
    }

    /// Delete every post imported from `feed_name`, returning how many were removed.
    pub async fn delete_posts_for_feed(&self, feed_name: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM posts WHERE source_feed_name = ?")
            .bind(feed_name)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Post Queries
    // ========================================================================

    pub async fn post_exists(
        &self,
        feed_name: &str,
        external_id: &str,
    ) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM posts WHERE source_feed_name = ? AND external_id = ? LIMIT 1",
        )
        .bind(feed_name)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(row.is_some())
    }

    /// Number of imported posts per source feed. Feeds with no posts are absent.
    pub async fn count_posts_by_feed(&self) -> Result<BTreeMap<String, u64>, DatabaseError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT source_feed_name, COUNT(*)
            FROM posts
            WHERE source_feed_name IS NOT NULL
            GROUP BY source_feed_name
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(name, count)| (name, count.max(0) as u64))
            .collect())
    }

    /// Posts imported from `feed_name`, newest first by publication date.
    pub async fn get_posts_for_feed(&self, feed_name: &str) -> Result<Vec<Post>, DatabaseError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, body, excerpt, category, status, source_feed_name,
                   external_id, source_url, published_at, created_at
            FROM posts
            WHERE source_feed_name = ?
            ORDER BY published_at DESC, id ASC
            LIMIT ?
        "#,
        )
        .bind(feed_name)
        .bind(MAX_POSTS)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl ArticleStore for Database {
    async fn create_draft_article(&self, draft: &NewDraft) -> Result<ArticleId, DatabaseError> {
        self.insert_draft(draft).await
    }

    async fn exists_by_source(
        &self,
        feed_name: &str,
        external_id: &str,
    ) -> Result<bool, DatabaseError> {
        self.post_exists(feed_name, external_id).await
    }

    async fn count_by_source(&self) -> Result<BTreeMap<String, u64>, DatabaseError> {
        self.count_posts_by_feed().await
    }

    async fn delete_by_source(&self, feed_name: &str) -> Result<u64, DatabaseError> {
        self.delete_posts_for_feed(feed_name).await
    }
}
