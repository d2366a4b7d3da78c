use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed post store.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database on a single
    /// connection, which is what the tests use.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock, `DatabaseError::Migration` if the schema cannot be
    /// created, and `DatabaseError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: wait up to 5 seconds for the write lock before
        // returning SQLITE_BUSY, so a CLI command and a running batch can
        // write concurrently.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);

        // Every in-memory connection is a separate database, so keep exactly
        // one alive for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;

        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Run migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Editor-written posts leave the source columns NULL; imported posts
        // are unique per (source_feed_name, external_id).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                excerpt TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft'
                    CHECK (status IN ('draft', 'published')),
                source_feed_name TEXT,
                external_id TEXT,
                source_url TEXT,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE(source_feed_name, external_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_source ON posts(source_feed_name)")
            .execute(&mut *tx)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status, created_at DESC)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_runs_migrations() {
        let db = Database::open(":memory:").await.unwrap();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'posts'",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_directory_is_not_reported_as_locked() {
        let path = std::env::temp_dir()
            .join("newsroom_schema_test_missing")
            .join("no_such_dir")
            .join("posts.db");
        std::fs::remove_dir_all(std::env::temp_dir().join("newsroom_schema_test_missing")).ok();

        match Database::open(path.to_str().unwrap()).await {
            Ok(_) => panic!("opening a file in a missing directory should fail"),
            Err(DatabaseError::InstanceLocked) => {
                panic!("a missing directory was reported as a locked database")
            }
            Err(DatabaseError::Other(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_open_file_database_reopens() {
        let dir = std::env::temp_dir().join("newsroom_schema_test_reopen");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("posts.db");
        let path_str = path.to_str().unwrap();
        std::fs::remove_file(&path).ok();

        {
            let db = Database::open(path_str).await.unwrap();
            db.pool.close().await;
        }
        let db = Database::open(path_str).await.unwrap();
        db.pool.close().await;

        std::fs::remove_dir_all(&dir).ok();
    }
}
