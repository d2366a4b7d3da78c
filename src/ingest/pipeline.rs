use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::dedup;
use super::types::{BatchSummary, FeedImportResult, ImportError};
use crate::config::{Config, FeedConfig};
use crate::feed::{filter, FeedFetcher, FeedRegistry, RawEntry};
use crate::storage::{ArticleStore, DatabaseError, NewDraft};
use crate::util::{clean_title, escape_html, excerpt, validate_feed_url, EXCERPT_MAX_CHARS};

/// Knobs for ad-hoc imports.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Cap for [`ImportPipeline::import_from_url`] when the caller gives none.
    pub default_max_items: usize,
    /// Allow ad-hoc imports from loopback and private-network hosts.
    pub allow_private_hosts: bool,
    /// Category assigned to ad-hoc imports.
    pub default_category: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_max_items: 10,
            allow_private_hosts: false,
            default_category: "news".to_string(),
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_max_items: config.default_max_items,
            allow_private_hosts: config.allow_private_hosts,
            ..Self::default()
        }
    }
}

/// Fetch → filter → dedup → store, for one feed or the whole registry.
///
/// Cheap to share behind an `Arc`; holds no per-run state. Batches are
/// serialized by [`RunCoordinator`](crate::scheduler::RunCoordinator), not here.
pub struct ImportPipeline {
    registry: Arc<FeedRegistry>,
    store: Arc<dyn ArticleStore>,
    fetcher: FeedFetcher,
    options: PipelineOptions,
}

impl ImportPipeline {
    pub fn new(
        registry: Arc<FeedRegistry>,
        store: Arc<dyn ArticleStore>,
        fetcher: FeedFetcher,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            store,
            fetcher,
            options,
        }
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// All configured feeds, disabled ones included.
    pub fn list_feeds(&self) -> &[FeedConfig] {
        self.registry.list_feeds()
    }

    /// Imports every enabled feed in registry order.
    ///
    /// A feed that fails to fetch or parse is reported with `success: false`
    /// and the batch carries on with the next feed.
    pub async fn import_all(&self) -> BatchSummary {
        let started_at = Utc::now();
        let feeds: Vec<&FeedConfig> = self.registry.list_enabled_feeds().collect();
        tracing::info!(feeds = feeds.len(), "Starting import batch");

        let mut results = Vec::with_capacity(feeds.len());
        for feed in feeds {
            results.push(self.import_feed(feed).await);
        }

        let summary = BatchSummary::from_results(started_at, Utc::now(), results);
        tracing::info!(
            total_feeds = summary.total_feeds,
            successful_feeds = summary.successful_feeds,
            imported = summary.total_imported,
            "Import batch finished"
        );
        summary
    }

    /// Imports one feed. Never fails; problems are recorded in the result.
    pub async fn import_feed(&self, config: &FeedConfig) -> FeedImportResult {
        let entries = match self.fetcher.fetch(&config.name, &config.url).await {
            Ok(entries) => entries,
            Err(e) if e.is_parse() => {
                tracing::warn!(feed = %config.name, url = %config.url, error = %e, "Feed document is not a valid feed");
                return FeedImportResult::failed(&config.name, e.to_string());
            }
            Err(e) => {
                tracing::warn!(feed = %config.name, url = %config.url, error = %e, "Feed fetch failed");
                return FeedImportResult::failed(&config.name, e.to_string());
            }
        };

        let fetched = entries.len();
        let eligible = filter::apply(entries, config);
        let filtered_out = fetched - eligible.len();

        let (fresh, duplicates) = dedup::partition(self.store.as_ref(), eligible, &config.name).await;

        let mut result = FeedImportResult::new(&config.name);
        result.skipped = filtered_out + duplicates;

        for entry in fresh {
            let draft = build_draft(&entry, config);
            match self.store.create_draft_article(&draft).await {
                Ok(id) => {
                    tracing::debug!(feed = %config.name, id = id, title = %draft.title, "Imported draft");
                    result.imported += 1;
                }
                Err(DatabaseError::Duplicate { .. }) => {
                    // Another writer imported it after our dedup check
                    result.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        feed = %config.name,
                        external_id = %entry.external_id,
                        error = %e,
                        "Failed to store draft"
                    );
                    result
                        .errors
                        .push(format!("{}: {}", entry.external_id, e));
                }
            }
        }

        tracing::info!(
            feed = %config.name,
            fetched = fetched,
            imported = result.imported,
            skipped = result.skipped,
            errors = result.errors.len(),
            "Feed imported"
        );
        result
    }

    /// Imports the registered feed called `name`, enabled or not.
    pub async fn import_feed_by_name(&self, name: &str) -> Result<FeedImportResult, ImportError> {
        let config = self
            .registry
            .get(name)
            .ok_or_else(|| ImportError::UnknownFeed(name.to_string()))?;
        Ok(self.import_feed(config).await)
    }

    /// One-off import of an arbitrary feed URL under `feed_name`.
    ///
    /// No keyword filtering is applied. The cap is `max_items` when given,
    /// else the configured default.
    pub async fn import_from_url(
        &self,
        url: &str,
        feed_name: &str,
        max_items: Option<usize>,
    ) -> Result<FeedImportResult, ImportError> {
        let feed_name = feed_name.trim();
        if feed_name.is_empty() {
            return Err(ImportError::EmptyFeedName);
        }
        let max_items = max_items.unwrap_or(self.options.default_max_items);
        if max_items == 0 {
            return Err(ImportError::ZeroMaxItems);
        }
        let url = validate_feed_url(url, self.options.allow_private_hosts)?;

        let config = FeedConfig::new(feed_name, url.as_str())
            .with_max_items(max_items)
            .with_category(self.options.default_category.clone());
        tracing::info!(feed = %feed_name, url = %url, max_items = max_items, "Ad-hoc import");
        Ok(self.import_feed(&config).await)
    }

    /// Imported post counts per source feed.
    ///
    /// Every registered feed appears, with zero when nothing is stored;
    /// ad-hoc sources appear only when they have posts.
    pub async fn get_feed_post_counts(&self) -> Result<BTreeMap<String, u64>, DatabaseError> {
        let mut counts: BTreeMap<String, u64> = self
            .registry
            .list_feeds()
            .iter()
            .map(|f| (f.name.clone(), 0))
            .collect();
        counts.extend(self.store.count_by_source().await?);
        Ok(counts)
    }

    /// Deletes every post imported from `feed_name`, returning how many were removed.
    pub async fn clear_feed_posts(&self, feed_name: &str) -> Result<u64, DatabaseError> {
        let deleted = self.store.delete_by_source(feed_name).await?;
        tracing::info!(feed = %feed_name, deleted = deleted, "Cleared imported posts");
        Ok(deleted)
    }
}

/// Derives the stored draft from a feed entry.
///
/// `entry.summary` arrives sanitized from the parser. The source link is only
/// rendered for http(s) URLs.
fn build_draft(entry: &RawEntry, config: &FeedConfig) -> NewDraft {
    let source_url = entry
        .link
        .as_deref()
        .filter(|link| {
            url::Url::parse(link).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
        })
        .map(str::to_string);

    let mut body = entry.summary.trim().to_string();
    if let Some(link) = &source_url {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&format!(
            "<p>Originally published at <a href=\"{}\" rel=\"noopener\">{}</a></p>",
            escape_html(link),
            escape_html(&config.name)
        ));
    }

    NewDraft {
        source_feed_name: config.name.clone(),
        external_id: entry.external_id.clone(),
        title: clean_title(&entry.title),
        body,
        excerpt: excerpt(&entry.summary, EXCERPT_MAX_CHARS),
        category: config.category.clone(),
        source_url,
        published_at: entry.published_at,
    }
}
