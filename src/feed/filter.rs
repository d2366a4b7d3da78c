//! Keyword policy and per-feed cap.
//!
//! Exclusion wins over inclusion, and the cap is applied only after both
//! keyword checks, so a feed with `max_items = N` yields up to N entries
//! that actually qualify.

use crate::config::FeedConfig;
use crate::feed::parser::RawEntry;

/// Filters `entries` by `config`'s keyword lists, then truncates to `config.max_items`.
///
/// Order is preserved. Matching is a case-insensitive substring test against
/// the entry title and summary; blank keywords are ignored.
pub fn apply(entries: Vec<RawEntry>, config: &FeedConfig) -> Vec<RawEntry> {
    let include = normalize(&config.keywords);
    let exclude = normalize(&config.exclude_keywords);

    entries
        .into_iter()
        .filter(|entry| {
            let haystack = searchable_text(entry);
            if exclude.iter().any(|k| haystack.contains(k.as_str())) {
                tracing::debug!(
                    feed = %config.name,
                    external_id = %entry.external_id,
                    "Entry dropped by exclude keyword"
                );
                return false;
            }
            if !include.is_empty() && !include.iter().any(|k| haystack.contains(k.as_str())) {
                tracing::debug!(
                    feed = %config.name,
                    external_id = %entry.external_id,
                    "Entry matches no keyword"
                );
                return false;
            }
            true
        })
        .take(config.max_items)
        .collect()
}

fn normalize(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn searchable_text(entry: &RawEntry) -> String {
    let mut text = String::with_capacity(entry.title.len() + entry.summary.len() + 1);
    text.push_str(&entry.title);
    text.push('\n');
    text.push_str(&entry.summary);
    text.to_lowercase()
}
