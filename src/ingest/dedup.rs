use std::collections::HashSet;

use crate::feed::RawEntry;
use crate::storage::ArticleStore;

/// Splits `entries` into those not yet imported for `feed_name` and a count
/// of the rest.
///
/// An entry is a duplicate when the store already holds its
/// `(feed_name, external_id)` or when an earlier entry in the same batch
/// carried the same id. If the existence check itself fails, the entry is
/// counted as a duplicate and left for the next run.
pub async fn partition(
    store: &dyn ArticleStore,
    entries: Vec<RawEntry>,
    feed_name: &str,
) -> (Vec<RawEntry>, usize) {
    let mut fresh = Vec::with_capacity(entries.len());
    let mut seen = HashSet::with_capacity(entries.len());
    let mut duplicates = 0;

    for entry in entries {
        if !seen.insert(entry.external_id.clone()) {
            duplicates += 1;
            continue;
        }

        match store.exists_by_source(feed_name, &entry.external_id).await {
            Ok(false) => fresh.push(entry),
            Ok(true) => {
                tracing::debug!(
                    feed = %feed_name,
                    external_id = %entry.external_id,
                    "Entry already imported"
                );
                duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(
                    feed = %feed_name,
                    external_id = %entry.external_id,
                    error = %e,
                    "Duplicate check failed, skipping entry"
                );
                duplicates += 1;
            }
        }
    }

    (fresh, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArticleId, DatabaseError, NewDraft};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    /// Store that knows a fixed set of ids and fails lookups for "broken".
    struct FixedStore {
        known: Vec<&'static str>,
    }

    #[async_trait]
    impl ArticleStore for FixedStore {
        async fn create_draft_article(&self, _: &NewDraft) -> Result<ArticleId, DatabaseError> {
            unreachable!("dedup never writes")
        }

        async fn exists_by_source(&self, _: &str, external_id: &str) -> Result<bool, DatabaseError> {
            if external_id == "broken" {
                return Err(DatabaseError::Other(sqlx::Error::PoolTimedOut));
            }
            Ok(self.known.contains(&external_id))
        }

        async fn count_by_source(&self) -> Result<BTreeMap<String, u64>, DatabaseError> {
            Ok(BTreeMap::new())
        }

        async fn delete_by_source(&self, _: &str) -> Result<u64, DatabaseError> {
            Ok(0)
        }
    }

    fn entry(id: &str) -> RawEntry {
        RawEntry {
            external_id: id.to_string(),
            title: format!("Story {id}"),
            link: None,
            summary: String::new(),
            published_at: None,
            source_feed_name: "A".to_string(),
        }
    }

    #[tokio::test]
    async fn test_partition_skips_known() {
        let store = FixedStore { known: vec!["2"] };
        let (fresh, dupes) = partition(&store, vec![entry("1"), entry("2"), entry("3")], "A").await;
        let ids: Vec<_> = fresh.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(dupes, 1);
    }

    #[tokio::test]
    async fn test_partition_skips_repeats_within_batch() {
        let store = FixedStore { known: vec![] };
        let (fresh, dupes) = partition(&store, vec![entry("1"), entry("1")], "A").await;
        assert_eq!(fresh.len(), 1);
        assert_eq!(dupes, 1);
    }

    #[tokio::test]
    async fn test_partition_failed_check_counts_as_duplicate() {
        let store = FixedStore { known: vec![] };
        let (fresh, dupes) = partition(&store, vec![entry("broken"), entry("ok")], "A").await;
        let ids: Vec<_> = fresh.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(ids, ["ok"]);
        assert_eq!(dupes, 1);
    }
}
