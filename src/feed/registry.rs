use crate::config::FeedConfig;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate feed name '{0}'")]
    DuplicateName(String),
}

/// Read-only list of configured feeds.
///
/// Order is preserved from configuration and is the order batches process
/// feeds in. Names are unique.
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: Vec<FeedConfig>,
}

impl FeedRegistry {
    pub fn new(feeds: Vec<FeedConfig>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for feed in &feeds {
            if !seen.insert(feed.name.as_str()) {
                return Err(RegistryError::DuplicateName(feed.name.clone()));
            }
        }
        Ok(Self { feeds })
    }

    /// All configured feeds, disabled ones included.
    pub fn list_feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    pub fn list_enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FeedRegistry {
        FeedRegistry::new(vec![
            FeedConfig::new("A", "https://a.example.com/rss"),
            FeedConfig::new("B", "https://b.example.com/rss").disabled(),
            FeedConfig::new("C", "https://c.example.com/rss"),
        ])
        .unwrap()
    }

    #[test]
    fn test_list_feeds_keeps_order_and_disabled() {
        let registry = registry();
        let names: Vec<_> = registry
            .list_feeds()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_list_enabled_feeds_skips_disabled() {
        let registry = registry();
        let names: Vec<_> = registry
            .list_enabled_feeds()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["A", "C"]);
    }

    #[test]
    fn test_get_by_name() {
        let registry = registry();
        assert_eq!(
            registry.get("B").map(|f| f.url.as_str()),
            Some("https://b.example.com/rss")
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = FeedRegistry::new(vec![
            FeedConfig::new("A", "https://a.example.com/rss"),
            FeedConfig::new("A", "https://a2.example.com/rss"),
        ]);
        assert!(matches!(result, Err(RegistryError::DuplicateName(name)) if name == "A"));
    }
}
