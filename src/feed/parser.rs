use chrono::{DateTime, Utc};
use feed_rs::model::Link;
use feed_rs::parser;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The document could not be interpreted as RSS, Atom or JSON Feed.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(#[from] parser::ParseFeedError);

/// One entry of a fetched feed, before filtering and deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Dedup key within the feed: the feed-provided id, else the entry link.
    pub external_id: String,
    pub title: String,
    pub link: Option<String>,
    /// Summary HTML as published; empty when the feed has none.
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_feed_name: String,
}

/// Parses a feed document into entries ordered most-recent-first.
///
/// Missing optional fields are defaulted rather than failing the document:
/// no title becomes "Untitled", no summary becomes empty (falling back to
/// the content body first), no date stays `None`. Undated entries sort after
/// dated ones and keep their document order.
///
/// Summary and content HTML is cleaned by feed-rs (ammonia) before it is
/// returned, so scripts and event-handler attributes never leave the parser.
pub fn parse_feed(bytes: &[u8], feed_name: &str) -> Result<Vec<RawEntry>, ParseError> {
    let feed = parser::Builder::new()
        .sanitize_content(true)
        .id_generator(|links, _title, _uri| link_id(links))
        .build()
        .parse(bytes)?;

    let mut entries: Vec<RawEntry> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let published_at = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let external_id =
                external_id(Some(entry.id.as_str()), link.as_deref(), &title, published_at);

            RawEntry {
                external_id,
                title,
                link,
                summary,
                published_at,
                source_feed_name: feed_name.to_string(),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    Ok(entries)
}

/// Id for entries whose feed supplies none: the entry link, else empty so
/// [`external_id`] falls back to a content hash.
fn link_id(links: &[Link]) -> String {
    links
        .iter()
        .map(|l| l.href.trim())
        .find(|href| !href.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn external_id(
    existing: Option<&str>,
    link: Option<&str>,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(id) = existing.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    if let Some(link) = link {
        return link.to_string();
    }

    let input = format!(
        "{}|{}",
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Local</title>
    <item>
        <guid>older</guid>
        <title>Older story</title>
        <link>https://news.example.com/older</link>
        <description>Older summary</description>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
        <guid> newer </guid>
        <title>Newer story</title>
        <link>https://news.example.com/newer</link>
        <description>&lt;p&gt;Newer summary&lt;/p&gt;</description>
        <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
        <guid>undated</guid>
        <link>https://news.example.com/undated</link>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_orders_newest_first() {
        let entries = parse_feed(RSS.as_bytes(), "Local").unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(ids, ["newer", "older", "undated"]);
        assert!(entries.iter().all(|e| e.source_feed_name == "Local"));
    }

    #[test]
    fn test_parse_fills_fields() {
        let entries = parse_feed(RSS.as_bytes(), "Local").unwrap();
        let newer = &entries[0];
        assert_eq!(newer.title, "Newer story");
        assert_eq!(newer.link.as_deref(), Some("https://news.example.com/newer"));
        assert_eq!(newer.summary, "<p>Newer summary</p>");
        assert!(newer.published_at.is_some());
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let entries = parse_feed(RSS.as_bytes(), "Local").unwrap();
        let undated = &entries[2];
        assert_eq!(undated.title, "Untitled");
        assert_eq!(undated.summary, "");
        assert_eq!(undated.published_at, None);
    }

    #[test]
    fn test_parse_atom() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Atom</title>
    <id>urn:feed</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <entry>
        <id>urn:entry:1</id>
        <title>Atom entry</title>
        <link href="https://atom.example.com/1"/>
        <updated>2024-01-02T00:00:00Z</updated>
        <content type="html">Body text</content>
    </entry>
</feed>"#;
        let entries = parse_feed(atom.as_bytes(), "Atom").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].external_id, "urn:entry:1");
        assert_eq!(entries[0].summary, "Body text");
    }

    #[test]
    fn test_parse_malformed_document() {
        assert!(parse_feed(b"<not valid xml", "Broken").is_err());
        assert!(parse_feed(b"<html><body>hello</body></html>", "Broken").is_err());
    }

    #[test]
    fn test_parse_empty_channel() {
        let empty = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        assert!(parse_feed(empty.as_bytes(), "Empty").unwrap().is_empty());
    }

    fn single_item(item: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Local</title>{item}</channel></rss>"#
        )
    }

    #[test]
    fn test_guidless_item_keyed_by_link() {
        let before = single_item(
            "<item><title>Council delays vote</title>\
             <link>https://news.example.com/story</link></item>",
        );
        let after = single_item(
            "<item><title>Council delays budget vote</title>\
             <link>https://news.example.com/story</link></item>",
        );

        let before = parse_feed(before.as_bytes(), "Local").unwrap();
        let after = parse_feed(after.as_bytes(), "Local").unwrap();
        assert_eq!(before[0].external_id, "https://news.example.com/story");
        assert_eq!(after[0].external_id, before[0].external_id);
    }

    #[test]
    fn test_guid_preferred_over_link() {
        let doc = single_item(
            "<item><guid> guid-1 </guid><title>T</title>\
             <link>https://news.example.com/story</link></item>",
        );
        let entries = parse_feed(doc.as_bytes(), "Local").unwrap();
        assert_eq!(entries[0].external_id, "guid-1");
    }

    #[test]
    fn test_item_without_guid_or_link_gets_content_hash() {
        let doc = single_item("<item><title>Bulletin</title></item>");
        let first = parse_feed(doc.as_bytes(), "Local").unwrap();
        let second = parse_feed(doc.as_bytes(), "Local").unwrap();
        assert_eq!(first[0].external_id.len(), 64);
        assert_eq!(first[0].external_id, second[0].external_id);
    }

    #[test]
    fn test_summary_markup_is_sanitized() {
        let doc = single_item(
            r#"<item><guid>x</guid><title>T</title><description><![CDATA[<p onclick="steal()">Hi</p><script>alert(1)</script><a href="javascript:alert(2)">x</a>]]></description></item>"#,
        );
        let entries = parse_feed(doc.as_bytes(), "Local").unwrap();
        let summary = &entries[0].summary;
        assert!(summary.contains("Hi"), "got {summary}");
        assert!(!summary.contains("<script"), "got {summary}");
        assert!(!summary.contains("onclick"), "got {summary}");
        assert!(!summary.contains("javascript:"), "got {summary}");
    }

    #[test]
    fn test_external_id_hash_is_stable() {
        let a = external_id(None, None, "Title", None);
        let b = external_id(None, None, "Title", None);
        let c = external_id(None, None, "Other", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
