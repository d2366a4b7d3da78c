use scraper::{Html, Node};
use std::borrow::Cow;

/// Ellipsis appended to truncated excerpts.
const ELLIPSIS: &str = "...";

/// Strips ASCII control characters, keeping tab, newline and carriage return.
///
/// Returns `Cow::Borrowed` when the input is already clean (the common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |c: char| c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r');

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_control(c)).collect())
}

/// Collapses every whitespace run to a single space and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans a feed-supplied title for storage as a post title.
pub fn clean_title(s: &str) -> String {
    collapse_whitespace(&strip_control_chars(s))
}

/// Extracts the visible text of an HTML fragment.
///
/// Parsing is done by `scraper` (html5ever), which also decodes every HTML
/// entity. Contents of `<script>` and `<style>` elements are dropped. Block
/// level tags become whitespace so adjacent paragraphs do not run together.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    matches!(ancestor.value(), Node::Element(el) if matches!(el.name(), "script" | "style"))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if is_block(el.name()) => out.push(' '),
            _ => {}
        }
    }

    collapse_whitespace(&out)
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "br" | "div" | "li" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            | "blockquote" | "tr" | "td"
    )
}

/// Escapes text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Truncates `s` to at most `max_chars` characters, appending "..." when cut.
///
/// Cuts on a char boundary and prefers the last word break in the kept text.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_chars {
        return Cow::Borrowed(s);
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let byte_end = s.char_indices().nth(keep).map_or(s.len(), |(idx, _)| idx);
    let head = &s[..byte_end];
    let head = match head.rfind(' ') {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    Cow::Owned(format!("{}{}", head.trim_end(), ELLIPSIS))
}

/// Plain-text excerpt of an HTML summary.
pub fn excerpt(html: &str, max_chars: usize) -> String {
    truncate_chars(&strip_html(html), max_chars).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_control_chars_clean_input_borrows() {
        assert!(matches!(strip_control_chars("Plain title"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_control_chars_removes_controls() {
        assert_eq!(strip_control_chars("Bad\x00ti\x1btle\x7f"), "Badtitle");
        assert_eq!(strip_control_chars("keep\ttabs\nand lines"), "keep\ttabs\nand lines");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  Council\n  votes\x07 on budget "), "Council votes on budget");
    }

    #[test]
    fn test_strip_html_tags_and_entities() {
        assert_eq!(
            strip_html("<p>Rain &amp; snow</p><p>in &lt;ABQ&gt;&nbsp;today</p>"),
            "Rain & snow in <ABQ> today"
        );
        assert_eq!(strip_html("It&#39;s &#x41;OK"), "It's AOK");
    }

    #[test]
    fn test_strip_html_drops_script_and_style() {
        assert_eq!(
            strip_html("<style>p { color: red }</style>Hello<script>alert(1)</script> world"),
            "Hello world"
        );
    }

    #[test]
    fn test_strip_html_quoted_angle_bracket_in_attribute() {
        assert_eq!(strip_html(r#"<a title="x>y" href="/s">Story</a> text"#), "Story text");
    }

    #[test]
    fn test_strip_html_named_entities() {
        assert_eq!(strip_html("Caf&eacute; &copy; 2024 &amp; ABQ"), "Café © 2024 & ABQ");
    }

    #[test]
    fn test_escape_html() {
        assert!(matches!(escape_html("plain"), Cow::Borrowed("plain")));
        assert_eq!(
            escape_html(r#"https://x.example.com/?a=1&b="2""#),
            "https://x.example.com/?a=1&amp;b=&quot;2&quot;"
        );
    }

    #[test]
    fn test_truncate_chars_fits() {
        assert!(matches!(truncate_chars("short", 10), Cow::Borrowed("short")));
    }

    #[test]
    fn test_truncate_chars_on_word_break() {
        assert_eq!(truncate_chars("The quick brown fox jumps", 15), "The quick...");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let s = "日本語のテキストです";
        let t = truncate_chars(s, 6);
        assert_eq!(t, "日本語...");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(
            excerpt("<p>A <b>long</b> story about the city budget</p>", 20),
            "A long story..."
        );
    }
}
