use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

/// Strip tags and decode entities from an HTML fragment, collapsing whitespace.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max_chars`, cutting back to the last space and appending `...`.
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    let cut = match truncated.rfind(' ') {
        Some(idx) if idx > 0 => &truncated[..idx],
        _ => truncated.as_str(),
    };
    format!("{cut}...")
}

/// Hard cut at `max_chars` without word awareness.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn xml_start() -> &'static Regex {
    static XML_START: OnceLock<Regex> = OnceLock::new();
    XML_START.get_or_init(|| Regex::new(r"(?i)<\?xml|<rss|<feed").expect("static regex"))
}

/// Drop a BOM and any bytes some servers emit before the XML prolog.
pub fn clean_xml(raw: &str) -> &str {
    let content = raw.trim_start_matches('\u{feff}').trim();
    match xml_start().find(content) {
        Some(m) if m.start() > 0 => &content[m.start()..],
        _ => content,
    }
}
