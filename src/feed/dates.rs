//! Date text exactly as the feed wrote it.
//!
//! feed-rs hands back parsed timestamps and drops the ones it cannot parse,
//! but articles keep the publisher's own string. This scrapes the date
//! elements of each `<item>`/`<entry>` block from the raw document, in
//! document order, so they can be paired with feed-rs entries by index.

use std::sync::OnceLock;

use regex::Regex;

static ITEM_BLOCK: OnceLock<Option<Regex>> = OnceLock::new();
static PUBLISHED: OnceLock<Option<Regex>> = OnceLock::new();
static UPDATED: OnceLock<Option<Regex>> = OnceLock::new();

fn item_block_re() -> Option<&'static Regex> {
    ITEM_BLOCK
        .get_or_init(|| Regex::new(r"(?is)<(item|entry)\b[^>]*>(.*?)</(?:item|entry)\s*>").ok())
        .as_ref()
}

fn published_re() -> Option<&'static Regex> {
    PUBLISHED
        .get_or_init(|| {
            Regex::new(r"(?is)<(pubDate|published|dc:date|issued)\b[^>]*>(.*?)</(?:pubDate|published|dc:date|issued)\s*>")
                .ok()
        })
        .as_ref()
}

fn updated_re() -> Option<&'static Regex> {
    UPDATED
        .get_or_init(|| {
            Regex::new(r"(?is)<(updated|atom:updated|dcterms:modified|modified)\b[^>]*>(.*?)</(?:updated|atom:updated|dcterms:modified|modified)\s*>")
                .ok()
        })
        .as_ref()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDates {
    pub published: Option<String>,
    pub updated: Option<String>,
}

/// Raw date strings per item, in document order. Empty when the document is
/// not XML (JSON Feed) or nothing matches.
pub fn scrape(document: &str) -> Vec<RawDates> {
    let Some(block_re) = item_block_re() else {
        return Vec::new();
    };

    block_re
        .captures_iter(document)
        .filter_map(|cap| cap.get(2))
        .map(|body| RawDates {
            published: element_text(published_re(), body.as_str()),
            updated: element_text(updated_re(), body.as_str()),
        })
        .collect()
}

fn element_text(re: Option<&Regex>, body: &str) -> Option<String> {
    let text = re?.captures(body)?.get(2)?.as_str().trim();
    let text = text
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(text)
        .trim();

    (!text.is_empty()).then(|| text.to_string())
}
