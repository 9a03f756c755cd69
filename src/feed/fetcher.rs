use std::sync::Arc;

use feed_rs::parser;

use crate::error::Result;
use crate::services::HttpFetch;

use super::dates;
use super::item::RawItem;

pub struct FeedFetcher {
    http: Arc<dyn HttpFetch>,
}

impl FeedFetcher {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    /// Download and parse one feed into raw items, in feed order.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<RawItem>> {
        let bytes = self.http.get(url).await?;
        parse_items(&bytes)
    }
}

/// Parse RSS, Atom or JSON Feed bytes.
pub fn parse_items(bytes: &[u8]) -> Result<Vec<RawItem>> {
    let feed = parser::parse(bytes)?;
    let feed_type = feed.feed_type;

    // Raw dates pair up with entries by position; any disagreement in count
    // means the scrape cannot be trusted for this document.
    let raw_dates = dates::scrape(&String::from_utf8_lossy(bytes));
    let raw_dates = if raw_dates.len() == feed.entries.len() {
        raw_dates
    } else {
        if !raw_dates.is_empty() {
            tracing::debug!(
                "Found {} item blocks for {} entries; using parsed dates",
                raw_dates.len(),
                feed.entries.len()
            );
        }
        Vec::new()
    };

    let items = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| RawItem::from_entry(&feed_type, entry, raw_dates.get(i)))
        .collect();

    Ok(items)
}
