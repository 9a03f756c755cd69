//! Raw feed item shapes, before field extraction.
//!
//! Dialects disagree on where the same information lives: RSS puts the body
//! in `description` with an optional `content:encoded`, Atom nests text in
//! `content`/`summary` wrappers and expresses the article URL as a link
//! element. Each known shape gets its own struct and the extractor has one
//! adapter per variant.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, FeedType, MediaObject};

use super::dates::RawDates;

#[derive(Debug, Clone)]
pub enum RawItem {
    /// RSS 0.9x, 1.0 and 2.0 `<item>`.
    Rss(RssItem),
    /// Atom `<entry>` and JSON Feed items.
    Atom(AtomEntry),
}

#[derive(Debug, Clone, Default)]
pub struct RssItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub content_encoded: Option<String>,
    pub pub_date: Option<String>,
    pub updated: Option<String>,
    pub media: MediaRefs,
}

#[derive(Debug, Clone, Default)]
pub struct AtomEntry {
    pub title: Option<TextBlock>,
    pub links: Vec<AtomLink>,
    pub content: Option<TextBlock>,
    pub summary: Option<TextBlock>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub media: MediaRefs,
}

/// Text wrapped with its declared media type (Atom `type="html"` etc).
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub content: String,
    pub media_type: String,
}

impl TextBlock {
    /// Plain text never carries markup worth scraping.
    pub fn is_plain(&self) -> bool {
        self.media_type.to_ascii_lowercase().starts_with("text/plain")
    }

    #[cfg(test)]
    pub fn html(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            media_type: "text/html".to_string(),
        }
    }

    #[cfg(test)]
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            media_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AtomLink {
    pub href: String,
    pub rel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub media_type: Option<String>,
}

impl Enclosure {
    pub fn is_image(&self) -> bool {
        self.media_type
            .as_deref()
            .map(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

/// Image references carried outside the markup.
#[derive(Debug, Clone, Default)]
pub struct MediaRefs {
    /// `<enclosure>`, `media:content` and Atom `rel="enclosure"` links.
    pub enclosures: Vec<Enclosure>,
    /// A dedicated item image such as `itunes:image` or JSON Feed `image`.
    pub image: Option<String>,
    /// `media:thumbnail` nested in a media group.
    pub thumbnails: Vec<String>,
}

impl RawItem {
    /// Rebuild the dialect shape from a feed-rs entry.
    ///
    /// feed-rs normalizes every dialect into one `Entry`, so the mapping back
    /// is by feed type: RSS description arrives as `summary` and
    /// `content:encoded` as `content`. Dates come from `raw` when the feed's
    /// own text is known, else from the parsed timestamps.
    pub fn from_entry(feed_type: &FeedType, entry: Entry, raw: Option<&RawDates>) -> Self {
        let raw = raw.cloned().unwrap_or_default();
        match feed_type {
            FeedType::RSS0 | FeedType::RSS1 | FeedType::RSS2 => {
                RawItem::Rss(rss_from_entry(entry, raw))
            }
            FeedType::Atom | FeedType::JSON => RawItem::Atom(atom_from_entry(entry, raw)),
        }
    }
}

fn rss_from_entry(entry: Entry, raw: RawDates) -> RssItem {
    RssItem {
        title: entry.title.map(|t| t.content),
        link: entry.links.first().map(|l| l.href.clone()),
        description: entry.summary.map(|s| s.content),
        content_encoded: entry.content.and_then(|c| c.body),
        pub_date: raw.published.or_else(|| entry.published.map(|d| d.to_rfc2822())),
        updated: raw.updated.or_else(|| entry.updated.map(|d| d.to_rfc2822())),
        media: media_refs(&entry.media, &[]),
    }
}

fn atom_from_entry(entry: Entry, raw: RawDates) -> AtomEntry {
    let (enclosure_links, links): (Vec<_>, Vec<_>) = entry
        .links
        .into_iter()
        .partition(|l| l.rel.as_deref() == Some("enclosure"));

    let enclosures: Vec<Enclosure> = enclosure_links
        .into_iter()
        .map(|l| Enclosure {
            url: l.href,
            media_type: l.media_type,
        })
        .collect();

    AtomEntry {
        title: entry.title.map(|t| TextBlock {
            content: t.content,
            media_type: t.content_type.to_string(),
        }),
        links: links
            .into_iter()
            .map(|l| AtomLink {
                href: l.href,
                rel: l.rel,
            })
            .collect(),
        content: entry.content.and_then(|c| {
            let media_type = c.content_type.to_string();
            c.body.map(|content| TextBlock {
                content,
                media_type,
            })
        }),
        summary: entry.summary.map(|s| TextBlock {
            content: s.content,
            media_type: s.content_type.to_string(),
        }),
        published: raw.published.or_else(|| entry.published.map(rfc3339)),
        updated: raw.updated.or_else(|| entry.updated.map(rfc3339)),
        media: media_refs(&entry.media, &enclosures),
    }
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Media objects without any content entry are standalone item images
/// (itunes:image, JSON Feed image); thumbnails inside a group with content
/// belong to that content.
fn media_refs(media: &[MediaObject], extra_enclosures: &[Enclosure]) -> MediaRefs {
    let mut refs = MediaRefs {
        enclosures: extra_enclosures.to_vec(),
        ..Default::default()
    };

    for object in media {
        let thumbnails = object.thumbnails.iter().map(|t| t.image.uri.clone());

        if object.content.is_empty() {
            let mut thumbnails = thumbnails;
            if refs.image.is_none() {
                refs.image = thumbnails.next();
            }
            refs.thumbnails.extend(thumbnails);
            continue;
        }

        for content in &object.content {
            if let Some(url) = &content.url {
                refs.enclosures.push(Enclosure {
                    url: url.to_string(),
                    media_type: content.content_type.as_ref().map(|m| m.to_string()),
                });
            }
        }
        refs.thumbnails.extend(thumbnails);
    }

    refs
}
