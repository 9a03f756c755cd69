use chrono::Utc;
use thiserror::Error;

use super::item::{AtomEntry, MediaRefs, RawItem, RssItem, TextBlock};
use super::markup;

const UNTITLED: &str = "Untitled";

/// Normalized fields of one feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: String,
    pub image_url: Option<String>,
}

/// The item carries no link and cannot be stored.
#[derive(Debug, Clone, Error)]
#[error("item {title:?} has no link")]
pub struct UnusableItem {
    pub title: String,
}

/// Extract the canonical fields from a raw item.
///
/// When the item carries no date at all, the current time is substituted.
/// That timestamp is a known inaccuracy; it only affects display ordering.
pub fn extract(item: &RawItem) -> Result<ExtractedItem, UnusableItem> {
    match item {
        RawItem::Rss(rss) => extract_rss(rss),
        RawItem::Atom(atom) => extract_atom(atom),
    }
}

fn extract_rss(item: &RssItem) -> Result<ExtractedItem, UnusableItem> {
    let title = present(item.title.as_deref())
        .unwrap_or(UNTITLED)
        .to_string();

    let Some(link) = present(item.link.as_deref()) else {
        return Err(UnusableItem { title });
    };

    let description = present(item.description.as_deref())
        .or_else(|| present(item.content_encoded.as_deref()))
        .map(str::to_string);

    let published_at = present(item.pub_date.as_deref())
        .or_else(|| present(item.updated.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(now);

    let bodies = [item.description.as_deref(), item.content_encoded.as_deref()];

    Ok(ExtractedItem {
        title,
        link: link.to_string(),
        description,
        published_at,
        image_url: find_image(&item.media, &bodies),
    })
}

fn extract_atom(entry: &AtomEntry) -> Result<ExtractedItem, UnusableItem> {
    let title = present(entry.title.as_ref().map(|t| t.content.as_str()))
        .unwrap_or(UNTITLED)
        .to_string();

    let Some(link) = atom_link(entry) else {
        return Err(UnusableItem { title });
    };

    let content = entry.content.as_ref().map(|c| c.content.as_str());
    let summary = entry.summary.as_ref().map(|s| s.content.as_str());

    let description = present(content)
        .or_else(|| present(summary))
        .map(str::to_string);

    let published_at = present(entry.published.as_deref())
        .or_else(|| present(entry.updated.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(now);

    Ok(ExtractedItem {
        title,
        link: link.to_string(),
        description,
        published_at,
        image_url: find_image(&entry.media, &[scrapable(&entry.content), scrapable(&entry.summary)]),
    })
}

fn scrapable(block: &Option<TextBlock>) -> Option<&str> {
    block
        .as_ref()
        .filter(|b| !b.is_plain())
        .map(|b| b.content.as_str())
}

/// The `alternate` link (or one without a rel), else the first link that is
/// not `self`.
fn atom_link(entry: &AtomEntry) -> Option<&str> {
    let links = || {
        entry
            .links
            .iter()
            .filter(|l| present(Some(l.href.as_str())).is_some())
    };

    links()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links().find(|l| l.rel.as_deref() != Some("self")))
        .map(|l| l.href.trim())
}

/// Image probe chain, first hit wins: image enclosure, dedicated image field,
/// media thumbnail, `<img>` in the markup, then `og:image` in the markup.
fn find_image(media: &MediaRefs, bodies: &[Option<&str>]) -> Option<String> {
    media
        .enclosures
        .iter()
        .find(|e| e.is_image() && present(Some(e.url.as_str())).is_some())
        .map(|e| e.url.trim().to_string())
        .or_else(|| present(media.image.as_deref()).map(str::to_string))
        .or_else(|| {
            media
                .thumbnails
                .iter()
                .find_map(|t| present(Some(t.as_str())))
                .map(str::to_string)
        })
        .or_else(|| bodies.iter().flatten().find_map(|b| markup::first_img_src(b)))
        .or_else(|| bodies.iter().flatten().find_map(|b| markup::og_image(b)))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}
