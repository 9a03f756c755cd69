use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use crate::error::Result;

use super::{HttpFetch, StockPhotoSearch};

const PLACEHOLDER_BASE_URL: &str = "https://picsum.photos/seed";
const PLACEHOLDER_WIDTH: u32 = 800;
const PLACEHOLDER_HEIGHT: u32 = 450;
const DEFAULT_EXTENSION: &str = ".jpg";
/// Longest extension accepted from a URL, dot included.
const MAX_EXTENSION_LEN: usize = 5;

/// Whether a source may spend stock photo API quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustTier {
    Trusted,
    Untrusted,
}

/// Content-addressed image files under one directory.
///
/// A file name is derived from the article id and a hash of the source URL,
/// so the same URL for the same article always lands on the same file.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, url: &str, article_id: i64) -> PathBuf {
        self.dir.join(cache_file_name(url, article_id))
    }

    async fn contains(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    /// Write through a temp file so readers never see a partial image.
    async fn store(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let temp_suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let tmp_path = path.with_extension(format!("tmp.{}", temp_suffix));

        tokio::fs::write(&tmp_path, bytes).await?;

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn cache_file_name(url: &str, article_id: i64) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!("article_{}_{}{}", article_id, &digest[..16], url_extension(url))
}

/// Extension of the URL path with its dot, or `.jpg` when there is none or
/// it does not look like a real extension.
fn url_extension(url: &str) -> String {
    let ext = url::Url::parse(url).ok().and_then(|u| {
        Path::new(u.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
    });

    match ext {
        Some(ext)
            if ext.len() > 1
                && ext.len() <= MAX_EXTENSION_LEN
                && ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

fn looks_like_http(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

/// Seed-based placeholder URL; the same keywords always give the same image.
pub fn placeholder_url(keywords: &str) -> String {
    let digest = hex::encode(Sha256::digest(keywords.as_bytes()));
    format!(
        "{}/{}/{}/{}",
        PLACEHOLDER_BASE_URL,
        &digest[..7],
        PLACEHOLDER_WIDTH,
        PLACEHOLDER_HEIGHT
    )
}

pub struct ImageResolver {
    http: Arc<dyn HttpFetch>,
    stock_photos: Option<Arc<dyn StockPhotoSearch>>,
    cache: ImageCache,
    trusted_sources: HashSet<String>,
    downloads: Arc<Semaphore>,
}

impl ImageResolver {
    pub fn new(http: Arc<dyn HttpFetch>, cache: ImageCache, max_concurrent_downloads: usize) -> Self {
        Self {
            http,
            stock_photos: None,
            cache,
            trusted_sources: HashSet::new(),
            downloads: Arc::new(Semaphore::new(max_concurrent_downloads.max(1))),
        }
    }

    /// Without a stock photo client the resolver goes straight from the feed
    /// image to the placeholder.
    pub fn with_stock_photos(mut self, stock_photos: Arc<dyn StockPhotoSearch>) -> Self {
        self.stock_photos = Some(stock_photos);
        self
    }

    pub fn with_trusted_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn trust_tier(&self, source: &str) -> TrustTier {
        if self.trusted_sources.contains(source) {
            TrustTier::Trusted
        } else {
            TrustTier::Untrusted
        }
    }

    /// Find a local image for an article: the feed's own image, then a stock
    /// photo for trusted sources, then a placeholder. `None` only when every
    /// step failed; failures are logged and never returned.
    pub async fn resolve(
        &self,
        image_url: Option<&str>,
        keywords: &str,
        tier: TrustTier,
        article_id: i64,
    ) -> Option<String> {
        if let Some(url) = image_url.filter(|u| looks_like_http(u)) {
            if let Some(path) = self.try_download(url, article_id).await {
                return Some(path);
            }
        }

        if tier == TrustTier::Trusted {
            if let Some(path) = self.from_stock_photos(keywords, article_id).await {
                return Some(path);
            }
        }

        let placeholder = placeholder_url(keywords);
        self.try_download(&placeholder, article_id).await
    }

    async fn from_stock_photos(&self, keywords: &str, article_id: i64) -> Option<String> {
        let stock_photos = self.stock_photos.as_ref()?;

        let urls = match stock_photos.search(keywords).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("Stock photo search for {:?} failed: {}", keywords, e);
                return None;
            }
        };

        let Some(url) = urls.into_iter().next() else {
            tracing::debug!("No stock photos for {:?}", keywords);
            return None;
        };

        self.try_download(&url, article_id).await
    }

    async fn try_download(&self, url: &str, article_id: i64) -> Option<String> {
        match self.download(url, article_id).await {
            Ok(path) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                tracing::debug!("Image download failed for article {} ({}): {}", article_id, url, e);
                None
            }
        }
    }

    /// Download `url` into the cache unless it is already there.
    pub async fn download(&self, url: &str, article_id: i64) -> Result<PathBuf> {
        let url = url.trim();
        if !looks_like_http(url) {
            return Err(anyhow::anyhow!("Not an http(s) URL: {}", url).into());
        }

        let path = self.cache.path_for(url, article_id);
        if self.cache.contains(&path).await {
            tracing::debug!("Image already cached: {}", path.display());
            return Ok(path);
        }

        let _permit = self
            .downloads
            .acquire()
            .await
            .map_err(|e| anyhow::anyhow!("Download pool closed: {}", e))?;

        let bytes = self.http.get(url).await?;
        if bytes.is_empty() {
            return Err(anyhow::anyhow!("Empty image body from {}", url).into());
        }

        self.cache.store(&path, &bytes).await?;
        tracing::debug!("Saved image {} -> {}", url, path.display());
        Ok(path)
    }
}
