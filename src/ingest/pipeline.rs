use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::db::Repository;
use crate::error::Result;
use crate::feed::{extract, FeedFetcher, RawItem};
use crate::models::{FeedSource, InsertOutcome, NewArticle};
use crate::services::{classify, extract_keywords, ImageResolver};

const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 5;

/// Outcome of one pass over every configured source.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub inserted: usize,
    /// Sources whose ingestion hit a store error.
    pub failed_sources: Vec<String>,
}

pub struct Pipeline {
    fetcher: FeedFetcher,
    store: Arc<Repository>,
    images: ImageResolver,
    max_concurrent_fetches: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Pipeline {
    pub fn new(fetcher: FeedFetcher, store: Arc<Repository>, images: ImageResolver) -> Self {
        Self {
            fetcher,
            store,
            images,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            shutdown: None,
        }
    }

    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit.max(1);
        self
    }

    /// Once the channel reads `true`, sources stop before their next item.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Ingest every source, at most `max_concurrent_fetches` at a time. A
    /// failing source never stops the others.
    pub async fn ingest_all(&self, sources: &[FeedSource]) -> RunSummary {
        // Owned sources, so a run can be spawned onto the runtime.
        let results: Vec<(String, Result<usize>)> = stream::iter(sources.iter().cloned())
            .map(|source| async move {
                let result = self.ingest(&source).await;
                (source.name, result)
            })
            .buffer_unordered(self.max_concurrent_fetches)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (name, result) in results {
            match result {
                Ok(count) => summary.inserted += count,
                Err(_) => summary.failed_sources.push(name),
            }
        }

        tracing::info!(
            "Ingestion run complete: {} new articles from {} sources ({} failed)",
            summary.inserted,
            sources.len(),
            summary.failed_sources.len()
        );
        summary
    }

    /// Ingest one source and return how many articles were new.
    ///
    /// An unreachable or unparsable feed yields `Ok(0)`. Only store errors
    /// are returned; everything else is logged and skipped per item.
    pub async fn ingest(&self, source: &FeedSource) -> Result<usize> {
        let items = match self.fetcher.fetch_feed(&source.url).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Failed to fetch {} ({}): {}", source.name, source.url, e);
                return Ok(0);
            }
        };

        tracing::debug!("Fetched {} items from {}", items.len(), source.name);

        let mut inserted = 0;
        for item in &items {
            if self.shutting_down() {
                tracing::info!(
                    "Shutdown requested; stopping {} after {} new articles",
                    source.name,
                    inserted
                );
                break;
            }

            match self.process_item(source, item).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) if e.is_store() => {
                    tracing::error!("Article store failed while ingesting {}: {}", source.name, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Error processing item from {}: {}", source.name, e);
                }
            }
        }

        tracing::info!("Added {} new articles from {}", inserted, source.name);
        Ok(inserted)
    }

    /// Returns whether the item became a new article.
    async fn process_item(&self, source: &FeedSource, item: &RawItem) -> Result<bool> {
        let extracted = match extract(item) {
            Ok(extracted) => extracted,
            Err(unusable) => {
                tracing::warn!("Skipping item from {}: {}", source.name, unusable);
                return Ok(false);
            }
        };

        let category = classify(
            &extracted.title,
            extracted.description.as_deref().unwrap_or_default(),
        );
        let keywords = extract_keywords(&extracted.title);

        let article = NewArticle {
            title: extracted.title.clone(),
            link: extracted.link.clone(),
            description: extracted.description,
            published_at: extracted.published_at,
            source: source.name.clone(),
            category,
            image_url: extracted.image_url.clone(),
        };

        let id = match self.store.insert_if_absent(article).await? {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Skipped => {
                tracing::debug!("Already stored: {}", extracted.link);
                return Ok(false);
            }
        };

        let tier = self.images.trust_tier(&source.name);
        match self
            .images
            .resolve(extracted.image_url.as_deref(), &keywords, tier, id)
            .await
        {
            Some(path) => {
                self.store.update_local_image(id, path).await?;
            }
            None => {
                tracing::debug!("No image for {:?} ({})", extracted.title, extracted.link);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ingest::Scheduler;
    use crate::models::{ArticleQuery, Category};
    use crate::services::http::testing::FakeHttp;
    use crate::services::images::placeholder_url;
    use crate::services::ImageCache;
    use tempfile::TempDir;

    const JPEG: &[u8] = b"\xff\xd8\xff\xe0fake jpeg";

    const APPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Gadgets</title>
  <link>https://gadgets.example.com</link>
  <description>Gadget news</description>
  <item>
    <title>Apple unveils new AI chip</title>
    <link>https://gadgets.example.com/apple-ai-chip</link>
    <description>Apple's latest silicon uses machine learning</description>
    <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
  </item>
</channel></rss>"#;

    const MIXED_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Mixed</title>
  <link>https://mixed.example.com</link>
  <description>Mixed bag</description>
  <item>
    <title>No link here</title>
    <description>This item cannot be stored</description>
  </item>
  <item>
    <title>Cup final ends in penalties</title>
    <link>https://mixed.example.com/cup-final</link>
    <description>The football match went to extra time</description>
    <enclosure url="https://cdn.example.com/final.png" type="image/png" length="1234"/>
  </item>
</channel></rss>"#;

    struct Harness {
        _dir: TempDir,
        http: Arc<FakeHttp>,
        store: Arc<Repository>,
        pipeline: Pipeline,
    }

    async fn harness(http: FakeHttp) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("news.db");
        let store = Arc::new(Repository::new(db_path.to_str().unwrap()).await.unwrap());
        let http = Arc::new(http);
        let images = ImageResolver::new(http.clone(), ImageCache::new(dir.path().join("images")), 2)
            .with_trusted_sources(["BBC News"]);
        let pipeline = Pipeline::new(FeedFetcher::new(http.clone()), store.clone(), images);

        Harness {
            _dir: dir,
            http,
            store,
            pipeline,
        }
    }

    #[tokio::test]
    async fn apple_story_is_classified_and_gets_a_placeholder_image() {
        let h = harness(
            FakeHttp::new()
                .route("https://gadgets.example.com/rss", APPLE_FEED)
                .route("https://picsum.photos/", JPEG),
        )
        .await;
        let source = FeedSource::new("Gadget Blog", "https://gadgets.example.com/rss");

        let inserted = h.pipeline.ingest(&source).await.unwrap();
        assert_eq!(inserted, 1);

        let articles = h.store.query(ArticleQuery::default(), 10, 0).await.unwrap();
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.title, "Apple unveils new AI chip");
        assert_eq!(article.category, Category::Technology);
        assert_eq!(article.source, "Gadget Blog");
        assert_eq!(article.published_at, "Mon, 06 Jan 2025 10:00:00 GMT");
        assert_eq!(article.image_url, None);

        let local = article.local_image.as_deref().unwrap();
        assert!(std::path::Path::new(local).exists());
        assert!(h
            .http
            .requests()
            .contains(&placeholder_url(&extract_keywords(&article.title))));
    }

    #[tokio::test]
    async fn second_run_inserts_nothing() {
        let h = harness(
            FakeHttp::new()
                .route("https://gadgets.example.com/rss", APPLE_FEED)
                .route("https://picsum.photos/", JPEG),
        )
        .await;
        let source = FeedSource::new("Gadget Blog", "https://gadgets.example.com/rss");

        assert_eq!(h.pipeline.ingest(&source).await.unwrap(), 1);
        assert_eq!(h.pipeline.ingest(&source).await.unwrap(), 0);

        let stats = h.store.counts_by_group().await.unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn linkless_items_are_skipped_and_not_counted() {
        let h = harness(
            FakeHttp::new()
                .route("https://mixed.example.com/rss", MIXED_FEED)
                .route("https://cdn.example.com/", JPEG),
        )
        .await;
        let source = FeedSource::new("Mixed", "https://mixed.example.com/rss");

        assert_eq!(h.pipeline.ingest(&source).await.unwrap(), 1);

        let articles = h.store.query(ArticleQuery::default(), 10, 0).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].category, Category::Sports);
        assert_eq!(
            articles[0].image_url.as_deref(),
            Some("https://cdn.example.com/final.png")
        );
        assert!(articles[0].local_image.as_deref().unwrap().ends_with(".png"));
        assert_eq!(h.http.request_counts()["https://cdn.example.com/final.png"], 1);
    }

    #[tokio::test]
    async fn unreachable_source_counts_zero_and_others_still_run() {
        let h = harness(
            FakeHttp::new()
                .route("https://gadgets.example.com/rss", APPLE_FEED)
                .route("https://broken.example.com/rss", "<html>not a feed</html>")
                .route("https://picsum.photos/", JPEG),
        )
        .await;

        let down = FeedSource::new("Down", "https://down.example.com/rss");
        assert_eq!(h.pipeline.ingest(&down).await.unwrap(), 0);

        let sources = vec![
            down,
            FeedSource::new("Broken", "https://broken.example.com/rss"),
            FeedSource::new("Gadget Blog", "https://gadgets.example.com/rss"),
        ];
        let summary = h.pipeline.ingest_all(&sources).await;
        assert_eq!(summary.inserted, 1);
        assert!(summary.failed_sources.is_empty());
    }

    #[tokio::test]
    async fn missing_image_never_blocks_insert() {
        // No image routes at all: every fallback fails.
        let h = harness(FakeHttp::new().route("https://gadgets.example.com/rss", APPLE_FEED)).await;
        let source = FeedSource::new("BBC News", "https://gadgets.example.com/rss");

        assert_eq!(h.pipeline.ingest(&source).await.unwrap(), 1);
        let articles = h.store.query(ArticleQuery::default(), 10, 0).await.unwrap();
        assert_eq!(articles[0].local_image, None);
    }

    #[tokio::test]
    async fn shutdown_stops_before_the_next_item() {
        let h = harness(
            FakeHttp::new()
                .route("https://gadgets.example.com/rss", APPLE_FEED)
                .route("https://picsum.photos/", JPEG),
        )
        .await;
        let (tx, rx) = watch::channel(false);
        let pipeline = h.pipeline.with_shutdown(rx);
        tx.send(true).unwrap();

        let source = FeedSource::new("Gadget Blog", "https://gadgets.example.com/rss");
        assert_eq!(pipeline.ingest(&source).await.unwrap(), 0);
        assert_eq!(h.store.counts_by_group().await.unwrap().total, 0);
    }

    const EMPTY_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Quiet</title>
  <link>https://quiet.example.com</link>
  <description>Nothing new</description>
</channel></rss>"#;

    #[tokio::test]
    async fn concurrent_fetches_are_bounded() {
        let h = harness(
            FakeHttp::new()
                .route("https://quiet.example.com/", EMPTY_FEED)
                .with_latency(Duration::from_millis(20)),
        )
        .await;
        let pipeline = h.pipeline.with_max_concurrent_fetches(2);

        let sources: Vec<FeedSource> = (0..6)
            .map(|i| FeedSource::new(format!("Quiet {}", i), format!("https://quiet.example.com/{}", i)))
            .collect();
        let summary = pipeline.ingest_all(&sources).await;

        assert_eq!(summary.inserted, 0);
        assert_eq!(h.http.requests().len(), 6);
        assert_eq!(h.http.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn scheduled_run_ingests_every_source() {
        let h = harness(
            FakeHttp::new()
                .route("https://gadgets.example.com/rss", APPLE_FEED)
                .route("https://mixed.example.com/rss", MIXED_FEED)
                .route("https://picsum.photos/", JPEG)
                .route("https://cdn.example.com/", JPEG),
        )
        .await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pipeline = Arc::new(h.pipeline.with_shutdown(shutdown_rx));
        let sources = Arc::new(vec![
            FeedSource::new("Gadget Blog", "https://gadgets.example.com/rss"),
            FeedSource::new("Mixed", "https://mixed.example.com/rss"),
        ]);

        let job = move || {
            let pipeline = pipeline.clone();
            let sources = sources.clone();
            async move {
                pipeline.ingest_all(&sources).await;
            }
        };
        let handle = Scheduler::new(Duration::from_secs(3600), job)
            .with_shutdown(shutdown_tx)
            .start();
        handle.trigger();

        let store = h.store.clone();
        let filled = tokio::time::timeout(Duration::from_secs(5), async {
            while store.counts_by_group().await.unwrap().total < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        handle.shutdown().await;

        assert!(filled.is_ok());
        let stats = h.store.counts_by_group().await.unwrap();
        assert_eq!(stats.total, 2);
    }
}
