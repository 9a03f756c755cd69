use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

mod config;
mod db;
mod error;
mod feed;
mod ingest;
mod models;
mod services;

use config::Config;
use db::Repository;
use error::Result;
use feed::FeedFetcher;
use ingest::{Pipeline, Scheduler};
use models::{Article, ArticleQuery, Category, GroupCount};
use services::{HttpClient, ImageCache, ImageResolver, UnsplashClient};

const SNIPPET_WIDTH: usize = 100;
const SNIPPET_CHARS: usize = 200;

#[derive(Parser)]
#[command(name = "news-aggregator", version, about = "Poll news feeds into a local article store")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every configured source once
    Fetch,
    /// List stored articles, newest first
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        json: bool,
    },
    /// Find articles whose title or description contains the query
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Print one article by id
    Get {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Article counts by source and category
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Keep ingesting on the configured interval until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?.with_env_overrides(),
        None => Config::load()?,
    };

    let store = Arc::new(Repository::new(&config.db_path).await?);

    match cli.command {
        Command::Fetch => {
            let pipeline = build_pipeline(&config, store.clone())?;
            let summary = pipeline.ingest_all(&config.sources).await;
            println!(
                "Added {} new articles from {} sources",
                summary.inserted,
                config.sources.len()
            );
            if !summary.failed_sources.is_empty() {
                println!("Failed: {}", summary.failed_sources.join(", "));
            }
        }
        Command::Show {
            limit,
            page,
            source,
            category,
            json,
        } => {
            let filter = ArticleQuery {
                source,
                category,
                search: None,
            };
            let filtered = filter.source.is_some() || filter.category.is_some();
            let offset = page.saturating_sub(1) * limit;
            let articles = store.query(filter, limit, offset).await?;
            print_articles(&articles, json)?;

            if articles.is_empty() && filtered && !json {
                println!("Known sources: {}", store.distinct_sources().await?.join(", "));
                let categories: Vec<String> = store
                    .distinct_categories()
                    .await?
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                println!("Known categories: {}", categories.join(", "));
            }
        }
        Command::Search { query, limit, json } => {
            let articles = store.search(&query.join(" "), limit).await?;
            print_articles(&articles, json)?;
        }
        Command::Get { id, json } => match store.get(id).await? {
            Some(article) => print_articles(std::slice::from_ref(&article), json)?,
            None => println!("No article with id {}", id),
        },
        Command::Stats { json } => {
            let stats = store.counts_by_group().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("Total articles: {}", stats.total);
            print_groups("By source", &stats.by_source);
            print_groups("By category", &stats.by_category);
        }
        Command::Watch => run_watch(config, store).await?,
    }

    Ok(())
}

fn build_pipeline(config: &Config, store: Arc<Repository>) -> Result<Pipeline> {
    let feed_http = Arc::new(HttpClient::new(Duration::from_secs(config.feed_timeout_secs))?);
    let image_timeout = Duration::from_secs(config.image_timeout_secs);
    let image_http = Arc::new(HttpClient::new(image_timeout)?);

    let mut images = ImageResolver::new(
        image_http,
        ImageCache::new(&config.image_dir),
        config.max_concurrent_downloads,
    )
    .with_trusted_sources(config.trusted_sources.iter().cloned());

    match config.stock_photo_key() {
        Some(key) => {
            let client = UnsplashClient::new(key.to_string(), image_timeout)?;
            images = images.with_stock_photos(Arc::new(client));
        }
        None => tracing::info!("No Unsplash access key configured; using placeholder images only"),
    }

    Ok(Pipeline::new(FeedFetcher::new(feed_http), store, images)
        .with_max_concurrent_fetches(config.max_concurrent_fetches))
}

async fn run_watch(config: Config, store: Arc<Repository>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pipeline = Arc::new(build_pipeline(&config, store)?.with_shutdown(shutdown_rx));
    let sources = Arc::new(config.sources);
    let interval = Duration::from_secs(u64::from(config.refresh_interval_minutes.max(1)) * 60);

    let job = move || {
        let pipeline = pipeline.clone();
        let sources = sources.clone();
        async move {
            pipeline.ingest_all(&sources).await;
        }
    };

    let handle = Scheduler::new(interval, job).with_shutdown(shutdown_tx).start();
    handle.trigger();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, finishing the current run");
    handle.shutdown().await;
    Ok(())
}

fn print_articles(articles: &[Article], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(articles)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!("No articles found.");
        return Ok(());
    }

    for article in articles {
        println!("[{}] {}", article.category, article.title);
        println!("    {} | {}", article.source, article.published_at);
        println!("    {}", article.link);
        if let Some(text) = article.description.as_deref().and_then(snippet) {
            println!("    {}", text);
        }
        if let Some(path) = &article.local_image {
            println!("    image: {}", path);
        }
        println!();
    }
    Ok(())
}

/// Plain-text preview of (possibly HTML) description markup.
fn snippet(html: &str) -> Option<String> {
    let text = html2text::from_read(html.as_bytes(), SNIPPET_WIDTH).ok()?;
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if text.chars().count() > SNIPPET_CHARS {
        let cut: String = text.chars().take(SNIPPET_CHARS).collect();
        Some(format!("{}...", cut.trim_end()))
    } else {
        Some(text)
    }
}

fn print_groups(heading: &str, groups: &[GroupCount]) {
    println!("\n{}:", heading);
    for group in groups {
        println!("  {:<24} {}", group.name, group.count);
    }
}
