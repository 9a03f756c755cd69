use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::FeedSource;

const APP_DIR: &str = "news-aggregator";
const UNSPLASH_KEY_ENV: &str = "UNSPLASH_ACCESS_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: String,
    pub image_dir: String,

    /// Stock photo credential; `UNSPLASH_ACCESS_KEY` overrides it.
    pub unsplash_access_key: Option<String>,

    pub refresh_interval_minutes: u32,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_downloads: usize,
    pub feed_timeout_secs: u64,
    pub image_timeout_secs: u64,

    /// Sources allowed to use the stock photo API.
    pub trusted_sources: Vec<String>,
    pub sources: Vec<FeedSource>,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_sources() -> Vec<FeedSource> {
    [
        ("BBC News", "http://feeds.bbci.co.uk/news/rss.xml"),
        ("The Guardian", "https://www.theguardian.com/world/rss"),
        ("NPR", "https://feeds.npr.org/1001/rss.xml"),
        ("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
        ("TechCrunch", "https://techcrunch.com/feed/"),
        ("Hacker News", "https://hnrss.org/frontpage"),
        ("The Verge", "https://www.theverge.com/rss/index.xml"),
        ("Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
        ("Wired", "https://www.wired.com/feed/rss"),
        ("Bloomberg", "https://feeds.bloomberg.com/markets/news.rss"),
        ("Scientific American", "http://rss.sciam.com/ScientificAmerican-Global"),
        ("Nature", "https://www.nature.com/nature.rss"),
        ("Variety", "https://variety.com/feed/"),
    ]
    .into_iter()
    .map(|(name, url)| FeedSource::new(name, url))
    .collect()
}

fn default_trusted_sources() -> Vec<String> {
    ["BBC News", "TechCrunch", "The Verge", "Reuters", "The Guardian"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: data_dir().join("news.db").to_string_lossy().to_string(),
            image_dir: data_dir()
                .join("images")
                .join("articles")
                .to_string_lossy()
                .to_string(),
            unsplash_access_key: None,
            refresh_interval_minutes: 15,
            max_concurrent_fetches: 5,
            max_concurrent_downloads: 5,
            feed_timeout_secs: 30,
            image_timeout_secs: 10,
            trusted_sources: default_trusted_sources(),
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Load the user config, writing the defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        Ok(config.with_env_overrides())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(UNSPLASH_KEY_ENV) {
            if !key.trim().is_empty() {
                self.unsplash_access_key = Some(key.trim().to_string());
            }
        }
        self
    }

    /// Stock photo key, if one is actually set.
    pub fn stock_photo_key(&self) -> Option<&str> {
        self.unsplash_access_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 || self.max_concurrent_downloads == 0 {
            return Err(AppError::Config(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.feed_timeout_secs == 0 || self.image_timeout_secs == 0 {
            return Err(AppError::Config("timeouts must be at least 1 second".to_string()));
        }
        if let Some(source) = self.sources.iter().find(|s| s.name.trim().is_empty()) {
            return Err(AppError::Config(format!("source {} has no name", source.url)));
        }
        Ok(())
    }
}
