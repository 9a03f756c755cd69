use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};

const UNSPLASH_API_URL: &str = "https://api.unsplash.com";

/// Keyword search against a stock photo library.
#[async_trait]
pub trait StockPhotoSearch: Send + Sync {
    /// Image URLs matching `keywords`, best match first. May be empty.
    async fn search(&self, keywords: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
}

pub struct UnsplashClient {
    client: Client,
    access_key: String,
}

impl UnsplashClient {
    pub fn new(access_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, access_key })
    }
}

#[async_trait]
impl StockPhotoSearch for UnsplashClient {
    async fn search(&self, keywords: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/search/photos?query={}&per_page=1&orientation=landscape",
            UNSPLASH_API_URL,
            urlencoding::encode(keywords)
        );

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .header("Accept-Version", "v1")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::StockPhotoApi(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: SearchResponse = response.json().await?;

        Ok(photo_urls(body))
    }
}

fn photo_urls(body: SearchResponse) -> Vec<String> {
    body.results
        .into_iter()
        .filter_map(|photo| photo.urls.regular)
        .filter(|url| !url.trim().is_empty())
        .collect()
}
