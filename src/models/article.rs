use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    /// Kept exactly as the feed reported it; interpreted at display time.
    pub published_at: String,
    pub source: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub local_image: Option<String>,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: String,
    pub source: String,
    pub category: Category,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// An article with the same link already exists.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub source: Option<String>,
    pub category: Option<Category>,
    /// Substring match against title or description.
    pub search: Option<String>,
}

impl ArticleQuery {
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total: i64,
    pub by_source: Vec<GroupCount>,
    pub by_category: Vec<GroupCount>,
}
