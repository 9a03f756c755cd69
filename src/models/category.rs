use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Topical category assigned to an article at ingestion time.
///
/// Declaration order matters: the classifier breaks score ties in favour of
/// the category declared first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Technology,
    Business,
    Politics,
    Science,
    Sports,
    Entertainment,
    World,
    Health,
    General,
}

impl Category {
    /// Categories the classifier scores, in tie-break order. `General` is the
    /// fallback and has no keywords.
    pub const SCORED: [Category; 8] = [
        Category::Technology,
        Category::Business,
        Category::Politics,
        Category::Science,
        Category::Sports,
        Category::Entertainment,
        Category::World,
        Category::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Business => "Business",
            Category::Politics => "Politics",
            Category::Science => "Science",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::World => "World",
            Category::Health => "Health",
            Category::General => "General",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Technology => &[
                "tech", "ai", "software", "app", "apple", "google", "microsoft", "bitcoin",
                "crypto", "computer", "data", "code", "programming", "algorithm",
            ],
            Category::Business => &[
                "business", "economy", "market", "stock", "finance", "company", "startup",
                "ceo", "trade", "investment", "bank",
            ],
            Category::Politics => &[
                "politics", "election", "government", "congress", "senate", "president",
                "minister", "parliament", "vote", "law",
            ],
            Category::Science => &[
                "science", "research", "study", "climate", "space", "nasa", "brain", "health",
                "medical", "doctor",
            ],
            Category::Sports => &[
                "football", "soccer", "basketball", "baseball", "tennis", "cricket", "sports",
                "game", "player", "team", "match",
            ],
            Category::Entertainment => &[
                "movie", "film", "music", "celebrity", "actor", "actress", "netflix",
                "spotify", "concert", "album", "show",
            ],
            Category::World => &[
                "china", "russia", "ukraine", "israel", "iran", "india", "europe", "asia",
                "africa", "australia", "war",
            ],
            Category::Health => &[
                "covid", "vaccine", "health", "hospital", "doctor", "medical", "disease",
                "drug", "treatment", "patient",
            ],
            Category::General => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::SCORED
            .iter()
            .chain(std::iter::once(&Category::General))
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}
