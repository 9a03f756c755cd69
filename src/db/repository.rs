use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, ArticleQuery, Category, GroupCount, InsertOutcome, NewArticle, Stats};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, title, link, description, published_at, source, category, \
                               image_url, local_image, inserted_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Insert unless an article with the same link exists. The stored row
    /// always keeps the fields of the first insert.
    pub async fn insert_if_absent(&self, article: NewArticle) -> Result<InsertOutcome> {
        let outcome = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO articles (title, link, description, published_at, source, category, image_url)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                       ON CONFLICT(link) DO NOTHING"#,
                    params![
                        article.title,
                        article.link,
                        article.description,
                        article.published_at,
                        article.source,
                        article.category.as_str(),
                        article.image_url,
                    ],
                )?;

                if changed == 0 {
                    Ok(InsertOutcome::Skipped)
                } else {
                    Ok(InsertOutcome::Inserted(conn.last_insert_rowid()))
                }
            })
            .await?;
        Ok(outcome)
    }

    /// Fill in the cached image path. Returns false when the row is missing
    /// or already has one.
    pub async fn update_local_image(&self, id: i64, path: String) -> Result<bool> {
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE articles SET local_image = ?1 WHERE id = ?2 AND local_image IS NULL",
                    params![path, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(updated)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM articles WHERE id = ?1",
                    ARTICLE_COLUMNS
                ))?;
                let article = stmt.query_row(params![id], article_from_row).optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Most recently inserted first.
    pub async fn query(&self, filter: ArticleQuery, limit: usize, offset: usize) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut clauses: Vec<&str> = Vec::new();
                let mut values: Vec<Value> = Vec::new();

                if let Some(source) = filter.source.filter(|s| !s.is_empty()) {
                    clauses.push("source = ?");
                    values.push(Value::Text(source));
                }
                if let Some(category) = filter.category {
                    clauses.push("category = ?");
                    values.push(Value::Text(category.as_str().to_string()));
                }
                if let Some(text) = filter.search.filter(|s| !s.trim().is_empty()) {
                    let pattern = format!("%{}%", text.trim());
                    clauses.push("(title LIKE ? OR description LIKE ?)");
                    values.push(Value::Text(pattern.clone()));
                    values.push(Value::Text(pattern));
                }

                let mut sql = format!("SELECT {} FROM articles", ARTICLE_COLUMNS);
                if !clauses.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clauses.join(" AND "));
                }
                sql.push_str(" ORDER BY inserted_at DESC, id DESC LIMIT ? OFFSET ?");
                values.push(Value::Integer(limit as i64));
                values.push(Value::Integer(offset as i64));

                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params_from_iter(values.iter()), article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<Article>> {
        self.query(ArticleQuery::default().search(text), limit, 0).await
    }

    pub async fn distinct_sources(&self) -> Result<Vec<String>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT DISTINCT source FROM articles ORDER BY source")?;
                let sources = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn distinct_categories(&self) -> Result<Vec<Category>> {
        let names = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT DISTINCT category FROM articles ORDER BY category")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await?;

        Ok(names.iter().filter_map(|n| n.parse().ok()).collect())
    }

    pub async fn counts_by_group(&self) -> Result<Stats> {
        let stats = self
            .conn
            .call(|conn| {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;

                let grouped = |column: &str| -> rusqlite::Result<Vec<GroupCount>> {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {col}, COUNT(*) AS n FROM articles GROUP BY {col} ORDER BY n DESC, {col}",
                        col = column
                    ))?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok(GroupCount {
                                name: row.get(0)?,
                                count: row.get(1)?,
                            })
                        })?
                        .collect();
                    rows
                };

                let by_source = grouped("source")?;
                let by_category = grouped("category")?;

                Ok(Stats {
                    total,
                    by_source,
                    by_category,
                })
            })
            .await?;
        Ok(stats)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<Article> {
    let category: String = row.get(6)?;

    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        link: row.get(2)?,
        description: row.get(3)?,
        published_at: row.get(4)?,
        source: row.get(5)?,
        category: category.parse().unwrap_or(Category::General),
        image_url: row.get(7)?,
        local_image: row.get(8)?,
        inserted_at: row
            .get::<_, String>(9)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    async fn repository() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("news.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn article(link: &str, title: &str, source: &str, category: Category) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            link: link.to_string(),
            description: Some(format!("About {}", title)),
            published_at: "Mon, 06 Jan 2025 10:00:00 +0000".to_string(),
            source: source.to_string(),
            category,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn duplicate_link_keeps_first_insert() {
        let (_dir, repo) = repository().await;

        let first = repo
            .insert_if_absent(article("https://x.com/1", "Original", "BBC News", Category::World))
            .await
            .unwrap();
        let InsertOutcome::Inserted(id) = first else {
            panic!("expected an insert, got {:?}", first);
        };

        let second = repo
            .insert_if_absent(article("https://x.com/1", "Rewritten", "NPR", Category::Sports))
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome::Skipped);

        let all = repo.query(ArticleQuery::default(), 10, 0).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].title, "Original");
        assert_eq!(all[0].source, "BBC News");
        assert_eq!(all[0].category, Category::World);
    }

    #[tokio::test]
    async fn local_image_is_filled_once() {
        let (_dir, repo) = repository().await;
        let InsertOutcome::Inserted(id) = repo
            .insert_if_absent(article("https://x.com/1", "One", "NPR", Category::General))
            .await
            .unwrap()
        else {
            panic!("expected an insert");
        };

        assert!(assert_ok!(repo.update_local_image(id, "/img/a.jpg".to_string()).await));
        assert!(!assert_ok!(repo.update_local_image(id, "/img/b.jpg".to_string()).await));
        assert!(!assert_ok!(repo.update_local_image(id + 100, "/img/c.jpg".to_string()).await));

        let stored = repo.get(id).await.unwrap().unwrap();
        assert_eq!(stored.local_image.as_deref(), Some("/img/a.jpg"));
    }

    #[tokio::test]
    async fn query_filters_and_paginates_newest_first() {
        let (_dir, repo) = repository().await;
        for i in 0..5 {
            let source = if i % 2 == 0 { "BBC News" } else { "Wired" };
            let category = if i < 3 { Category::Technology } else { Category::Science };
            assert_ok!(
                repo.insert_if_absent(article(&format!("https://x.com/{}", i), &format!("Story {}", i), source, category))
                    .await
            );
        }

        let page = repo.query(ArticleQuery::default(), 2, 0).await.unwrap();
        let titles: Vec<_> = page.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Story 4", "Story 3"]);

        let next = repo.query(ArticleQuery::default(), 2, 2).await.unwrap();
        let titles: Vec<_> = next.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Story 2", "Story 1"]);

        let bbc = repo
            .query(ArticleQuery::default().source("BBC News"), 10, 0)
            .await
            .unwrap();
        assert_eq!(bbc.len(), 3);

        let bbc_science = repo
            .query(
                ArticleQuery::default().source("BBC News").category(Category::Science),
                10,
                0,
            )
            .await
            .unwrap();
        assert_eq!(bbc_science.len(), 1);
        assert_eq!(bbc_science[0].title, "Story 4");
    }

    #[tokio::test]
    async fn search_matches_title_or_description() {
        let (_dir, repo) = repository().await;
        let mut with_desc = article("https://x.com/1", "Quiet headline", "NPR", Category::General);
        with_desc.description = Some("A rocket launch was delayed".to_string());
        assert_ok!(repo.insert_if_absent(with_desc).await);
        assert_ok!(
            repo.insert_if_absent(article("https://x.com/2", "Rocket lands", "NPR", Category::Science))
                .await
        );
        assert_ok!(
            repo.insert_if_absent(article("https://x.com/3", "Budget vote", "NPR", Category::Politics))
                .await
        );

        let hits = repo.search("rocket", 100).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(repo.search("submarine", 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn distinct_values_and_group_counts() {
        let (_dir, repo) = repository().await;
        let rows = [
            ("https://x.com/1", "Wired", Category::Technology),
            ("https://x.com/2", "Wired", Category::Technology),
            ("https://x.com/3", "BBC News", Category::World),
        ];
        for (link, source, category) in rows {
            assert_ok!(repo.insert_if_absent(article(link, "t", source, category)).await);
        }

        assert_eq!(
            repo.distinct_sources().await.unwrap(),
            vec!["BBC News".to_string(), "Wired".to_string()]
        );
        assert_eq!(
            repo.distinct_categories().await.unwrap(),
            vec![Category::Technology, Category::World]
        );

        let stats = repo.counts_by_group().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(
            stats.by_source,
            vec![
                GroupCount { name: "Wired".to_string(), count: 2 },
                GroupCount { name: "BBC News".to_string(), count: 1 },
            ]
        );
        assert_eq!(stats.by_category[0], GroupCount { name: "Technology".to_string(), count: 2 });
    }
}
