use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{InternalLink, LinkRef, PostRecord};

use super::schema::SCHEMA;

/// SQLite-backed store for published posts, the image cache, the internal-link
/// pool and free-form settings.
///
/// All statements run on the single background thread owned by the
/// `tokio_rusqlite` connection, so access is serialized without an extra lock.
/// Every method is its own autocommit transaction.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        let repository = Self { conn };
        repository.initialize().await?;
        Ok(repository)
    }

    /// Creates any missing tables. Safe to call on every run.
    pub async fn initialize(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Post operations

    pub async fn is_posted(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let found = conn
                    .query_row("SELECT 1 FROM posts WHERE id = ?1", params![id], |_| Ok(()))
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(exists)
    }

    /// Records a published item, replacing any earlier row with the same id.
    pub async fn mark_posted(
        &self,
        id: &str,
        title: &str,
        slug: &str,
        platforms: &[String],
        lang: &str,
        content_hash: &str,
    ) -> Result<()> {
        let platforms_json = serde_json::to_string(platforms)?;
        let published_at = Utc::now().to_rfc3339();
        let (id, title, slug, lang, content_hash) = (
            id.to_string(),
            title.to_string(),
            slug.to_string(),
            lang.to_string(),
            content_hash.to_string(),
        );

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT OR REPLACE INTO posts (id, title, slug, published_at, platforms, lang, hash)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![id, title, slug, published_at, platforms_json, lang, content_hash],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<PostRecord>> {
        let id = id.to_string();
        let post = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, slug, published_at, platforms, lang, hash FROM posts WHERE id = ?1",
                )?;
                let post = stmt.query_row(params![id], post_from_row).optional()?;
                Ok(post)
            })
            .await?;
        Ok(post)
    }

    // Image cache

    pub async fn find_cached_image(&self, prompt_hash: &str) -> Result<Option<String>> {
        let prompt_hash = prompt_hash.to_string();
        let url = self
            .conn
            .call(move |conn| {
                let url = conn
                    .query_row(
                        "SELECT url FROM images WHERE prompt_hash = ?1",
                        params![prompt_hash],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(url)
            })
            .await?;
        Ok(url)
    }

    pub async fn cache_image(&self, prompt_hash: &str, url: &str) -> Result<()> {
        let (prompt_hash, url) = (prompt_hash.to_string(), url.to_string());
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO images (prompt_hash, url, created_at) VALUES (?1, ?2, ?3)",
                    params![prompt_hash, url, created_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Internal links

    pub async fn add_internal_link(&self, title: &str, url: &str, tags: &str) -> Result<i64> {
        let (title, url, tags) = (title.to_string(), url.to_string(), tags.to_string());
        let created_at = Utc::now().to_rfc3339();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO internal_links (title, url, tags, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![title, url, tags, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Up to `limit` links drawn at random from the whole pool.
    pub async fn sample_internal_links(&self, limit: usize) -> Result<Vec<LinkRef>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let links = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT title, url FROM internal_links ORDER BY RANDOM() LIMIT ?1")?;
                let links = stmt
                    .query_map(params![limit], |row| {
                        Ok(LinkRef {
                            title: row.get(0)?,
                            url: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(links)
            })
            .await?;
        Ok(links)
    }

    pub async fn list_internal_links(&self) -> Result<Vec<InternalLink>> {
        let links = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, url, tags, created_at FROM internal_links ORDER BY id DESC",
                )?;
                let links = stmt
                    .query_map([], internal_link_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(links)
            })
            .await?;
        Ok(links)
    }

    // Settings

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM settings WHERE key = ?1",
                        params![key],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?;
                Ok(value.flatten())
            })
            .await?;
        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 as written by this module (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {}", raw).into(),
        )
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<PostRecord> {
    let platforms: String = row.get(4)?;
    Ok(PostRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        published_at: datetime_column(row, 3)?,
        platforms: serde_json::from_str(&platforms).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
        })?,
        lang: row.get(5)?,
        content_hash: row.get(6)?,
    })
}

fn internal_link_from_row(row: &Row) -> rusqlite::Result<InternalLink> {
    Ok(InternalLink {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        tags: row.get(3)?,
        created_at: datetime_column(row, 4)?,
    })
}
