use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub published_at: DateTime<Utc>,
    pub platforms: Vec<String>,
    pub lang: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalLink {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub tags: String,
    pub created_at: DateTime<Utc>,
}

/// Title/url pair handed out by the internal-link sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub title: String,
    pub url: String,
}
