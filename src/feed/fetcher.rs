use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;

use crate::error::Result;
use crate::models::FeedItem;

// Wide enough that html2text doesn't hard-wrap summaries before they reach the prompt
const SUMMARY_TEXT_WIDTH: usize = 1000;

/// Pull-based source of candidate items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// At most `max_entries` items in feed order. Never fails: an unreachable or
    /// malformed feed yields an empty list.
    async fn fetch(&self, url: &str, max_entries: usize) -> Vec<FeedItem>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("autopost/1.0")
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, url: &str, max_entries: usize) -> Result<Vec<FeedItem>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_items(&bytes, max_entries)
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str, max_entries: usize) -> Vec<FeedItem> {
        match self.fetch_feed(url, max_entries).await {
            Ok(items) => {
                tracing::info!("Fetched {} items from {}", items.len(), url);
                items
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                Vec::new()
            }
        }
    }
}

/// Parses an RSS/Atom/JSON feed body into at most `max_entries` items.
pub fn parse_items(raw: &[u8], max_entries: usize) -> Result<Vec<FeedItem>> {
    // Leave missing ids empty: feed-rs would otherwise hash or randomize them
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(raw)?;

    let items = feed
        .entries
        .into_iter()
        .take(max_entries)
        .map(|entry| {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();

            // Summary first, then fall back to the content body
            let summary_html = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            let id = [entry.id.as_str(), link.as_str(), title.as_str()]
                .into_iter()
                .map(str::trim)
                .find(|candidate| !candidate.is_empty())
                .unwrap_or_default()
                .to_string();

            FeedItem {
                id,
                title,
                link,
                summary: html_to_text(&summary_html),
            }
        })
        .collect();

    Ok(items)
}

fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    match html2text::from_read(html.as_bytes(), SUMMARY_TEXT_WIDTH) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::debug!("Failed to convert summary HTML to text: {}", e);
            html.to_string()
        }
    }
}
