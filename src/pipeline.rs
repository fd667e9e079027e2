use std::sync::Arc;

use chrono::Utc;

use crate::ai::{ContentGenerator, GeminiBackend, GenerationBackend};
use crate::config::{Config, FeedConfig};
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{FeedFetcher, FeedSource};
use crate::models::{FeedItem, GeneratedArticle, LinkRef};
use crate::services::{HttpImageBackend, ImageBackend, ImageCache, Publisher};
use crate::utils::{hash_text, make_slug};

pub const LAST_RUN_KEY: &str = "last_run_at";
const RELATED_LINK_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    pub skipped: usize,
    pub generation_failed: usize,
    pub publish_failed: usize,
    pub published: usize,
}

/// fetch → check → generate → publish → record, one item at a time.
pub struct Pipeline {
    repository: Repository,
    source: Box<dyn FeedSource>,
    generator: Option<ContentGenerator>,
    publisher: Publisher,
    images: Option<ImageCache>,
    feeds: Vec<FeedConfig>,
    max_entries: usize,
    lang: String,
    style: String,
    site_url: Option<String>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        repository: Repository,
        source: Box<dyn FeedSource>,
        generator: Option<ContentGenerator>,
        publisher: Publisher,
        images: Option<ImageCache>,
    ) -> Self {
        Self {
            repository,
            source,
            generator,
            publisher,
            images,
            feeds: config.feeds.clone(),
            max_entries: config.max_entries,
            lang: config.lang.clone(),
            style: config.style.clone(),
            site_url: config.site_url.clone(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let source = Box::new(FeedFetcher::new()?);

        let generator = match &config.google_api_key {
            Some(key) => {
                let backend: Arc<dyn GenerationBackend> =
                    Arc::new(GeminiBackend::new(key.clone(), config.gemini_model.clone())?);
                Some(ContentGenerator::new(
                    backend,
                    config.generation_attempts,
                    config.retry_delay(),
                ))
            }
            None => None,
        };

        let images = match &config.image_api_url {
            Some(endpoint) => {
                let backend: Arc<dyn ImageBackend> = Arc::new(HttpImageBackend::new(
                    endpoint.clone(),
                    config.image_api_key.clone(),
                )?);
                Some(ImageCache::new(repository.clone(), backend))
            }
            None => None,
        };

        let publisher = Publisher::from_config(config)?;

        Ok(Self::new(config, repository, source, generator, publisher, images))
    }

    /// One pass over every configured feed. Storage errors abort the pass;
    /// generation and publishing failures only skip the affected item.
    pub async fn run_once(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();

        let Some(generator) = &self.generator else {
            tracing::error!("GOOGLE_API_KEY not configured, skipping run.");
            return Ok(stats);
        };

        if self.feeds.is_empty() {
            tracing::warn!("No feeds configured.");
        }

        for feed in &self.feeds {
            let items = self.source.fetch(&feed.url, self.max_entries).await;
            stats.fetched += items.len();

            for item in &items {
                self.process_item(generator, feed, item, &mut stats).await?;
            }
        }

        self.repository
            .set_setting(LAST_RUN_KEY, &Utc::now().to_rfc3339())
            .await?;

        tracing::info!(
            "Run finished: {} fetched, {} published, {} skipped, {} generation failures, {} publish failures",
            stats.fetched,
            stats.published,
            stats.skipped,
            stats.generation_failed,
            stats.publish_failed
        );
        Ok(stats)
    }

    async fn process_item(
        &self,
        generator: &ContentGenerator,
        feed: &FeedConfig,
        item: &FeedItem,
        stats: &mut RunStats,
    ) -> Result<()> {
        if item.id.is_empty() {
            tracing::warn!("Skipping feed item without id, link or title from {}", feed.url);
            stats.skipped += 1;
            return Ok(());
        }

        if self.repository.is_posted(&item.id).await? {
            tracing::debug!("Already posted: {}", item.id);
            stats.skipped += 1;
            return Ok(());
        }

        let Some(mut article) = generator
            .generate_article(
                &item.title,
                &item.summary,
                &self.lang,
                &self.style,
                feed.category.as_deref(),
            )
            .await
        else {
            stats.generation_failed += 1;
            return Ok(());
        };

        self.decorate(&mut article).await?;

        let report = self.publisher.publish(&article, &item.link).await;
        if !report.any_succeeded() {
            tracing::error!("Publishing failed on every channel: {}", article.title);
            stats.publish_failed += 1;
            return Ok(());
        }
        if !report.all_succeeded() {
            tracing::warn!(
                "Partially published {} (succeeded: {:?})",
                article.title,
                report.succeeded()
            );
        }

        let slug = make_slug(&article.title);
        self.repository
            .mark_posted(
                &item.id,
                &article.title,
                &slug,
                &report.succeeded(),
                &self.lang,
                &hash_text(&article.html_body),
            )
            .await?;

        if let Some(site_url) = &self.site_url {
            let url = format!("{}/{}", site_url.trim_end_matches('/'), slug);
            self.repository
                .add_internal_link(&article.title, &url, &article.category)
                .await?;
        }

        tracing::info!("Posted: {}", article.title);
        stats.published += 1;
        Ok(())
    }

    /// Cover image on top, related posts at the bottom.
    async fn decorate(&self, article: &mut GeneratedArticle) -> Result<()> {
        if let Some(images) = &self.images {
            let prompt = format!(
                "Blog cover illustration for \"{}\" ({})",
                article.title, article.category
            );
            if let Some(url) = images.get_or_generate(&prompt).await? {
                article.html_body = format!(
                    "<p><img src=\"{}\" alt=\"{}\"></p>\n{}",
                    escape_attr(&url),
                    escape_attr(&article.title),
                    article.html_body
                );
            }
        }

        let related = self
            .repository
            .sample_internal_links(RELATED_LINK_COUNT)
            .await?;
        if !related.is_empty() {
            article.html_body.push('\n');
            article.html_body.push_str(&related_links_block(&related));
        }
        Ok(())
    }
}

fn related_links_block(links: &[LinkRef]) -> String {
    let items: String = links
        .iter()
        .map(|link| {
            format!(
                "<li><a href=\"{}\">{}</a></li>",
                escape_attr(&link.url),
                escape_html(&link.title)
            )
        })
        .collect();
    format!("<div class=\"related-posts\"><h3>延伸閱讀</h3><ul>{}</ul></div>", items)
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
