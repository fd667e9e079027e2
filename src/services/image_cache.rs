use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::utils::hash_text;

/// Produces a hosted image URL for a prompt.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    url: Option<String>,
}

/// Generic JSON image endpoint: POST `{"prompt": ...}`, expects `{"url": ...}`.
pub struct HttpImageBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpImageBackend {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
        let mut request = self.client.post(&self.endpoint).json(&ImageRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ImageApi(format!("API error: {}", error_text)));
        }

        let image: ImageResponse = response.json().await?;
        Ok(image.url.filter(|url| !url.is_empty()))
    }
}

/// Get-or-generate for images, keyed by the SHA-256 of the prompt.
pub struct ImageCache {
    repository: Repository,
    backend: Arc<dyn ImageBackend>,
}

impl ImageCache {
    pub fn new(repository: Repository, backend: Arc<dyn ImageBackend>) -> Self {
        Self { repository, backend }
    }

    /// Backend failures are logged and yield `None`; store failures propagate.
    pub async fn get_or_generate(&self, prompt: &str) -> Result<Option<String>> {
        let prompt_hash = hash_text(prompt);
        if let Some(url) = self.repository.find_cached_image(&prompt_hash).await? {
            tracing::info!("Using cached image.");
            return Ok(Some(url));
        }

        let url = match self.backend.generate_image(prompt).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Image generation failed: {}", e);
                None
            }
        };

        if let Some(url) = &url {
            self.repository.cache_image(&prompt_hash, url).await?;
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageBackend for CountingBackend {
        async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(base) => Ok(Some(format!("{}/{}", base, prompt.len()))),
                None => Err(AppError::ImageApi("offline".into())),
            }
        }
    }

    #[tokio::test]
    async fn second_lookup_hits_the_cache() {
        let repository = Repository::new(":memory:").await.unwrap();
        let backend = Arc::new(CountingBackend {
            reply: Some("https://img.example".into()),
            calls: AtomicUsize::new(0),
        });
        let cache = ImageCache::new(repository.clone(), backend.clone());

        let first = cache.get_or_generate("a bowl of ramen").await.unwrap();
        let second = cache.get_or_generate("a bowl of ramen").await.unwrap();

        assert_eq!(first.as_deref(), Some("https://img.example/15"));
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            repository
                .find_cached_image(&hash_text("a bowl of ramen"))
                .await
                .unwrap(),
            first
        );
    }

    #[tokio::test]
    async fn backend_failure_is_not_cached() {
        let repository = Repository::new(":memory:").await.unwrap();
        let backend = Arc::new(CountingBackend {
            reply: None,
            calls: AtomicUsize::new(0),
        });
        let cache = ImageCache::new(repository, backend.clone());

        assert_eq!(cache.get_or_generate("prompt").await.unwrap(), None);
        assert_eq!(cache.get_or_generate("prompt").await.unwrap(), None);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }
}
