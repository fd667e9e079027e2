use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::GeneratedArticle;

use super::blogger::BloggerEmailChannel;
use super::telegram::TelegramChannel;

/// A single publishing destination.
///
/// Implementations log their own failures and report them as `false`; they
/// never return an error to the caller.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, article: &GeneratedArticle, source_link: &str) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub results: Vec<(&'static str, bool)>,
}

impl PublishReport {
    /// True only when there was at least one channel and every channel succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|(_, ok)| *ok)
    }

    pub fn any_succeeded(&self) -> bool {
        self.results.iter().any(|(_, ok)| *ok)
    }

    pub fn succeeded(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

pub struct Publisher {
    channels: Vec<Box<dyn Channel>>,
}

impl Publisher {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Self {
        Self { channels }
    }

    /// Blogger is always present (it reports failure when unconfigured);
    /// Telegram is added only when both token and channel are set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut channels: Vec<Box<dyn Channel>> = vec![Box::new(BloggerEmailChannel::from_config(config))];

        match (&config.telegram_bot_token, &config.telegram_channel_id) {
            (Some(token), Some(channel)) => {
                channels.push(Box::new(TelegramChannel::new(token.clone(), channel.clone())?));
            }
            _ => tracing::debug!("Telegram not configured, skipping channel"),
        }

        Ok(Self::new(channels))
    }

    /// Attempts every channel, in order, regardless of earlier failures.
    pub async fn publish(&self, article: &GeneratedArticle, source_link: &str) -> PublishReport {
        let mut report = PublishReport::default();
        for channel in &self.channels {
            let ok = channel.publish(article, source_link).await;
            if !ok {
                tracing::warn!("Channel {} failed for: {}", channel.name(), article.title);
            }
            report.results.push((channel.name(), ok));
        }
        report
    }
}
