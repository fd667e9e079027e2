use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::ai::DEFAULT_GEMINI_MODEL;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Affiliate category hint and blog label for items from this feed.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_style")]
    pub style: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u32,

    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    pub google_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    pub gmail_user: Option<String>,
    pub gmail_app_password: Option<String>,
    pub blogger_email: Option<String>,

    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,

    pub image_api_url: Option<String>,
    pub image_api_key: Option<String>,

    /// Public base URL of the blog; enables recording new posts as internal links.
    pub site_url: Option<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autopost");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("autopost.db").to_string_lossy().to_string()
}

fn default_max_entries() -> usize {
    5
}

fn default_lang() -> String {
    "zh-TW".to_string()
}

fn default_style() -> String {
    "zh_style_1".to_string()
}

fn default_poll_interval() -> u32 {
    60
}

fn default_generation_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            feeds: Vec::new(),
            max_entries: default_max_entries(),
            lang: default_lang(),
            style: default_style(),
            poll_interval_minutes: default_poll_interval(),
            generation_attempts: default_generation_attempts(),
            retry_delay_secs: default_retry_delay(),
            google_api_key: None,
            gemini_model: default_gemini_model(),
            gmail_user: None,
            gmail_app_password: None,
            blogger_email: None,
            telegram_bot_token: None,
            telegram_channel_id: None,
            image_api_url: None,
            image_api_key: None,
            site_url: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `.env` and the process
    /// environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            Config::default()
        };

        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.retain_valid_feeds();

        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autopost")
            .join("config.toml")
    }

    /// Overlays values from an environment lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("AUTOPOST_DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = get("RSS_FEEDS") {
            self.feeds = v
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| FeedConfig {
                    url: url.to_string(),
                    category: None,
                })
                .collect();
        }
        if let Some(v) = get("MAX_ENTRIES") {
            match v.parse() {
                Ok(n) => self.max_entries = n,
                Err(_) => tracing::warn!("Ignoring invalid MAX_ENTRIES: {}", v),
            }
        }
        if let Some(v) = get("POST_LANG") {
            self.lang = v;
        }
        if let Some(v) = get("POST_STYLE") {
            self.style = v;
        }
        if let Some(v) = get("POLL_INTERVAL_MINUTES") {
            match v.parse() {
                Ok(n) => self.poll_interval_minutes = n,
                Err(_) => tracing::warn!("Ignoring invalid POLL_INTERVAL_MINUTES: {}", v),
            }
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini_model = v;
        }

        let secrets: [(&str, &mut Option<String>); 9] = [
            ("GOOGLE_API_KEY", &mut self.google_api_key),
            ("GMAIL_USER", &mut self.gmail_user),
            ("GMAIL_APP_PASSWORD", &mut self.gmail_app_password),
            ("BLOGGER_EMAIL", &mut self.blogger_email),
            ("TELEGRAM_BOT_TOKEN", &mut self.telegram_bot_token),
            ("TELEGRAM_CHANNEL_ID", &mut self.telegram_channel_id),
            ("IMAGE_API_URL", &mut self.image_api_url),
            ("IMAGE_API_KEY", &mut self.image_api_key),
            ("SITE_URL", &mut self.site_url),
        ];
        for (key, slot) in secrets {
            if let Some(v) = get(key) {
                *slot = Some(v);
            }
        }
    }

    /// Drops feeds whose URL doesn't parse as http(s).
    pub fn retain_valid_feeds(&mut self) {
        self.feeds.retain(|feed| match Url::parse(&feed.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => true,
            _ => {
                tracing::warn!("Ignoring invalid feed URL: {}", feed.url);
                false
            }
        });
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_entries, 5);
        assert_eq!(config.generation_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.lang, "zh-TW");
        assert!(config.google_api_key.is_none());
        assert!(config.db_path.ends_with("autopost.db"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: Config = toml::from_str(
            r#"
            db_path = "/tmp/file.db"
            max_entries = 2

            [[feeds]]
            url = "https://food.example/rss"
            category = "food"
            "#,
        )
        .expect("toml must parse");
        assert_eq!(config.feeds[0].category.as_deref(), Some("food"));

        config.apply_env(lookup(&[
            ("AUTOPOST_DB_PATH", "/tmp/env.db"),
            ("MAX_ENTRIES", "7"),
            ("GOOGLE_API_KEY", "key-123"),
            ("TELEGRAM_BOT_TOKEN", "  "),
        ]));

        assert_eq!(config.db_path, "/tmp/env.db");
        assert_eq!(config.max_entries, 7);
        assert_eq!(config.google_api_key.as_deref(), Some("key-123"));
        assert!(config.telegram_bot_token.is_none());
        assert_eq!(config.feeds.len(), 1);
    }

    #[test]
    fn rss_feeds_env_replaces_feed_list() {
        let mut config = Config::default();
        config.apply_env(lookup(&[(
            "RSS_FEEDS",
            "https://a.example/rss, ,ftp://b.example/rss,not a url,https://c.example/atom",
        )]));
        config.retain_valid_feeds();

        let urls: Vec<&str> = config.feeds.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/rss", "https://c.example/atom"]);
    }

    #[test]
    fn invalid_numbers_are_ignored() {
        let mut config = Config::default();
        config.apply_env(lookup(&[("MAX_ENTRIES", "lots"), ("POLL_INTERVAL_MINUTES", "-1")]));
        assert_eq!(config.max_entries, 5);
        assert_eq!(config.poll_interval_minutes, 60);
    }
}
