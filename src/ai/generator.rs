use std::sync::Arc;
use std::time::Duration;

use crate::models::GeneratedArticle;
use crate::services::affiliate_block;

use super::backend::GenerationBackend;
use super::prompt::build_prompt;

pub const DEFAULT_CATEGORY: &str = "未分類";

/// Turns a feed item into article HTML, retrying the backend a fixed number
/// of times with a fixed pause in between.
pub struct ContentGenerator {
    backend: Arc<dyn GenerationBackend>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ContentGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Returns `None` once every attempt has failed; never errors.
    pub async fn generate_article(
        &self,
        title: &str,
        summary: &str,
        lang: &str,
        style: &str,
        category_hint: Option<&str>,
    ) -> Option<GeneratedArticle> {
        let prompt = build_prompt(title, summary, lang, style);

        let Some(body) = self.generate_with_retry(&prompt).await else {
            tracing::error!(
                "Article generation failed after {} attempts: {}",
                self.max_attempts,
                title
            );
            return None;
        };

        let category = category_hint
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        let mut html_body = body;
        html_body.push('\n');
        html_body.push_str(&affiliate_block(title, category_hint.unwrap_or_default()));

        Some(GeneratedArticle {
            title: title.to_string(),
            html_body,
            category,
        })
    }

    async fn generate_with_retry(&self, prompt: &str) -> Option<String> {
        for attempt in 1..=self.max_attempts {
            match self.backend.generate(prompt).await {
                Ok(text) => {
                    let body = strip_code_fence(&text);
                    if !body.is_empty() {
                        return Some(body.to_string());
                    }
                    tracing::warn!("Generation attempt {} returned no text", attempt);
                }
                Err(e) => {
                    tracing::warn!("Generation attempt {} failed: {}", attempt, e);
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        None
    }
}

/// Removes a surrounding Markdown code fence (```` ```html ... ``` ````), if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("html") on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
