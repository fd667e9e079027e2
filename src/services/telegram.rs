use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::GeneratedArticle;

use super::publisher::Channel;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Broadcasts a short announcement to a Telegram channel. The bot must be an
/// admin of the channel.
pub struct TelegramChannel {
    client: Client,
    bot_token: String,
    channel_id: String,
    base_url: String,
}

impl TelegramChannel {
    pub fn new(bot_token: String, channel_id: String) -> Result<Self> {
        Self::with_base_url(bot_token, channel_id, TELEGRAM_API_URL.to_string())
    }

    pub fn with_base_url(bot_token: String, channel_id: String, base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            bot_token,
            channel_id,
            base_url,
        })
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let params = [
            ("chat_id", self.channel_id.as_str()),
            ("text", text),
            ("parse_mode", "HTML"),
        ];

        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.base_url, self.bot_token))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::TelegramApi(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(())
    }
}

/// Bold title followed by the source link, in Telegram's HTML subset.
fn announcement(article: &GeneratedArticle, source_link: &str) -> String {
    let mut text = format!("<b>{}</b>", escape_html(&article.title));
    if !article.category.is_empty() {
        text.push_str(&format!(" #{}", escape_html(&article.category)));
    }
    if !source_link.is_empty() {
        text.push_str("\n\n");
        text.push_str(&escape_html(source_link));
    }
    text
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn publish(&self, article: &GeneratedArticle, source_link: &str) -> bool {
        match self.send_message(&announcement(article, source_link)).await {
            Ok(()) => {
                tracing::info!("Published to Telegram: {}", article.title);
                true
            }
            Err(e) => {
                tracing::error!("Failed to publish to Telegram: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Form, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn send_message_handler(
        State(received): State<Received>,
        Form(form): Form<HashMap<String, String>>,
    ) -> StatusCode {
        received.lock().expect("lock").push(form);
        StatusCode::OK
    }

    async fn spawn_test_server(received: Received) -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route("/botgood-token/sendMessage", post(send_message_handler))
            .with_state(received);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}"), join_handle)
    }

    fn article() -> GeneratedArticle {
        GeneratedArticle {
            title: "Fish & chips <review>".into(),
            html_body: "<p>X</p>".into(),
            category: "food".into(),
        }
    }

    #[tokio::test]
    async fn publish_posts_form_to_bot_api() {
        let received = Received::default();
        let (base_url, server_task) = spawn_test_server(received.clone()).await;
        let channel =
            TelegramChannel::with_base_url("good-token".into(), "@mychannel".into(), base_url)
                .expect("client must build");

        assert!(channel.publish(&article(), "https://source.example/a").await);

        let forms = received.lock().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0]["chat_id"], "@mychannel");
        assert_eq!(forms[0]["parse_mode"], "HTML");
        assert!(forms[0]["text"].starts_with("<b>Fish &amp; chips &lt;review&gt;</b> #food"));
        assert!(forms[0]["text"].ends_with("https://source.example/a"));

        server_task.abort();
    }

    #[tokio::test]
    async fn non_success_status_reports_failure() {
        let (base_url, server_task) = spawn_test_server(Received::default()).await;
        let channel =
            TelegramChannel::with_base_url("bad-token".into(), "@mychannel".into(), base_url)
                .expect("client must build");

        // Unknown route answers 404
        assert!(!channel.publish(&article(), "").await);

        server_task.abort();
    }

    #[tokio::test]
    async fn transport_error_reports_failure() {
        let channel = TelegramChannel::with_base_url(
            "good-token".into(),
            "@mychannel".into(),
            "http://127.0.0.1:9".into(),
        )
        .expect("client must build");
        assert!(!channel.publish(&article(), "").await);
    }
}
