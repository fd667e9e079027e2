use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::GeneratedArticle;

use super::publisher::Channel;

const SMTP_RELAY: &str = "smtp.gmail.com";

struct MailAccount {
    user: String,
    app_password: String,
    blogger_email: String,
}

/// Publishes through Blogger's "post by email" address, sending from a Gmail
/// account over implicit-TLS SMTP.
pub struct BloggerEmailChannel {
    account: Option<MailAccount>,
}

impl BloggerEmailChannel {
    pub fn new(user: Option<String>, app_password: Option<String>, blogger_email: Option<String>) -> Self {
        let account = match (user, app_password, blogger_email) {
            (Some(user), Some(app_password), Some(blogger_email)) => Some(MailAccount {
                user,
                app_password,
                blogger_email,
            }),
            _ => None,
        };
        Self { account }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gmail_user.clone(),
            config.gmail_app_password.clone(),
            config.blogger_email.clone(),
        )
    }

    async fn send(&self, account: &MailAccount, article: &GeneratedArticle) -> Result<()> {
        let message = build_message(account, article)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(SMTP_RELAY)
            .map_err(|e| AppError::Mail(e.to_string()))?
            .credentials(Credentials::new(
                account.user.clone(),
                account.app_password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;
        Ok(())
    }
}

fn build_message(account: &MailAccount, article: &GeneratedArticle) -> Result<Message> {
    let from = account
        .user
        .parse::<Mailbox>()
        .map_err(|e| AppError::Mail(format!("invalid sender {}: {}", account.user, e)))?;
    let to = account
        .blogger_email
        .parse::<Mailbox>()
        .map_err(|e| AppError::Mail(format!("invalid recipient {}: {}", account.blogger_email, e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(format!("{} #{}", article.title, article.category))
        .header(ContentType::TEXT_HTML)
        .body(article.html_body.clone())
        .map_err(|e| AppError::Mail(e.to_string()))
}

#[async_trait]
impl Channel for BloggerEmailChannel {
    fn name(&self) -> &'static str {
        "blogger"
    }

    async fn publish(&self, article: &GeneratedArticle, _source_link: &str) -> bool {
        let Some(account) = &self.account else {
            tracing::error!("Gmail or Blogger email not configured.");
            return false;
        };

        match self.send(account, article).await {
            Ok(()) => {
                tracing::info!("Published to Blogger via email: {}", article.title);
                true
            }
            Err(e) => {
                tracing::error!("Failed to publish to Blogger: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> GeneratedArticle {
        GeneratedArticle {
            title: "Night market opens".into(),
            html_body: "<p>Body</p>".into(),
            category: "food".into(),
        }
    }

    #[tokio::test]
    async fn missing_credentials_report_failure() {
        let channel = BloggerEmailChannel::new(Some("me@gmail.com".into()), None, None);
        assert!(!channel.publish(&article(), "").await);
    }

    #[test]
    fn message_carries_category_in_subject() {
        let account = MailAccount {
            user: "me@gmail.com".into(),
            app_password: "secret".into(),
            blogger_email: "me.secret123@blogger.com".into(),
        };
        let message = build_message(&account, &article()).expect("message must build");
        let raw = String::from_utf8(message.formatted()).expect("utf8");

        assert!(raw.contains("Subject: Night market opens #food"));
        assert!(raw.contains("To: me.secret123@blogger.com"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn invalid_address_is_a_mail_error() {
        let account = MailAccount {
            user: "not an address".into(),
            app_password: "secret".into(),
            blogger_email: "me.secret123@blogger.com".into(),
        };
        assert!(matches!(build_message(&account, &article()), Err(AppError::Mail(_))));
    }
}
