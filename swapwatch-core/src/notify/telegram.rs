//! Telegram Bot API adapter for the [`Notifier`] port.

use super::{Notifier, NotifyError};
use async_trait::async_trait;
use serde::Deserialize;

/// Default API host; the daemon's config layer falls back to it when no
/// override is given.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    http: reqwest::Client,
}

impl TelegramNotifier {
    /// The api_base is overridable for local bot-API servers.
    pub fn with_api_base(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, subscriber_id: &str, text: &str) -> Result<(), NotifyError> {
        #[derive(Deserialize)]
        struct SendMessageResponse {
            ok: bool,
            #[serde(default)]
            description: Option<String>,
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response: SendMessageResponse = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "chat_id": subscriber_id, "text": text }))
            .send()
            .await?
            .json()
            .await?;
        if response.ok {
            Ok(())
        } else {
            Err(NotifyError::Rejected(
                response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}
