//! Telegram Bot API notifier.

use crate::domain::error::ScannerError;
use crate::ports::notifier_port::NotifierPort;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub const TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, ScannerError> {
        Self::with_api_base(TELEGRAM_API, bot_token, chat_id)
    }

    pub fn with_api_base(
        api_base: &str,
        bot_token: String,
        chat_id: String,
    ) -> Result<Self, ScannerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScannerError::Notify {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }
}

#[async_trait]
impl NotifierPort for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), ScannerError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            // reqwest errors embed the URL, which carries the token.
            .map_err(|e| ScannerError::Notify {
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScannerError::Notify {
                reason: format!("HTTP {}: {}", status, body.trim()),
            });
        }
        Ok(())
    }
}
