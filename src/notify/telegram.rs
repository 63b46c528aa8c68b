//! Telegram delivery channel.
//!
//! Sends alert copy to a chat via the Bot API `sendMessage` method.
//! Telegram is roomy enough (4096 chars) that the full copy almost
//! always fits untrimmed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AlertCopy, Notifier};
use crate::types::{NotificationResult, OiAlertEvent};

const CHANNEL_NAME: &str = "telegram";
const MESSAGE_LIMIT: usize = 4096;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            bot_token,
            chat_id,
        })
    }

    async fn send(&self, text: &str) -> Result<i64> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Telegram request failed")?;

        let status = response.status();
        let body: SendMessageResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Telegram response (HTTP {status})"))?;

        if !body.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                body.description.as_deref().unwrap_or("unknown")
            );
        }

        body.result
            .map(|m| m.message_id)
            .context("Telegram response missing message id")
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &OiAlertEvent, copy: &AlertCopy) -> NotificationResult {
        let text = copy.fit(MESSAGE_LIMIT);
        debug!(event_id = %event.event_id, chars = text.chars().count(), "Sending Telegram alert");

        match self.send(&text).await {
            Ok(message_id) => NotificationResult::ok(
                CHANNEL_NAME,
                &event.event_id,
                Some(message_id.to_string()),
                None,
            ),
            Err(e) => NotificationResult::failed(CHANNEL_NAME, &event.event_id, format!("{e:#}")),
        }
    }

    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let notifier = TelegramNotifier::new("123:abc".into(), "-100123".into()).unwrap();
        assert_eq!(notifier.name(), "telegram");
    }

    #[test]
    fn test_response_parsing() {
        let body: SendMessageResponse =
            serde_json::from_str(r#"{"ok":true,"result":{"message_id":42,"date":0}}"#).unwrap();
        assert!(body.ok);
        assert_eq!(body.result.unwrap().message_id, 42);
    }

    #[test]
    fn test_error_response_parsing() {
        let body: SendMessageResponse =
            serde_json::from_str(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
                .unwrap();
        assert!(!body.ok);
        assert_eq!(body.description.as_deref(), Some("Bad Request: chat not found"));
    }
}
