//! Twitter/X delivery channel.
//!
//! Posts alert copy via the v2 `POST /2/tweets` endpoint. The channel
//! owns two quirks the others don't have: a 280-character ceiling, and
//! an optional locale pass that translates the finished copy through
//! the summarizer before posting. When the event carries a related
//! news-post id in its metadata, the alert goes out as a quote-repost
//! of that post.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AlertCopy, Notifier};
use crate::llm::Summarizer;
use crate::types::{NotificationResult, OiAlertEvent};

const CHANNEL_NAME: &str = "twitter";
const TWEET_LIMIT: usize = 280;
const API_URL: &str = "https://api.x.com/2/tweets";

/// Metadata key carrying the id of a news post to quote.
pub const QUOTE_POST_KEY: &str = "news_post_id";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TweetRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quote_tweet_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    #[serde(default)]
    data: Option<TweetData>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct TwitterNotifier {
    http: Client,
    bearer_token: String,
    locale: String,
    translator: Option<Arc<dyn Summarizer>>,
}

impl TwitterNotifier {
    pub fn new(
        bearer_token: String,
        locale: String,
        translator: Option<Arc<dyn Summarizer>>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build Twitter HTTP client")?;

        Ok(Self {
            http,
            bearer_token,
            locale,
            translator,
        })
    }

    /// Translate the finished copy when a non-English locale is
    /// configured. Translation failures fall back to the English copy.
    async fn localize(&self, text: String) -> String {
        if self.locale.eq_ignore_ascii_case("en") {
            return text;
        }
        let Some(translator) = &self.translator else {
            return text;
        };
        match translator.translate(&text, &self.locale).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(locale = %self.locale, error = %e, "Translation failed, posting English copy");
                text
            }
        }
    }

    async fn post(&self, text: &str, quote_id: Option<&str>) -> Result<String> {
        let request = TweetRequest {
            text,
            quote_tweet_id: quote_id,
        };

        let response = self
            .http
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .json(&request)
            .send()
            .await
            .context("Twitter request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Twitter API error {status}: {body}");
        }

        let body: TweetResponse = response
            .json()
            .await
            .context("Failed to parse Twitter response")?;

        body.data
            .map(|d| d.id)
            .context("Twitter response missing tweet id")
    }
}

#[async_trait]
impl Notifier for TwitterNotifier {
    async fn notify(&self, event: &OiAlertEvent, copy: &AlertCopy) -> NotificationResult {
        let text = copy.fit(TWEET_LIMIT);
        let text = self.localize(text).await;
        // Translation can overrun the ceiling again.
        let text = if text.chars().count() > TWEET_LIMIT {
            text.chars().take(TWEET_LIMIT - 1).chain(['…']).collect()
        } else {
            text
        };

        let quote_id = event.metadata.get(QUOTE_POST_KEY).map(String::as_str);
        debug!(
            event_id = %event.event_id,
            chars = text.chars().count(),
            quoting = quote_id.is_some(),
            "Posting alert tweet"
        );

        match self.post(&text, quote_id).await {
            Ok(tweet_id) => {
                let url = format!("https://x.com/i/status/{tweet_id}");
                NotificationResult::ok(CHANNEL_NAME, &event.event_id, Some(tweet_id), Some(url))
            }
            Err(e) => NotificationResult::failed(CHANNEL_NAME, &event.event_id, format!("{e:#}")),
        }
    }

    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }
}
