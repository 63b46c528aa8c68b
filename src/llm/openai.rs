//! OpenAI chat-completions summarizer.
//!
//! Implements the `Summarizer` trait against the OpenAI Chat
//! Completions API (and compatible endpoints). Retries throttles and
//! server errors with exponential backoff; everything else fails fast
//! so the caller can fall back to template-only copy.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Summarizer;
use crate::types::OiAlertEvent;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 256;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;

const COMMENTARY_SYSTEM: &str = "You are a derivatives-market analyst. Given a \
confirmed open-interest move, write one or two short factual sentences of \
context. No advice, no hype, no emojis, no hashtags. Plain prose only.";

const TRANSLATE_SYSTEM: &str = "You translate short market alerts. Preserve \
tickers, numbers, percent signs and emojis exactly. Reply with the \
translation only.";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiSummarizer {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiSummarizer {
    pub fn new(api_key: String, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    /// Render the event into a compact prompt line.
    fn build_commentary_prompt(event: &OiAlertEvent) -> String {
        let mut parts = vec![format!(
            "{} {} open interest {} {:+.1}% over {}",
            event.symbol,
            event.market,
            if event.direction == crate::types::Direction::Down {
                "fell"
            } else {
                "rose"
            },
            event.oi_change_pct,
            event.interval,
        )];

        if let Some(oi) = event.oi_usd {
            parts.push(format!("current OI ${:.0}", oi));
        }
        if let Some(p) = event.price_change_24h_pct {
            parts.push(format!("price 24h {p:+.1}%"));
        }
        if let Some(r) = event.oi_mcap_ratio {
            parts.push(format!("OI/mcap {r:.3}"));
        }

        parts.join(", ")
    }

    async fn call_api(&self, system: &str, user_message: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(OPENAI_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenAI response")?;

                        let text = body
                            .choices
                            .first()
                            .and_then(|c| c.message.as_ref())
                            .map(|m| m.content.trim().to_string())
                            .unwrap_or_default();

                        if text.is_empty() {
                            anyhow::bail!("OpenAI returned an empty completion");
                        }
                        return Ok(text);
                    }

                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable OpenAI error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenAI API error {status}: {error_text}");
                }
                Err(e) => {
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "OpenAI API failed after {MAX_RETRIES} retries: {}",
            last_error.unwrap_or_default()
        )
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn commentary(&self, event: &OiAlertEvent) -> Result<String> {
        let prompt = Self::build_commentary_prompt(event);
        debug!(event_id = %event.event_id, model = %self.model, "Requesting alert commentary");
        self.call_api(COMMENTARY_SYSTEM, &prompt).await
    }

    async fn translate(&self, text: &str, locale: &str) -> Result<String> {
        if locale.eq_ignore_ascii_case("en") {
            return Ok(text.to_string());
        }
        let prompt = format!("Translate into locale '{locale}':\n\n{text}");
        self.call_api(TRANSLATE_SYSTEM, &prompt).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
