//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, bot tokens) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::Window;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub detection: DetectionConfig,
    pub tickers: TickersConfig,
    pub provider: ProviderConfig,
    pub summarizer: SummarizerConfig,
    pub notifiers: NotifiersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub scan_interval_secs: u64,
    /// Run the full pipeline but log would-be alerts instead of sending.
    #[serde(default)]
    pub dry_run: bool,
    /// Candidate-pool SQLite path.
    pub db_path: String,
    /// Terminal candidate records older than this are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// Absolute OI change percent that arms/confirms a candidate.
    pub threshold_pct: f64,
    /// Which window is authoritative for the threshold test.
    pub window: Window,
    pub cooldown_window_secs: i64,
    /// Market label stamped onto emitted events.
    pub market_label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TickersConfig {
    /// Fixed major symbols, always scanned.
    pub majors: Vec<String>,
    /// Optional fixed long-tail symbols.
    #[serde(default)]
    pub long_tail: Vec<String>,
    /// Also include the vendor's top-N symbols by volume. 0 disables.
    #[serde(default)]
    pub top_n: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub api_key_env: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// Bounded scan fan-out (worker permits).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_provider_timeout() -> u64 {
    15
}

fn default_concurrency() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    pub enabled: bool,
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifiersConfig {
    pub telegram: TelegramConfig,
    pub twitter: TwitterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token_env: String,
    pub chat_id_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    pub enabled: bool,
    pub bearer_token_env: String,
    /// BCP-47 language tag for this account's posts; "en" needs no
    /// translation.
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [agent]
        name = "SENTINEL-001"
        scan_interval_secs = 300
        db_path = "sentinel.db"

        [detection]
        threshold_pct = 10.0
        window = "4h"
        cooldown_window_secs = 14400
        market_label = "Binance Perpetuals"

        [tickers]
        majors = ["BTC", "ETH", "SOL"]
        long_tail = ["DOGE"]
        top_n = 25

        [provider]
        api_key_env = "COINALYZE_API_KEY"

        [summarizer]
        enabled = false
        model = "gpt-4o-mini"
        api_key_env = "OPENAI_API_KEY"

        [notifiers.telegram]
        enabled = true
        bot_token_env = "TELEGRAM_BOT_TOKEN"
        chat_id_env = "TELEGRAM_CHAT_ID"

        [notifiers.twitter]
        enabled = false
        bearer_token_env = "TWITTER_BEARER_TOKEN"
        locale = "ja"
    "#;

    #[test]
    fn test_parse_sample_config() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.agent.name, "SENTINEL-001");
        assert_eq!(cfg.agent.scan_interval_secs, 300);
        assert_eq!(cfg.agent.retention_days, 7); // default
        assert!(!cfg.agent.dry_run); // default

        assert_eq!(cfg.detection.window, Window::Medium);
        assert!((cfg.detection.threshold_pct - 10.0).abs() < 1e-10);

        assert_eq!(cfg.tickers.majors.len(), 3);
        assert_eq!(cfg.tickers.top_n, 25);

        assert_eq!(cfg.provider.concurrency, 5); // default
        assert_eq!(cfg.provider.timeout_secs, 15); // default

        assert!(cfg.notifiers.telegram.enabled);
        assert_eq!(cfg.notifiers.twitter.locale, "ja");
    }

    #[test]
    fn test_parse_rejects_bad_window() {
        let bad = SAMPLE.replace("window = \"4h\"", "window = \"2d\"");
        assert!(toml::from_str::<AppConfig>(&bad).is_err());
    }

    #[test]
    fn test_resolve_env_missing() {
        assert!(AppConfig::resolve_env("SENTINEL_TEST_DEFINITELY_UNSET_VAR").is_err());
    }
}
