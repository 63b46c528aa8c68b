//! Coinalyze derivatives-data integration.
//!
//! Implements `MarketDataProvider` against the Coinalyze REST API:
//! current open interest (USD-converted) per venue, last price with a
//! 24h change, and a volume-ranked symbol listing for the top-N ticker
//! set. We only deserialize the fields we need.
//!
//! Rate limit: the free tier throttles aggressively; 429 responses are
//! surfaced as `ProviderError::RateLimited` so candidacy survives them.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{MarketDataProvider, ProviderError, VenueSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.coinalyze.net/v1";
const PROVIDER_NAME: &str = "coinalyze";

/// Venue preferred as the representative price source when present.
const PRIMARY_VENUE: &str = "binance";
/// Quote asset preferred on the primary venue.
const PRIMARY_QUOTE: &str = "USDT";

// ---------------------------------------------------------------------------
// API response types (Coinalyze JSON → Rust)
// ---------------------------------------------------------------------------

/// One row of `/open-interest?convert_to_usd=true`, joined client-side
/// with price data. One row per (venue, quote) contract.
#[derive(Debug, Deserialize)]
struct OiRow {
    /// Vendor symbol code, e.g. "BTCUSDT_PERP.A".
    symbol: String,
    /// OI in USD when `convert_to_usd` is set.
    value: f64,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    quote_asset: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    /// Vendor 24h OI change percent.
    #[serde(default)]
    change_24h: Option<f64>,
    /// Vendor 24h price change percent.
    #[serde(default)]
    price_change_24h: Option<f64>,
    #[serde(default)]
    market_cap_usd: Option<f64>,
}

/// One row of `/future-markets`, used for the volume ranking.
#[derive(Debug, Deserialize)]
struct MarketRow {
    #[serde(default)]
    base_asset: Option<String>,
    #[serde(default)]
    volume_24h_usd: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Coinalyze REST client.
pub struct CoinalyzeClient {
    http: Client,
    api_key: String,
}

impl CoinalyzeClient {
    /// Create a new client. `timeout_secs` bounds every call so a slow
    /// vendor can never stall a scan cycle past its interval.
    pub fn new(api_key: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("SENTINEL/0.1.0 (oi-alert-agent)")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build Coinalyze HTTP client: {e}"))?;

        Ok(Self { http, api_key })
    }

    /// GET a Coinalyze endpoint and decode the JSON body, mapping HTTP
    /// failures onto the provider error taxonomy.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{BASE_URL}{path}?{query}");
        debug!(url = %url, "Coinalyze request");

        let resp = self
            .http
            .get(&url)
            .header("api_key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(url = %url, "Coinalyze rate limit hit");
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// Convert API rows for one symbol into venue snapshots, dropping
    /// rows without a usable OI value.
    fn to_snapshots(rows: Vec<OiRow>) -> Vec<VenueSnapshot> {
        rows.into_iter()
            .filter(|r| r.value > 0.0)
            .map(|r| VenueSnapshot {
                venue: r
                    .exchange
                    .unwrap_or_else(|| Self::venue_from_code(&r.symbol)),
                quote_asset: r.quote_asset.unwrap_or_else(|| PRIMARY_QUOTE.to_string()),
                oi_usd: r.value,
                price: r.price.unwrap_or(0.0),
                oi_change_24h_pct: r.change_24h,
                price_change_24h_pct: r.price_change_24h,
                market_cap_usd: r.market_cap_usd,
            })
            .collect()
    }

    /// Coinalyze symbol codes carry the venue as a suffix letter
    /// ("BTCUSDT_PERP.A" → exchange code "A"). Fall back to the code
    /// itself when the shape is unexpected.
    fn venue_from_code(code: &str) -> String {
        match code.rsplit_once('.') {
            Some((_, suffix)) if suffix.eq_ignore_ascii_case("a") => PRIMARY_VENUE.to_string(),
            Some((_, suffix)) => suffix.to_lowercase(),
            None => code.to_lowercase(),
        }
    }
}

// ---------------------------------------------------------------------------
// MarketDataProvider implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketDataProvider for CoinalyzeClient {
    async fn snapshot(&self, symbol: &str) -> Result<Vec<VenueSnapshot>, ProviderError> {
        let query = format!(
            "symbols={}&convert_to_usd=true",
            urlencoding::encode(symbol),
        );
        let rows: Vec<OiRow> = self.get_json("/open-interest", &query).await?;

        let snapshots = Self::to_snapshots(rows);
        debug!(
            symbol,
            venues = snapshots.len(),
            "Coinalyze snapshot fetched"
        );
        Ok(snapshots)
    }

    async fn top_symbols(&self, n: u32) -> Result<Vec<String>, ProviderError> {
        let rows: Vec<MarketRow> = self.get_json("/future-markets", "").await?;

        // Rank by the vendor's 24h USD volume, dedupe base assets while
        // keeping rank order.
        let mut ranked: Vec<(String, f64)> = rows
            .into_iter()
            .filter_map(|r| {
                let base = r.base_asset?;
                Some((base.to_uppercase(), r.volume_24h_usd.unwrap_or(0.0)))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = std::collections::HashSet::new();
        let top: Vec<String> = ranked
            .into_iter()
            .filter(|(base, _)| seen.insert(base.clone()))
            .take(n as usize)
            .map(|(base, _)| base)
            .collect();

        debug!(requested = n, returned = top.len(), "Coinalyze top symbols");
        Ok(top)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
