//! Market-data provider boundary.
//!
//! Defines the `MarketDataProvider` trait the scanner consumes and the
//! provider-side error taxonomy. The concrete Coinalyze client lives in
//! `coinalyze.rs`; tests substitute deterministic in-memory providers.

pub mod coinalyze;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One venue's current reading for a symbol. A provider may return
/// several rows per symbol (one per trading venue / quote asset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSnapshot {
    /// Venue identifier, e.g. "binance".
    pub venue: String,
    /// Quote asset of the contract, e.g. "USDT".
    pub quote_asset: String,
    /// Current open interest in USD.
    pub oi_usd: f64,
    /// Last traded price.
    pub price: f64,
    /// Vendor-reported 24h OI change percent.
    pub oi_change_24h_pct: Option<f64>,
    /// Vendor-reported 24h price change percent.
    pub price_change_24h_pct: Option<f64>,
    /// Circulating market cap in USD, when the vendor enriches it.
    pub market_cap_usd: Option<f64>,
}

/// Errors a provider can surface. The scanner maps these onto the
/// `ScanErrorKind` taxonomy; nothing here crosses a batch boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Vendor-side throttling (HTTP 429 equivalent). Transient.
    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("provider response decode error: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }
}

/// Abstraction over the market snapshot vendor.
///
/// Implementors fetch current open interest, price, and long-window
/// change metrics, and optionally rank symbols by volume.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Current per-venue snapshots for one symbol. An empty vector
    /// means the vendor knows nothing usable about the symbol.
    async fn snapshot(&self, symbol: &str) -> Result<Vec<VenueSnapshot>, ProviderError>;

    /// The vendor's top-N symbols by its own volume ranking.
    async fn top_symbols(&self, n: u32) -> Result<Vec<String>, ProviderError>;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
