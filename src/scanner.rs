//! Per-symbol market scanner.
//!
//! Pulls venue snapshots from the market-data provider and derives the
//! normalized metrics the decision engine consumes: aggregated open
//! interest in USD, OI/price change percentages over the three
//! windows, and a coarse direction. A batch scan runs with bounded
//! concurrency; no single symbol's failure ever aborts a cycle.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::market::{MarketDataProvider, ProviderError, VenueSnapshot};
use crate::types::{Direction, ScanErrorKind, ScanResult, Window};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Venue preferred as the representative price source.
const PRIMARY_VENUE: &str = "binance";
/// Quote asset preferred on the primary venue.
const PRIMARY_QUOTE: &str = "USDT";

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Metrics aggregated across all venue rows for one symbol.
#[derive(Debug, Clone, PartialEq)]
struct Aggregate {
    oi_usd: f64,
    price: f64,
    oi_change_24h_pct: Option<f64>,
    price_change_24h_pct: Option<f64>,
    market_cap_usd: Option<f64>,
}

/// Collapse multi-venue rows into one reading: sum OI, average price
/// across venues that report a positive price, preferring the primary
/// venue/quote pair as the representative price source when present.
fn aggregate(snapshots: &[VenueSnapshot]) -> Option<Aggregate> {
    if snapshots.is_empty() {
        return None;
    }

    let oi_usd: f64 = snapshots.iter().map(|s| s.oi_usd).sum();

    let primary = snapshots
        .iter()
        .find(|s| s.venue == PRIMARY_VENUE && s.quote_asset == PRIMARY_QUOTE && s.price > 0.0);

    let price = match primary {
        Some(p) => p.price,
        None => {
            let priced: Vec<f64> = snapshots
                .iter()
                .map(|s| s.price)
                .filter(|p| *p > 0.0)
                .collect();
            if priced.is_empty() {
                0.0
            } else {
                priced.iter().sum::<f64>() / priced.len() as f64
            }
        }
    };

    let mean_of = |values: Vec<f64>| -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    // For change percentages, the primary venue's reading wins; else a
    // simple mean of whatever venues reported one.
    let oi_change_24h_pct = primary
        .and_then(|p| p.oi_change_24h_pct)
        .or_else(|| mean_of(snapshots.iter().filter_map(|s| s.oi_change_24h_pct).collect()));
    let price_change_24h_pct = primary
        .and_then(|p| p.price_change_24h_pct)
        .or_else(|| {
            mean_of(
                snapshots
                    .iter()
                    .filter_map(|s| s.price_change_24h_pct)
                    .collect(),
            )
        });

    let market_cap_usd = snapshots.iter().find_map(|s| s.market_cap_usd);

    Some(Aggregate {
        oi_usd,
        price,
        oi_change_24h_pct,
        price_change_24h_pct,
        market_cap_usd,
    })
}

/// Derive a shorter-window change from the vendor's 24h change by
/// linear interpolation. An approximation, not a measurement — the
/// vendor only exposes the long window directly, so the shorter
/// windows assume the move was spread evenly across the day.
fn interpolate(pct_24h: Option<f64>, window: Window) -> Option<f64> {
    pct_24h.map(|p| p * window.hours() / Window::Long.hours())
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Scans symbols against the market-data provider.
pub struct Scanner {
    provider: Arc<dyn MarketDataProvider>,
    /// Worker permits for batch scans.
    concurrency: usize,
}

impl Scanner {
    pub fn new(provider: Arc<dyn MarketDataProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
        }
    }

    /// Scan one symbol. Never returns an error: failures are folded
    /// into the result's error classification.
    pub async fn scan_symbol(&self, symbol: &str) -> ScanResult {
        let snapshots = match self.provider.snapshot(symbol).await {
            Ok(s) => s,
            Err(ProviderError::RateLimited) => {
                warn!(symbol, "Provider rate limit during scan");
                return ScanResult::failed(symbol, ScanErrorKind::RateLimit);
            }
            Err(e) => {
                warn!(symbol, error = %e, "Scan failed");
                return ScanResult::failed(symbol, ScanErrorKind::Fatal);
            }
        };

        let agg = match aggregate(&snapshots) {
            Some(a) if a.oi_usd > 0.0 && a.price > 0.0 => a,
            _ => {
                debug!(symbol, "No usable snapshot");
                return ScanResult::no_data(symbol);
            }
        };

        let oi_change_4h = interpolate(agg.oi_change_24h_pct, Window::Medium);

        ScanResult {
            symbol: symbol.to_string(),
            oi_usd: Some(agg.oi_usd),
            oi_change_1h_pct: interpolate(agg.oi_change_24h_pct, Window::Short),
            oi_change_4h_pct: oi_change_4h,
            oi_change_24h_pct: agg.oi_change_24h_pct,
            price_change_1h_pct: interpolate(agg.price_change_24h_pct, Window::Short),
            price_change_4h_pct: interpolate(agg.price_change_24h_pct, Window::Medium),
            price_change_24h_pct: agg.price_change_24h_pct,
            oi_mcap_ratio: agg
                .market_cap_usd
                .filter(|m| *m > 0.0)
                .map(|m| agg.oi_usd / m),
            direction: Direction::from_change(oi_change_4h),
            at: Utc::now(),
            error: ScanErrorKind::None,
        }
    }

    /// Scan a batch of symbols with bounded concurrency. The returned
    /// vector has exactly one result per input symbol; the engine
    /// never sees a partial batch.
    pub async fn scan_all(&self, symbols: &[String]) -> Vec<ScanResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let futures = symbols.iter().map(|symbol| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                match semaphore.acquire().await {
                    Ok(_permit) => self.scan_symbol(symbol).await,
                    // Only possible if the semaphore is closed, which we never do.
                    Err(_) => ScanResult::failed(symbol, ScanErrorKind::Fatal),
                }
            }
        });

        futures::future::join_all(futures).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
