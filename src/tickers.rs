//! Ticker-universe selection.
//!
//! Builds the list of symbols to scan each cycle: a fixed "major" set,
//! an optional long-tail set, and — when the vendor ranking can be
//! fetched in time — its top-N symbols by volume. Dynamic retrieval
//! failures degrade to the static lists; `get_tickers` never fails and
//! never returns an empty universe.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::market::MarketDataProvider;

/// Upper bound on the vendor ranking call so a slow provider cannot
/// stall the orchestrator.
const TOP_N_TIMEOUT: Duration = Duration::from_secs(10);

/// Composes the per-cycle symbol universe.
pub struct TickerSource {
    majors: Vec<String>,
    long_tail: Vec<String>,
    top_n: u32,
    provider: Option<Arc<dyn MarketDataProvider>>,
}

impl TickerSource {
    pub fn new(
        majors: Vec<String>,
        long_tail: Vec<String>,
        top_n: u32,
        provider: Option<Arc<dyn MarketDataProvider>>,
    ) -> Self {
        Self {
            majors,
            long_tail,
            top_n,
            provider,
        }
    }

    /// The symbols to scan this cycle, deduplicated, in stable order:
    /// majors first, then long-tail, then any vendor top-N additions.
    pub async fn get_tickers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tickers = Vec::new();

        for symbol in self.majors.iter().chain(self.long_tail.iter()) {
            let symbol = symbol.to_uppercase();
            if seen.insert(symbol.clone()) {
                tickers.push(symbol);
            }
        }

        if self.top_n > 0 {
            match self.fetch_top_n().await {
                Ok(top) => {
                    let before = tickers.len();
                    for symbol in top {
                        let symbol = symbol.to_uppercase();
                        if seen.insert(symbol.clone()) {
                            tickers.push(symbol);
                        }
                    }
                    debug!(
                        added = tickers.len() - before,
                        total = tickers.len(),
                        "Vendor top-N merged into ticker universe"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Top-N retrieval failed, using static ticker list");
                }
            }
        }

        tickers
    }

    /// Time-bounded vendor ranking call.
    async fn fetch_top_n(&self) -> anyhow::Result<Vec<String>> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no provider configured for top-N"))?;

        let top = tokio::time::timeout(TOP_N_TIMEOUT, provider.top_symbols(self.top_n))
            .await
            .map_err(|_| anyhow::anyhow!("top-N query timed out"))??;

        Ok(top)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
