//! Cycle orchestration.
//!
//! Owns the full select→scan→decide→notify pipeline for one cycle and
//! the periodic retention purge. The orchestrator never aborts a cycle
//! for a per-symbol or per-channel failure; only wholesale faults
//! (storage unavailable) surface as errors, and the caller's loop
//! contains those too.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{DecisionEngine, EngineConfig};
use crate::llm::Summarizer;
use crate::notify::{dispatch_all, AlertCopy, Notifier};
use crate::pool::CandidatePool;
use crate::scanner::Scanner;
use crate::tickers::TickerSource;
use crate::types::{NotificationResult, ScanStats};

/// Purge terminal candidate records every this many cycles.
const PURGE_EVERY_CYCLES: u64 = 24;

/// Summary of one completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub universe_size: usize,
    pub stats: ScanStats,
    pub deliveries: Vec<NotificationResult>,
    pub dry_run: bool,
}

pub struct Orchestrator {
    tickers: TickerSource,
    scanner: Scanner,
    pool: CandidatePool,
    engine_config: EngineConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
    notifiers: Vec<Arc<dyn Notifier>>,
    dry_run: bool,
    retention_days: i64,
    cycle_count: u64,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tickers: TickerSource,
        scanner: Scanner,
        pool: CandidatePool,
        engine_config: EngineConfig,
        summarizer: Option<Arc<dyn Summarizer>>,
        notifiers: Vec<Arc<dyn Notifier>>,
        dry_run: bool,
        retention_days: i64,
    ) -> Self {
        Self {
            tickers,
            scanner,
            pool,
            engine_config,
            summarizer,
            notifiers,
            dry_run,
            retention_days,
            cycle_count: 0,
        }
    }

    /// Candidates currently awaiting confirmation. Used for the
    /// startup log line after state is restored.
    pub async fn live_candidates(&self) -> Result<u64> {
        self.pool.live_count().await
    }

    /// Drop terminal candidate records older than the retention
    /// window. Runs on shutdown and every `PURGE_EVERY_CYCLES` cycles.
    pub async fn purge(&self) -> Result<u64> {
        let purged = self.pool.purge_older_than(self.retention_days).await?;
        if purged > 0 {
            info!(purged, retention_days = self.retention_days, "Purged old candidate records");
        }
        Ok(purged)
    }

    /// Run one full cycle: select the universe, scan it, run the
    /// decision pass, and fan confirmed events out to every channel.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycle_count += 1;
        let cycle_number = self.cycle_count;
        info!(cycle = cycle_number, "Starting cycle");

        // 1. Universe
        let symbols = self.tickers.get_tickers().await;
        let universe_size = symbols.len();
        info!(count = universe_size, "Universe selected");

        // 2. Scan
        let results = self.scanner.scan_all(&symbols).await;

        // 3. Decide
        let engine = DecisionEngine::new(&self.pool, self.engine_config.clone());
        let (events, stats) = engine.process(&results).await?;

        // 4. Notify
        let mut deliveries = Vec::new();
        for event in &events {
            let commentary = self.commentary_for(event).await;
            let copy = AlertCopy::from_event(event, commentary.as_deref());

            if self.dry_run {
                info!(event = %event, text = %copy.fit(4096), "Dry run: alert suppressed");
                continue;
            }

            deliveries.extend(dispatch_all(&self.notifiers, event, &copy).await);
        }

        // 5. Housekeeping
        if cycle_number % PURGE_EVERY_CYCLES == 0 {
            if let Err(e) = self.purge().await {
                warn!(error = %e, "Retention purge failed");
            }
        }

        Ok(CycleReport {
            cycle_number,
            universe_size,
            stats,
            deliveries,
            dry_run: self.dry_run,
        })
    }

    /// Commentary is additive only: a summarizer failure degrades the
    /// alert to template-only copy instead of blocking it.
    async fn commentary_for(&self, event: &crate::types::OiAlertEvent) -> Option<String> {
        let summarizer = self.summarizer.as_ref()?;
        match summarizer.commentary(event).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(event_id = %event.event_id, error = %e, "Commentary failed, sending template copy");
                None
            }
        }
    }
}

/// Log a human-readable cycle summary.
pub fn log_cycle_report(report: &CycleReport) {
    let delivered = report.deliveries.iter().filter(|d| d.success).count();
    let failed = report.deliveries.len() - delivered;
    info!(
        cycle = report.cycle_number,
        universe = report.universe_size,
        stats = %report.stats,
        delivered,
        failed,
        dry_run = report.dry_run,
        "Cycle complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketDataProvider, ProviderError, VenueSnapshot};
    use crate::notify::Notifier;
    use crate::types::{OiAlertEvent, Window};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that always reports the same 4h-equivalent OI change.
    struct FixedProvider {
        change_24h_pct: f64,
    }

    #[async_trait]
    impl MarketDataProvider for FixedProvider {
        async fn snapshot(&self, symbol: &str) -> Result<Vec<VenueSnapshot>, ProviderError> {
            let _ = symbol;
            Ok(vec![VenueSnapshot {
                venue: "binance".to_string(),
                quote_asset: "USDT".to_string(),
                oi_usd: 1_000_000.0,
                price: 100.0,
                oi_change_24h_pct: Some(self.change_24h_pct),
                price_change_24h_pct: Some(1.0),
                market_cap_usd: None,
            }])
        }

        async fn top_symbols(&self, _n: u32) -> Result<Vec<String>, ProviderError> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct RecordingNotifier {
        calls: AtomicUsize,
        texts: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                texts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &OiAlertEvent, copy: &AlertCopy) -> NotificationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.lock().unwrap().push(copy.fit(4096));
            NotificationResult::ok("recording", &event.event_id, None, None)
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    async fn orchestrator_with(
        change_24h_pct: f64,
        notifier: Arc<RecordingNotifier>,
        dry_run: bool,
    ) -> Orchestrator {
        // 72%/24h interpolates to 12% over the 4h window.
        let provider: Arc<dyn MarketDataProvider> = Arc::new(FixedProvider { change_24h_pct });
        let tickers = TickerSource::new(vec!["ALPHA".to_string()], Vec::new(), 0, None);
        let scanner = Scanner::new(provider, 5);
        let pool = CandidatePool::in_memory().await.unwrap();
        let config = EngineConfig {
            threshold_pct: 10.0,
            window: Window::Medium,
            cooldown: chrono::Duration::hours(4),
            market_label: "Perpetual Futures".to_string(),
        };
        Orchestrator::new(
            tickers,
            scanner,
            pool,
            config,
            None,
            vec![notifier],
            dry_run,
            7,
        )
    }

    #[tokio::test]
    async fn test_two_cycles_deliver_exactly_one_alert() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut orch = orchestrator_with(72.0, notifier.clone(), false).await;

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.stats.new_candidates, 1);
        assert!(report.deliveries.is_empty());

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.stats.confirmed_events, 1);
        assert_eq!(report.deliveries.len(), 1);
        assert!(report.deliveries[0].success);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        let texts = notifier.texts.lock().unwrap();
        assert!(texts[0].contains("$ALPHA"));
    }

    #[tokio::test]
    async fn test_quiet_market_never_notifies() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut orch = orchestrator_with(6.0, notifier.clone(), false).await;

        for _ in 0..3 {
            let report = orch.run_cycle().await.unwrap();
            assert!(report.deliveries.is_empty());
        }
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_suppresses_delivery() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut orch = orchestrator_with(72.0, notifier.clone(), true).await;

        orch.run_cycle().await.unwrap();
        let report = orch.run_cycle().await.unwrap();

        // The event confirms but never reaches a channel.
        assert_eq!(report.stats.confirmed_events, 1);
        assert!(report.deliveries.is_empty());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_live_candidates_reflects_pool() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut orch = orchestrator_with(72.0, notifier, false).await;

        assert_eq!(orch.live_candidates().await.unwrap(), 0);
        orch.run_cycle().await.unwrap();
        assert_eq!(orch.live_candidates().await.unwrap(), 1);
    }
}
