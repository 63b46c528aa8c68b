//! Decision engine — threshold policy and the candidate state machine.
//!
//! Consumes one cycle's scan results, reads and writes the persistent
//! candidate pool, and emits confirmed alert events plus per-cycle
//! statistics. A single threshold breach never alerts: the first breach
//! arms a candidate, the second consecutive breach confirms it
//! (two-phase confirmation). Confirmed keys stay quiet until the
//! retention purge removes them.

use anyhow::Result;
use tracing::{debug, info};

use crate::pool::CandidatePool;
use crate::types::{
    candidate_key, CandidateRecord, CandidateStatus, OiAlertEvent, ScanErrorKind, ScanResult,
    ScanStats, Window,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Threshold policy for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Absolute OI change percent that arms/confirms a candidate.
    pub threshold_pct: f64,
    /// Which window is authoritative for the threshold test.
    pub window: Window,
    /// Cooldown bucket width for event-id idempotence.
    pub cooldown: chrono::Duration,
    /// Market label stamped onto emitted events.
    pub market_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            threshold_pct: 10.0,
            window: Window::Medium,
            cooldown: chrono::Duration::hours(4),
            market_label: "Perpetual Futures".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Applies the threshold policy and candidate state machine to a
/// batch of scan results.
pub struct DecisionEngine<'a> {
    pool: &'a CandidatePool,
    config: EngineConfig,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(pool: &'a CandidatePool, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    /// Process one full cycle's results. Returns the confirmed events
    /// and the cycle statistics.
    pub async fn process(
        &self,
        results: &[ScanResult],
    ) -> Result<(Vec<OiAlertEvent>, ScanStats)> {
        let mut events = Vec::new();
        let mut stats = ScanStats::default();

        for result in results {
            stats.record_result(result);

            if !result.is_ok() {
                self.handle_errored(result).await?;
                continue;
            }

            let change = result.oi_change(self.config.window);
            let breaching = match change {
                // Null never satisfies the threshold test.
                None => false,
                Some(c) => c.abs() >= self.config.threshold_pct,
            };

            if breaching {
                self.handle_breach(result, change, &mut events, &mut stats)
                    .await?;
            } else {
                self.handle_below_threshold(result, &mut stats).await?;
            }
        }

        info!(stats = %stats, events = events.len(), "Decision pass complete");
        Ok((events, stats))
    }

    /// Rate-limited scans preserve candidacy: a live candidate gets its
    /// retry counter bumped instead of being dropped. Other errors
    /// leave state untouched.
    async fn handle_errored(&self, result: &ScanResult) -> Result<()> {
        if result.error != ScanErrorKind::RateLimit {
            return Ok(());
        }

        let key = candidate_key(&result.symbol, self.config.window.label());
        if let Some(mut record) = self.pool.get(&key).await? {
            if record.is_live() {
                record.record_rate_limit();
                self.pool.upsert(&record).await?;
                debug!(
                    key = %key,
                    retries = record.retry_count,
                    "Candidacy preserved across rate limit"
                );
            }
        }
        Ok(())
    }

    /// Below-threshold readings drop a live candidate (the earlier
    /// breach was transient) and are otherwise a no-op.
    async fn handle_below_threshold(
        &self,
        result: &ScanResult,
        stats: &mut ScanStats,
    ) -> Result<()> {
        let key = candidate_key(&result.symbol, self.config.window.label());
        if let Some(record) = self.pool.get(&key).await? {
            if record.is_live() {
                self.pool.mark_dropped(&key).await?;
                stats.dropped_candidates += 1;
                debug!(key = %key, "Candidate dropped (breach was transient)");
            }
        }
        Ok(())
    }

    /// Threshold breaches run the candidate state machine:
    /// no record → arm; live candidate → confirm and emit;
    /// confirmed → suppressed; dropped → re-arm.
    async fn handle_breach(
        &self,
        result: &ScanResult,
        change: Option<f64>,
        events: &mut Vec<OiAlertEvent>,
        stats: &mut ScanStats,
    ) -> Result<()> {
        let interval = self.config.window.label();
        let key = candidate_key(&result.symbol, interval);
        let change_pct = change.unwrap_or(0.0);

        match self.pool.get(&key).await? {
            None => {
                // First breach arms a candidate; no event yet.
                let record =
                    CandidateRecord::new(&result.symbol, interval, change_pct, result.direction);
                self.pool.upsert(&record).await?;
                stats.new_candidates += 1;
                info!(key = %key, change = format!("{change_pct:+.1}%"), "Candidate armed");
            }
            Some(record) if record.is_live() => {
                // Second consecutive breach confirms.
                let event = OiAlertEvent::from_confirmation(
                    result,
                    &record,
                    &self.config.market_label,
                    self.config.window,
                    self.config.cooldown,
                );
                self.pool.mark_sent(&key).await?;
                stats.confirmed_events += 1;
                info!(event = %event, "Candidate confirmed");
                events.push(event);
            }
            Some(record) if record.status == CandidateStatus::Dropped => {
                // A previously transient key re-breaching starts a
                // fresh confirmation cycle.
                let record =
                    CandidateRecord::new(&result.symbol, interval, change_pct, result.direction);
                self.pool.upsert(&record).await?;
                stats.new_candidates += 1;
                info!(key = %key, "Dropped candidate re-armed");
            }
            Some(_confirmed) => {
                // Already alerted; quiet until retention purges the key.
                debug!(key = %key, "Breach suppressed (already confirmed)");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    async fn engine_fixture() -> CandidatePool {
        CandidatePool::in_memory().await.unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[tokio::test]
    async fn test_empty_batch_all_zero() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        let (events, stats) = engine.process(&[]).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(stats.total_symbols, 0);
        assert_eq!(stats.new_candidates, 0);
        assert_eq!(stats.confirmed_events, 0);
    }

    #[tokio::test]
    async fn test_first_breach_arms_without_event() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        let (events, stats) = engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.new_candidates, 1);
        let rec = pool.get("ALPHA:4h").await.unwrap().unwrap();
        assert!(rec.is_live());
        assert_eq!(rec.direction, Direction::Up);
    }

    #[tokio::test]
    async fn test_second_breach_confirms_exactly_one_event() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        let (events, stats) = engine
            .process(&[ScanResult::sample("ALPHA", 11.0)])
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(stats.confirmed_events, 1);
        let event = &events[0];
        assert_eq!(event.symbol, "ALPHA");
        assert_eq!(event.direction, Direction::Up);
        assert!((event.oi_change_pct - 11.0).abs() < 1e-10);

        let rec = pool.get("ALPHA:4h").await.unwrap().unwrap();
        assert_eq!(rec.status, CandidateStatus::ConfirmedSent);
    }

    #[tokio::test]
    async fn test_transient_breach_drops_candidate() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        let (events, stats) = engine
            .process(&[ScanResult::sample("ALPHA", 3.0)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.dropped_candidates, 1);
        let rec = pool.get("ALPHA:4h").await.unwrap().unwrap();
        assert_eq!(rec.status, CandidateStatus::Dropped);
    }

    #[tokio::test]
    async fn test_below_threshold_never_arms() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        let (events, stats) = engine
            .process(&[ScanResult::sample("BETA", 4.0)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.new_candidates, 0);
        assert!(pool.get("BETA:4h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirmed_key_stays_quiet() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        engine
            .process(&[ScanResult::sample("ALPHA", 11.0)])
            .await
            .unwrap();
        // Third breaching cycle inside the same confirmed state.
        let (events, stats) = engine
            .process(&[ScanResult::sample("ALPHA", 14.0)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.confirmed_events, 0);
        assert_eq!(stats.new_candidates, 0);
    }

    #[tokio::test]
    async fn test_dropped_key_rearms() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        engine
            .process(&[ScanResult::sample("ALPHA", 3.0)])
            .await
            .unwrap(); // dropped
        let (events, stats) = engine
            .process(&[ScanResult::sample("ALPHA", 13.0)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.new_candidates, 1);
        assert!(pool.get("ALPHA:4h").await.unwrap().unwrap().is_live());
    }

    #[tokio::test]
    async fn test_rate_limit_preserves_candidacy() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        let (events, stats) = engine
            .process(&[ScanResult::failed("ALPHA", ScanErrorKind::RateLimit)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.rate_limited, 1);
        let rec = pool.get("ALPHA:4h").await.unwrap().unwrap();
        assert!(rec.is_live());
        assert_eq!(rec.retry_count, 1);
        assert_eq!(rec.last_error, ScanErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_rate_limit_without_candidate_is_noop() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        let (events, stats) = engine
            .process(&[ScanResult::failed("GAMMA", ScanErrorKind::RateLimit)])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.rate_limited, 1);
        assert!(pool.get("GAMMA:4h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_data_treated_like_quiet_symbol() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        let (events, stats) = engine
            .process(&[ScanResult::no_data("DELTA")])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(stats.no_data, 1);
        assert!(pool.get("DELTA:4h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_null_change_never_satisfies_threshold() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        let mut result = ScanResult::sample("EPSILON", 12.0);
        result.oi_change_4h_pct = None;

        let (events, stats) = engine.process(&[result]).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(stats.new_candidates, 0);
        assert!(pool.get("EPSILON:4h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_breach_direction_down() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("OMEGA", -15.0)])
            .await
            .unwrap();
        let (events, _) = engine
            .process(&[ScanResult::sample("OMEGA", -12.0)])
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Down);
    }

    #[tokio::test]
    async fn test_worked_example() {
        // threshold=10, interval=4h.
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        // Cycle 1: ALPHA +12% → candidate, no event.
        let (events, _) = engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        assert!(events.is_empty());

        // Cycle 2: ALPHA +11% → exactly one Up event.
        let (events, _) = engine
            .process(&[ScanResult::sample("ALPHA", 11.0)])
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Up);

        // Cycle 3: fresh BETA at +4% → nothing at all.
        let (events, stats) = engine
            .process(&[ScanResult::sample("BETA", 4.0)])
            .await
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(stats.new_candidates, 0);
        assert!(pool.get("BETA:4h").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_event_carries_first_detection_metadata() {
        let pool = engine_fixture().await;
        let engine = DecisionEngine::new(&pool, config());

        engine
            .process(&[ScanResult::sample("ALPHA", 12.0)])
            .await
            .unwrap();
        engine
            .process(&[ScanResult::failed("ALPHA", ScanErrorKind::RateLimit)])
            .await
            .unwrap();
        let (events, _) = engine
            .process(&[ScanResult::sample("ALPHA", 11.0)])
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata.get("retry_count").unwrap(), "1");
        assert!(events[0].metadata.contains_key("first_detected"));
    }
}
