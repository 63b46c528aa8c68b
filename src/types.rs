//! Shared types for the SENTINEL agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that market, engine, and
//! notification modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Windows & direction
// ---------------------------------------------------------------------------

/// The three sampling windows derived per symbol.
///
/// Serialized as its label ("1h" / "4h" / "24h") so configs and stored
/// records stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// 1 hour.
    Short,
    /// 4 hours.
    Medium,
    /// 24 hours.
    Long,
}

impl Window {
    /// Window length in hours.
    pub fn hours(&self) -> f64 {
        match self {
            Window::Short => 1.0,
            Window::Medium => 4.0,
            Window::Long => 24.0,
        }
    }

    /// Human label used in keys, events and alert copy.
    pub fn label(&self) -> &'static str {
        match self {
            Window::Short => "1h",
            Window::Medium => "4h",
            Window::Long => "24h",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Window {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" | "1h" => Ok(Window::Short),
            "medium" | "4h" => Ok(Window::Medium),
            "long" | "24h" => Ok(Window::Long),
            _ => Err(anyhow::anyhow!("Unknown window: {s}")),
        }
    }
}

impl Serialize for Window {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Window {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Coarse direction of an open-interest move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Unknown,
}

impl Direction {
    /// Classify from a signed change percentage. `None` and exact zero
    /// both map to `Unknown`.
    pub fn from_change(change_pct: Option<f64>) -> Self {
        match change_pct {
            Some(p) if p > 0.0 => Direction::Up,
            Some(p) if p < 0.0 => Direction::Down,
            _ => Direction::Unknown,
        }
    }

    /// Icon used in alert copy headlines.
    pub fn icon(&self) -> &'static str {
        match self {
            Direction::Up => "📈",
            Direction::Down => "📉",
            Direction::Unknown => "➖",
        }
    }

    /// Stable lowercase token used in event ids and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "unknown" => Ok(Direction::Unknown),
            _ => Err(anyhow::anyhow!("Unknown direction: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan results
// ---------------------------------------------------------------------------

/// Classification of a failed (or degraded) per-symbol scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanErrorKind {
    /// Scan succeeded, metrics are usable.
    None,
    /// Vendor signalled throttling (HTTP 429 equivalent). Transient.
    RateLimit,
    /// No usable snapshot for the symbol this cycle.
    NoData,
    /// Unexpected failure; symbol skipped this cycle.
    Fatal,
}

impl ScanErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanErrorKind::None => "none",
            ScanErrorKind::RateLimit => "rate_limit",
            ScanErrorKind::NoData => "no_data",
            ScanErrorKind::Fatal => "fatal_error",
        }
    }
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScanErrorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ScanErrorKind::None),
            "rate_limit" => Ok(ScanErrorKind::RateLimit),
            "no_data" => Ok(ScanErrorKind::NoData),
            "fatal_error" => Ok(ScanErrorKind::Fatal),
            _ => Err(anyhow::anyhow!("Unknown scan error kind: {s}")),
        }
    }
}

/// One symbol's derived metrics for one scan cycle.
///
/// Created by the scanner, consumed once by the decision engine,
/// then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    /// Current open interest in USD across all aggregated venues.
    pub oi_usd: Option<f64>,
    pub oi_change_1h_pct: Option<f64>,
    pub oi_change_4h_pct: Option<f64>,
    pub oi_change_24h_pct: Option<f64>,
    pub price_change_1h_pct: Option<f64>,
    pub price_change_4h_pct: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    /// OI / market-cap ratio, when market-cap enrichment is available.
    pub oi_mcap_ratio: Option<f64>,
    pub direction: Direction,
    pub at: DateTime<Utc>,
    pub error: ScanErrorKind,
}

impl ScanResult {
    /// An empty result for a symbol that produced no usable snapshot.
    pub fn no_data(symbol: &str) -> Self {
        Self::failed(symbol, ScanErrorKind::NoData)
    }

    /// An empty result carrying an error classification.
    pub fn failed(symbol: &str, error: ScanErrorKind) -> Self {
        ScanResult {
            symbol: symbol.to_string(),
            oi_usd: None,
            oi_change_1h_pct: None,
            oi_change_4h_pct: None,
            oi_change_24h_pct: None,
            price_change_1h_pct: None,
            price_change_4h_pct: None,
            price_change_24h_pct: None,
            oi_mcap_ratio: None,
            direction: Direction::Unknown,
            at: Utc::now(),
            error,
        }
    }

    /// Whether the scan produced usable metrics.
    pub fn is_ok(&self) -> bool {
        self.error == ScanErrorKind::None
    }

    /// OI change percentage for the given window.
    pub fn oi_change(&self, window: Window) -> Option<f64> {
        match window {
            Window::Short => self.oi_change_1h_pct,
            Window::Medium => self.oi_change_4h_pct,
            Window::Long => self.oi_change_24h_pct,
        }
    }

    /// Price change percentage for the given window.
    pub fn price_change(&self, window: Window) -> Option<f64> {
        match window {
            Window::Short => self.price_change_1h_pct,
            Window::Medium => self.price_change_4h_pct,
            Window::Long => self.price_change_24h_pct,
        }
    }

    /// Helper to build a successful test result with sensible defaults.
    pub fn sample(symbol: &str, change_4h_pct: f64) -> Self {
        ScanResult {
            symbol: symbol.to_string(),
            oi_usd: Some(250_000_000.0),
            oi_change_1h_pct: Some(change_4h_pct / 4.0),
            oi_change_4h_pct: Some(change_4h_pct),
            oi_change_24h_pct: Some(change_4h_pct * 6.0),
            price_change_1h_pct: Some(0.4),
            price_change_4h_pct: Some(1.6),
            price_change_24h_pct: Some(9.6),
            oi_mcap_ratio: Some(0.12),
            direction: Direction::from_change(Some(change_4h_pct)),
            at: Utc::now(),
            error: ScanErrorKind::None,
        }
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error {
            ScanErrorKind::None => write!(
                f,
                "{} OI=${:.0} Δ4h={:+.1}% Δ24h={:+.1}% dir={}",
                self.symbol,
                self.oi_usd.unwrap_or(0.0),
                self.oi_change_4h_pct.unwrap_or(0.0),
                self.oi_change_24h_pct.unwrap_or(0.0),
                self.direction,
            ),
            kind => write!(f, "{} <{kind}>", self.symbol),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate state machine
// ---------------------------------------------------------------------------

/// Lifecycle status of a candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    /// Breached the threshold once; awaiting a confirming cycle.
    Candidate,
    /// Confirmed and alerted. Terminal until purged.
    ConfirmedSent,
    /// The breach turned out to be transient. Terminal until purged.
    Dropped,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Candidate => "candidate",
            CandidateStatus::ConfirmedSent => "confirmed_sent",
            CandidateStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(CandidateStatus::Candidate),
            "confirmed_sent" => Ok(CandidateStatus::ConfirmedSent),
            "dropped" => Ok(CandidateStatus::Dropped),
            _ => Err(anyhow::anyhow!("Unknown candidate status: {s}")),
        }
    }
}

/// Persistent per-(symbol, interval) confirmation state.
///
/// Exactly one live record per key. Created on first threshold breach,
/// mutated every cycle that concerns the key, eventually terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub symbol: String,
    /// Interval label, e.g. "4h". Part of the key.
    pub interval: String,
    pub first_detected: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    /// Last OI change percentage observed for this key.
    pub last_change_pct: f64,
    pub status: CandidateStatus,
    /// Incremented on rate-limit errors while still a candidate.
    pub retry_count: u32,
    pub last_error: ScanErrorKind,
    /// Direction at detection time.
    pub direction: Direction,
}

impl CandidateRecord {
    /// Create a fresh candidate on first threshold breach.
    pub fn new(symbol: &str, interval: &str, change_pct: f64, direction: Direction) -> Self {
        let now = Utc::now();
        CandidateRecord {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            first_detected: now,
            last_checked: now,
            last_change_pct: change_pct,
            status: CandidateStatus::Candidate,
            retry_count: 0,
            last_error: ScanErrorKind::None,
            direction,
        }
    }

    /// The storage key: `symbol:interval`.
    pub fn key(&self) -> String {
        candidate_key(&self.symbol, &self.interval)
    }

    /// Whether this record is still awaiting confirmation.
    pub fn is_live(&self) -> bool {
        self.status == CandidateStatus::Candidate
    }

    /// Register a transient vendor throttle against a live candidate.
    pub fn record_rate_limit(&mut self) {
        self.retry_count += 1;
        self.last_error = ScanErrorKind::RateLimit;
        self.last_checked = Utc::now();
    }
}

impl fmt::Display for CandidateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] Δ={:+.1}% {} retries={}",
            self.key(),
            self.status,
            self.last_change_pct,
            self.direction,
            self.retry_count,
        )
    }
}

/// Compose the candidate pool key for a symbol/interval pair.
pub fn candidate_key(symbol: &str, interval: &str) -> String {
    format!("{symbol}:{interval}")
}

// ---------------------------------------------------------------------------
// Alert event
// ---------------------------------------------------------------------------

/// A confirmed open-interest alert, ready for notification fan-out.
///
/// The id is a pure function of (symbol, interval, direction, cooldown
/// time-bucket), which makes re-delivery within the same cooldown
/// bucket idempotent downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OiAlertEvent {
    pub event_id: String,
    pub symbol: String,
    /// Market label for alert copy, e.g. "Binance Perpetuals".
    pub market: String,
    /// Interval label, e.g. "4h".
    pub interval: String,
    pub oi_usd: Option<f64>,
    pub oi_change_pct: f64,
    pub direction: Direction,
    pub detected_at: DateTime<Utc>,
    pub price_change_1h_pct: Option<f64>,
    pub price_change_4h_pct: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub oi_mcap_ratio: Option<f64>,
    /// Free-form metadata: first-detection time, retry count, and any
    /// channel hints (e.g. a news item id for quote-reposting).
    pub metadata: HashMap<String, String>,
}

impl OiAlertEvent {
    /// Compute the deterministic event identifier.
    ///
    /// `hex(sha256(symbol|interval|direction|bucket))[..16]` where
    /// `bucket = floor(detected_at_ms / cooldown_ms)`.
    pub fn compute_id(
        symbol: &str,
        interval: &str,
        direction: Direction,
        detected_at_ms: i64,
        cooldown_ms: i64,
    ) -> String {
        let bucket = detected_at_ms.div_euclid(cooldown_ms.max(1));
        let mut hasher = Sha256::new();
        hasher.update(symbol.as_bytes());
        hasher.update(b"|");
        hasher.update(interval.as_bytes());
        hasher.update(b"|");
        hasher.update(direction.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(bucket.to_be_bytes());
        hex::encode(&hasher.finalize()[..8])
    }

    /// Build a confirmed event from the current scan result and the
    /// candidate's first-detection metadata.
    pub fn from_confirmation(
        result: &ScanResult,
        record: &CandidateRecord,
        market: &str,
        window: Window,
        cooldown: chrono::Duration,
    ) -> Self {
        let change = result.oi_change(window).unwrap_or(record.last_change_pct);
        let detected_at = result.at;
        let event_id = Self::compute_id(
            &result.symbol,
            &record.interval,
            record.direction,
            detected_at.timestamp_millis(),
            cooldown.num_milliseconds(),
        );

        let mut metadata = HashMap::new();
        metadata.insert(
            "first_detected".to_string(),
            record.first_detected.to_rfc3339(),
        );
        metadata.insert("retry_count".to_string(), record.retry_count.to_string());

        OiAlertEvent {
            event_id,
            symbol: result.symbol.clone(),
            market: market.to_string(),
            interval: record.interval.clone(),
            oi_usd: result.oi_usd,
            oi_change_pct: change,
            direction: record.direction,
            detected_at,
            price_change_1h_pct: result.price_change_1h_pct,
            price_change_4h_pct: result.price_change_4h_pct,
            price_change_24h_pct: result.price_change_24h_pct,
            oi_mcap_ratio: result.oi_mcap_ratio,
            metadata,
        }
    }
}

impl fmt::Display for OiAlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} OI {:+.1}% ({})",
            self.event_id,
            self.symbol,
            self.interval,
            self.direction.icon(),
            self.oi_change_pct,
            self.market,
        )
    }
}

// ---------------------------------------------------------------------------
// Cycle statistics
// ---------------------------------------------------------------------------

/// Per-cycle counters. Observability only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_symbols: u64,
    pub scanned_ok: u64,
    pub no_data: u64,
    pub rate_limited: u64,
    pub fatal_errors: u64,
    pub new_candidates: u64,
    pub confirmed_events: u64,
    pub dropped_candidates: u64,
}

impl ScanStats {
    /// Record the error-class of one scan result.
    pub fn record_result(&mut self, result: &ScanResult) {
        self.total_symbols += 1;
        match result.error {
            ScanErrorKind::None => self.scanned_ok += 1,
            ScanErrorKind::RateLimit => self.rate_limited += 1,
            ScanErrorKind::NoData => self.no_data += 1,
            ScanErrorKind::Fatal => self.fatal_errors += 1,
        }
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "symbols={} ok={} no_data={} rate_limited={} fatal={} new={} confirmed={} dropped={}",
            self.total_symbols,
            self.scanned_ok,
            self.no_data,
            self.rate_limited,
            self.fatal_errors,
            self.new_candidates,
            self.confirmed_events,
            self.dropped_candidates,
        )
    }
}

// ---------------------------------------------------------------------------
// Notification results
// ---------------------------------------------------------------------------

/// Per-channel delivery outcome for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub channel: String,
    pub success: bool,
    pub event_id: String,
    /// Channel-native message identifier, when the channel returns one.
    pub native_id: Option<String>,
    /// Channel-native URL of the delivered message, when available.
    pub url: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn ok(
        channel: &str,
        event_id: &str,
        native_id: Option<String>,
        url: Option<String>,
    ) -> Self {
        NotificationResult {
            channel: channel.to_string(),
            success: true,
            event_id: event_id.to_string(),
            native_id,
            url,
            error: None,
        }
    }

    pub fn failed(channel: &str, event_id: &str, error: String) -> Self {
        NotificationResult {
            channel: channel.to_string(),
            success: false,
            event_id: event_id.to_string(),
            native_id: None,
            url: None,
            error: Some(error),
        }
    }
}

impl fmt::Display for NotificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "[{}] delivered {}", self.channel, self.event_id)?;
            if let Some(id) = &self.native_id {
                write!(f, " ({id})")?;
            }
            Ok(())
        } else {
            write!(
                f,
                "[{}] FAILED {}: {}",
                self.channel,
                self.event_id,
                self.error.as_deref().unwrap_or("unknown error"),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SENTINEL.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Notification error ({channel}): {message}")]
    Notify { channel: String, message: String },

    #[error("Summarizer error ({model}): {message}")]
    Summarizer { model: String, message: String },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Window tests --

    #[test]
    fn test_window_hours() {
        assert_eq!(Window::Short.hours(), 1.0);
        assert_eq!(Window::Medium.hours(), 4.0);
        assert_eq!(Window::Long.hours(), 24.0);
    }

    #[test]
    fn test_window_from_str() {
        assert_eq!("4h".parse::<Window>().unwrap(), Window::Medium);
        assert_eq!("medium".parse::<Window>().unwrap(), Window::Medium);
        assert_eq!("1h".parse::<Window>().unwrap(), Window::Short);
        assert_eq!("LONG".parse::<Window>().unwrap(), Window::Long);
        assert!("2d".parse::<Window>().is_err());
    }

    #[test]
    fn test_window_display() {
        assert_eq!(format!("{}", Window::Medium), "4h");
    }

    // -- Direction tests --

    #[test]
    fn test_direction_from_change() {
        assert_eq!(Direction::from_change(Some(12.0)), Direction::Up);
        assert_eq!(Direction::from_change(Some(-3.5)), Direction::Down);
        assert_eq!(Direction::from_change(Some(0.0)), Direction::Unknown);
        assert_eq!(Direction::from_change(None), Direction::Unknown);
    }

    #[test]
    fn test_direction_roundtrip() {
        for d in [Direction::Up, Direction::Down, Direction::Unknown] {
            let parsed: Direction = d.as_str().parse().unwrap();
            assert_eq!(parsed, d);
        }
    }

    // -- ScanErrorKind tests --

    #[test]
    fn test_scan_error_kind_roundtrip() {
        for kind in [
            ScanErrorKind::None,
            ScanErrorKind::RateLimit,
            ScanErrorKind::NoData,
            ScanErrorKind::Fatal,
        ] {
            let parsed: ScanErrorKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("oops".parse::<ScanErrorKind>().is_err());
    }

    // -- ScanResult tests --

    #[test]
    fn test_scan_result_no_data() {
        let r = ScanResult::no_data("BTC");
        assert_eq!(r.error, ScanErrorKind::NoData);
        assert!(r.oi_usd.is_none());
        assert_eq!(r.direction, Direction::Unknown);
        assert!(!r.is_ok());
    }

    #[test]
    fn test_scan_result_window_accessors() {
        let r = ScanResult::sample("ETH", 12.0);
        assert_eq!(r.oi_change(Window::Medium), Some(12.0));
        assert_eq!(r.oi_change(Window::Short), Some(3.0));
        assert_eq!(r.oi_change(Window::Long), Some(72.0));
        assert_eq!(r.price_change(Window::Medium), Some(1.6));
    }

    #[test]
    fn test_scan_result_display() {
        let ok = ScanResult::sample("BTC", 12.0);
        assert!(format!("{ok}").contains("BTC"));
        let bad = ScanResult::failed("DOGE", ScanErrorKind::RateLimit);
        assert!(format!("{bad}").contains("rate_limit"));
    }

    // -- CandidateRecord tests --

    #[test]
    fn test_candidate_new_is_live() {
        let rec = CandidateRecord::new("BTC", "4h", 12.0, Direction::Up);
        assert!(rec.is_live());
        assert_eq!(rec.status, CandidateStatus::Candidate);
        assert_eq!(rec.retry_count, 0);
        assert_eq!(rec.key(), "BTC:4h");
    }

    #[test]
    fn test_candidate_record_rate_limit() {
        let mut rec = CandidateRecord::new("BTC", "4h", 12.0, Direction::Up);
        rec.record_rate_limit();
        rec.record_rate_limit();
        assert_eq!(rec.retry_count, 2);
        assert_eq!(rec.last_error, ScanErrorKind::RateLimit);
        assert!(rec.is_live());
    }

    #[test]
    fn test_candidate_status_roundtrip() {
        for status in [
            CandidateStatus::Candidate,
            CandidateStatus::ConfirmedSent,
            CandidateStatus::Dropped,
        ] {
            let parsed: CandidateStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_candidate_key_format() {
        assert_eq!(candidate_key("SOL", "4h"), "SOL:4h");
    }

    // -- Event id tests --

    #[test]
    fn test_event_id_deterministic() {
        let a = OiAlertEvent::compute_id("BTC", "4h", Direction::Up, 1_700_000_000_000, 3_600_000);
        let b = OiAlertEvent::compute_id("BTC", "4h", Direction::Up, 1_700_000_000_000, 3_600_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_event_id_changes_with_each_input() {
        let base =
            OiAlertEvent::compute_id("BTC", "4h", Direction::Up, 1_700_000_000_000, 3_600_000);
        assert_ne!(
            base,
            OiAlertEvent::compute_id("ETH", "4h", Direction::Up, 1_700_000_000_000, 3_600_000)
        );
        assert_ne!(
            base,
            OiAlertEvent::compute_id("BTC", "1h", Direction::Up, 1_700_000_000_000, 3_600_000)
        );
        assert_ne!(
            base,
            OiAlertEvent::compute_id("BTC", "4h", Direction::Down, 1_700_000_000_000, 3_600_000)
        );
        // Next cooldown bucket
        assert_ne!(
            base,
            OiAlertEvent::compute_id("BTC", "4h", Direction::Up, 1_700_003_600_000, 3_600_000)
        );
    }

    #[test]
    fn test_event_id_stable_within_bucket() {
        // Two timestamps inside the same cooldown bucket give the same id.
        let a = OiAlertEvent::compute_id("BTC", "4h", Direction::Up, 1_700_000_000_000, 3_600_000);
        let b = OiAlertEvent::compute_id("BTC", "4h", Direction::Up, 1_700_000_500_000, 3_600_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_event_from_confirmation() {
        let result = ScanResult::sample("BTC", 11.0);
        let mut record = CandidateRecord::new("BTC", "4h", 12.0, Direction::Up);
        record.retry_count = 1;

        let event = OiAlertEvent::from_confirmation(
            &result,
            &record,
            "Binance Perpetuals",
            Window::Medium,
            chrono::Duration::hours(4),
        );

        assert_eq!(event.symbol, "BTC");
        assert_eq!(event.interval, "4h");
        assert_eq!(event.direction, Direction::Up);
        assert!((event.oi_change_pct - 11.0).abs() < 1e-10);
        assert_eq!(event.metadata.get("retry_count").unwrap(), "1");
        assert!(event.metadata.contains_key("first_detected"));
    }

    #[test]
    fn test_event_display() {
        let result = ScanResult::sample("BTC", 11.0);
        let record = CandidateRecord::new("BTC", "4h", 12.0, Direction::Up);
        let event = OiAlertEvent::from_confirmation(
            &result,
            &record,
            "Binance Perpetuals",
            Window::Medium,
            chrono::Duration::hours(4),
        );
        let display = format!("{event}");
        assert!(display.contains("BTC"));
        assert!(display.contains("📈"));
    }

    // -- ScanStats tests --

    #[test]
    fn test_stats_record_result() {
        let mut stats = ScanStats::default();
        stats.record_result(&ScanResult::sample("A", 1.0));
        stats.record_result(&ScanResult::no_data("B"));
        stats.record_result(&ScanResult::failed("C", ScanErrorKind::RateLimit));
        stats.record_result(&ScanResult::failed("D", ScanErrorKind::Fatal));

        assert_eq!(stats.total_symbols, 4);
        assert_eq!(stats.scanned_ok, 1);
        assert_eq!(stats.no_data, 1);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.fatal_errors, 1);
    }

    #[test]
    fn test_stats_default_all_zero() {
        let stats = ScanStats::default();
        assert_eq!(stats.total_symbols, 0);
        assert_eq!(stats.confirmed_events, 0);
        assert_eq!(stats.dropped_candidates, 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = ScanStats {
            total_symbols: 10,
            scanned_ok: 8,
            confirmed_events: 2,
            ..Default::default()
        };
        let display = format!("{stats}");
        assert!(display.contains("symbols=10"));
        assert!(display.contains("confirmed=2"));
    }

    // -- NotificationResult tests --

    #[test]
    fn test_notification_result_ok() {
        let r = NotificationResult::ok("telegram", "abc123", Some("42".into()), None);
        assert!(r.success);
        assert!(r.error.is_none());
        assert!(format!("{r}").contains("delivered"));
    }

    #[test]
    fn test_notification_result_failed() {
        let r = NotificationResult::failed("twitter", "abc123", "timeout".into());
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("timeout"));
        assert!(format!("{r}").contains("FAILED"));
    }

    // -- SentinelError tests --

    #[test]
    fn test_sentinel_error_display() {
        let e = SentinelError::Provider {
            provider: "coinalyze".to_string(),
            message: "connection timeout".to_string(),
        };
        assert_eq!(
            format!("{e}"),
            "Provider error (coinalyze): connection timeout"
        );

        let e = SentinelError::Notify {
            channel: "telegram".to_string(),
            message: "bad token".to_string(),
        };
        assert!(format!("{e}").contains("telegram"));
    }
}
