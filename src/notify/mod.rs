//! Notification fan-out.
//!
//! Defines the `Notifier` trait, the shared alert-copy model, and the
//! fan-out dispatcher. Channels are independent: one channel failing
//! never blocks another, and per-channel outcomes are collected rather
//! than propagated.

pub mod telegram;
pub mod twitter;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::types::{Direction, NotificationResult, OiAlertEvent};

// ---------------------------------------------------------------------------
// Alert copy
// ---------------------------------------------------------------------------

/// Rendered alert text, split by priority so channels with tight
/// length limits can shed the least important parts first.
#[derive(Debug, Clone)]
pub struct AlertCopy {
    /// The alert itself. Always kept; truncated only as a last resort.
    pub headline: String,
    /// Core numbers: OI value, price moves. First to shrink after
    /// secondary is gone.
    pub primary: String,
    /// Color: OI/mcap ratio, model commentary. First to go.
    pub secondary: String,
}

impl AlertCopy {
    /// Build channel-agnostic copy from an event, with optional model
    /// commentary folded into the secondary block.
    pub fn from_event(event: &OiAlertEvent, commentary: Option<&str>) -> Self {
        let verb = match event.direction {
            Direction::Down => "surged down",
            _ => "surged up",
        };
        let headline = format!(
            "{} ${} {} OI {} {:+.1}% over {}",
            event.direction.icon(),
            event.symbol,
            event.market,
            verb,
            event.oi_change_pct,
            event.interval,
        );

        let mut primary_parts = Vec::new();
        if let Some(oi) = event.oi_usd {
            primary_parts.push(format!("Open interest: {}", format_usd(oi)));
        }
        if let Some(p) = event.price_change_1h_pct {
            primary_parts.push(format!("Price 1h: {p:+.1}%"));
        }
        if let Some(p) = event.price_change_4h_pct {
            primary_parts.push(format!("Price 4h: {p:+.1}%"));
        }
        if let Some(p) = event.price_change_24h_pct {
            primary_parts.push(format!("Price 24h: {p:+.1}%"));
        }

        let mut secondary_parts = Vec::new();
        if let Some(r) = event.oi_mcap_ratio {
            secondary_parts.push(format!("OI/mcap: {r:.3}"));
        }
        if let Some(text) = commentary {
            let text = text.trim();
            if !text.is_empty() {
                secondary_parts.push(text.to_string());
            }
        }

        AlertCopy {
            headline,
            primary: primary_parts.join("\n"),
            secondary: secondary_parts.join("\n"),
        }
    }

    /// Render the copy within `limit` characters, shedding blocks in
    /// reverse priority order: secondary first, then primary, then
    /// truncating the headline itself with an ellipsis.
    pub fn fit(&self, limit: usize) -> String {
        let full = self.join(true, true);
        if char_len(&full) <= limit {
            return full;
        }

        let without_secondary = self.join(true, false);
        if char_len(&without_secondary) <= limit {
            return without_secondary;
        }

        let headline_only = self.join(false, false);
        if char_len(&headline_only) <= limit {
            return headline_only;
        }

        truncate_chars(&headline_only, limit)
    }

    fn join(&self, primary: bool, secondary: bool) -> String {
        let mut out = self.headline.clone();
        if primary && !self.primary.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.primary);
        }
        if secondary && !self.secondary.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.secondary);
        }
        out
    }
}

/// Character count, not byte length. Channel limits are in characters
/// and alert copy carries multi-byte icons.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Hard-truncate to `limit` characters, ending with an ellipsis.
fn truncate_chars(s: &str, limit: usize) -> String {
    if limit == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Compact USD formatting for alert copy: $1.25B, $430.0M, $1,200.
fn format_usd(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("${:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("${:.0}K", value / 1e3)
    } else {
        format!("${value:.0}")
    }
}

// ---------------------------------------------------------------------------
// Notifier trait and fan-out
// ---------------------------------------------------------------------------

/// Abstraction over alert delivery channels.
///
/// Implementors fit the shared copy to their own length limit and
/// deliver it, reporting the outcome without panicking or propagating.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event. Must return a result, never an Err: channel
    /// failures are data, not control flow.
    async fn notify(&self, event: &OiAlertEvent, copy: &AlertCopy) -> NotificationResult;

    /// Channel name for logs and delivery records.
    fn name(&self) -> &'static str;
}

/// Deliver one event to every configured channel sequentially,
/// collecting per-channel outcomes. A failing channel is logged and
/// skipped, never fatal.
pub async fn dispatch_all(
    notifiers: &[Arc<dyn Notifier>],
    event: &OiAlertEvent,
    copy: &AlertCopy,
) -> Vec<NotificationResult> {
    let mut results = Vec::with_capacity(notifiers.len());

    for notifier in notifiers {
        let result = notifier.notify(event, copy).await;
        if result.success {
            info!(channel = notifier.name(), outcome = %result, "Alert delivered");
        } else {
            error!(channel = notifier.name(), outcome = %result, "Alert delivery failed");
        }
        results.push(result);
    }

    results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
