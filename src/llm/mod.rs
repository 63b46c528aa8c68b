//! LLM integration for alert commentary.
//!
//! Defines the `Summarizer` trait and provides an OpenAI-compatible
//! chat-completions implementation. Commentary is strictly additive:
//! every alert renders fully from scan data alone, and a summarizer
//! failure degrades to template-only copy.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::OiAlertEvent;

/// Abstraction over alert-commentary generators.
///
/// Implementors turn a confirmed alert event into one or two short
/// sentences of market context, and optionally translate finished
/// alert copy into another locale.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate brief commentary for a confirmed alert.
    async fn commentary(&self, event: &OiAlertEvent) -> Result<String>;

    /// Translate finished alert copy into the target locale.
    /// Locale "en" is an identity pass and must not call out.
    async fn translate(&self, text: &str, locale: &str) -> Result<String>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}
