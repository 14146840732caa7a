//! Extraction/embedding gateway.
//!
//! The matching engine and the orchestrator only ever see the [`Gateway`]
//! trait. Every call returns a value, never an error: failures are folded
//! into a fallback value tagged [`CallStatus::Degraded`] and recorded on the
//! run's [`CallContext`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Mode;
use crate::models::{ExtractedProfile, ExtractionKind, FitScores, Recommendations};
use crate::scoring::weights::ScoringWeights;
use crate::text::language::Language;

pub mod backend;
pub mod cache;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod gemini;
pub mod prompts;
pub mod rate_limit;

pub use backend::{CapabilityBackend, GatewayError, ModelCatalog};
pub use client::GatewayClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// No credentials or backend configured.
    Unavailable,
    Timeout,
    RateLimited,
    MalformedPayload,
    Cancelled,
    Failed(String),
}

impl From<&GatewayError> for DegradeReason {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(_) => DegradeReason::Unavailable,
            GatewayError::Timeout => DegradeReason::Timeout,
            GatewayError::RateLimited { .. } | GatewayError::Api { status: 429, .. } => {
                DegradeReason::RateLimited
            }
            GatewayError::Parse(_) | GatewayError::EmptyContent => DegradeReason::MalformedPayload,
            GatewayError::Cancelled => DegradeReason::Cancelled,
            other => DegradeReason::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    Fresh,
    Cached,
    Degraded(DegradeReason),
}

/// A gateway value plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub status: CallStatus,
}

impl<T> Fetched<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            status: CallStatus::Fresh,
        }
    }

    pub fn cached(value: T) -> Self {
        Self {
            value,
            status: CallStatus::Cached,
        }
    }

    pub fn degraded(value: T, reason: DegradeReason) -> Self {
        Self {
            value,
            status: CallStatus::Degraded(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, CallStatus::Degraded(_))
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Cooperative cancellation shared between a caller and a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradationEvent {
    pub operation: &'static str,
    pub reason: DegradeReason,
}

/// Per-run state threaded through every gateway call.
#[derive(Debug, Default)]
pub struct CallContext {
    pub mode: Mode,
    pub language: Language,
    pub cancel: CancellationToken,
    degradations: Mutex<Vec<DegradationEvent>>,
}

impl CallContext {
    pub fn new(mode: Mode, language: Language, cancel: CancellationToken) -> Self {
        Self {
            mode,
            language,
            cancel,
            degradations: Mutex::new(Vec::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records the outcome of one call; only degraded outcomes are kept.
    pub fn observe<T>(&self, operation: &'static str, fetched: &Fetched<T>) {
        if let CallStatus::Degraded(reason) = &fetched.status {
            self.record(operation, reason.clone());
        }
    }

    pub fn record(&self, operation: &'static str, reason: DegradeReason) {
        if let Ok(mut events) = self.degradations.lock() {
            events.push(DegradationEvent { operation, reason });
        }
    }

    pub fn degradations(&self) -> Vec<DegradationEvent> {
        self.degradations
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn is_degraded(&self) -> bool {
        self.degradations
            .lock()
            .map(|events| !events.is_empty())
            .unwrap_or(false)
    }
}

/// The capability boundary consumed by the engine.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// False when no backend is configured; every call then degrades.
    fn is_available(&self) -> bool;

    /// Structured lists from free text; all-empty lists on failure.
    async fn extract(
        &self,
        text: &str,
        kind: ExtractionKind,
        ctx: &CallContext,
    ) -> Fetched<ExtractedProfile>;

    /// Embedding vector; empty on failure.
    async fn embed(&self, text: &str, ctx: &CallContext) -> Fetched<Vec<f32>>;

    /// Related terms per input term; every term maps to an empty list on failure.
    async fn enrich_terms(
        &self,
        terms: &[String],
        ctx: &CallContext,
    ) -> Fetched<HashMap<String, Vec<String>>>;

    /// Raw category weights suggested for this job; `None` on failure.
    async fn infer_category_weights(
        &self,
        job_text: &str,
        ctx: &CallContext,
    ) -> Fetched<Option<ScoringWeights>>;

    async fn identify_missing_skills(
        &self,
        job_skills: &[String],
        candidate_skills: &[String],
        ctx: &CallContext,
    ) -> Fetched<Vec<String>>;

    async fn generate_recommendations(
        &self,
        job: &ExtractedProfile,
        candidate: &ExtractedProfile,
        scores: &FitScores,
        ctx: &CallContext,
    ) -> Fetched<Recommendations>;
}

/// Isolates the JSON object in model output: the body of a ```json fence,
/// else of a bare ``` fence, else the outermost `{...}` span.
pub fn extract_json_payload(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```json") {
        return fenced_body(&text[start + "```json".len()..]);
    }
    if let Some(start) = text.find("```") {
        return fenced_body(&text[start + "```".len()..]);
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(open), Some(close)) if open < close => &text[open..=close],
        _ => text,
    }
}

fn fenced_body(after_open: &str) -> &str {
    match after_open.find("```") {
        Some(end) => after_open[..end].trim(),
        None => after_open.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_with_json_fence() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json_payload(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_payload_with_bare_fence() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json_payload(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_payload_without_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(extract_json_payload(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_payload_surrounded_by_prose() {
        let input = "Here you go: {\"a\": {\"b\": 1}} hope that helps";
        assert_eq!(extract_json_payload(input), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_payload_fence_after_prose() {
        let input = "Sure!\n```json\n{\"missing\": []}\n```\nDone.";
        assert_eq!(extract_json_payload(input), "{\"missing\": []}");
    }

    #[test]
    fn test_degrade_reason_from_error() {
        assert_eq!(
            DegradeReason::from(&GatewayError::Timeout),
            DegradeReason::Timeout
        );
        assert_eq!(
            DegradeReason::from(&GatewayError::Api {
                status: 429,
                message: String::new()
            }),
            DegradeReason::RateLimited
        );
        assert_eq!(
            DegradeReason::from(&GatewayError::EmptyContent),
            DegradeReason::MalformedPayload
        );
    }

    #[test]
    fn test_context_records_only_degraded_calls() {
        let ctx = CallContext::default();
        ctx.observe("embedding", &Fetched::fresh(vec![1.0f32]));
        ctx.observe("embedding", &Fetched::cached(vec![1.0f32]));
        assert!(!ctx.is_degraded());
        ctx.observe(
            "extraction",
            &Fetched::degraded(ExtractedProfile::default(), DegradeReason::Unavailable),
        );
        assert!(ctx.is_degraded());
        assert_eq!(ctx.degradations()[0].operation, "extraction");
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let ctx = CallContext::new(Mode::Fast, Language::En, token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
