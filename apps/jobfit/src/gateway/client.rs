//! `GatewayClient`: the resilient [`Gateway`] implementation.
//!
//! Owns the rate limiter and the cache handle. Each call walks its model
//! sequence; per model it tries the cache, then up to `max_attempts` backend
//! calls under the mode's timeout, backing off between transient failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{GatewaySettings, RetryPolicy, Timeouts};
use crate::gateway::backend::{CapabilityBackend, GatewayError, ModelCatalog};
use crate::gateway::cache::{cache_key, CacheEntry, CacheStore};
use crate::gateway::prompts::{self, JSON_ONLY_SYSTEM};
use crate::gateway::rate_limit::RateLimiter;
use crate::gateway::{extract_json_payload, CallContext, DegradeReason, Fetched, Gateway};
use crate::models::{ExtractedProfile, ExtractionKind, FitScores, Recommendations};
use crate::scoring::weights::ScoringWeights;

/// What a single backend invocation asks for.
#[derive(Debug, Clone, Copy)]
enum Request<'a> {
    Generate { prompt: &'a str },
    Embed { text: &'a str },
}

#[derive(Debug, Serialize, Deserialize)]
struct MissingSkillsPayload {
    #[serde(default)]
    missing: Vec<serde_json::Value>,
}

pub struct GatewayClient {
    backend: Option<Arc<dyn CapabilityBackend>>,
    models: ModelCatalog,
    cache: Arc<dyn CacheStore>,
    limiter: RateLimiter,
    settings: GatewaySettings,
}

impl GatewayClient {
    /// `backend = None` builds a client for which the capability is
    /// unavailable: every call returns its fallback, degraded.
    pub fn new(
        backend: Option<Arc<dyn CapabilityBackend>>,
        models: ModelCatalog,
        cache: Arc<dyn CacheStore>,
        settings: GatewaySettings,
    ) -> Self {
        let limiter = RateLimiter::new(settings.min_interval);
        Self {
            backend,
            models,
            cache,
            limiter,
            settings,
        }
    }

    /// Tries each model in order and returns the first value obtained,
    /// from cache or backend. The error is the last one seen.
    #[allow(clippy::too_many_arguments)]
    async fn fetch<T>(
        &self,
        operation: &'static str,
        models: &[String],
        cache_input: &str,
        request: Request<'_>,
        policy: RetryPolicy,
        timeout: Duration,
        ctx: &CallContext,
    ) -> Result<Fetched<T>, GatewayError>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| GatewayError::Unavailable("no backend configured".to_string()))?;

        let mut last_error = GatewayError::Unavailable(format!("no model configured for {operation}"));
        for model in models {
            let key = cache_key(operation, model, cache_input);
            if let Some(entry) = self.cache.get(&key).await {
                match serde_json::from_value::<T>(entry.value) {
                    Ok(value) => {
                        debug!(operation, model = %model, "cache hit");
                        return Ok(Fetched::cached(value));
                    }
                    Err(e) => debug!(operation, error = %e, "ignoring undecodable cache entry"),
                }
            }

            let model_ref = model.as_str();
            let attempt = move || async move {
                let value = invoke(backend.as_ref(), model_ref, request).await?;
                Ok::<T, GatewayError>(serde_json::from_value::<T>(value)?)
            };

            match self.with_retries(operation, policy, timeout, ctx, attempt).await {
                Ok(value) => {
                    match serde_json::to_value(&value) {
                        Ok(json) => self.cache.put(&key, CacheEntry::new(json)).await,
                        Err(e) => warn!(operation, error = %e, "could not cache response"),
                    }
                    return Ok(Fetched::fresh(value));
                }
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) => {
                    warn!(operation, model = %model, error = %e, "model failed; trying next");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Runs `call` until it succeeds, fails permanently or exhausts the
    /// policy. Cancellation is checked before every attempt; an attempt
    /// already in flight is never interrupted by it.
    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        policy: RetryPolicy,
        timeout: Duration,
        ctx: &CallContext,
        mut call: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if ctx.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            if attempt > 0 {
                let delay = policy.backoff(attempt - 1);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying gateway call"
                );
                tokio::time::sleep(delay).await;
                if ctx.is_cancelled() {
                    return Err(GatewayError::Cancelled);
                }
            }

            self.limiter.acquire().await;
            let error = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => GatewayError::Timeout,
            };

            if !error.is_transient() {
                return Err(error);
            }
            debug!(operation, attempt, error = %error, "transient gateway failure");
            last_error = Some(error);
        }

        Err(match last_error {
            Some(GatewayError::Api { status: 429, .. }) | None => GatewayError::RateLimited {
                retries: max_attempts,
            },
            Some(e) => e,
        })
    }

    fn timeouts(&self, ctx: &CallContext) -> Timeouts {
        Timeouts::for_mode(ctx.mode)
    }

    /// Unwraps a fetch result, substituting `fallback` on failure and
    /// recording the outcome on the context.
    fn settle<T>(
        operation: &'static str,
        result: Result<Fetched<T>, GatewayError>,
        fallback: impl FnOnce() -> T,
        ctx: &CallContext,
    ) -> Fetched<T> {
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                let reason = DegradeReason::from(&e);
                if matches!(reason, DegradeReason::Unavailable) {
                    debug!(operation, "capability unavailable; using fallback");
                } else {
                    warn!(operation, error = %e, "gateway call degraded; using fallback");
                }
                Fetched::degraded(fallback(), reason)
            }
        };
        ctx.observe(operation, &fetched);
        fetched
    }
}

async fn invoke(
    backend: &dyn CapabilityBackend,
    model: &str,
    request: Request<'_>,
) -> Result<serde_json::Value, GatewayError> {
    match request {
        Request::Generate { prompt } => {
            let raw = backend.generate(model, JSON_ONLY_SYSTEM, prompt).await?;
            Ok(serde_json::from_str(extract_json_payload(&raw))?)
        }
        Request::Embed { text } => {
            let vector = backend.embed(model, text).await?;
            if vector.is_empty() {
                return Err(GatewayError::EmptyContent);
            }
            Ok(serde_json::to_value(vector)?)
        }
    }
}

/// Keeps string entries only; the model occasionally mixes in other types.
fn string_items(values: &[serde_json::Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn number(value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn dedup_terms(terms: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Gateway for GatewayClient {
    fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    async fn extract(
        &self,
        text: &str,
        kind: ExtractionKind,
        ctx: &CallContext,
    ) -> Fetched<ExtractedProfile> {
        let prompt = prompts::extraction_prompt(kind, ctx.language, text);
        let cache_input = format!("{}|{}|{}", ctx.language.code(), kind.as_str(), text);
        let result = self
            .fetch::<ExtractedProfile>(
                "extraction",
                &self.models.extraction,
                &cache_input,
                Request::Generate { prompt: &prompt },
                self.settings.extraction_retry,
                self.timeouts(ctx).extraction,
                ctx,
            )
            .await;
        let fetched = Self::settle("extraction", result, ExtractedProfile::default, ctx);
        info!(
            kind = kind.as_str(),
            items = fetched.value.item_count(),
            status = ?fetched.status,
            "extraction finished"
        );
        fetched
    }

    async fn embed(&self, text: &str, ctx: &CallContext) -> Fetched<Vec<f32>> {
        let clean = text.trim();
        if clean.is_empty() {
            return Fetched::fresh(Vec::new());
        }
        let result = self
            .fetch::<Vec<f32>>(
                "embedding",
                &self.models.embedding,
                clean,
                Request::Embed { text: clean },
                self.settings.embedding_retry,
                self.timeouts(ctx).embedding,
                ctx,
            )
            .await;
        Self::settle("embedding", result, Vec::new, ctx)
    }

    async fn enrich_terms(
        &self,
        terms: &[String],
        ctx: &CallContext,
    ) -> Fetched<HashMap<String, Vec<String>>> {
        let unique = dedup_terms(terms);
        let empty = || -> HashMap<String, Vec<String>> {
            terms.iter().map(|t| (t.clone(), Vec::new())).collect()
        };
        if unique.is_empty() {
            return Fetched::fresh(empty());
        }

        let items_json = match serde_json::to_string(&unique) {
            Ok(json) => json,
            Err(e) => {
                let fetched = Fetched::degraded(empty(), DegradeReason::Failed(e.to_string()));
                ctx.observe("enrichment", &fetched);
                return fetched;
            }
        };
        let prompt = prompts::enrichment_prompt(ctx.language, &items_json);
        let cache_input = format!("{}|{}", ctx.language.code(), items_json);
        let result = self
            .fetch::<HashMap<String, serde_json::Value>>(
                "enrichment",
                std::slice::from_ref(&self.models.enrichment),
                &cache_input,
                Request::Generate { prompt: &prompt },
                self.settings.enrichment_retry,
                self.timeouts(ctx).enrichment,
                ctx,
            )
            .await;

        let result = result.map(|f| {
            let raw = f.value;
            let mapped = terms
                .iter()
                .map(|term| {
                    let related = raw
                        .get(term.as_str())
                        .or_else(|| raw.get(term.to_lowercase().as_str()))
                        .and_then(|v| v.as_array())
                        .map(|values| string_items(values))
                        .unwrap_or_default();
                    (term.clone(), related)
                })
                .collect();
            Fetched {
                value: mapped,
                status: f.status,
            }
        });
        Self::settle("enrichment", result, empty, ctx)
    }

    async fn infer_category_weights(
        &self,
        job_text: &str,
        ctx: &CallContext,
    ) -> Fetched<Option<ScoringWeights>> {
        let prompt = prompts::dynamic_weights_prompt(ctx.language, job_text);
        let cache_input = format!("{}|{}", ctx.language.code(), job_text);
        let result = self
            .fetch::<HashMap<String, serde_json::Value>>(
                "dynamic_weights",
                std::slice::from_ref(&self.models.dynamic_weights),
                &cache_input,
                Request::Generate { prompt: &prompt },
                self.settings.single_shot_retry,
                self.timeouts(ctx).extraction,
                ctx,
            )
            .await;

        Self::settle(
            "dynamic_weights",
            result.map(|f| Fetched {
                value: Some(ScoringWeights {
                    technical_skills: number(f.value.get("technical_skills")),
                    soft_skills: number(f.value.get("soft_skills")),
                    methodologies: number(f.value.get("methodologies")),
                    experience_education: number(f.value.get("experience_education")),
                }),
                status: f.status,
            }),
            || None,
            ctx,
        )
    }

    async fn identify_missing_skills(
        &self,
        job_skills: &[String],
        candidate_skills: &[String],
        ctx: &CallContext,
    ) -> Fetched<Vec<String>> {
        let (job_json, candidate_json) = match (
            serde_json::to_string(job_skills),
            serde_json::to_string(candidate_skills),
        ) {
            (Ok(j), Ok(c)) => (j, c),
            _ => {
                let fetched = Fetched::degraded(
                    Vec::new(),
                    DegradeReason::Failed("unserialisable skill lists".to_string()),
                );
                ctx.observe("missing_skills", &fetched);
                return fetched;
            }
        };
        let prompt = prompts::missing_skills_prompt(ctx.language, &job_json, &candidate_json);
        let cache_input = format!("{}|{}|{}", ctx.language.code(), job_json, candidate_json);
        let result = self
            .fetch::<MissingSkillsPayload>(
                "missing_skills",
                std::slice::from_ref(&self.models.missing_skills),
                &cache_input,
                Request::Generate { prompt: &prompt },
                self.settings.single_shot_retry,
                self.timeouts(ctx).extraction,
                ctx,
            )
            .await
            .map(|f| Fetched {
                value: string_items(&f.value.missing),
                status: f.status,
            });
        Self::settle("missing_skills", result, Vec::new, ctx)
    }

    async fn generate_recommendations(
        &self,
        job: &ExtractedProfile,
        candidate: &ExtractedProfile,
        scores: &FitScores,
        ctx: &CallContext,
    ) -> Fetched<Recommendations> {
        let payloads = (
            serde_json::to_string(job),
            serde_json::to_string(candidate),
            serde_json::to_string(scores),
        );
        let (job_json, candidate_json, scores_json) = match payloads {
            (Ok(j), Ok(c), Ok(s)) => (j, c, s),
            _ => {
                let fetched = Fetched::degraded(
                    Recommendations::default(),
                    DegradeReason::Failed("unserialisable analysis payload".to_string()),
                );
                ctx.observe("recommendations", &fetched);
                return fetched;
            }
        };
        let prompt =
            prompts::recommendations_prompt(ctx.language, &job_json, &candidate_json, &scores_json);
        let cache_input = format!(
            "{}|{}|{}|{}",
            ctx.language.code(),
            job_json,
            candidate_json,
            scores_json
        );
        let result = self
            .fetch::<Recommendations>(
                "recommendations",
                std::slice::from_ref(&self.models.recommendations),
                &cache_input,
                Request::Generate { prompt: &prompt },
                self.settings.single_shot_retry,
                self.timeouts(ctx).extraction,
                ctx,
            )
            .await;
        Self::settle("recommendations", result, Recommendations::default, ctx)
    }
}
