//! Test doubles for the gateway seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::gateway::backend::{CapabilityBackend, GatewayError};
use crate::gateway::{CallContext, DegradeReason, Fetched, Gateway};
use crate::models::{ExtractedProfile, ExtractionKind, FitScores, Recommendations};
use crate::scoring::weights::ScoringWeights;
use crate::text::language::Language;
use crate::text::normalize::preprocess_for_embedding;

/// Backend that replays queued responses in order. An exhausted queue
/// answers with a permanent 400 error.
#[derive(Default)]
pub struct ScriptedBackend {
    generate: Mutex<VecDeque<Result<String, GatewayError>>>,
    embed: Mutex<VecDeque<Result<Vec<f32>, GatewayError>>>,
    models: Mutex<Vec<String>>,
    generate_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_text(&self, text: &str) {
        self.generate.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_generate_error(&self, err: GatewayError) {
        self.generate.lock().unwrap().push_back(Err(err));
    }

    pub fn push_vector(&self, vector: Vec<f32>) {
        self.embed.lock().unwrap().push_back(Ok(vector));
    }

    pub fn push_embed_error(&self, err: GatewayError) {
        self.embed.lock().unwrap().push_back(Err(err));
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn models_called(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn exhausted() -> GatewayError {
        GatewayError::Api {
            status: 400,
            message: "no scripted response".to_string(),
        }
    }
}

#[async_trait]
impl CapabilityBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        model: &str,
        _system: &str,
        _prompt: &str,
    ) -> Result<String, GatewayError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.to_string());
        self.pause().await;
        let next = self.generate.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn embed(&self, model: &str, _text: &str) -> Result<Vec<f32>, GatewayError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.to_string());
        self.pause().await;
        let next = self.embed.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(Self::exhausted()))
    }
}

/// In-memory [`Gateway`] with scripted answers.
///
/// Embeddings are keyed by the embedding preprocessing of their text, so
/// scripting "Docker" also answers the engine's "docker". Unscripted texts
/// embed to an empty vector without marking the run degraded.
pub struct FakeGateway {
    available: bool,
    failing_embeddings: bool,
    embeddings: HashMap<String, Vec<f32>>,
    extractions: HashMap<ExtractionKind, ExtractedProfile>,
    enrichments: HashMap<String, Vec<String>>,
    weights: Option<ScoringWeights>,
    missing: Vec<String>,
    recommendations: Recommendations,
    embed_calls: AtomicUsize,
    embedded: Mutex<Vec<String>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            available: true,
            failing_embeddings: false,
            embeddings: HashMap::new(),
            extractions: HashMap::new(),
            enrichments: HashMap::new(),
            weights: None,
            missing: Vec::new(),
            recommendations: Recommendations::default(),
            embed_calls: AtomicUsize::new(0),
            embedded: Mutex::new(Vec::new()),
        }
    }

    /// A gateway whose capability is not configured.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Every embedding call times out.
    pub fn failing_embeddings(mut self) -> Self {
        self.failing_embeddings = true;
        self
    }

    pub fn with_embedding(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.embeddings.insert(Self::key(text), vector);
        self
    }

    pub fn with_extraction(mut self, kind: ExtractionKind, profile: ExtractedProfile) -> Self {
        self.extractions.insert(kind, profile);
        self
    }

    pub fn with_enrichment(mut self, term: &str, related: &[&str]) -> Self {
        self.enrichments.insert(
            term.to_string(),
            related.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_missing_skills(mut self, missing: &[&str]) -> Self {
        self.missing = missing.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_recommendations(mut self, recommendations: Recommendations) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Texts passed to `embed`, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    fn key(text: &str) -> String {
        preprocess_for_embedding(text, Language::En)
    }

    /// Common gate: unavailable capability or cancelled run.
    fn refuse<T>(&self, operation: &'static str, fallback: T, ctx: &CallContext) -> Result<Fetched<T>, T> {
        let reason = if !self.available {
            DegradeReason::Unavailable
        } else if ctx.is_cancelled() {
            DegradeReason::Cancelled
        } else {
            return Err(fallback);
        };
        let fetched = Fetched::degraded(fallback, reason);
        ctx.observe(operation, &fetched);
        Ok(fetched)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn extract(
        &self,
        _text: &str,
        kind: ExtractionKind,
        ctx: &CallContext,
    ) -> Fetched<ExtractedProfile> {
        match self.refuse("extraction", ExtractedProfile::default(), ctx) {
            Ok(refused) => refused,
            Err(_) => Fetched::fresh(self.extractions.get(&kind).cloned().unwrap_or_default()),
        }
    }

    async fn embed(&self, text: &str, ctx: &CallContext) -> Fetched<Vec<f32>> {
        if let Ok(refused) = self.refuse("embedding", Vec::new(), ctx) {
            return refused;
        }
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embedded.lock().unwrap().push(text.to_string());
        if self.failing_embeddings {
            let fetched = Fetched::degraded(Vec::new(), DegradeReason::Timeout);
            ctx.observe("embedding", &fetched);
            return fetched;
        }
        Fetched::fresh(
            self.embeddings
                .get(&Self::key(text))
                .cloned()
                .unwrap_or_default(),
        )
    }

    async fn enrich_terms(
        &self,
        terms: &[String],
        ctx: &CallContext,
    ) -> Fetched<HashMap<String, Vec<String>>> {
        let empty: HashMap<String, Vec<String>> =
            terms.iter().map(|t| (t.clone(), Vec::new())).collect();
        match self.refuse("enrichment", empty, ctx) {
            Ok(refused) => refused,
            Err(mut map) => {
                for (term, related) in map.iter_mut() {
                    if let Some(scripted) = self.enrichments.get(term) {
                        *related = scripted.clone();
                    }
                }
                Fetched::fresh(map)
            }
        }
    }

    async fn infer_category_weights(
        &self,
        _job_text: &str,
        ctx: &CallContext,
    ) -> Fetched<Option<ScoringWeights>> {
        match self.refuse("dynamic_weights", None, ctx) {
            Ok(refused) => refused,
            Err(_) => Fetched::fresh(self.weights),
        }
    }

    async fn identify_missing_skills(
        &self,
        _job_skills: &[String],
        _candidate_skills: &[String],
        ctx: &CallContext,
    ) -> Fetched<Vec<String>> {
        match self.refuse("missing_skills", Vec::new(), ctx) {
            Ok(refused) => refused,
            Err(_) => Fetched::fresh(self.missing.clone()),
        }
    }

    async fn generate_recommendations(
        &self,
        _job: &ExtractedProfile,
        _candidate: &ExtractedProfile,
        _scores: &FitScores,
        ctx: &CallContext,
    ) -> Fetched<Recommendations> {
        match self.refuse("recommendations", Recommendations::default(), ctx) {
            Ok(refused) => refused,
            Err(_) => Fetched::fresh(self.recommendations.clone()),
        }
    }
}

/// Unit vector at `degrees` in the plane: cosine between two such vectors is
/// the cosine of their angle difference.
pub fn planar(degrees: f64) -> Vec<f32> {
    let radians = degrees.to_radians();
    vec![radians.cos() as f32, radians.sin() as f32]
}

/// Planar vector whose cosine with `planar(0.0)` is `similarity`.
pub fn at_similarity(similarity: f64) -> Vec<f32> {
    planar(similarity.clamp(-1.0, 1.0).acos().to_degrees())
}
