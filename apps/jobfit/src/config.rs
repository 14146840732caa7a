use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::scoring::weights::ScoringWeights;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Analysis mode. Fast favours short timeouts for interactive use; Deep allows
/// longer calls, enrichment and hybrid item matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Fast,
    Deep,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Deep => "deep",
        }
    }
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "deep" => Ok(Mode::Deep),
            other => Err(AppError::Validation(format!(
                "unknown analysis mode '{other}' (expected 'fast' or 'deep')"
            ))),
        }
    }
}

/// Process configuration loaded from environment variables.
/// A missing `GEMINI_API_KEY` is not an error: the gateway reports the
/// capability as unavailable and every run completes degraded.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub redis_url: Option<String>,
    pub mode: Mode,
    pub rate_limit_min_interval: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let mode = match optional_env("ANALYSIS_MODE") {
            Some(raw) => raw
                .parse::<Mode>()
                .context("ANALYSIS_MODE must be 'fast' or 'deep'")?,
            None => Mode::default(),
        };

        let interval_ms = std::env::var("RATE_LIMIT_MIN_INTERVAL_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("RATE_LIMIT_MIN_INTERVAL_MS must be a non-negative integer")?;

        Ok(Config {
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            redis_url: optional_env("REDIS_URL"),
            mode,
            rate_limit_min_interval: Duration::from_millis(interval_ms),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Reads an env var, treating unset and blank the same way.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Gateway tunables
// ────────────────────────────────────────────────────────────────────────────

/// Per-mode upper bounds on a single gateway call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub extraction: Duration,
    pub embedding: Duration,
    pub enrichment: Duration,
}

impl Timeouts {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Fast => Timeouts {
                extraction: Duration::from_secs(12),
                embedding: Duration::from_secs(8),
                enrichment: Duration::from_secs(8),
            },
            Mode::Deep => Timeouts {
                extraction: Duration::from_secs(20),
                embedding: Duration::from_secs(15),
                enrichment: Duration::from_secs(15),
            },
        }
    }
}

/// Bounded exponential backoff: `base_delay * 2^attempt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub const fn single_shot() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.min(5))
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub min_interval: Duration,
    pub extraction_retry: RetryPolicy,
    pub embedding_retry: RetryPolicy,
    pub enrichment_retry: RetryPolicy,
    pub single_shot_retry: RetryPolicy,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            extraction_retry: RetryPolicy::new(3, Duration::from_millis(1000)),
            embedding_retry: RetryPolicy::new(2, Duration::from_millis(500)),
            enrichment_retry: RetryPolicy::new(2, Duration::from_millis(750)),
            single_shot_retry: RetryPolicy::single_shot(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine tunables
// ────────────────────────────────────────────────────────────────────────────

/// Minimum combined score for an item-to-item match, per category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    pub technical: f64,
    pub soft: f64,
    pub methodologies: f64,
    pub experience_education: f64,
}

impl MatchThresholds {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Fast => MatchThresholds {
                technical: 0.55,
                soft: 0.55,
                methodologies: 0.55,
                experience_education: 0.75,
            },
            Mode::Deep => MatchThresholds {
                technical: 0.50,
                soft: 0.50,
                methodologies: 0.50,
                experience_education: 0.70,
            },
        }
    }
}

/// Ordered confidence bands used to label a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTypeBands {
    pub exact: f64,
    pub semantic: f64,
    pub partial: f64,
}

impl Default for MatchTypeBands {
    fn default() -> Self {
        Self {
            exact: 0.85,
            semantic: 0.70,
            partial: 0.50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

impl HybridWeights {
    pub fn combine(&self, semantic: f64, keyword: f64) -> f64 {
        self.semantic * semantic + self.keyword * keyword
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Squashes raw BM25 into [0,1] as `raw / (raw + squash)`.
    pub squash: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            squash: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextSettings {
    pub max_sentences: usize,
    /// Sentences of this many characters or fewer are dropped.
    pub min_sentence_chars: usize,
    pub evidence_chars: usize,
    /// Fraction of the category threshold a sentence match must clear.
    pub relaxation: f64,
    pub anchor_similarity: f64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_sentences: 120,
            min_sentence_chars: 20,
            evidence_chars: 300,
            relaxation: 0.9,
            anchor_similarity: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitLevelBands {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for FitLevelBands {
    fn default() -> Self {
        Self {
            excellent: 80.0,
            good: 60.0,
            fair: 40.0,
        }
    }
}

/// Every number the matching and scoring engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub fast_thresholds: MatchThresholds,
    pub deep_thresholds: MatchThresholds,
    pub match_bands: MatchTypeBands,
    pub hybrid: HybridWeights,
    pub bm25: Bm25Params,
    /// Cap on variants per item, the original term included.
    pub max_enrich_variants: usize,
    pub context: ContextSettings,
    pub scoring_weights: ScoringWeights,
    /// Credit given to a match whose candidate item is an internship or project.
    pub internship_discount: f64,
    pub fit_levels: FitLevelBands,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fast_thresholds: MatchThresholds::for_mode(Mode::Fast),
            deep_thresholds: MatchThresholds::for_mode(Mode::Deep),
            match_bands: MatchTypeBands::default(),
            hybrid: HybridWeights::default(),
            bm25: Bm25Params::default(),
            max_enrich_variants: 5,
            context: ContextSettings::default(),
            scoring_weights: ScoringWeights::default(),
            internship_discount: 0.5,
            fit_levels: FitLevelBands::default(),
        }
    }
}

impl EngineSettings {
    pub fn thresholds(&self, mode: Mode) -> MatchThresholds {
        match mode {
            Mode::Fast => self.fast_thresholds,
            Mode::Deep => self.deep_thresholds,
        }
    }

    /// The only hard-error path in the engine: weight vectors that do not
    /// form a convex combination are a programming mistake, not bad input.
    pub fn validate(&self) -> Result<(), AppError> {
        let hybrid = [self.hybrid.semantic, self.hybrid.keyword];
        if !is_convex(&hybrid) {
            return Err(AppError::InvalidConfig(format!(
                "hybrid weights must be non-negative and sum to 1, got {hybrid:?}"
            )));
        }
        let scoring = self.scoring_weights.as_array();
        if !is_convex(&scoring) {
            return Err(AppError::InvalidConfig(format!(
                "scoring weights must be non-negative and sum to 1, got {scoring:?}"
            )));
        }
        if self.max_enrich_variants == 0 {
            return Err(AppError::InvalidConfig(
                "max_enrich_variants must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.internship_discount) {
            return Err(AppError::InvalidConfig(format!(
                "internship_discount must lie in [0,1], got {}",
                self.internship_discount
            )));
        }
        Ok(())
    }
}

fn is_convex(weights: &[f64]) -> bool {
    let sum: f64 = weights.iter().sum();
    weights.iter().all(|w| w.is_finite() && *w >= 0.0) && (sum - 1.0).abs() < 1e-6
}
