//! The raw capability seam: one text-generation call and one embedding call.
//! Everything above this trait (retries, caching, fallbacks) is provider
//! agnostic.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("Call timed out")]
    Timeout,

    #[error("Call cancelled")]
    Cancelled,

    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Transient failures are worth retrying; a malformed request or missing
    /// credentials will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Http(_)
            | GatewayError::Parse(_)
            | GatewayError::RateLimited { .. }
            | GatewayError::EmptyContent
            | GatewayError::Timeout => true,
            GatewayError::Api { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Cancelled | GatewayError::Unavailable(_) => false,
        }
    }
}

/// A provider of generative text and embeddings.
#[async_trait]
pub trait CapabilityBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Runs one prompt and returns the model's raw text.
    async fn generate(&self, model: &str, system: &str, prompt: &str)
        -> Result<String, GatewayError>;

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, GatewayError>;
}

/// Model identifiers per operation. Sequences are tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub extraction: Vec<String>,
    pub embedding: Vec<String>,
    pub enrichment: String,
    pub recommendations: String,
    pub dynamic_weights: String,
    pub missing_skills: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            extraction: vec!["gemini-2.0-pro".to_string(), "gemini-2.0-flash".to_string()],
            embedding: vec![
                "text-embedding-004".to_string(),
                "embedding-001".to_string(),
            ],
            enrichment: "gemini-2.0-flash".to_string(),
            recommendations: "gemini-2.0-flash".to_string(),
            dynamic_weights: "gemini-2.0-pro".to_string(),
            missing_skills: "gemini-2.0-pro".to_string(),
        }
    }
}
