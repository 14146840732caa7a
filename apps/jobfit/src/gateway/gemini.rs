//! Google Generative Language API backend.
//!
//! Makes exactly one HTTP request per call. Retries, timeouts and model
//! fallback belong to `GatewayClient`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gateway::backend::{CapabilityBackend, GatewayError};

/// Transport-level ceiling; per-call budgets are shorter and enforced above.
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl CapabilityBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, GatewayError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        };

        let body = self
            .post(&self.endpoint(model, "generateContent"), &request)
            .await?;
        let response: GenerateResponse = serde_json::from_str(&body)?;
        let text = response.text().ok_or(GatewayError::EmptyContent)?;

        debug!(model, chars = text.len(), "generateContent succeeded");
        Ok(text)
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, GatewayError> {
        let request = EmbedRequest {
            model: format!("models/{model}"),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };

        let body = self
            .post(&self.endpoint(model, "embedContent"), &request)
            .await?;
        let response: EmbedResponse = serde_json::from_str(&body)?;
        if response.embedding.values.is_empty() {
            return Err(GatewayError::EmptyContent);
        }
        Ok(response.embedding.values)
    }
}
