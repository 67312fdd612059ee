//! Remote embedding backend: an OpenAI-compatible `/v1/embeddings`
//! endpoint called with a blocking client. Build-time corpora go out as
//! one batched request; queries as single-item requests. No caching and
//! no automatic retry; callers decide whether a failure is worth retrying.

use cvrag_core::config::EmbeddingConfig;
use cvrag_core::error::{Error, Result};
use cvrag_core::traits::Embedder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_DIM: usize = 1536;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug)]
pub struct RemoteEmbedder {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
    dim: usize,
    id: String,
}

impl RemoteEmbedder {
    /// Build the client with the configured request timeout. The timeout
    /// bounds every `embed_batch` call, including build-time batches.
    pub fn new(api_key: String, cfg: &EmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        let api_url = cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dim = cfg.dim.unwrap_or(DEFAULT_DIM);
        let id = format!("remote:{model}:d{dim}");
        Ok(Self { client, api_url, api_key, model, dim, id })
    }
}

impl Embedder for RemoteEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        debug!("requesting {} embeddings from {}", texts.len(), self.api_url);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| Error::EmbeddingBackend(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("embeddings API returned {status}: {message}");
            return Err(Error::EmbeddingBackend(format!(
                "embeddings API returned {status}: {message}"
            )));
        }

        let mut parsed: EmbeddingsResponse = response
            .json()
            .map_err(|e| Error::EmbeddingBackend(format!("malformed embeddings response: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::EmbeddingBackend(format!(
                "embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        let mut vectors = Vec::with_capacity(parsed.data.len());
        for item in parsed.data {
            if item.embedding.len() != self.dim {
                return Err(Error::EmbeddingBackend(format!(
                    "embeddings API returned dimension {}, expected {}",
                    item.embedding.len(),
                    self.dim
                )));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}
