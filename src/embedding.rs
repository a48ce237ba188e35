//! Embedding client
//!
//! One uniform contract (`dimensions`, `embed`, `embed_batch`) over three
//! providers: Ollama, OpenAI, and a deterministic Mock for tests. Providers
//! are a tagged variant; no dynamic dispatch. Every response is validated
//! against the declared dimension; all failures map to a single embedding
//! error kind carrying the provider name.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::{Config, ProviderKind};
use crate::error::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct EmbeddingClient {
    kind: ProviderKind,
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::embedding(config.provider.as_str(), e.to_string()))?;
        Ok(EmbeddingClient {
            kind: config.provider,
            http,
            endpoint: config.embedding_endpoint.clone(),
            model: config.embedding_model.clone(),
            api_key: config.openai_api_key.clone(),
            dimension: config.embedding_dimension,
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Declared vector dimension. Validated against every provider response.
    pub fn dimensions(&self) -> usize {
        self.dimension
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.kind {
            ProviderKind::Mock => Ok(mock_vector(text, self.dimension)),
            ProviderKind::Ollama => self.embed_ollama(text).await,
            ProviderKind::OpenAi => {
                let texts = [text.to_string()];
                let mut vectors = self.embed_openai(&texts).await?;
                vectors.pop().ok_or_else(|| {
                    AppError::embedding(self.provider_name(), "empty embedding response")
                })
            }
        }
    }

    /// Batch embedding, results in input order. OpenAI and Mock embed the
    /// whole batch at once; Ollama's embeddings route is single-prompt, so
    /// it issues sequential calls.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self.kind {
            ProviderKind::Mock => Ok(texts
                .iter()
                .map(|t| mock_vector(t, self.dimension))
                .collect()),
            ProviderKind::Ollama => {
                let mut vectors = Vec::with_capacity(texts.len());
                for text in texts {
                    vectors.push(self.embed_ollama(text).await?);
                }
                Ok(vectors)
            }
            ProviderKind::OpenAi => self.embed_openai(texts).await,
        }
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = self.expect_success(resp).await?;
        let body: OllamaResponse = self.read_json(resp).await?;
        self.check_dimension(body.embedding)
    }

    async fn embed_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.endpoint);
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::embedding(self.provider_name(), "missing OPENAI_API_KEY")
        })?;
        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = self.expect_success(resp).await?;
        let body: OpenAiResponse = self.read_json(resp).await?;
        if body.data.len() != texts.len() {
            return Err(AppError::embedding(
                self.provider_name(),
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    body.data.len()
                ),
            ));
        }
        let mut items = body.data;
        items.sort_by_key(|item| item.index);
        items
            .into_iter()
            .map(|item| self.check_dimension(item.embedding))
            .collect()
    }

    fn check_dimension(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.len() != self.dimension {
            return Err(AppError::embedding(
                self.provider_name(),
                format!(
                    "shape mismatch: provider returned {} dimensions, {} declared; set EMBEDDING_DIMENSION to match the model",
                    vector.len(),
                    self.dimension
                ),
            ));
        }
        Ok(vector)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        AppError::embedding(
            self.provider_name(),
            format!("{e}; is the embedding service running at {}?", self.endpoint),
        )
    }

    async fn expect_success(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(AppError::embedding(
            self.provider_name(),
            format!("request failed with {status}: {body}"),
        ))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(&self, resp: reqwest::Response) -> Result<T> {
        resp.json().await.map_err(|e| {
            AppError::embedding(self.provider_name(), format!("unexpected response shape: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiItem>,
}

#[derive(Debug, Deserialize)]
struct OpenAiItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Deterministic bag-of-tokens vector: each whitespace token hashes to a
/// pseudo-random direction and the sum is L2-normalized. Identical inputs
/// give identical vectors; inputs sharing tokens land measurably closer
/// than unrelated ones, which is what test scenarios need from a mock.
fn mock_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut sum = vec![0.0_f32; dimension];
    let mut any = false;
    for token in text.split_whitespace() {
        any = true;
        for (i, value) in token_direction(token, dimension).into_iter().enumerate() {
            sum[i] += value;
        }
    }
    if !any {
        sum = token_direction("", dimension);
    }
    let norm = sum.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut sum {
            *v /= norm;
        }
    }
    sum
}

fn token_direction(token: &str, dimension: usize) -> Vec<f32> {
    let token = token.to_ascii_lowercase();
    let mut out = Vec::with_capacity(dimension);
    let mut counter = 0u32;
    while out.len() < dimension {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(token.as_bytes());
        for byte in hasher.finalize() {
            if out.len() == dimension {
                break;
            }
            out.push(byte as f32 / 127.5 - 1.0);
        }
        counter += 1;
    }
    out
}
