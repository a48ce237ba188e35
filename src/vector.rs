//! Vector store client
//!
//! Thin REST client over a Qdrant-compatible endpoint: collection lifecycle,
//! point upsert/search/delete/scroll, health probe. Point ids are UUIDs
//! derived from content, so upserts are idempotent and retries are safe.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const SCROLL_PAGE: usize = 1024;

/// Payload carried by every point. snake_case on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub file_path: String,
    pub chunk_id: usize,
    pub file_hash: String,
    pub parent_directories: Vec<String>,
}

/// A point to upsert.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// One raw search hit, descending by cosine score.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f32,
    pub payload: Option<PointPayload>,
}

pub struct VectorStore {
    client: reqwest::Client,
    endpoint: String,
    collection: String,
}

impl VectorStore {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(key) = &config.vector_api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| AppError::Config("VECTOR_API_KEY contains invalid characters".into()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        Ok(VectorStore {
            client: builder
                .build()
                .map_err(|e| AppError::vector(&config.vector_endpoint, e.to_string()))?,
            endpoint: config.vector_endpoint.clone(),
            collection: config.collection.clone(),
        })
    }

    /// Liveness probe; false on any failure.
    pub async fn healthz(&self) -> bool {
        let url = format!("{}/healthz", self.endpoint);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Create the collection if absent; fail hard when it exists with a
    /// different vector size.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let url = self.collection_url();
        let resp = self.get(&url).await?;
        if resp.status().is_success() {
            let body: Value = self.read_json(resp).await?;
            let existing = body
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64);
            return match existing {
                Some(size) if size as usize == dimension => Ok(()),
                Some(size) => Err(AppError::vector(
                    &self.endpoint,
                    format!(
                        "dimension mismatch: collection '{}' has size {size}, embedding provider produces {dimension}; reset the index or change EMBEDDING_MODEL",
                        self.collection
                    ),
                )),
                None => Err(AppError::vector(
                    &self.endpoint,
                    format!("collection '{}' has an unreadable vector config", self.collection),
                )),
            };
        }
        if resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(self.status_error(resp).await);
        }

        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        let resp = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.expect_success(resp).await?;
        tracing::info!(collection = %self.collection, dimension, "Created vector collection");
        Ok(())
    }

    /// At-least-once upsert; deterministic ids make retries harmless.
    pub async fn upsert(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let url = format!("{}/points", self.collection_url());
        let resp = self
            .client
            .put(&url)
            .query(&[("wait", "true")])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.expect_success(resp).await?;
        Ok(())
    }

    /// Nearest-neighbour search, descending by cosine score.
    pub async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<Value>,
    ) -> Result<Vec<ScoredPoint>> {
        let url = format!("{}/points/search", self.collection_url());
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = self.expect_success(resp).await?;
        let body: SearchResponse = self.read_json(resp).await?;
        Ok(body.result)
    }

    /// Remove every point belonging to `file_path`.
    pub async fn delete_by_file_path(&self, file_path: &str) -> Result<()> {
        self.delete_points(json!({
            "filter": { "must": [ { "key": "file_path", "match": { "value": file_path } } ] }
        }))
        .await
    }

    pub async fn delete_ids(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete_points(json!({ "points": ids })).await
    }

    async fn delete_points(&self, body: Value) -> Result<()> {
        let url = format!("{}/points/delete", self.collection_url());
        let resp = self
            .client
            .post(&url)
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.expect_success(resp).await?;
        Ok(())
    }

    /// Distinct `file_path` payload values across the whole collection.
    /// Drives the status consistency check; pages through the scroll API.
    pub async fn scroll_file_paths(&self) -> Result<Vec<String>> {
        let url = format!("{}/points/scroll", self.collection_url());
        let mut paths = std::collections::BTreeSet::new();
        let mut offset: Option<Value> = None;
        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": ["file_path"],
                "with_vector": false,
            });
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }
            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            let resp = self.expect_success(resp).await?;
            let page: ScrollResponse = self.read_json(resp).await?;
            for point in page.result.points {
                if let Some(path) = point
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("file_path"))
                    .and_then(Value::as_str)
                {
                    paths.insert(path.to_string());
                }
            }
            match page.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        Ok(paths.into_iter().collect())
    }

    /// Drop the whole collection. Missing collection is fine; reset is
    /// best-effort.
    pub async fn delete_collection(&self) -> Result<()> {
        let url = self.collection_url();
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.status_error(resp).await)
        }
    }

    // ===== plumbing =====

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        AppError::vector(
            &self.endpoint,
            format!("{e}; is the vector store running at {}?", self.endpoint),
        )
    }

    async fn expect_success(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(self.status_error(resp).await)
        }
    }

    async fn status_error(&self, resp: reqwest::Response) -> AppError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        AppError::vector(&self.endpoint, format!("request failed with {status}: {body}"))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(&self, resp: reqwest::Response) -> Result<T> {
        resp.json()
            .await
            .map_err(|e| AppError::vector(&self.endpoint, format!("unexpected response shape: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrollPoint {
    #[allow(dead_code)]
    id: Value,
    #[serde(default)]
    payload: Option<Value>,
}
