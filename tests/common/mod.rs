#![allow(dead_code)] // each test binary uses a different slice of the harness

//! Shared harness for integration tests
//!
//! One httpmock server plays both external services: the Qdrant-compatible
//! vector store and the Ollama embedding endpoint (their routes don't
//! collide). Configuration is built through `Config::from_lookup`, so tests
//! never mutate the process environment unless they are specifically about
//! environment handling.

use httpmock::prelude::*;
use httpmock::Mock;
use tempfile::TempDir;

use directory_indexer::{CommandContext, Config};

pub const DIM: usize = 4;
pub const COLLECTION: &str = "di-test";

pub struct Harness {
    pub server: MockServer,
    pub data_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Harness {
            server: MockServer::start_async().await,
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Context wired to the mock server with the Ollama provider, so every
    /// embedding request is visible (and countable) as HTTP traffic.
    pub async fn context(&self) -> CommandContext {
        self.context_with_provider("ollama").await
    }

    /// Context whose vector store points at a dead port; everything else
    /// (data dir, mock embedding endpoint) stays wired to this harness.
    pub async fn context_with_dead_vector_store(&self) -> CommandContext {
        let base = self.server.base_url();
        let data = self.data_dir.path().to_string_lossy().to_string();
        let config = Config::from_lookup(move |name| match name {
            "DATA_DIR" => Some(data.clone()),
            "VECTOR_ENDPOINT" => Some("http://127.0.0.1:1".into()),
            "COLLECTION_NAME" => Some(COLLECTION.into()),
            "EMBEDDING_PROVIDER" => Some("ollama".into()),
            "EMBEDDING_ENDPOINT" => Some(base.clone()),
            "EMBEDDING_DIMENSION" => Some(DIM.to_string()),
            _ => None,
        })
        .unwrap();
        CommandContext::new(config).await.unwrap()
    }

    pub async fn context_with_provider(&self, provider: &str) -> CommandContext {
        let base = self.server.base_url();
        let data = self.data_dir.path().to_string_lossy().to_string();
        let provider = provider.to_string();
        let config = Config::from_lookup(move |name| match name {
            "DATA_DIR" => Some(data.clone()),
            "VECTOR_ENDPOINT" => Some(base.clone()),
            "COLLECTION_NAME" => Some(COLLECTION.into()),
            "EMBEDDING_PROVIDER" => Some(provider.clone()),
            "EMBEDDING_ENDPOINT" => Some(base.clone()),
            "EMBEDDING_DIMENSION" => Some(DIM.to_string()),
            "CHUNK_SIZE" => Some("1024".into()),
            "CHUNK_OVERLAP" => Some("0".into()),
            _ => None,
        })
        .unwrap();
        CommandContext::new(config).await.unwrap()
    }

    // ===== canned vector-store routes =====

    pub async fn mock_collection_exists(&self) -> Mock<'_> {
        let path = format!("/collections/{COLLECTION}");
        self.server
            .mock_async(move |when, then| {
                when.method(GET).path(path.clone());
                then.status(200).json_body(serde_json::json!({
                    "result": { "config": { "params": {
                        "vectors": { "size": DIM, "distance": "Cosine" }
                    } } }
                }));
            })
            .await
    }

    pub async fn mock_upsert(&self) -> Mock<'_> {
        let path = format!("/collections/{COLLECTION}/points");
        self.server
            .mock_async(move |when, then| {
                when.method(PUT).path(path.clone());
                then.status(200)
                    .json_body(serde_json::json!({ "result": { "status": "completed" } }));
            })
            .await
    }

    pub async fn mock_delete(&self) -> Mock<'_> {
        let path = format!("/collections/{COLLECTION}/points/delete");
        self.server
            .mock_async(move |when, then| {
                when.method(POST).path(path.clone());
                then.status(200)
                    .json_body(serde_json::json!({ "result": { "status": "completed" } }));
            })
            .await
    }

    pub async fn mock_search(&self, result: serde_json::Value) -> Mock<'_> {
        let path = format!("/collections/{COLLECTION}/points/search");
        self.server
            .mock_async(move |when, then| {
                when.method(POST).path(path.clone());
                then.status(200)
                    .json_body(serde_json::json!({ "result": result }));
            })
            .await
    }

    pub async fn mock_scroll(&self, file_paths: &[&str]) -> Mock<'_> {
        let points: Vec<serde_json::Value> = file_paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                serde_json::json!({ "id": i, "payload": { "file_path": path } })
            })
            .collect();
        let path = format!("/collections/{COLLECTION}/points/scroll");
        self.server
            .mock_async(move |when, then| {
                when.method(POST).path(path.clone());
                then.status(200).json_body(serde_json::json!({
                    "result": { "points": points, "next_page_offset": null }
                }));
            })
            .await
    }

    /// Fixed-vector Ollama endpoint; `hits()` counts embedding requests.
    pub async fn mock_embeddings(&self) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(200)
                    .json_body(serde_json::json!({ "embedding": [0.5, 0.5, 0.5, 0.5] }));
            })
            .await
    }
}

/// A scored search hit in the vector store's wire shape.
pub fn scored_hit(file_path: &str, chunk_id: usize, score: f32) -> serde_json::Value {
    serde_json::json!({
        "id": uuid::Uuid::new_v5(
            &uuid::Uuid::NAMESPACE_OID,
            format!("{file_path}:{chunk_id}").as_bytes(),
        ),
        "score": score,
        "payload": {
            "file_path": file_path,
            "chunk_id": chunk_id,
            "file_hash": "feed".repeat(16),
            "parent_directories": ["/r"],
        }
    })
}
