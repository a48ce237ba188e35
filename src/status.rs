//! Status and prerequisites
//!
//! Probes of the external services plus a snapshot of stored state. Only
//! the metadata stats are fatal; everything else degrades into the `issues`
//! list so `status` still answers when a service is down.

use serde::Serialize;

use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::store::{Store, StoreStats};
use crate::vector::VectorStore;
use crate::workspace::{Workspace, WorkspaceRegistry};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub vector_store: bool,
    pub embedding: bool,
    pub embedding_provider: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorySummary {
    pub path: String,
    pub status: String,
    /// Epoch seconds of the last completed index.
    pub indexed_at: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub stats: StoreStats,
    pub directories: Vec<DirectorySummary>,
    pub workspaces: Vec<Workspace>,
    /// Consistency findings. Reported, never auto-repaired.
    pub issues: Vec<String>,
}

/// Probe both external services.
///
/// The embedding probe is a real 1-token request so auth and model
/// availability are exercised, not just the socket.
pub async fn service_status(
    vectors: &VectorStore,
    embedder: &EmbeddingClient,
) -> ServiceStatus {
    let vector_store = vectors.healthz().await;
    let embedding = embedder.embed("ok").await.is_ok();
    ServiceStatus {
        vector_store,
        embedding,
        embedding_provider: embedder.provider_name().to_string(),
    }
}

/// Stored-state snapshot: counts, per-directory summaries, workspace roster,
/// and the metadata ↔ vector-store consistency check.
pub async fn index_status(
    store: &Store,
    vectors: &VectorStore,
    workspaces: &WorkspaceRegistry,
) -> Result<IndexStatus> {
    let stats = store.stats().await?;
    let mut issues = Vec::new();

    let mut directories = Vec::new();
    for dir in store.list_directories().await? {
        let prefix = format!("{}/", dir.path.trim_end_matches('/'));
        let last_error = store
            .files_under(&prefix)
            .await?
            .iter()
            .rev()
            .find_map(|f| f.errors.last().map(|e| format!("{}: {e}", f.path)));
        directories.push(DirectorySummary {
            path: dir.path,
            status: dir.status.as_str().to_string(),
            indexed_at: dir.indexed_at,
            last_error,
        });
    }

    // Consistency: every metadata path should have points, every point
    // should have a metadata row.
    match vectors.scroll_file_paths().await {
        Ok(vector_paths) => {
            let stored: std::collections::BTreeSet<String> =
                store.all_file_paths().await?.into_iter().collect();
            let in_vectors: std::collections::BTreeSet<String> =
                vector_paths.into_iter().collect();
            for path in stored.difference(&in_vectors) {
                // Chunk-less rows (error placeholders) legitimately have no points.
                if let Some(record) = store.get_file(path).await? {
                    if !record.chunks.is_empty() {
                        issues.push(format!("indexed file has no vector points: {path}"));
                    }
                }
            }
            for path in in_vectors.difference(&stored) {
                issues.push(format!("vector points without metadata row: {path}"));
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Consistency check skipped");
            issues.push(format!("consistency check unavailable: {err}"));
        }
    }

    Ok(IndexStatus {
        stats,
        directories,
        workspaces: workspaces.all().to_vec(),
        issues,
    })
}
