//! Command layer
//!
//! The single call-table behind both surfaces: every operation is a method
//! on [`CommandContext`] returning plain data, and the CLI and MCP layers
//! only differ in how they render it.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::{AppError, Result};
use crate::indexer::{IndexSummary, Indexer};
use crate::search::{self, SearchOptions, SearchResult};
use crate::status::{self, IndexStatus, ServiceStatus};
use crate::store::Store;
use crate::vector::VectorStore;
use crate::workspace::WorkspaceRegistry;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub services: ServiceStatus,
    pub index: IndexStatus,
}

#[derive(Debug, Serialize)]
pub struct ResetReport {
    pub vector_store_cleared: bool,
    pub metadata_cleared: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub vector_endpoint: String,
    pub collection: String,
    pub data_dir: String,
}

/// Shared state for one process: the frozen config plus connected backends.
pub struct CommandContext {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub vectors: Arc<VectorStore>,
    pub embedder: Arc<EmbeddingClient>,
    /// Cooperative stop flag observed between files during indexing.
    pub cancel: Arc<AtomicBool>,
}

impl CommandContext {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Store::open(&config.db_path()).await?;
        let vectors = VectorStore::new(&config)?;
        let embedder = EmbeddingClient::new(&config)?;
        Ok(CommandContext {
            config: Arc::new(config),
            store: Arc::new(store),
            vectors: Arc::new(vectors),
            embedder: Arc::new(embedder),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn index(&self, roots: &[String]) -> Result<IndexSummary> {
        if roots.is_empty() {
            return Err(AppError::UserInput("no directories given to index".into()));
        }
        let indexer = Indexer::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.vectors),
            Arc::clone(&self.embedder),
            Arc::clone(&self.cancel),
        );
        indexer.index(roots).await
    }

    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let workspaces = WorkspaceRegistry::from_env();
        search::search(
            &self.store,
            &self.vectors,
            &self.embedder,
            &workspaces,
            query,
            opts,
        )
        .await
    }

    pub async fn similar(&self, file_path: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let workspaces = WorkspaceRegistry::from_env();
        search::similar(
            &self.store,
            &self.vectors,
            &self.embedder,
            &workspaces,
            file_path,
            limit,
        )
        .await
    }

    pub async fn get(&self, file_path: &str, chunks: Option<&str>) -> Result<String> {
        search::get_content(&self.store, file_path, chunks).await
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let workspaces = WorkspaceRegistry::from_env();
        let services = status::service_status(&self.vectors, &self.embedder).await;
        let index = status::index_status(&self.store, &self.vectors, &workspaces).await?;
        Ok(StatusReport { services, index })
    }

    /// Destructive: drops the vector collection and truncates the metadata
    /// store. Refuses without `force`; proceeds best-effort when a service
    /// is unreachable and reports what actually happened.
    pub async fn reset(&self, force: bool) -> Result<ResetReport> {
        if !force {
            return Err(AppError::UserInput(
                "reset is destructive; confirmation required (pass --force)".into(),
            ));
        }
        let mut notes = Vec::new();
        let vector_store_cleared = match self.vectors.delete_collection().await {
            Ok(()) => true,
            Err(err) => {
                notes.push(format!("vector store not cleared: {err}"));
                false
            }
        };
        let metadata_cleared = match self.store.clear().await {
            Ok(()) => true,
            Err(err) => {
                notes.push(format!("metadata store not cleared: {err}"));
                false
            }
        };
        tracing::info!(vector_store_cleared, metadata_cleared, "Reset complete");
        Ok(ResetReport {
            vector_store_cleared,
            metadata_cleared,
            notes,
        })
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            embedding_provider: self.config.provider.as_str().to_string(),
            embedding_model: self.config.embedding_model.clone(),
            vector_endpoint: self.config.vector_endpoint.clone(),
            collection: self.config.collection.clone(),
            data_dir: self.config.data_dir.display().to_string(),
        }
    }
}
