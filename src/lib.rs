//! # directory-indexer: semantic search over local directories
//!
//! Scans directory trees, chunks and embeds their text files through an
//! external embedding provider (Ollama, OpenAI, or a deterministic mock),
//! and keeps two stores in step: SQLite as the metadata source of truth and
//! a Qdrant-compatible vector store for nearest-neighbour search. The same
//! operations are exposed to humans through the CLI and to AI assistants
//! through MCP (JSON-RPC 2.0 over stdio).
//!
//! ## Quick start
//!
//! ```no_run
//! use directory_indexer::{CommandContext, Config, SearchOptions};
//!
//! # async fn demo() -> directory_indexer::Result<()> {
//! let context = CommandContext::new(Config::from_env()?).await?;
//! let summary = context.index(&["/home/me/notes".into()]).await?;
//! println!("indexed {} files", summary.indexed);
//!
//! let results = context
//!     .search("error handling patterns", &SearchOptions { limit: 5, ..Default::default() })
//!     .await?;
//! for hit in results {
//!     println!("{:.3} {}", hit.score, hit.file_path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Indexing is incremental: an unchanged tree re-indexes with zero
//! embedding calls, and files deleted on disk are reconciled out of both
//! stores on the next run.

pub mod cli;
pub mod commands;
pub mod config;
pub mod content;
pub mod embedding;
pub mod error;
pub mod ignore_rules;
pub mod indexer;
pub mod mcp;
pub mod scanner;
pub mod search;
pub mod status;
pub mod store;
pub mod vector;
pub mod workspace;

pub use commands::{CommandContext, ResetReport, ServerInfo, StatusReport};
pub use config::{Config, ProviderKind};
pub use embedding::EmbeddingClient;
pub use error::{AppError, Result};
pub use indexer::{IndexSummary, Indexer};
pub use search::{SearchOptions, SearchResult};
pub use store::{ChunkRef, DirStatus, FileRecord, Store};
pub use vector::{Point, PointPayload, VectorStore};
pub use workspace::WorkspaceRegistry;
