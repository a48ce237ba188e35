//! Indexing orchestrator
//!
//! Drives scan → diff → chunk → embed → dual-store write for each root.
//! Incremental: mtime gates the cheap skip, content hash gates re-embedding,
//! and paths that disappeared are reconciled out of both stores. Per-file
//! failures are recorded on the file row and in the returned summary; they
//! never abort the batch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::content::{chunk_text, derive_point_id, hash_bytes, is_text, normalize_path};
use crate::embedding::EmbeddingClient;
use crate::error::{AppError, Result};
use crate::ignore_rules::EssentialPatterns;
use crate::scanner::{scan_root, FileCandidate};
use crate::store::{ChunkRef, DirStatus, FileRecord, Store};
use crate::vector::{Point, PointPayload, VectorStore};

/// Outcome of one `index` invocation across all requested roots.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    /// Roots that could not be scanned at all. Drives the CLI exit code;
    /// not part of the wire shape.
    #[serde(skip)]
    pub missing_roots: usize,
}

pub struct Indexer {
    config: Arc<Config>,
    store: Arc<Store>,
    vectors: Arc<VectorStore>,
    embedder: Arc<EmbeddingClient>,
    /// Cooperative stop flag, checked between files, never mid-file.
    cancel: Arc<AtomicBool>,
}

enum FileOutcome {
    Indexed,
    /// Content unchanged; only the recorded mtime needed refreshing.
    Touched,
    /// Not text: outside the index, silently.
    NotText,
    Failed { path: String, error: String },
}

struct Job {
    path: String,
    size: u64,
    modified_time: i64,
    parent_dirs: Vec<String>,
    /// Previously indexed: old points must be deleted before new ones land.
    replace: bool,
    stored_hash: Option<String>,
}

impl Indexer {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        vectors: Arc<VectorStore>,
        embedder: Arc<EmbeddingClient>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Indexer {
            config,
            store,
            vectors,
            embedder,
            cancel,
        }
    }

    /// Index every root. Roots that fail to scan are reported and the rest
    /// proceed; a missing vector store or embedding provider aborts.
    pub async fn index(&self, roots: &[String]) -> Result<IndexSummary> {
        self.vectors
            .ensure_collection(self.embedder.dimensions())
            .await?;

        let mut summary = IndexSummary::default();
        for raw in roots {
            if self.cancel.load(Ordering::SeqCst) {
                summary.errors.push("indexing interrupted".into());
                break;
            }
            let root = normalize_path(Path::new(raw));
            if let Err(err) = self.index_root(&root, &mut summary).await {
                match err {
                    AppError::NotFound(_) | AppError::FileProcessing { .. } => {
                        tracing::warn!(root = %root, error = %err, "Root failed");
                        self.store.upsert_directory(&root, DirStatus::Failed).await?;
                        summary.errors.push(format!("{root}: {err}"));
                        summary.missing_roots += 1;
                    }
                    // Store/vector/embedding failures are global: abort.
                    other => return Err(other),
                }
            }
        }
        tracing::info!(
            indexed = summary.indexed,
            skipped = summary.skipped,
            deleted = summary.deleted,
            failed = summary.failed,
            "Index run complete"
        );
        Ok(summary)
    }

    async fn index_root(&self, root: &str, summary: &mut IndexSummary) -> Result<()> {
        self.store.upsert_directory(root, DirStatus::Indexing).await?;

        let essentials = EssentialPatterns::new(&self.config.extra_ignores);
        let candidates = scan_root(root, &essentials, self.config.max_file_size)?;

        let prefix = format!("{}/", root.trim_end_matches('/'));
        let stored: HashMap<String, FileRecord> = self
            .store
            .files_under(&prefix)
            .await?
            .into_iter()
            .map(|f| (f.path.clone(), f))
            .collect();

        // Deletion reconciliation: stored paths the scanner no longer sees.
        let current: HashMap<&str, &FileCandidate> =
            candidates.iter().map(|c| (c.path.as_str(), c)).collect();
        for path in stored.keys() {
            if !current.contains_key(path.as_str()) {
                self.vectors.delete_by_file_path(path).await?;
                self.store.delete_file(path).await?;
                summary.deleted += 1;
                tracing::debug!(path = %path, "Removed deleted file");
            }
        }

        // Classify the survivors.
        let mut jobs = Vec::new();
        for candidate in &candidates {
            let previous = stored.get(&candidate.path);
            if candidate.oversize {
                if let Some(record) = previous {
                    let warning = format!(
                        "file exceeds MAX_FILE_SIZE ({} > {}); kept stale index",
                        candidate.size, self.config.max_file_size
                    );
                    if !record.errors.contains(&warning) {
                        let mut updated = record.clone();
                        updated.errors.push(warning);
                        self.store.upsert_file(&updated).await?;
                    }
                    summary.skipped += 1;
                }
                continue;
            }
            match previous {
                Some(record) if record.modified_time == candidate.modified_time => {
                    summary.skipped += 1;
                }
                other => jobs.push(Job {
                    path: candidate.path.clone(),
                    size: candidate.size,
                    modified_time: candidate.modified_time,
                    parent_dirs: ancestor_chain(root, &candidate.path),
                    replace: other.is_some(),
                    stored_hash: other.map(|r| r.hash.clone()),
                }),
            }
        }

        // Process new/modified files; embedding HTTP concurrency is bounded
        // by one shared semaphore.
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut join_set: JoinSet<FileOutcome> = JoinSet::new();
        for job in jobs {
            if self.cancel.load(Ordering::SeqCst) {
                summary.errors.push("indexing interrupted".into());
                break;
            }
            let config = Arc::clone(&self.config);
            let store = Arc::clone(&self.store);
            let vectors = Arc::clone(&self.vectors);
            let embedder = Arc::clone(&self.embedder);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                process_file(&config, &store, &vectors, &embedder, &semaphore, job).await
            });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(FileOutcome::Indexed) => summary.indexed += 1,
                Ok(FileOutcome::Touched) => summary.skipped += 1,
                Ok(FileOutcome::NotText) => {}
                Ok(FileOutcome::Failed { path, error }) => {
                    summary.failed += 1;
                    summary.errors.push(format!("{path}: {error}"));
                }
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(format!("worker panicked: {err}"));
                }
            }
        }

        // Per-file errors do not poison the directory.
        self.store
            .finalize_directory(root, DirStatus::Completed, epoch_now())
            .await?;
        Ok(())
    }
}

async fn process_file(
    config: &Config,
    store: &Store,
    vectors: &VectorStore,
    embedder: &EmbeddingClient,
    semaphore: &Semaphore,
    job: Job,
) -> FileOutcome {
    match process_file_inner(config, store, vectors, embedder, semaphore, &job).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let error = err.to_string();
            // Keep the failure on a row so `status` can show it, without
            // ever making the row look up to date: a row that matches the
            // candidate's mtime would be classified unchanged and the file
            // would never be retried.
            let write_result = if job.replace {
                // The prior row, its chunks, and its live points stay
                // intact; the stale mtime re-detects the file as modified
                // on the next run.
                match store.get_file(&job.path).await {
                    Ok(Some(mut record)) => {
                        if record.errors.contains(&error) {
                            Ok(())
                        } else {
                            record.errors.push(error.clone());
                            store.upsert_file(&record).await
                        }
                    }
                    Ok(None) => Ok(()),
                    Err(store_err) => Err(store_err),
                }
            } else {
                store
                    .upsert_file(&FileRecord {
                        path: job.path.clone(),
                        size: job.size,
                        // Sentinel mtime: never matches a scanned candidate,
                        // so the next run retries.
                        modified_time: 0,
                        hash: String::new(),
                        parent_dirs: job.parent_dirs.clone(),
                        chunks: Vec::new(),
                        errors: vec![error.clone()],
                    })
                    .await
            };
            if let Err(store_err) = write_result {
                tracing::warn!(path = %job.path, error = %store_err, "Could not record file error");
            }
            FileOutcome::Failed {
                path: job.path,
                error,
            }
        }
    }
}

async fn process_file_inner(
    config: &Config,
    store: &Store,
    vectors: &VectorStore,
    embedder: &EmbeddingClient,
    semaphore: &Semaphore,
    job: &Job,
) -> Result<FileOutcome> {
    let bytes = tokio::fs::read(&job.path)
        .await
        .map_err(|e| AppError::file(&job.path, format!("read failed: {e}")))?;
    if !is_text(Path::new(&job.path), &bytes) {
        return Ok(FileOutcome::NotText);
    }

    let hash = hash_bytes(&bytes);
    if job.stored_hash.as_deref() == Some(hash.as_str()) {
        // Only the mtime moved; refresh it so the next run takes the cheap
        // skip, and leave points untouched.
        if let Some(mut record) = store.get_file(&job.path).await? {
            record.modified_time = job.modified_time;
            store.upsert_file(&record).await?;
        }
        return Ok(FileOutcome::Touched);
    }

    let text = String::from_utf8(bytes)
        .map_err(|e| AppError::file(&job.path, format!("not valid UTF-8: {e}")))?;

    let mut refs = Vec::new();
    let mut contents = Vec::new();
    for (index, window) in chunk_text(&text, config.chunk_size, config.overlap).enumerate() {
        refs.push(ChunkRef {
            chunk_index: index,
            start_byte: window.start_byte,
            end_byte: window.end_byte,
            point_id: derive_point_id(&hash, index),
        });
        contents.push(window.content.to_string());
    }

    // Embed everything before touching either store, so a provider failure
    // leaves no partial chunks behind.
    let mut embeddings = Vec::with_capacity(contents.len());
    for batch in contents.chunks(config.embedding_batch.max(1)) {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| AppError::embedding(embedder.provider_name(), "semaphore closed"))?;
        embeddings.extend(embedder.embed_batch(batch).await?);
    }

    // Replaced files drop their old points first to keep chunk_index dense.
    if job.replace {
        vectors.delete_by_file_path(&job.path).await?;
    }

    let points: Vec<Point> = refs
        .iter()
        .zip(embeddings)
        .map(|(chunk, vector)| Point {
            id: chunk.point_id,
            vector,
            payload: PointPayload {
                file_path: job.path.clone(),
                chunk_id: chunk.chunk_index,
                file_hash: hash.clone(),
                parent_directories: job.parent_dirs.clone(),
            },
        })
        .collect();
    vectors.upsert(&points).await?;

    // Metadata lands only after the vector write succeeded; a crash in
    // between re-detects the file as modified on the next run.
    store
        .upsert_file(&FileRecord {
            path: job.path.clone(),
            size: job.size,
            modified_time: job.modified_time,
            hash,
            parent_dirs: job.parent_dirs.clone(),
            chunks: refs,
            errors: Vec::new(),
        })
        .await?;

    tracing::debug!(path = %job.path, chunks = points.len(), "Indexed file");
    Ok(FileOutcome::Indexed)
}

/// Ancestors of `path` from the registered root down to the containing
/// directory, root included.
fn ancestor_chain(root: &str, path: &str) -> Vec<String> {
    let mut chain = vec![root.to_string()];
    let Some(relative) = path.strip_prefix(root).map(|r| r.trim_start_matches('/')) else {
        return chain;
    };
    let mut current = root.trim_end_matches('/').to_string();
    let segments: Vec<&str> = relative.split('/').collect();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        current = format!("{current}/{segment}");
        chain.push(current.clone());
    }
    chain
}

pub(crate) fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
