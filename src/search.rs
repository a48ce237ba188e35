//! Search engine
//!
//! Query → embed → over-fetched vector search → group per file → filter by
//! workspace / path prefix → metadata join → shaped results. `similar` runs
//! the same pipeline seeded from a file's mean chunk embedding; `get_content`
//! serves chunk-addressable slices of indexed files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::content::normalize_path;
use crate::embedding::EmbeddingClient;
use crate::error::{AppError, Result};
use crate::store::Store;
use crate::vector::{ScoredPoint, VectorStore};
use crate::workspace::WorkspaceRegistry;

/// Hard ceiling on requested results.
pub const MAX_LIMIT: usize = 100;
/// Default result count.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Default, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub workspace: Option<String>,
    pub min_score: Option<f32>,
    pub path_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkHit {
    pub chunk_id: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub file_path: String,
    /// Max chunk score for the file.
    pub score: f32,
    pub matching_chunks: usize,
    pub size: u64,
    pub total_chunks: usize,
    /// Matching chunks, best first.
    pub chunks: Vec<ChunkHit>,
}

/// Semantic search across everything indexed.
pub async fn search(
    store: &Store,
    vectors: &VectorStore,
    embedder: &EmbeddingClient,
    workspaces: &WorkspaceRegistry,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Err(AppError::UserInput("search query is empty".into()));
    }
    let vector = embedder.embed(query).await?;
    run_search(store, vectors, workspaces, &vector, opts, None).await
}

/// Files similar to an already-indexed file, the file itself excluded.
///
/// The query vector is the mean of the file's chunk embeddings (chunk text
/// re-read from the recorded byte ranges); when only one chunk exists the
/// mean degenerates to that chunk's embedding.
pub async fn similar(
    store: &Store,
    vectors: &VectorStore,
    embedder: &EmbeddingClient,
    workspaces: &WorkspaceRegistry,
    file_path: &str,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let path = normalize_path(Path::new(file_path));
    let record = store
        .get_file(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file '{path}' is not indexed")))?;
    if record.chunks.is_empty() {
        return Err(AppError::NotFound(format!(
            "file '{path}' has no indexed chunks"
        )));
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::file(&path, format!("read failed: {e}")))?;
    let mut texts = Vec::with_capacity(record.chunks.len());
    for chunk in &record.chunks {
        let slice = bytes
            .get(chunk.start_byte..chunk.end_byte)
            .ok_or_else(|| AppError::file(&path, "file shrank since indexing; re-run index"))?;
        texts.push(String::from_utf8_lossy(slice).into_owned());
    }
    let embeddings = embedder.embed_batch(&texts).await?;
    let vector = mean_vector(&embeddings)
        .or_else(|| embeddings.first().cloned())
        .ok_or_else(|| AppError::NotFound(format!("file '{path}' has no indexed chunks")))?;

    let opts = SearchOptions {
        limit,
        ..Default::default()
    };
    run_search(store, vectors, workspaces, &vector, &opts, Some(&path)).await
}

async fn run_search(
    store: &Store,
    vectors: &VectorStore,
    workspaces: &WorkspaceRegistry,
    vector: &[f32],
    opts: &SearchOptions,
    exclude: Option<&str>,
) -> Result<Vec<SearchResult>> {
    let limit = if opts.limit == 0 {
        DEFAULT_LIMIT
    } else {
        opts.limit.min(MAX_LIMIT)
    };
    // Over-fetch to survive post-filtering.
    let fetch = (limit * 3).clamp(10, 300);

    let allowed = allowed_prefixes(workspaces, opts)?;
    let hits = vectors.search(vector, fetch, None).await?;
    let grouped = group_by_file(&hits, exclude, &allowed, opts.min_score);

    let mut results = Vec::new();
    for (file_path, chunks) in grouped {
        let Some(record) = store.get_file(&file_path).await? else {
            tracing::debug!(path = %file_path, "Vector hit without metadata row; skipping");
            continue;
        };
        let score = chunks.first().map(|c| c.score).unwrap_or(0.0);
        results.push(SearchResult {
            file_path,
            score,
            matching_chunks: chunks.len(),
            size: record.size,
            total_chunks: record.chunks.len(),
            chunks,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    results.truncate(limit);
    Ok(results)
}

/// Resolve workspace / path-prefix options into allowed prefixes.
/// Empty means unfiltered.
fn allowed_prefixes(
    workspaces: &WorkspaceRegistry,
    opts: &SearchOptions,
) -> Result<Vec<String>> {
    let mut allowed = Vec::new();
    if let Some(name) = &opts.workspace {
        allowed.extend(workspaces.resolve(name)?);
    }
    if let Some(prefix) = &opts.path_prefix {
        allowed.push(normalize_path(Path::new(prefix)));
    }
    Ok(allowed)
}

/// Group raw chunk hits per file, chunks sorted best-first, files keyed so
/// iteration is deterministic.
fn group_by_file(
    hits: &[ScoredPoint],
    exclude: Option<&str>,
    allowed: &[String],
    min_score: Option<f32>,
) -> BTreeMap<String, Vec<ChunkHit>> {
    let mut grouped: BTreeMap<String, Vec<ChunkHit>> = BTreeMap::new();
    for hit in hits {
        let Some(payload) = &hit.payload else { continue };
        if exclude == Some(payload.file_path.as_str()) {
            continue;
        }
        if !allowed.is_empty() && !under_any(&payload.file_path, allowed) {
            continue;
        }
        grouped
            .entry(payload.file_path.clone())
            .or_default()
            .push(ChunkHit {
                chunk_id: payload.chunk_id,
                score: hit.score,
            });
    }
    for chunks in grouped.values_mut() {
        chunks.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }
    if let Some(min) = min_score {
        grouped.retain(|_, chunks| chunks.first().map(|c| c.score >= min).unwrap_or(false));
    }
    grouped
}

fn under_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        let trimmed = prefix.trim_end_matches('/');
        path == trimmed || path.starts_with(&format!("{trimmed}/"))
    })
}

fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut mean = vec![0.0_f32; first.len()];
    for vector in vectors {
        if vector.len() != mean.len() {
            return None;
        }
        for (m, v) in mean.iter_mut().zip(vector) {
            *m += v;
        }
    }
    let n = vectors.len() as f32;
    for m in &mut mean {
        *m /= n;
    }
    Some(mean)
}

// ===== Content retrieval =====

/// Return file content, whole or as a 1-based inclusive chunk range
/// (`"3"` or `"2-5"`). Indexed files slice the recorded byte ranges;
/// unindexed files fall back to the same semantics over lines.
pub async fn get_content(
    store: &Store,
    file_path: &str,
    chunks: Option<&str>,
) -> Result<String> {
    let path = normalize_path(Path::new(file_path));
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::file(&path, format!("read failed: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| AppError::file(&path, format!("not valid UTF-8: {e}")))?;

    let Some(spec) = chunks else {
        return Ok(text);
    };
    let (start, end) = parse_range(spec)?;

    if let Some(record) = store.get_file(&path).await? {
        if record.chunks.is_empty() || end > record.chunks.len() {
            return Err(AppError::file(
                &path,
                format!(
                    "chunk range {spec} out of bounds (file has {} chunks)",
                    record.chunks.len()
                ),
            ));
        }
        let mut out = String::new();
        for chunk in &record.chunks[start - 1..end] {
            let slice = text.get(chunk.start_byte..chunk.end_byte).ok_or_else(|| {
                AppError::file(&path, "file changed since indexing; re-run index")
            })?;
            out.push_str(slice);
        }
        return Ok(out);
    }

    // Not indexed: the same 1-based inclusive range over lines.
    let lines: Vec<&str> = text.lines().collect();
    if end > lines.len() {
        return Err(AppError::file(
            &path,
            format!("line range {spec} out of bounds (file has {} lines)", lines.len()),
        ));
    }
    Ok(lines[start - 1..end].join("\n"))
}

/// Parse `"N"` or `"M-N"`, 1-based inclusive.
fn parse_range(spec: &str) -> Result<(usize, usize)> {
    let invalid = || {
        AppError::UserInput(format!(
            "invalid chunk range '{spec}' (expected N or M-N, 1-based)"
        ))
    };
    let spec = spec.trim();
    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => (
            a.trim().parse::<usize>().map_err(|_| invalid())?,
            b.trim().parse::<usize>().map_err(|_| invalid())?,
        ),
        None => {
            let n = spec.parse::<usize>().map_err(|_| invalid())?;
            (n, n)
        }
    };
    if start == 0 || end < start {
        return Err(invalid());
    }
    Ok((start, end))
}
