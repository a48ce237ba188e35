//! Process-wide configuration
//!
//! Resolved once at startup from environment variables into an immutable
//! value passed to every component. Re-reading the environment mid-process
//! is not supported; workspace variables (`WORKSPACE_<NAME>`) are the one
//! exception and live in [`crate::workspace`].

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Default chunk window in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Default overlap between consecutive chunks in bytes.
pub const DEFAULT_CHUNK_OVERLAP: usize = 64;
/// Default per-file size cap (1 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;
/// Default bound on concurrent in-flight embedding requests.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default embedding batch size.
pub const DEFAULT_EMBEDDING_BATCH: usize = 32;
/// Default declared embedding dimension (nomic-embed-text).
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Which embedding backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    /// Deterministic hash-based vectors. Tests only.
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mock => "mock",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAi),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::Config(format!(
                "unknown EMBEDDING_PROVIDER '{other}' (expected ollama, openai, or mock)"
            ))),
        }
    }
}

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Vector store base URL.
    pub vector_endpoint: String,
    /// Optional bearer key for the vector store.
    pub vector_api_key: Option<String>,
    /// Vector store collection name.
    pub collection: String,

    pub provider: ProviderKind,
    /// Embedding provider base URL.
    pub embedding_endpoint: String,
    pub embedding_model: String,
    /// Required when `provider` is OpenAI.
    pub openai_api_key: Option<String>,
    /// Declared vector dimension, validated against the first real response.
    pub embedding_dimension: usize,
    pub embedding_batch: usize,

    /// Where the metadata database lives.
    pub data_dir: PathBuf,

    pub chunk_size: usize,
    pub overlap: usize,
    pub max_file_size: u64,
    pub concurrency: usize,
    /// Extra essential ignore patterns on top of the built-ins.
    pub extra_ignores: Vec<String>,
    pub verbose: bool,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration from an arbitrary variable source.
    ///
    /// Exists so tests can exercise resolution without mutating the
    /// process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider: ProviderKind = get("EMBEDDING_PROVIDER")
            .as_deref()
            .unwrap_or("ollama")
            .parse()?;

        let openai_api_key = get("OPENAI_API_KEY").filter(|k| !k.is_empty());
        if provider == ProviderKind::OpenAi && openai_api_key.is_none() {
            return Err(AppError::Config(
                "EMBEDDING_PROVIDER=openai requires OPENAI_API_KEY to be set".into(),
            ));
        }

        let embedding_endpoint = get("EMBEDDING_ENDPOINT")
            .or_else(|| get("OLLAMA_ENDPOINT"))
            .unwrap_or_else(|| match provider {
                ProviderKind::OpenAi => "https://api.openai.com/v1".into(),
                _ => "http://localhost:11434".into(),
            });

        let data_dir = match get("DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or_else(|| {
                    AppError::Config("cannot determine home directory; set DATA_DIR".into())
                })?
                .join(".directory-indexer"),
        };

        let chunk_size = parse_var(&get, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let overlap = parse_var(&get, "CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        if chunk_size == 0 {
            return Err(AppError::Config("CHUNK_SIZE must be greater than zero".into()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "CHUNK_OVERLAP ({overlap}) must be smaller than CHUNK_SIZE ({chunk_size})"
            )));
        }

        let config = Config {
            vector_endpoint: get("VECTOR_ENDPOINT")
                .or_else(|| get("QDRANT_ENDPOINT"))
                .unwrap_or_else(|| "http://localhost:6333".into())
                .trim_end_matches('/')
                .to_string(),
            vector_api_key: get("VECTOR_API_KEY").filter(|k| !k.is_empty()),
            collection: get("COLLECTION_NAME").unwrap_or_else(|| "directory-indexer".into()),
            provider,
            embedding_endpoint: embedding_endpoint.trim_end_matches('/').to_string(),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "nomic-embed-text".into()),
            openai_api_key,
            embedding_dimension: parse_var(&get, "EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            embedding_batch: parse_var(&get, "EMBEDDING_BATCH_SIZE", DEFAULT_EMBEDDING_BATCH)?,
            data_dir,
            chunk_size,
            overlap,
            max_file_size: parse_var(&get, "MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            concurrency: parse_var(&get, "CONCURRENCY", DEFAULT_CONCURRENCY)?.max(1),
            extra_ignores: get("IGNORE_PATTERNS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            verbose: false,
        };

        tracing::debug!(
            vector_endpoint = %config.vector_endpoint,
            collection = %config.collection,
            provider = config.provider.as_str(),
            embedding_endpoint = %config.embedding_endpoint,
            model = %config.embedding_model,
            dimension = config.embedding_dimension,
            data_dir = %config.data_dir.display(),
            "Resolved configuration"
        );
        Ok(config)
    }

    /// CLI flag override applied before the value is frozen.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Path of the metadata database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("data.db")
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn defaults_when_env_empty() {
        let config = Config::from_lookup(lookup(&[("DATA_DIR", "/tmp/di")])).unwrap();
        assert_eq!(config.vector_endpoint, "http://localhost:6333");
        assert_eq!(config.collection, "directory-indexer");
        assert_eq!(config.provider, ProviderKind::Ollama);
        assert_eq!(config.embedding_endpoint, "http://localhost:11434");
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.overlap, DEFAULT_CHUNK_OVERLAP);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/di/data.db"));
    }

    #[test]
    fn qdrant_endpoint_alias_respected() {
        let config = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("QDRANT_ENDPOINT", "http://qdrant:6333/"),
        ]))
        .unwrap();
        assert_eq!(config.vector_endpoint, "http://qdrant:6333");
    }

    #[test]
    fn primary_endpoint_wins_over_alias() {
        let config = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("VECTOR_ENDPOINT", "http://a:6333"),
            ("QDRANT_ENDPOINT", "http://b:6333"),
        ]))
        .unwrap();
        assert_eq!(config.vector_endpoint, "http://a:6333");
    }

    #[test]
    fn openai_requires_api_key() {
        let err = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("EMBEDDING_PROVIDER", "openai"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn openai_defaults_to_public_endpoint() {
        let config = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("EMBEDDING_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.embedding_endpoint, "https://api.openai.com/v1");
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("EMBEDDING_PROVIDER", "cohere"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("cohere"));
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let err = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn numeric_garbage_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("CHUNK_SIZE", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    #[test]
    fn extra_ignores_split_and_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/di"),
            ("IGNORE_PATTERNS", "dist, .cache,,build"),
        ]))
        .unwrap();
        assert_eq!(config.extra_ignores, vec!["dist", ".cache", "build"]);
    }
}
