//! SQLite metadata store
//!
//! The durable catalog of directories, files, chunks, and per-file errors:
//! the source of truth for what should exist; the vector store is a derived
//! index. sqlx with WAL mode: concurrent reads, a single writer. Schema is
//! created on first open; migrations are additive only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// One contiguous window of a file's content, addressable in the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// 0-based, dense.
    pub chunk_index: usize,
    /// Half-open UTF-8 byte range.
    pub start_byte: usize,
    pub end_byte: usize,
    /// Vector-store point id, derived from `(file_hash, chunk_index)`.
    pub point_id: Uuid,
}

/// Full row for an indexed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Normalized absolute path (unique).
    pub path: String,
    pub size: u64,
    /// Epoch seconds.
    pub modified_time: i64,
    /// Lower-hex SHA-256 of the raw bytes.
    pub hash: String,
    /// Ancestor chain up to and including each registered root.
    pub parent_dirs: Vec<String>,
    /// Sorted by `chunk_index`.
    pub chunks: Vec<ChunkRef>,
    pub errors: Vec<String>,
}

/// Directory lifecycle. Transitions strictly pending → indexing →
/// (completed | failed); rows are never deleted outside an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Pending,
    Indexing,
    Completed,
    Failed,
}

impl DirStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirStatus::Pending => "pending",
            DirStatus::Indexing => "indexing",
            DirStatus::Completed => "completed",
            DirStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> DirStatus {
        match s {
            "indexing" => DirStatus::Indexing,
            "completed" => DirStatus::Completed,
            "failed" => DirStatus::Failed,
            _ => DirStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub path: String,
    pub status: DirStatus,
    /// Epoch seconds of the last completed index, if any.
    pub indexed_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub directories: u64,
    pub files: u64,
    pub chunks: u64,
    pub db_size_bytes: u64,
}

/// Handle over the metadata database.
pub struct Store {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!(
                    "cannot create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let url = format!(
            "sqlite://{}?mode=rwc",
            path.to_string_lossy().replace('\\', "/")
        );
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // WAL mode: concurrent reads, single writer
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous = NORMAL")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .map_err(|e| AppError::Storage(format!("cannot open {}: {e}", path.display())))?;

        let store = Store {
            pool,
            db_path: path.to_path_buf(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS directories (
                id INTEGER PRIMARY KEY,
                path TEXT UNIQUE NOT NULL,
                status TEXT NOT NULL,
                indexed_at INTEGER
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                path TEXT UNIQUE NOT NULL,
                size INTEGER NOT NULL,
                modified_time INTEGER NOT NULL,
                hash TEXT NOT NULL,
                parent_dirs TEXT NOT NULL,
                chunks TEXT NOT NULL,
                errors TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Directories =====

    pub async fn upsert_directory(&self, path: &str, status: DirStatus) -> Result<()> {
        sqlx::query(
            "INSERT INTO directories (path, status) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET status = excluded.status",
        )
        .bind(path)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal transition with the completion timestamp.
    pub async fn finalize_directory(
        &self,
        path: &str,
        status: DirStatus,
        indexed_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE directories SET status = ?2, indexed_at = ?3 WHERE path = ?1",
        )
        .bind(path)
        .bind(status.as_str())
        .bind(indexed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_directory(&self, path: &str) -> Result<Option<DirectoryRecord>> {
        let row = sqlx::query(
            "SELECT path, status, indexed_at FROM directories WHERE path = ?1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| DirectoryRecord {
            path: r.get("path"),
            status: DirStatus::parse(r.get::<String, _>("status").as_str()),
            indexed_at: r.get("indexed_at"),
        }))
    }

    pub async fn list_directories(&self) -> Result<Vec<DirectoryRecord>> {
        let rows = sqlx::query("SELECT path, status, indexed_at FROM directories ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| DirectoryRecord {
                path: r.get("path"),
                status: DirStatus::parse(r.get::<String, _>("status").as_str()),
                indexed_at: r.get("indexed_at"),
            })
            .collect())
    }

    // ===== Files =====

    /// Full-row replace; the chunks field travels with the row, so a file
    /// and its chunk list are always updated together.
    pub async fn upsert_file(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO files (path, size, modified_time, hash, parent_dirs, chunks, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                size = excluded.size,
                modified_time = excluded.modified_time,
                hash = excluded.hash,
                parent_dirs = excluded.parent_dirs,
                chunks = excluded.chunks,
                errors = excluded.errors",
        )
        .bind(&record.path)
        .bind(record.size as i64)
        .bind(record.modified_time)
        .bind(&record.hash)
        .bind(to_json(&record.parent_dirs)?)
        .bind(to_json(&record.chunks)?)
        .bind(to_json(&record.errors)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT path, size, modified_time, hash, parent_dirs, chunks, errors
             FROM files WHERE path = ?1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_file).transpose()
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All rows whose path starts with `prefix`. Exact prefix semantics; the
    /// caller supplies a trailing slash to avoid `/a/b` matching `/a/bc`.
    pub async fn files_under(&self, prefix: &str) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT path, size, modified_time, hash, parent_dirs, chunks, errors
             FROM files WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_file).collect()
    }

    pub async fn all_file_paths(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT path FROM files ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("path")).collect())
    }

    /// Truncate everything. Used only by the reset operation.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM files").execute(&self.pool).await?;
        sqlx::query("DELETE FROM directories")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let directories: i64 = sqlx::query("SELECT COUNT(*) AS n FROM directories")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        let files: i64 = sqlx::query("SELECT COUNT(*) AS n FROM files")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        let chunk_rows = sqlx::query("SELECT chunks FROM files")
            .fetch_all(&self.pool)
            .await?;
        let mut chunks: u64 = 0;
        for row in chunk_rows {
            let raw: String = row.get("chunks");
            let parsed: Vec<ChunkRef> = from_json(&raw)?;
            chunks += parsed.len() as u64;
        }
        let db_size_bytes = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            directories: directories as u64,
            files: files as u64,
            chunks,
            db_size_bytes,
        })
    }
}

fn row_to_file(row: sqlx::sqlite::SqliteRow) -> Result<FileRecord> {
    Ok(FileRecord {
        path: row.get("path"),
        size: row.get::<i64, _>("size") as u64,
        modified_time: row.get("modified_time"),
        hash: row.get("hash"),
        parent_dirs: from_json(&row.get::<String, _>("parent_dirs"))?,
        chunks: from_json(&row.get::<String, _>("chunks"))?,
        errors: from_json(&row.get::<String, _>("errors"))?,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Storage(format!("serialize failed: {e}")))
}

fn from_json<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Storage(format!("corrupt JSON column: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::derive_point_id;
    use tempfile::TempDir;

    async fn make_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("data.db")).await.unwrap();
        (store, dir)
    }

    fn sample_record(path: &str) -> FileRecord {
        let hash = "ab".repeat(32);
        FileRecord {
            path: path.to_string(),
            size: 24,
            modified_time: 1_700_000_000,
            hash: hash.clone(),
            parent_dirs: vec!["/r".into()],
            chunks: vec![
                ChunkRef {
                    chunk_index: 0,
                    start_byte: 0,
                    end_byte: 12,
                    point_id: derive_point_id(&hash, 0),
                },
                ChunkRef {
                    chunk_index: 1,
                    start_byte: 12,
                    end_byte: 24,
                    point_id: derive_point_id(&hash, 1),
                },
            ],
            errors: vec![],
        }
    }

    #[tokio::test]
    async fn directory_lifecycle() {
        let (store, _dir) = make_store().await;
        store.upsert_directory("/r", DirStatus::Indexing).await.unwrap();
        let row = store.get_directory("/r").await.unwrap().unwrap();
        assert_eq!(row.status, DirStatus::Indexing);
        assert_eq!(row.indexed_at, None);

        store
            .finalize_directory("/r", DirStatus::Completed, 1_700_000_123)
            .await
            .unwrap();
        let row = store.get_directory("/r").await.unwrap().unwrap();
        assert_eq!(row.status, DirStatus::Completed);
        assert_eq!(row.indexed_at, Some(1_700_000_123));
    }

    #[tokio::test]
    async fn missing_rows_are_none_not_errors() {
        let (store, _dir) = make_store().await;
        assert!(store.get_directory("/nope").await.unwrap().is_none());
        assert!(store.get_file("/nope.md").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_round_trip_preserves_chunks() {
        let (store, _dir) = make_store().await;
        let record = sample_record("/r/a.md");
        store.upsert_file(&record).await.unwrap();
        let loaded = store.get_file("/r/a.md").await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn upsert_is_full_row_replace() {
        let (store, _dir) = make_store().await;
        let mut record = sample_record("/r/a.md");
        store.upsert_file(&record).await.unwrap();

        record.hash = "cd".repeat(32);
        record.chunks.truncate(1);
        record.errors.push("embed failed once".into());
        store.upsert_file(&record).await.unwrap();

        let loaded = store.get_file("/r/a.md").await.unwrap().unwrap();
        assert_eq!(loaded.chunks.len(), 1);
        assert_eq!(loaded.errors, vec!["embed failed once".to_string()]);
    }

    #[tokio::test]
    async fn files_under_uses_exact_prefix() {
        let (store, _dir) = make_store().await;
        store.upsert_file(&sample_record("/r/docs/a.md")).await.unwrap();
        store.upsert_file(&sample_record("/r/docs/sub/b.md")).await.unwrap();
        store.upsert_file(&sample_record("/r/docs-extra/c.md")).await.unwrap();

        let under = store.files_under("/r/docs/").await.unwrap();
        let paths: Vec<&str> = under.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/r/docs/a.md", "/r/docs/sub/b.md"]);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let (store, _dir) = make_store().await;
        store.upsert_directory("/r", DirStatus::Completed).await.unwrap();
        store.upsert_file(&sample_record("/r/a.md")).await.unwrap();
        store.delete_file("/r/a.md").await.unwrap();
        assert!(store.get_file("/r/a.md").await.unwrap().is_none());

        store.upsert_file(&sample_record("/r/b.md")).await.unwrap();
        store.clear().await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.files, 0);
        assert_eq!(stats.directories, 0);
    }

    #[tokio::test]
    async fn stats_count_chunks_and_size() {
        let (store, _dir) = make_store().await;
        store.upsert_directory("/r", DirStatus::Completed).await.unwrap();
        store.upsert_file(&sample_record("/r/a.md")).await.unwrap();
        store.upsert_file(&sample_record("/r/b.md")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.chunks, 4);
        assert!(stats.db_size_bytes > 0);
    }
}
