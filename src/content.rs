//! Path and content utilities
//!
//! Path normalization, content hashing, the text gate, chunk windowing, and
//! deterministic point-id derivation. Everything here is pure; file I/O
//! lives in the scanner and indexer.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Namespace for UUIDv5 point ids. Fixed so ids are stable across processes.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x2f0c_70d7_27d8_4b29_8d35_4a6e_13c0_f5e1);

/// Bytes sampled from the head of a file for the NUL check.
pub const TEXT_SAMPLE_SIZE: usize = 8 * 1024;

/// Extensions accepted by the text gate: prose, code, data, config.
const TEXT_EXTENSIONS: &[&str] = &[
    // prose
    "md", "markdown", "txt", "rst", "adoc", "org", "log",
    // code
    "rs", "py", "js", "mjs", "cjs", "ts", "jsx", "tsx", "go", "c", "h", "cpp", "hpp", "cc",
    "java", "cs", "rb", "php", "swift", "kt", "scala", "sh", "bash", "zsh", "fish", "pl", "lua",
    "r", "sql", "html", "htm", "css", "scss", "less", "vue", "svelte",
    // data / config
    "json", "jsonl", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "xml", "csv", "tsv",
    "properties", "tf", "proto", "graphql", "dockerfile", "makefile", "lock",
];

/// Normalize a path to an absolute, forward-slash, case-preserving form.
///
/// `.` and `..` components collapse lexically (symlinks are not resolved).
/// Idempotent: normalizing a normalized path is a no-op.
pub fn normalize_path(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(p) => {
                prefix = p.as_os_str().to_string_lossy().replace('\\', "/");
            }
            Component::RootDir => {}
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(seg) => parts.push(seg.to_string_lossy().into_owned()),
        }
    }
    format!("{}/{}", prefix, parts.join("/"))
}

/// Lower-hex SHA-256 of raw bytes. File-content identity and the seed for
/// point-id derivation.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stable point id for `(file_hash, chunk_index)`.
///
/// UUIDv5 over the pair: re-indexing unchanged content yields the same ids
/// in any process, which makes vector-store upserts idempotent.
pub fn derive_point_id(file_hash: &str, chunk_index: usize) -> Uuid {
    Uuid::new_v5(
        &POINT_ID_NAMESPACE,
        format!("{file_hash}:{chunk_index}").as_bytes(),
    )
}

/// Text gate: accepted extension and no NUL byte in the head sample.
///
/// Rejection is a skip, not an error: binary and unknown files are simply
/// outside the index.
pub fn is_text(path: &Path, sample: &[u8]) -> bool {
    let known = path
        .extension()
        .or_else(|| path.file_name())
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    known && !sample[..sample.len().min(TEXT_SAMPLE_SIZE)].contains(&0)
}

/// One window over a file's UTF-8 content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow<'a> {
    /// Half-open byte range into the original text.
    pub start_byte: usize,
    pub end_byte: usize,
    pub content: &'a str,
}

/// Lazily window `text` into chunks of at most `chunk_size` bytes,
/// consecutive chunks overlapping by at most `overlap` bytes.
///
/// Boundaries never split a multi-byte code point: a window end shifts left
/// to the nearest boundary, the following start shifts right. Empty input
/// yields no chunks. Callers validate `overlap < chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Chunker<'_> {
    Chunker {
        text,
        chunk_size: chunk_size.max(1),
        overlap,
        start: 0,
        done: text.is_empty(),
    }
}

pub struct Chunker<'a> {
    text: &'a str,
    chunk_size: usize,
    overlap: usize,
    start: usize,
    done: bool,
}

impl<'a> Iterator for Chunker<'a> {
    type Item = ChunkWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let len = self.text.len();
        let ideal_end = (self.start + self.chunk_size).min(len);
        let mut end = floor_char_boundary(self.text, ideal_end);
        if end <= self.start {
            // A single code point wider than chunk_size; take it whole
            // rather than emit an empty window.
            end = ceil_char_boundary(self.text, self.start + 1);
        }

        let window = ChunkWindow {
            start_byte: self.start,
            end_byte: end,
            content: &self.text[self.start..end],
        };

        if end >= len {
            self.done = true;
        } else {
            let mut next = ceil_char_boundary(self.text, end.saturating_sub(self.overlap));
            if next <= self.start {
                next = end;
            }
            self.start = next;
        }
        Some(window)
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    let len = text.len();
    while index < len && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots_and_parents() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), "/a/c/d");
        assert_eq!(normalize_path(Path::new("/a//b/")), "/a/b");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_path(Path::new("/x/../y/z"));
        let twice = normalize_path(Path::new(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_preserves_case() {
        assert_eq!(normalize_path(Path::new("/Foo/BAR")), "/Foo/BAR");
    }

    #[test]
    fn hash_matches_known_vector() {
        assert_eq!(
            hash_bytes(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn point_ids_deterministic_and_distinct() {
        let h = hash_bytes(b"content");
        assert_eq!(derive_point_id(&h, 0), derive_point_id(&h, 0));
        assert_ne!(derive_point_id(&h, 0), derive_point_id(&h, 1));
        assert_ne!(derive_point_id(&h, 0), derive_point_id(&hash_bytes(b"other"), 0));
    }

    #[test]
    fn text_gate_accepts_known_extensions() {
        assert!(is_text(Path::new("/p/readme.md"), b"hello"));
        assert!(is_text(Path::new("/p/main.RS"), b"fn main() {}"));
        assert!(!is_text(Path::new("/p/image.png"), b"not really"));
        assert!(!is_text(Path::new("/p/noext"), b"text"));
    }

    #[test]
    fn text_gate_rejects_nul_bytes() {
        assert!(!is_text(Path::new("/p/data.json"), b"ab\0cd"));
    }

    #[test]
    fn chunk_empty_yields_nothing() {
        assert_eq!(chunk_text("", 16, 0).count(), 0);
    }

    #[test]
    fn chunk_short_input_single_window() {
        let chunks: Vec<_> = chunk_text("hello", 16, 4).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_byte, 0);
        assert_eq!(chunks[0].end_byte, 5);
        assert_eq!(chunks[0].content, "hello");
    }

    #[test]
    fn chunk_advances_by_size_minus_overlap() {
        let text = "abcdefghijklmnop"; // 16 bytes
        let chunks: Vec<_> = chunk_text(text, 8, 2).collect();
        assert_eq!(chunks[0].content, "abcdefgh");
        assert_eq!(chunks[1].start_byte, 6);
        assert_eq!(chunks[1].content, "ghijklmn");
        assert_eq!(chunks[2].start_byte, 12);
        assert_eq!(chunks[2].content, "mnop");
    }

    #[test]
    fn chunk_zero_overlap_tiles_exactly() {
        let text = "0123456789";
        let chunks: Vec<_> = chunk_text(text, 4, 0).collect();
        let rebuilt: String = chunks.iter().map(|c| c.content).collect();
        assert_eq!(rebuilt, text);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_byte, pair[1].start_byte);
        }
    }

    #[test]
    fn chunk_never_splits_code_points() {
        // "é" is 2 bytes; a 3-byte window would land mid-character.
        let text = "ééééé"; // 10 bytes
        for chunk in chunk_text(text, 3, 0) {
            assert!(text.is_char_boundary(chunk.start_byte));
            assert!(text.is_char_boundary(chunk.end_byte));
            assert!(chunk.end_byte - chunk.start_byte <= 3);
        }
    }

    #[test]
    fn chunk_wider_code_point_than_window_taken_whole() {
        let text = "🦀🦀"; // 4 bytes each
        let chunks: Vec<_> = chunk_text(text, 2, 0).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "🦀");
        assert_eq!(chunks[1].content, "🦀");
    }

    #[test]
    fn chunk_round_trip_with_overlap() {
        let text = "the quick brown fox jumps over the lazy dog";
        let chunks: Vec<_> = chunk_text(text, 10, 3).collect();
        // De-overlap using recorded offsets: each chunk contributes the bytes
        // past the previous chunk's end.
        let mut rebuilt = String::new();
        let mut covered = 0;
        for c in &chunks {
            assert!(c.start_byte <= covered, "gap before {}", c.start_byte);
            if c.end_byte > covered {
                rebuilt.push_str(&text[covered..c.end_byte]);
                covered = c.end_byte;
            }
        }
        assert_eq!(rebuilt, text);
    }
}
