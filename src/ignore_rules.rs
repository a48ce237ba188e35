//! Ignore engine
//!
//! Two layers, evaluated in order. The essential layer is a hard segment
//! match (`.git`, `node_modules`, `target`, `.DS_Store`, plus user extras)
//! that no `.gitignore` negation can undo; it lives outside the gitignore
//! library for exactly that reason. The gitignore layer is the `ignore`
//! crate's matcher, scoped to the scanned tree (no parent traversal, no
//! global or exclude files) with standard wildcard, anchoring, directory
//! and negation semantics.

use std::path::Path;

use ignore::WalkBuilder;

/// Segments ignored unconditionally.
const BUILTIN_ESSENTIALS: &[&str] = &[".git", "node_modules", "target", ".DS_Store"];

/// The non-negatable ignore layer.
#[derive(Debug, Clone)]
pub struct EssentialPatterns {
    patterns: Vec<String>,
}

impl EssentialPatterns {
    pub fn new(extra: &[String]) -> Self {
        let mut patterns: Vec<String> = BUILTIN_ESSENTIALS.iter().map(|s| s.to_string()).collect();
        for p in extra {
            if !patterns.iter().any(|have| have == p) {
                patterns.push(p.clone());
            }
        }
        EssentialPatterns { patterns }
    }

    /// True when any component of `path` equals an essential pattern.
    pub fn matches(&self, path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|seg| self.patterns.iter().any(|p| p == seg))
                .unwrap_or(false)
        })
    }
}

/// Walker over `root` with both ignore layers applied.
///
/// The essential filter prunes matching directories before descent, so a
/// `!node_modules` negation deeper in the tree never sees them. `.gitignore`
/// files are honored only inside the tree being walked.
pub fn build_walker(root: &Path, essentials: &EssentialPatterns) -> ignore::Walk {
    let essentials = essentials.clone();
    WalkBuilder::new(root)
        .git_ignore(true)
        .require_git(false)
        .parents(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .hidden(false)
        .follow_links(false)
        .filter_entry(move |entry| !essentials.matches(entry.path()))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_segments_match_anywhere() {
        let essentials = EssentialPatterns::new(&[]);
        assert!(essentials.matches(Path::new("/repo/node_modules/x.js")));
        assert!(essentials.matches(Path::new("/repo/sub/.git/config")));
        assert!(essentials.matches(Path::new("/repo/target")));
        assert!(essentials.matches(Path::new("/repo/docs/.DS_Store")));
    }

    #[test]
    fn partial_segment_does_not_match() {
        let essentials = EssentialPatterns::new(&[]);
        assert!(!essentials.matches(Path::new("/repo/node_modules_backup/x.js")));
        assert!(!essentials.matches(Path::new("/repo/retarget/file.rs")));
    }

    #[test]
    fn user_extras_are_honored_and_deduped() {
        let essentials = EssentialPatterns::new(&["dist".into(), "target".into()]);
        assert!(essentials.matches(Path::new("/repo/dist/bundle.js")));
        assert!(!essentials.matches(Path::new("/repo/src/main.rs")));
    }
}
