//! Workspace registry
//!
//! Named directory aliases supplied through the environment: every
//! `WORKSPACE_<NAME>=<path>[,<path>...]` variable becomes a workspace named
//! `<name>` (lower-cased). Read on demand, the one part of configuration
//! that is not frozen at startup, because MCP clients commonly inject these
//! per-session.

use std::path::Path;

use serde::Serialize;

use crate::content::normalize_path;
use crate::error::{AppError, Result};

const ENV_PREFIX: &str = "WORKSPACE_";

#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub name: String,
    /// Normalized path prefixes.
    pub paths: Vec<String>,
    /// Every path exists and is a directory.
    pub is_valid: bool,
}

#[derive(Debug, Default)]
pub struct WorkspaceRegistry {
    workspaces: Vec<Workspace>,
}

impl WorkspaceRegistry {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl Iterator<Item = (String, String)>) -> Self {
        let mut workspaces: Vec<Workspace> = vars
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(ENV_PREFIX)?;
                if name.is_empty() || value.trim().is_empty() {
                    return None;
                }
                let paths: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| normalize_path(Path::new(p)))
                    .collect();
                if paths.is_empty() {
                    return None;
                }
                let is_valid = paths.iter().all(|p| Path::new(p).is_dir());
                Some(Workspace {
                    name: name.to_lowercase(),
                    paths,
                    is_valid,
                })
            })
            .collect();
        workspaces.sort_by(|a, b| a.name.cmp(&b.name));
        WorkspaceRegistry { workspaces }
    }

    pub fn all(&self) -> &[Workspace] {
        &self.workspaces
    }

    /// Path prefixes for a named workspace. Unknown names are the caller's
    /// error (CLI and RPC both surface it as NotFound).
    pub fn resolve(&self, name: &str) -> Result<Vec<String>> {
        let wanted = name.to_lowercase();
        self.workspaces
            .iter()
            .find(|w| w.name == wanted)
            .map(|w| w.paths.clone())
            .ok_or_else(|| {
                let known: Vec<&str> = self.workspaces.iter().map(|w| w.name.as_str()).collect();
                AppError::NotFound(if known.is_empty() {
                    format!("workspace '{name}' is not defined; set WORKSPACE_{} in the environment", name.to_uppercase())
                } else {
                    format!("workspace '{name}' is not defined (known: {})", known.join(", "))
                })
            })
    }
}
