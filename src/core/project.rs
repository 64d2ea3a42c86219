//! Project discovery and structure

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Name of the marker directory holding config and the store
pub const LAGER_DIR: &str = ".lager";

/// Represents a lagerkoll project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .lager/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(LAGER_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    ///
    /// With `force`, an existing `.lager/config.yaml` is overwritten.
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let lager_dir = root.join(LAGER_DIR);
        if lager_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root));
        }

        std::fs::create_dir_all(&lager_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::create_dir_all(root.join("data"))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(lager_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(lager_dir.join(".gitignore"), "lager.db*\n")
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# lagerkoll project configuration

# Where queries read from: snapshot (lager.json) or store (SQLite)
# source: snapshot

# Snapshot file, relative to the project root
# snapshot: data/lager.json

# SQLite store, relative to the project root
# database: .lager/lager.db

# Rows per page for `lagerkoll list`
# per_page: 10

# Result cache lifetimes in seconds
# query_ttl_secs: 1
# facet_ttl_secs: 300

# Default output format (auto, tsv, json, csv, md, yaml, id)
# default_format: auto
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .lager directory
    pub fn lager_dir(&self) -> PathBuf {
        self.root.join(LAGER_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.lager_dir().join("config.yaml")
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    #[error("not a lagerkoll project (searched from {searched_from:?})")]
    #[diagnostic(
        code(lagerkoll::project::not_found),
        help("run `lagerkoll init` to create one")
    )]
    NotFound { searched_from: PathBuf },

    #[error("lagerkoll project already exists at {0:?}")]
    #[diagnostic(
        code(lagerkoll::project::exists),
        help("use `lagerkoll init --force` to rewrite the config")
    )]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    #[diagnostic(code(lagerkoll::project::io))]
    IoError(String),
}
