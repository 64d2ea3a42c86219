//! Configuration management with layered hierarchy

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::query::DEFAULT_PER_PAGE;
use crate::core::source::SourceKind;
use crate::core::Project;

pub const DEFAULT_SNAPSHOT: &str = "data/lager.json";
pub const DEFAULT_DATABASE: &str = ".lager/lager.db";
pub const DEFAULT_QUERY_TTL_SECS: u64 = 1;
pub const DEFAULT_FACET_TTL_SECS: u64 = 300;

/// lagerkoll configuration with layered hierarchy
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where queries read from
    pub source: Option<SourceKind>,

    /// Snapshot file (`lager.json`)
    pub snapshot: Option<PathBuf>,

    /// SQLite store file
    pub database: Option<PathBuf>,

    pub per_page: Option<usize>,

    pub query_ttl_secs: Option<u64>,

    pub facet_ttl_secs: Option<u64>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let project = Project::discover().ok();
        let mut config = Self::load_files(Self::global_config_path().as_deref(), project.as_ref());
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Global then project config file; missing or broken files are skipped
    pub fn load_files(global: Option<&Path>, project: Option<&Project>) -> Self {
        // 1. Built-in defaults (already in Default impl)
        let mut config = Config::default();

        // 2. Global user config (~/.config/lagerkoll/config.yaml)
        if let Some(global) = global.and_then(Self::read_file) {
            config.merge(global);
        }

        // 3. Project config (.lager/config.yaml)
        if let Some(project_config) = project.and_then(|p| Self::read_file(&p.config_path())) {
            config.merge(project_config);
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read config");
                return None;
            }
        };
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                None
            }
        }
    }

    /// 4. Environment variables
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(source) = var("LAGER_SOURCE") {
            match source.parse() {
                Ok(kind) => self.source = Some(kind),
                Err(e) => tracing::warn!(%source, error = %e, "ignoring LAGER_SOURCE"),
            }
        }
        if let Some(snapshot) = var("LAGER_SNAPSHOT") {
            self.snapshot = Some(PathBuf::from(snapshot));
        }
        if let Some(database) = var("LAGER_DATABASE") {
            self.database = Some(PathBuf::from(database));
        }
        if let Some(per_page) = var("LAGER_PER_PAGE") {
            match per_page.parse::<usize>() {
                Ok(n) if n > 0 => self.per_page = Some(n),
                _ => tracing::warn!(%per_page, "ignoring LAGER_PER_PAGE"),
            }
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lagerkoll")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.source.is_some() {
            self.source = other.source;
        }
        if other.snapshot.is_some() {
            self.snapshot = other.snapshot;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.per_page.is_some() {
            self.per_page = other.per_page;
        }
        if other.query_ttl_secs.is_some() {
            self.query_ttl_secs = other.query_ttl_secs;
        }
        if other.facet_ttl_secs.is_some() {
            self.facet_ttl_secs = other.facet_ttl_secs;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    pub fn source(&self) -> SourceKind {
        self.source.unwrap_or_default()
    }

    /// Snapshot path, resolved against the project root (or cwd)
    pub fn snapshot_path(&self, project: Option<&Project>) -> PathBuf {
        let path = self
            .snapshot
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT));
        resolve(project, &path)
    }

    /// Store path, resolved against the project root (or cwd)
    pub fn database_path(&self, project: Option<&Project>) -> PathBuf {
        let path = self
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        resolve(project, &path)
    }

    pub fn per_page(&self) -> usize {
        self.per_page.filter(|n| *n > 0).unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn query_ttl(&self) -> Duration {
        Duration::from_secs(self.query_ttl_secs.unwrap_or(DEFAULT_QUERY_TTL_SECS))
    }

    pub fn facet_ttl(&self) -> Duration {
        Duration::from_secs(self.facet_ttl_secs.unwrap_or(DEFAULT_FACET_TTL_SECS))
    }
}

fn resolve(project: Option<&Project>, path: &Path) -> PathBuf {
    match project {
        Some(p) => p.resolve(path),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.source(), SourceKind::Snapshot);
        assert_eq!(config.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(config.query_ttl(), Duration::from_secs(1));
        assert_eq!(config.facet_ttl(), Duration::from_secs(300));
        assert_eq!(config.snapshot_path(None), PathBuf::from("data/lager.json"));
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path(), false).unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "per_page: 50\nsource: store\n").unwrap();
        std::fs::write(project.config_path(), "per_page: 25\n").unwrap();

        let config = Config::load_files(Some(&global), Some(&project));
        assert_eq!(config.per_page(), 25);
        assert_eq!(config.source(), SourceKind::Store);
        assert_eq!(
            config.database_path(Some(&project)),
            project.root().join(".lager/lager.db")
        );
    }

    #[test]
    fn test_invalid_file_is_skipped() {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "per_page: [not a number").unwrap();
        assert_eq!(Config::load_files(Some(&global), None), Config::default());
    }

    #[test]
    fn test_env_overrides_files() {
        let vars: HashMap<&str, &str> = [
            ("LAGER_SOURCE", "store"),
            ("LAGER_SNAPSHOT", "/tmp/other.json"),
            ("LAGER_PER_PAGE", "0"),
        ]
        .into_iter()
        .collect();
        let mut config = Config {
            per_page: Some(20),
            ..Default::default()
        };
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.source(), SourceKind::Store);
        assert_eq!(config.snapshot_path(None), PathBuf::from("/tmp/other.json"));
        // zero is rejected, the file value stays
        assert_eq!(config.per_page(), 20);
    }
}
