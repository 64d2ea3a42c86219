//! Shared helper functions for CLI commands
//!
//! Project and config resolution, source selection and the small text
//! formatters used by the table and detail views.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use miette::Result;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{
    CachedSource, Config, InventorySource, Project, SnapshotSource, SourceKind,
    StoreSource,
};

/// Project, layered config and CLI overrides for one invocation
#[derive(Debug)]
pub struct Context {
    pub project: Option<Project>,
    pub config: Config,
    source_override: Option<SourceKind>,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self> {
        let (project, config) = match &global.project {
            Some(root) => {
                let project = Project::discover_from(root)?;
                let mut config =
                    Config::load_files(Config::global_config_path().as_deref(), Some(&project));
                config.apply_env(|key| std::env::var(key).ok());
                (Some(project), config)
            }
            None => (Project::discover().ok(), Config::load()),
        };

        Ok(Self {
            project,
            config,
            source_override: global.source,
        })
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_override.unwrap_or_else(|| self.config.source())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.config.snapshot_path(self.project.as_ref())
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.database_path(self.project.as_ref())
    }

    /// Open the configured source without a cache in front
    pub fn open_source(&self) -> Result<Box<dyn InventorySource>> {
        let kind = self.source_kind();
        tracing::debug!(source = %kind, "opening inventory source");

        match kind {
            SourceKind::Snapshot => {
                let path = self.snapshot_path();
                if !path.exists() {
                    return Err(miette::miette!(
                        help = "set `snapshot` in .lager/config.yaml or LAGER_SNAPSHOT",
                        "snapshot not found: {}",
                        path.display()
                    ));
                }
                Ok(Box::new(SnapshotSource::new(path)))
            }
            SourceKind::Store => {
                let path = self.database_path();
                Ok(Box::new(StoreSource::open(&path)?))
            }
        }
    }

    /// Open the configured source behind the result cache
    pub fn open_cached(&self) -> Result<CachedSource<Box<dyn InventorySource>>> {
        Ok(CachedSource::new(
            self.open_source()?,
            self.config.query_ttl(),
            self.config.facet_ttl(),
        ))
    }

    /// `-f` wins; `auto` falls back to `default_format` from config
    pub fn format(&self, global: &GlobalOpts) -> OutputFormat {
        if global.format != OutputFormat::Auto {
            return global.format;
        }
        self.config
            .default_format
            .as_deref()
            .and_then(|name| match OutputFormat::from_str(name, true) {
                Ok(format) => Some(format),
                Err(_) => {
                    tracing::warn!(%name, "ignoring unknown default_format");
                    None
                }
            })
            .unwrap_or(OutputFormat::Auto)
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Calendar date in UTC
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

const UNITS: &[(f64, Unit)] = &[
    (60.0, Unit::Second),
    (60.0, Unit::Minute),
    (24.0, Unit::Hour),
    (7.0, Unit::Day),
    (4.34524, Unit::Week),
    (12.0, Unit::Month),
    (f64::INFINITY, Unit::Year),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn name(self, n: i64) -> &'static str {
        let one = n == 1;
        match self {
            Unit::Second if one => "sekund",
            Unit::Second => "sekunder",
            Unit::Minute if one => "minut",
            Unit::Minute => "minuter",
            Unit::Hour if one => "timme",
            Unit::Hour => "timmar",
            Unit::Day if one => "dag",
            Unit::Day => "dagar",
            Unit::Week if one => "vecka",
            Unit::Week => "veckor",
            Unit::Month if one => "månad",
            Unit::Month => "månader",
            Unit::Year => "år",
        }
    }

    /// Word forms for -1/0/+1 ("i går", "nästa vecka")
    fn idiom(self, n: i64) -> Option<&'static str> {
        match (self, n) {
            (Unit::Second, 0) => Some("nu"),
            (Unit::Day, -1) => Some("i går"),
            (Unit::Day, 1) => Some("i morgon"),
            (Unit::Week, -1) => Some("förra veckan"),
            (Unit::Week, 1) => Some("nästa vecka"),
            (Unit::Month, -1) => Some("förra månaden"),
            (Unit::Month, 1) => Some("nästa månad"),
            (Unit::Year, -1) => Some("i fjol"),
            (Unit::Year, 1) => Some("nästa år"),
            _ => None,
        }
    }
}

/// Swedish relative time, e.g. "för 3 dagar sedan" or "om 2 timmar"
///
/// Seconds step up through minutes, hours, days, weeks and months, rounding
/// at each step.
pub fn format_relative(dt: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let mut diff = ((*dt - *now).num_milliseconds() as f64 / 1000.0).round();
    let mut unit = Unit::Second;

    for (amount, next) in UNITS {
        if diff.abs() < *amount {
            break;
        }
        diff = (diff / amount).round();
        unit = *next;
    }

    let n = diff as i64;
    if let Some(word) = unit.idiom(n) {
        return word.to_string();
    }
    if n < 0 {
        format!("för {} {} sedan", -n, unit.name(-n))
    } else {
        format!("om {} {}", n, unit.name(n))
    }
}

/// Render a TTL for display
pub fn format_ttl(ttl: Duration) -> String {
    format!("{}s", ttl.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_str("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_truncate_str_multibyte() {
        assert_eq!(truncate_str("Bromsskiva främre vänster", 12), "Bromsskiv...");
        assert_eq!(truncate_str("åäöåäö", 6), "åäöåäö");
        assert_eq!(truncate_str("åäöåäöå", 6), "åäö...");
    }

    #[test]
    fn test_format_date_is_utc() {
        assert_eq!(format_date(&at(2024, 3, 9, 23, 59, 0)), "2024-03-09");
    }

    #[test]
    fn test_relative_past() {
        let now = at(2024, 5, 20, 12, 0, 0);
        assert_eq!(format_relative(&at(2024, 5, 17, 12, 0, 0), &now), "för 3 dagar sedan");
        assert_eq!(format_relative(&at(2024, 5, 20, 10, 0, 0), &now), "för 2 timmar sedan");
        assert_eq!(format_relative(&at(2024, 5, 20, 11, 59, 0), &now), "för 1 minut sedan");
        assert_eq!(format_relative(&at(2024, 5, 19, 12, 0, 0), &now), "i går");
        assert_eq!(format_relative(&at(2024, 5, 6, 12, 0, 0), &now), "för 2 veckor sedan");
        assert_eq!(format_relative(&at(2022, 5, 20, 12, 0, 0), &now), "för 2 år sedan");
    }

    #[test]
    fn test_relative_now_and_future() {
        let now = at(2024, 5, 20, 12, 0, 0);
        assert_eq!(format_relative(&now, &now), "nu");
        assert_eq!(format_relative(&at(2024, 5, 20, 12, 0, 30), &now), "om 30 sekunder");
        assert_eq!(format_relative(&at(2024, 5, 21, 12, 0, 0), &now), "i morgon");
    }
}
