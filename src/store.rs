// SPDX-License-Identifier: AGPL-3.0-or-later

//! Flat-file storage for snapshots and comparisons
//!
//! Each saved snapshot produces `<name>.json` (the loadable artifact) and
//! three derived files: `<name>-measures.csv`, `<name>-issues.csv` and
//! `<name>-summary.txt`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::compare::Comparison;
use crate::report::{OutputFormat, Reporter};
use crate::snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot not found: {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact name '{0}': must be non-empty and contain no path separator")]
    InvalidName(String),

    #[error("failed to parse snapshot {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render summary: {0}")]
    Render(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Paths written by a snapshot save
#[derive(Debug, Clone)]
pub struct SavedArtifacts {
    pub snapshot: PathBuf,
    pub measures_csv: PathBuf,
    pub issues_csv: PathBuf,
    pub summary: PathBuf,
}

impl SavedArtifacts {
    pub fn paths(&self) -> [&Path; 4] {
        [
            self.snapshot.as_path(),
            self.measures_csv.as_path(),
            self.issues_csv.as_path(),
            self.summary.as_path(),
        ]
    }
}

/// A directory of saved snapshots
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a snapshot identifier to a file.
    ///
    /// Identifiers containing a path separator are taken as paths. Other
    /// names resolve inside the store, with `.json` appended if missing.
    pub fn resolve(&self, name: &str) -> PathBuf {
        if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
            return PathBuf::from(name);
        }
        if name.ends_with(".json") {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{}.json", name))
        }
    }

    /// Load a saved snapshot
    pub fn load_snapshot(&self, name: &str) -> StoreResult<Snapshot> {
        let path = self.resolve(name);
        debug!("Loading snapshot from {}", path.display());

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) => return Err(StoreError::NotFound { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Parse { path, source })
    }

    /// Save a snapshot and its derived artifacts
    ///
    /// `name` follows the same rules as [`SnapshotStore::resolve`] for names
    /// inside the store: a trailing `.json` is dropped. Path separators are
    /// rejected so artifacts never land outside the store.
    pub fn save(&self, name: &str, snapshot: &Snapshot) -> StoreResult<SavedArtifacts> {
        let name = artifact_name(name)?;
        self.ensure_dir()?;

        let artifacts = SavedArtifacts {
            snapshot: self.dir.join(format!("{}.json", name)),
            measures_csv: self.dir.join(format!("{}-measures.csv", name)),
            issues_csv: self.dir.join(format!("{}-issues.csv", name)),
            summary: self.dir.join(format!("{}-summary.txt", name)),
        };

        write_file(&artifacts.snapshot, &serde_json::to_string_pretty(snapshot)?)?;
        write_measures_csv(&artifacts.measures_csv, snapshot)?;
        write_issues_csv(&artifacts.issues_csv, snapshot)?;

        let summary = Reporter::new(OutputFormat::Text)
            .render_snapshot(snapshot)
            .map_err(|e| StoreError::Render(format!("{:#}", e)))?;
        write_file(&artifacts.summary, &summary)?;

        info!("Saved snapshot '{}' to {}", name, self.dir.display());
        Ok(artifacts)
    }

    /// Save a comparison as `<name>.json`, with the naming rules of [`SnapshotStore::save`]
    pub fn save_comparison(&self, name: &str, comparison: &Comparison) -> StoreResult<PathBuf> {
        let name = artifact_name(name)?;
        self.ensure_dir()?;
        let path = self.dir.join(format!("{}.json", name));
        write_file(&path, &serde_json::to_string_pretty(comparison)?)?;
        info!("Saved comparison to {}", path.display());
        Ok(path)
    }

    /// Names of stored snapshots, sorted
    ///
    /// Any `.json` file that loads as a snapshot with project info or a
    /// timestamp counts; saved comparisons are skipped.
    pub fn list(&self) -> StoreResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_snapshot_file(&path) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}

/// Default snapshot name: `<project>-<YYYYMMDD-HHMMSS>`
pub fn default_snapshot_name(project_key: &str, at: chrono::DateTime<chrono::Utc>) -> String {
    let safe_key: String = project_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    format!("{}-{}", safe_key, at.format("%Y%m%d-%H%M%S"))
}

fn artifact_name(name: &str) -> StoreResult<&str> {
    let stem = name.strip_suffix(".json").unwrap_or(name);
    let has_separator = stem.contains('/') || stem.contains(std::path::MAIN_SEPARATOR);
    if stem.is_empty() || has_separator || stem == "." || stem == ".." {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(stem)
}

fn is_snapshot_file(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
        return false;
    };
    value.get("qualityGateChange").is_none()
        && (value.get("timestamp").is_some() || value.get("projectInfo").is_some())
}

fn write_file(path: &Path, content: &str) -> StoreResult<()> {
    std::fs::write(path, content).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_measures_csv(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["metric", "value"])?;
    for measure in snapshot.measures.iter().flatten() {
        writer.write_record([measure.metric.as_str(), measure.value.as_str()])?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_issues_csv(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "key",
        "severity",
        "type",
        "component",
        "line",
        "message",
        "creationDate",
    ])?;
    for issue in snapshot.issues.iter().flatten() {
        let line = issue.line.map(|l| l.to_string()).unwrap_or_default();
        writer.write_record([
            issue.key.as_deref().unwrap_or(""),
            issue.severity.as_deref().unwrap_or(""),
            issue.issue_type.as_deref().unwrap_or(""),
            issue.component.as_deref().unwrap_or(""),
            line.as_str(),
            issue.message.as_deref().unwrap_or(""),
            issue.creation_date.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_resolve_names() {
        let store = SnapshotStore::new("reports");

        assert_eq!(store.resolve("before"), PathBuf::from("reports/before.json"));
        assert_eq!(store.resolve("before.json"), PathBuf::from("reports/before.json"));
        assert_eq!(store.resolve("other/dir/x.json"), PathBuf::from("other/dir/x.json"));
    }

    #[test]
    fn test_default_snapshot_name() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(default_snapshot_name("acme_api", at), "acme_api-20240301-090507");
        assert_eq!(default_snapshot_name("org:web/app", at), "org_web_app-20240301-090507");
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let store = SnapshotStore::new("/nonexistent/sonarsnap-store");
        let err = store.load_snapshot("nope").unwrap_err();
        match err {
            StoreError::NotFound { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(artifact_name("cmp").unwrap(), "cmp");
        assert_eq!(artifact_name("cmp.json").unwrap(), "cmp");
        assert_eq!(artifact_name("v1.2").unwrap(), "v1.2");

        for bad in ["", ".json", "..", "../escape", "nested/cmp.json"] {
            assert!(
                matches!(artifact_name(bad), Err(StoreError::InvalidName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
