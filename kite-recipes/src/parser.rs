//! Output directory access for result parsing
//!
//! Concrete parsing belongs to each job type's `parse` hook. This module
//! gives those hooks a view of the directory the program ran in, plus
//! run-statistics discovery from a `runstats.json` written by the batch
//! system next to the run.

use kite_core::domain::{Record, RunDuration, RunStats};
use kite_core::{CoreError, JsonRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::host::HostIdentity;

/// Run statistics discovered for a working directory
///
/// Counts are only present when a `runstats.json` provided them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredStats {
    pub host: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncores: Option<u32>,
}

impl DiscoveredStats {
    fn from_identity(identity: &HostIdentity) -> Self {
        Self {
            host: identity.host.clone(),
            cluster: identity.cluster.clone(),
            ngpus: None,
            ncores: None,
        }
    }

    /// Complete run statistics, one core and no GPUs unless discovered
    pub fn into_runstats(self, duration: RunDuration, pkgversion: Option<String>) -> RunStats {
        RunStats {
            host: self.host,
            cluster: self.cluster,
            duration,
            ncores: self.ncores.unwrap_or(1),
            ngpus: self.ngpus.unwrap_or(0),
            pkgversion,
        }
    }
}

/// View of the directory an external program ran in
#[derive(Debug, Clone)]
pub struct OutputDir {
    workdir: PathBuf,
}

impl OutputDir {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.workdir
    }

    /// Path of `name` inside the directory
    pub fn get_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.workdir.join(name)
    }

    pub fn exists(&self, name: impl AsRef<Path>) -> bool {
        self.get_path(name).exists()
    }

    /// Decode a JSON file from the directory
    pub fn load_json<T: DeserializeOwned>(&self, name: impl AsRef<Path>) -> Result<T> {
        load_json(&self.get_path(name))
    }

    /// Write a value as JSON into the directory
    pub fn to_json<T: Serialize>(&self, value: &T, name: impl AsRef<Path>) -> Result<()> {
        write_json(&self.get_path(name), value)
    }

    /// Run statistics for this directory on the local host
    pub fn runstats(&self) -> DiscoveredStats {
        self.runstats_for(&HostIdentity::local())
    }

    /// Run statistics for this directory, attributed to `identity`
    ///
    /// Looks for `runstats.json` in the directory, then in its parent. A
    /// missing or unreadable file never fails: only host and cluster are
    /// returned.
    pub fn runstats_for(&self, identity: &HostIdentity) -> DiscoveredStats {
        let mut stats = DiscoveredStats::from_identity(identity);

        let Some(path) = self.find_runstats() else {
            return stats;
        };

        let raw: Record = match load_json(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ignoring run statistics in {}: {}", path.display(), e);
                return stats;
            }
        };

        stats.ngpus = raw.get("gpus").and_then(coerce_count);
        stats.ncores = raw.get("ntasks").and_then(coerce_count);
        stats
    }

    fn find_runstats(&self) -> Option<PathBuf> {
        let local = self.workdir.join(RunStats::FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let parent = self.workdir.join("..").join(RunStats::FILE_NAME);
        parent.is_file().then_some(parent)
    }
}

/// Integer count from a number or a numeric string
fn coerce_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u32))
        }
        _ => None,
    }
}

/// Decode a JSON file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).map_err(|e| CoreError::io(path, e))?;
    Ok(serde_json::from_slice(&data).map_err(CoreError::from)?)
}

/// Write a value to a JSON file, replacing it
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).map_err(CoreError::from)?;
    fs::write(path, data).map_err(|e| CoreError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> HostIdentity {
        HostIdentity::new("node01", "10.0.0.1")
    }

    #[test]
    fn test_runstats_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("run");
        fs::create_dir(&workdir).unwrap();

        let stats = OutputDir::new(&workdir).runstats_for(&identity());
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({"host": "node01", "cluster": "10.0.0.1"})
        );
    }

    #[test]
    fn test_runstats_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("runstats.json"),
            r#"{"gpus": "2", "ntasks": 16, "partition": "gpu"}"#,
        )
        .unwrap();

        let stats = OutputDir::new(dir.path()).runstats_for(&identity());
        assert_eq!(stats.ngpus, Some(2));
        assert_eq!(stats.ncores, Some(16));
        assert_eq!(stats.host, "node01");
    }

    #[test]
    fn test_runstats_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("run");
        fs::create_dir(&workdir).unwrap();
        fs::write(dir.path().join("runstats.json"), r#"{"ntasks": "8"}"#).unwrap();

        let stats = OutputDir::new(&workdir).runstats_for(&identity());
        assert_eq!(stats.ncores, Some(8));
        assert_eq!(stats.ngpus, None);
    }

    #[test]
    fn test_malformed_runstats_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("runstats.json"), "not json").unwrap();

        let stats = OutputDir::new(dir.path()).runstats_for(&identity());
        assert_eq!(stats.ncores, None);
        assert_eq!(stats.cluster, "10.0.0.1");
    }

    #[test]
    fn test_coerce_count() {
        assert_eq!(coerce_count(&json!(4)), Some(4));
        assert_eq!(coerce_count(&json!(4.0)), Some(4));
        assert_eq!(coerce_count(&json!(" 12 ")), Some(12));
        assert_eq!(coerce_count(&json!("2.0")), Some(2));
        assert_eq!(coerce_count(&json!("many")), None);
        assert_eq!(coerce_count(&json!(null)), None);
    }

    #[test]
    fn test_into_runstats_defaults() {
        let stats = OutputDir::new("/nonexistent/kite").runstats_for(&identity());
        let runstats = stats.into_runstats(RunDuration::pending(), Some("kite 1.0".to_string()));

        assert_eq!(runstats.ncores, 1);
        assert_eq!(runstats.ngpus, 0);
        assert!(runstats.duration.is_pending());
        assert_eq!(runstats.pkgversion.as_deref(), Some("kite 1.0"));
    }

    #[test]
    fn test_json_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::new(dir.path());

        out.to_json(&json!({"energy": -1.5}), "energy.json").unwrap();
        assert!(out.exists("energy.json"));

        let value: Value = out.load_json("energy.json").unwrap();
        assert_eq!(value["energy"], json!(-1.5));
        assert!(out.load_json::<Value>("missing.json").is_err());
    }
}
