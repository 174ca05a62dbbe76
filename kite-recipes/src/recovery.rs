//! Error recovery for interrupted or failed runs
//!
//! After a failure the recipe locates the most recent directory of the job
//! and hands it to the job type as a [`RecoveryContext`]. The job type picks
//! a [`RecoveryAction`], which produces the specification to resubmit.

use kite_core::domain::{JobSpec, Record, RunStats, Status};
use kite_core::JsonRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{RecipeError, Result};
use crate::parser::load_json;

/// What is known about a failed run
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    /// Job specification found in the directory, or the recipe's own
    pub spec: JobSpec,
    /// Directory the failed run left behind
    pub workdir: PathBuf,
    /// Raw `runstats.json` of the run, when present
    pub runstats: Option<Record>,
}

impl RecoveryContext {
    /// Build the context for `workdir`
    ///
    /// Unreadable files are logged and skipped; recovery always gets a
    /// context to work with.
    pub fn load(fallback: &JobSpec, workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();

        let info_path = workdir.join(JobSpec::FILE_NAME);
        let spec = if info_path.is_file() {
            JobSpec::from_json(&info_path).unwrap_or_else(|e| {
                warn!("Ignoring {}: {}", info_path.display(), e);
                fallback.clone()
            })
        } else {
            fallback.clone()
        };

        let stats_path = workdir.join(RunStats::FILE_NAME);
        let runstats = if stats_path.is_file() {
            load_json::<Record>(&stats_path)
                .map_err(|e| warn!("Ignoring {}: {}", stats_path.display(), e))
                .ok()
        } else {
            None
        };

        Self {
            spec,
            workdir,
            runstats,
        }
    }

    pub fn get_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.workdir.join(name)
    }

    /// Copy of `spec` with its status replaced
    pub fn set_status(&self, spec: &JobSpec, status: Status) -> JobSpec {
        spec.clone().with_status(status)
    }

    /// Remove the directory of the failed run
    pub fn delete_dir(&self) -> Result<()> {
        info!("Deleting {}", self.workdir.display());
        fs::remove_dir_all(&self.workdir).map_err(|e| RecipeError::io("remove", &self.workdir, e))
    }
}

/// Decision taken by a job type about a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Resubmit from scratch
    Retry,
    /// Resubmit, continuing from the failed run's directory
    Resume,
    /// Give up and mark the job as failed
    Escalate,
}

impl RecoveryAction {
    /// Specification to hand back to the caller
    pub fn apply(self, ctx: &RecoveryContext) -> JobSpec {
        match self {
            RecoveryAction::Retry => ctx.set_status(&ctx.spec, Status::Ready),
            RecoveryAction::Resume => {
                let mut spec = ctx.set_status(&ctx.spec, Status::Ready);
                spec.workdir = Some(ctx.workdir.clone());
                spec
            }
            RecoveryAction::Escalate => ctx.set_status(&ctx.spec, Status::Error),
        }
    }
}
