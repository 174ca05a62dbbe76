//! Pipes between chain stages
//!
//! A pipe turns the job specification and the latest result of a chain
//! into the specification the next stage is built from.

use kite_core::domain::{JobResult, JobSpec};
use kite_core::JsonRecord;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{RecipeError, Result};
use crate::fs::copy_tree;

pub trait JobPipe {
    fn name(&self) -> &str;

    fn pipe(&self, info: JobSpec, results: &JobResult) -> Result<JobSpec>;
}

/// Hands the specification on unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughPipe;

impl JobPipe for PassThroughPipe {
    fn name(&self) -> &str {
        "PassThroughPipe"
    }

    fn pipe(&self, info: JobSpec, _results: &JobResult) -> Result<JobSpec> {
        Ok(info)
    }
}

/// Writes the latest result as `jobresults.json` into a directory
#[derive(Debug, Clone)]
pub struct SaveResultsPipe {
    pub dir: PathBuf,
}

impl SaveResultsPipe {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl JobPipe for SaveResultsPipe {
    fn name(&self) -> &str {
        "SaveResultsPipe"
    }

    fn pipe(&self, info: JobSpec, results: &JobResult) -> Result<JobSpec> {
        fs::create_dir_all(&self.dir).map_err(|e| RecipeError::io("create", &self.dir, e))?;

        let path = self.dir.join(JobResult::FILE_NAME);
        results.to_json(&path)?;
        info!("Saved results to {}", path.display());
        Ok(info)
    }
}

/// Copies the result's working directory to `<workdir>.copy` and resumes
/// the next stage from the copy
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyWorkdirPipe;

impl JobPipe for CopyWorkdirPipe {
    fn name(&self) -> &str {
        "CopyWorkdirPipe"
    }

    fn pipe(&self, mut info: JobSpec, results: &JobResult) -> Result<JobSpec> {
        let Some(workdir) = &results.workdir else {
            warn!("Result has no working directory, nothing to copy");
            return Ok(info);
        };

        let mut copy = workdir.clone().into_os_string();
        copy.push(".copy");
        let copy = PathBuf::from(copy);

        copy_tree(workdir, &copy)?;
        info!("Copied {} to {}", workdir.display(), copy.display());

        info.workdir = Some(copy);
        Ok(info)
    }
}
