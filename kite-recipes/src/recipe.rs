//! Recipe lifecycle
//!
//! A [`Recipe`] runs one job of a [`JobType`] through its directory
//! lifecycle:
//!
//! 1. allocate a durable working directory `<basedir>/<name>_<timestamp>`,
//!    moving in the working directory of a previous run when the job
//!    carries one
//! 2. let the job type populate it (`setup`)
//! 3. copy it to a fresh directory under the scratch root and run the
//!    external program there
//! 4. parse the scratch directory into a [`JobResult`] and persist it
//! 5. copy the scratch directory back over the working directory
//!
//! Step 5 always happens, whether steps 3 and 4 succeed or not. Errors in
//! steps 3 and 4 are reported as [`RunOutcome::Failed`]; everything before
//! that propagates as [`RecipeError`].
//!
//! After a crash, [`Runnable::handle_errors`] finds the most recent
//! directory left by the job and asks the job type how to recover.

use chrono::Utc;
use kite_core::domain::{
    JobDescriptor, JobResult, JobSpec, Record, RunDuration, RunStats, Status, timestamp_label,
};
use kite_core::JsonRecord;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{RecipeError, Result};
use crate::fs::{move_dir, smart_copy};
use crate::host::{HostIdentity, cpu_count};
use crate::options::merge_options;
use crate::parser::OutputDir;
use crate::recovery::{RecoveryAction, RecoveryContext};
use crate::runner::{ProcessOutput, ProgramRunner};
use crate::settings::Settings;

/// Input key whose values are inherited by every result node
const PROPAGATED_KEY: &str = "attributes";

/// Hooks a job type provides to the lifecycle engine
pub trait JobType {
    /// Name used for working directory names
    fn name(&self) -> &str;

    /// Version string recorded in run statistics
    fn package_version(&self) -> Option<String> {
        None
    }

    /// Options used when the job does not override them
    fn default_options(&self) -> Record {
        Record::new()
    }

    /// Populate the working directory before the run
    fn setup(&self, spec: &JobSpec, options: &Record, workdir: &Path) -> anyhow::Result<()>;

    /// Argument vector of the external program
    fn command(&self, settings: &Settings, options: &Record) -> anyhow::Result<Vec<String>>;

    /// Decide whether the program succeeded
    fn check_exit(&self, output: &ProcessOutput) -> anyhow::Result<()> {
        if !output.success() {
            anyhow::bail!("{} exited with {}", self.name(), output.status);
        }
        Ok(())
    }

    /// Build the result from the directory the program ran in
    ///
    /// The duration may be left as a placeholder; the recipe then records
    /// the measured run time.
    fn parse(&self, output: &OutputDir, options: &Record) -> anyhow::Result<JobResult>;

    /// Specification to resubmit after a failed run
    fn recover(&self, ctx: &RecoveryContext) -> anyhow::Result<JobSpec> {
        Ok(RecoveryAction::Escalate.apply(ctx))
    }
}

/// Anything that can run a job and recover from its failure
pub trait Runnable {
    fn run(&mut self) -> Result<RunOutcome>;

    /// Inspect what a failed run left behind and return the specification
    /// to resubmit
    ///
    /// # Arguments
    /// * `delete_scratch` - Remove the inspected directory afterwards
    fn handle_errors(&mut self, delete_scratch: bool) -> Result<JobSpec>;
}

/// Lifecycle step a run failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Staging,
    Execution,
    Postprocess,
}

impl FailurePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePhase::Staging => "staging",
            FailurePhase::Execution => "execution",
            FailurePhase::Postprocess => "postprocess",
        }
    }
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that failed after staging began
#[derive(Debug, Clone, Error)]
#[error("{phase} failed: {message}")]
pub struct ExecutionFailure {
    pub phase: FailurePhase,
    /// Rendered error chain
    pub message: String,
    /// Working directory holding what the run left behind
    pub workdir: PathBuf,
}

/// Result of [`Runnable::run`]
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(JobResult),
    Failed(ExecutionFailure),
}

impl RunOutcome {
    pub fn into_result(self) -> std::result::Result<JobResult, ExecutionFailure> {
        match self {
            RunOutcome::Completed(results) => Ok(results),
            RunOutcome::Failed(failure) => Err(failure),
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        match self {
            RunOutcome::Completed(results) => Some(results),
            RunOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match self {
            RunOutcome::Completed(_) => None,
            RunOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

struct PhaseError {
    phase: FailurePhase,
    error: anyhow::Error,
}

fn at<E: Into<anyhow::Error>>(phase: FailurePhase) -> impl FnOnce(E) -> PhaseError {
    move |e| PhaseError {
        phase,
        error: e.into(),
    }
}

/// Lifecycle engine for one job of type `J`
pub struct Recipe<J> {
    pub info: JobSpec,
    pub runner: ProgramRunner,
    /// Directory working directories are allocated in
    pub basedir: PathBuf,
    pub job: J,
}

impl<J: JobType> Recipe<J> {
    /// Creates a recipe with settings from `settings_path` (or the
    /// environment) and the current directory as base directory
    pub fn new(info: JobSpec, settings_path: Option<&Path>, job: J) -> Result<Self> {
        let settings = Settings::load(settings_path)?;
        let basedir = std::env::current_dir()
            .map_err(|e| RecipeError::io("resolve", "current directory", e))?;
        Ok(Self::from_parts(info, settings, job, basedir))
    }

    pub fn from_parts(info: JobSpec, settings: Settings, job: J, basedir: PathBuf) -> Self {
        Self {
            info,
            runner: ProgramRunner::new(settings),
            basedir,
            job,
        }
    }

    /// Load the job specification from a `jobinfo.json` file
    pub fn from_json(path: &Path, settings_path: Option<&Path>, job: J) -> Result<Self> {
        let info = JobSpec::from_json(path)?;
        Self::new(info, settings_path, job)
    }

    pub fn with_basedir(mut self, basedir: impl Into<PathBuf>) -> Self {
        self.basedir = basedir.into();
        self
    }

    pub fn with_runner(mut self, runner: ProgramRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.runner.settings
    }

    /// Absolute scratch root
    pub fn scratch(&self) -> PathBuf {
        self.settings().scratch()
    }

    /// Default options with the job's overrides merged in
    pub fn options(&self) -> Record {
        merge_options(self.job.default_options(), &self.info.options)
    }

    pub fn inputs(&self) -> &[Record] {
        &self.info.inputs
    }

    /// Terminal job descriptor attached to successful results
    ///
    /// Only the identifiers are carried over from the job; other descriptor
    /// keys stay with the specification.
    pub fn done_job(&self, options: &Record) -> JobDescriptor {
        let mut job = JobDescriptor {
            id: self.info.job.id,
            uuid: self.info.job.uuid.clone(),
            options: Some(options.clone()),
            ..JobDescriptor::default()
        };
        job.set_status(Status::Done);
        job
    }

    /// Run statistics for work done in this process
    ///
    /// # Arguments
    /// * `duration` - Wall-clock seconds
    /// * `all_cores` - Count every logical CPU instead of one
    pub fn run_stats(&self, duration: f64, all_cores: bool) -> RunStats {
        let identity = HostIdentity::local();
        let mut stats = RunStats {
            host: identity.host,
            cluster: identity.cluster,
            duration: RunDuration::default(),
            ncores: if all_cores { cpu_count() } else { 1 },
            ngpus: 0,
            pkgversion: self.job.package_version(),
        };
        stats.set_duration(duration);
        stats
    }

    /// Create the durable working directory of this run
    ///
    /// A directory from an earlier run in the same second is never reused;
    /// a numeric suffix is added instead.
    pub fn allocate_workdir(&self) -> Result<PathBuf> {
        let stem = format!("{}_{}", self.job.name(), timestamp_label(Utc::now()));
        let mut workdir = self.basedir.join(&stem);
        let mut suffix = 1;
        while workdir.exists() {
            workdir = self.basedir.join(format!("{}_{}", stem, suffix));
            suffix += 1;
        }

        match &self.info.workdir {
            Some(prior) => {
                let prior = self.basedir.join(prior);
                info!(
                    "Resuming from {}, moving to {}",
                    prior.display(),
                    workdir.display()
                );
                move_dir(&prior, &workdir)?;
            }
            None => {
                fs::create_dir_all(&workdir).map_err(|e| RecipeError::io("create", &workdir, e))?;
            }
        }

        Ok(workdir)
    }

    /// Parse `calcdir`, finalize the result and persist it there
    pub fn postprocess(
        &self,
        calcdir: &Path,
        options: &Record,
        elapsed: Duration,
    ) -> anyhow::Result<JobResult> {
        let mut results = self.job.parse(&OutputDir::new(calcdir), options)?;

        self.propagate_key(&mut results, PROPAGATED_KEY);
        results.job = self.done_job(options);
        if results.runstats.duration.is_pending() {
            results.runstats.set_duration(elapsed.as_secs_f64());
        }

        results.to_json(calcdir.join(JobResult::FILE_NAME))?;
        Ok(results)
    }

    /// Merge the `key` object of every input into every node entity
    ///
    /// Values already on the node win over inherited ones. Every node ends
    /// up with a `key` object, empty when nothing was inherited.
    fn propagate_key(&self, results: &mut JobResult, key: &str) {
        let mut inherited = Record::new();
        for input in &self.info.inputs {
            if let Some(Value::Object(values)) = input.get(key) {
                inherited.extend(values.clone());
            }
        }

        for node in &mut results.nodes {
            let mut merged = inherited.clone();
            if let Some(Value::Object(own)) = node.entity.get(key) {
                merged.extend(own.clone());
            }
            node.entity.insert(key.to_string(), Value::Object(merged));
        }
    }

    /// Scratch directories left by runs of this job, oldest first
    pub fn existing_scratch(&mut self) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_", self.info.folder_prefix());
        list_dirs(&self.scratch(), &prefix)
    }

    /// Working directories of this job type in the base directory, oldest first
    pub fn existing_workdirs(&self) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_", self.job.name());
        list_dirs(&self.basedir, &prefix)
    }

    fn execute(
        &self,
        workdir: &Path,
        active: &Path,
        options: &Record,
    ) -> std::result::Result<JobResult, PhaseError> {
        smart_copy(workdir, active).map_err(at(FailurePhase::Staging))?;

        let cmd = self
            .job
            .command(self.settings(), options)
            .map_err(at(FailurePhase::Execution))?;
        let output = self
            .runner
            .run(&cmd, active)
            .map_err(at(FailurePhase::Execution))?;

        let stdout_path = active.join(&self.runner.stdout);
        fs::write(&stdout_path, &output.stdout)
            .map_err(|e| RecipeError::io("write", &stdout_path, e))
            .map_err(at(FailurePhase::Execution))?;
        self.job
            .check_exit(&output)
            .map_err(at(FailurePhase::Execution))?;

        self.postprocess(active, options, output.elapsed)
            .map_err(at(FailurePhase::Postprocess))
    }
}

impl<J: JobType> Runnable for Recipe<J> {
    fn run(&mut self) -> Result<RunOutcome> {
        self.info.uuid();
        let options = self.options();

        let workdir = self.allocate_workdir()?;
        self.job
            .setup(&self.info, &options, &workdir)
            .map_err(|e| RecipeError::hook("setup", e))?;

        let folder_name = self.info.folder_name();
        let guard = ScratchGuard::create(&self.scratch(), &folder_name, &workdir)?;
        info!("Running {} in {}", folder_name, guard.path().display());

        let outcome = match self.execute(&workdir, guard.path(), &options) {
            Ok(mut results) => {
                results.workdir = Some(workdir);
                info!("{} done", folder_name);
                RunOutcome::Completed(results)
            }
            Err(PhaseError { phase, error }) => {
                error!("{} failed during {}: {:#}", folder_name, phase, error);
                RunOutcome::Failed(ExecutionFailure {
                    phase,
                    message: format!("{:#}", error),
                    workdir,
                })
            }
        };

        guard.finish()?;
        Ok(outcome)
    }

    fn handle_errors(&mut self, delete_scratch: bool) -> Result<JobSpec> {
        let candidate = match self.existing_scratch()?.pop() {
            Some(dir) => Some(dir),
            None => self.existing_workdirs()?.pop(),
        };

        let Some(dir) = candidate else {
            warn!(
                "No directory found for {}, marking as error",
                self.info.folder_prefix()
            );
            return Ok(self.info.clone().with_status(Status::Error));
        };

        info!("Recovering from {}", dir.display());
        let ctx = RecoveryContext::load(&self.info, &dir);
        let spec = self
            .job
            .recover(&ctx)
            .map_err(|e| RecipeError::hook("recover", e))?;

        if !delete_scratch {
            return Ok(spec);
        }

        if spec.workdir.as_deref() == Some(dir.as_path()) {
            info!("Keeping {} to resume from", dir.display());
        } else {
            ctx.delete_dir()?;
        }

        Ok(spec)
    }
}

/// Subdirectories of `root` whose name starts with `prefix`, sorted by name
fn list_dirs(root: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| RecipeError::io("read", root, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RecipeError::io("read", root, e))?;
        let path = entry.path();
        if path.is_dir() && entry.file_name().to_string_lossy().starts_with(prefix) {
            dirs.push(path);
        }
    }

    dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(dirs)
}

/// Scratch directory that is copied back over the working directory when
/// the run ends
///
/// Copy-back happens in [`ScratchGuard::finish`] or, if the guard is dropped
/// early, in `Drop`. When the copy fails the scratch directory is kept so
/// recovery can find it.
struct ScratchGuard {
    dir: Option<TempDir>,
    path: PathBuf,
    workdir: PathBuf,
}

impl ScratchGuard {
    fn create(scratch_root: &Path, folder_name: &str, workdir: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}_", folder_name))
            .tempdir_in(scratch_root)
            .map_err(|e| RecipeError::io("create", scratch_root, e))?;

        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
            workdir: workdir.to_path_buf(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn finish(mut self) -> Result<()> {
        self.copy_back()
    }

    fn copy_back(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        debug!(
            "Copying {} back to {}",
            self.path.display(),
            self.workdir.display()
        );
        match smart_copy(dir.path(), &self.workdir) {
            Ok(()) => dir
                .close()
                .map_err(|e| RecipeError::io("remove", &self.path, e)),
            Err(e) => {
                let kept = dir.keep();
                error!("Copy-back failed, keeping {}", kept.display());
                Err(e)
            }
        }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Err(e) = self.copy_back() {
            error!("{:#}", e);
        }
    }
}
