//! External program invocation
//!
//! Runs one command to completion in an explicit working directory:
//! - stdout is piped and captured
//! - stderr is redirected to a freshly truncated file in that directory
//! - stdin is closed
//!
//! The exit status is returned as-is; interpreting it is up to the job type.

use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{RecipeError, Result};
use crate::settings::Settings;

/// Default name of the captured stdout file
pub const STDOUT_FILE: &str = "stdout.out";

/// Default name of the stderr file
pub const STDERR_FILE: &str = "stderr.out";

/// A completed external process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    /// Wall-clock time between spawn and exit
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` when the process was killed by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Invoker for the external program of a recipe
#[derive(Debug, Clone)]
pub struct ProgramRunner {
    pub settings: Settings,
    /// File name stdout is persisted to by the recipe
    pub stdout: String,
    /// File name stderr is redirected to
    pub stderr: String,
}

impl ProgramRunner {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            stdout: STDOUT_FILE.to_string(),
            stderr: STDERR_FILE.to_string(),
        }
    }

    /// Use different output file names
    pub fn with_output_files(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Runs `cmd` in `cwd` and waits for it to exit
    ///
    /// # Arguments
    /// * `cmd` - Program followed by its arguments
    /// * `cwd` - Working directory of the process; the stderr file is created here
    pub fn run(&self, cmd: &[String], cwd: &Path) -> Result<ProcessOutput> {
        let (program, args) = cmd.split_first().ok_or(RecipeError::EmptyCommand)?;

        let stderr_path = cwd.join(&self.stderr);
        let stderr =
            File::create(&stderr_path).map_err(|e| RecipeError::io("create", &stderr_path, e))?;

        info!("Running {} in {}", cmd.join(" "), cwd.display());
        let started = Instant::now();

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr))
            .output()
            .map_err(|e| RecipeError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        let elapsed = started.elapsed();
        debug!(
            "{} exited with {} after {:.3}s",
            program,
            output.status,
            elapsed.as_secs_f64()
        );

        Ok(ProcessOutput {
            status: output.status,
            stdout: output.stdout,
            elapsed,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn runner() -> ProgramRunner {
        ProgramRunner::new(Settings::default())
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let output = runner()
            .run(&sh("echo hello; echo oops >&2"), dir.path())
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "hello\n");
        assert_eq!(
            fs::read_to_string(dir.path().join(STDERR_FILE)).unwrap(),
            "oops\n"
        );
    }

    #[test]
    fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("input.txt"), "data").unwrap();

        let output = runner().run(&sh("cat input.txt"), dir.path()).unwrap();
        assert_eq!(output.stdout_lossy(), "data");
    }

    #[test]
    fn test_exit_status_not_interpreted() {
        let dir = tempfile::tempdir().unwrap();
        let output = runner().run(&sh("exit 3"), dir.path()).unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code(), Some(3));
    }

    #[test]
    fn test_stderr_file_truncated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("err.log"), "stale content").unwrap();

        let runner = runner().with_output_files("out.log", "err.log");
        runner.run(&sh("true"), dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("err.log")).unwrap(), "");
    }

    #[test]
    fn test_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner().run(&[], dir.path()).unwrap_err();
        assert!(matches!(err, RecipeError::EmptyCommand));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = vec!["kite-no-such-program".to_string()];
        let err = runner().run(&cmd, dir.path()).unwrap_err();
        assert!(matches!(err, RecipeError::Spawn { .. }));
    }
}
