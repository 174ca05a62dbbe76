//! Built-in `shell` recipe
//!
//! Runs the argument vector given in the `cmd` option. Extra arguments in
//! `args` are appended. A program that wants to report results writes them
//! as a JSON list of nodes to `nodes.json`.

use anyhow::{Context, bail};
use kite_core::domain::{JobResult, JobSpec, NodeResult, Record, RunDuration};
use kite_core::JsonRecord;
use serde_json::Value;
use std::path::Path;

use crate::parser::OutputDir;
use crate::recipe::JobType;
use crate::settings::Settings;

/// File the program may write its node results to
pub const NODES_FILE: &str = "nodes.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct ShellJob;

impl JobType for ShellJob {
    fn name(&self) -> &str {
        "ShellJob"
    }

    fn package_version(&self) -> Option<String> {
        Some(format!("kite-recipes {}", env!("CARGO_PKG_VERSION")))
    }

    fn setup(&self, spec: &JobSpec, _options: &Record, workdir: &Path) -> anyhow::Result<()> {
        spec.to_json(workdir.join(JobSpec::FILE_NAME))?;
        Ok(())
    }

    fn command(&self, _settings: &Settings, options: &Record) -> anyhow::Result<Vec<String>> {
        let mut cmd: Vec<String> = match options.get("cmd") {
            Some(Value::String(line)) => line.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => arguments(items).context("invalid 'cmd' option")?,
            Some(_) => bail!("option 'cmd' must be a string or a list of strings"),
            None => bail!("option 'cmd' is required"),
        };

        match options.get("args") {
            Some(Value::Array(items)) => {
                cmd.extend(arguments(items).context("invalid 'args' option")?)
            }
            Some(Value::Null) | None => {}
            Some(_) => bail!("option 'args' must be a list"),
        }

        Ok(cmd)
    }

    fn parse(&self, output: &OutputDir, _options: &Record) -> anyhow::Result<JobResult> {
        let nodes: Vec<NodeResult> = if output.exists(NODES_FILE) {
            output
                .load_json(NODES_FILE)
                .with_context(|| format!("failed to read {}", NODES_FILE))?
        } else {
            Vec::new()
        };

        let runstats = output
            .runstats()
            .into_runstats(RunDuration::pending(), self.package_version());
        Ok(JobResult::new(runstats, nodes))
    }
}

/// Command-line arguments from strings, numbers and booleans
fn arguments(items: &[Value]) -> anyhow::Result<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => bail!("unsupported argument {}", other),
        })
        .collect()
}
