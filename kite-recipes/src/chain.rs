//! Multi-stage jobs
//!
//! A [`RecipeChain`] runs recipe stages one after another, with pipes in
//! between to reshape the job specification. Each recipe stage is built
//! from the specification produced so far. The chain's result is the last
//! recipe stage's result, with its duration replaced by the total of all
//! stages.

use kite_core::domain::{JobResult, JobSpec};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{RecipeError, Result};
use crate::pipes::JobPipe;
use crate::recipe::{RunOutcome, Runnable};
use crate::registry::RecipeBuilder;

pub enum ChainStage {
    Recipe { name: String, build: RecipeBuilder },
    Pipe(Box<dyn JobPipe>),
}

impl ChainStage {
    pub fn recipe(name: impl Into<String>, build: RecipeBuilder) -> Self {
        ChainStage::Recipe {
            name: name.into(),
            build,
        }
    }

    pub fn pipe(pipe: impl JobPipe + 'static) -> Self {
        ChainStage::Pipe(Box::new(pipe))
    }

    pub fn name(&self) -> &str {
        match self {
            ChainStage::Recipe { name, .. } => name,
            ChainStage::Pipe(pipe) => pipe.name(),
        }
    }
}

pub struct RecipeChain {
    pub info: JobSpec,
    pub settings_path: Option<PathBuf>,
    stages: Vec<ChainStage>,
}

impl RecipeChain {
    pub fn new(info: JobSpec, settings_path: Option<&Path>) -> Self {
        Self {
            info,
            settings_path: settings_path.map(Path::to_path_buf),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn then(mut self, stage: ChainStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[ChainStage] {
        &self.stages
    }

    fn first_recipe(&self) -> Result<(&str, &RecipeBuilder)> {
        self.stages
            .iter()
            .find_map(|stage| match stage {
                ChainStage::Recipe { name, build } => Some((name.as_str(), build)),
                ChainStage::Pipe(_) => None,
            })
            .ok_or(RecipeError::NoRecipeStage)
    }
}

impl Runnable for RecipeChain {
    fn run(&mut self) -> Result<RunOutcome> {
        self.first_recipe()?;
        self.info.uuid();

        let settings_path = self.settings_path.as_deref();
        let mut info = self.info.clone();
        let mut latest: Option<JobResult> = None;
        let mut total = 0.0;

        for (index, stage) in self.stages.iter().enumerate() {
            info!("Chain stage {}: {}", index, stage.name());

            match stage {
                ChainStage::Recipe { build, .. } => {
                    let mut runnable = build(info.clone(), settings_path)?;
                    match runnable.run()? {
                        RunOutcome::Completed(results) => {
                            total += results.runstats.duration.seconds().unwrap_or(0.0);
                            latest = Some(results);
                        }
                        failed => return Ok(failed),
                    }
                }
                ChainStage::Pipe(pipe) => {
                    let results = latest
                        .as_ref()
                        .ok_or_else(|| RecipeError::PipeWithoutResults(pipe.name().to_string()))?;
                    info = pipe.pipe(info, results)?;
                }
            }

            if let Some(results) = latest.as_mut() {
                results.runstats.set_duration(total);
            }
        }

        latest
            .map(RunOutcome::Completed)
            .ok_or(RecipeError::NoRecipeStage)
    }

    fn handle_errors(&mut self, delete_scratch: bool) -> Result<JobSpec> {
        let (name, build) = self.first_recipe()?;
        info!("Recovering chain through stage {}", name);

        let mut runnable = build(self.info.clone(), self.settings_path.as_deref())?;
        runnable.handle_errors(delete_scratch)
    }
}
