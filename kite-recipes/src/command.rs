//! Runner command
//!
//! Resolves the recipe for a job through a [`RecipeRegistry`] and runs it
//! or recovers it.

use kite_core::domain::JobSpec;
use kite_core::JsonRecord;
use std::path::Path;
use tracing::info;

use crate::error::{RecipeError, Result};
use crate::recipe::{RunOutcome, Runnable};
use crate::registry::RecipeRegistry;

pub struct RunnerCommand {
    recipe_name: String,
    runnable: Box<dyn Runnable>,
}

impl RunnerCommand {
    /// Build the recipe selected by `recipe`, or by the job when `None`
    pub fn new(
        info: JobSpec,
        recipe: Option<&str>,
        settings_path: Option<&Path>,
        registry: &RecipeRegistry,
    ) -> Result<Self> {
        let recipe_name = recipe
            .or(info.recipe.name.as_deref())
            .ok_or(RecipeError::MissingRecipeName)?
            .to_string();

        info!("Using recipe {}", recipe_name);
        let runnable = registry.build(&recipe_name, info, settings_path)?;

        Ok(Self {
            recipe_name,
            runnable,
        })
    }

    /// Load the job from a `jobinfo.json` file
    pub fn from_json(
        path: &Path,
        recipe: Option<&str>,
        settings_path: Option<&Path>,
        registry: &RecipeRegistry,
    ) -> Result<Self> {
        let info = JobSpec::from_json(path)?;
        Self::new(info, recipe, settings_path, registry)
    }

    pub fn recipe_name(&self) -> &str {
        &self.recipe_name
    }

    pub fn run(&mut self) -> Result<RunOutcome> {
        self.runnable.run()
    }

    pub fn handle_errors(&mut self, delete_scratch: bool) -> Result<JobSpec> {
        self.runnable.handle_errors(delete_scratch)
    }
}
