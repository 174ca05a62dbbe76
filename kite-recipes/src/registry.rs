//! Recipe registry
//!
//! Maps recipe names to builders. How recipes end up in the registry is the
//! embedding application's business; lookup of an unregistered name is a
//! hard error.

use kite_core::domain::JobSpec;
use std::path::Path;
use std::sync::Arc;

use crate::chain::ChainStage;
use crate::error::{RecipeError, Result};
use crate::recipe::{JobType, Recipe, Runnable};
use crate::shell::ShellJob;

/// Builds a runnable for a job, given an optional settings file
pub type RecipeBuilder =
    Arc<dyn Fn(JobSpec, Option<&Path>) -> Result<Box<dyn Runnable>> + Send + Sync>;

/// Builder running a fresh job type from `make_job` through a [`Recipe`]
pub fn recipe_builder<J, F>(make_job: F) -> RecipeBuilder
where
    J: JobType + 'static,
    F: Fn() -> J + Send + Sync + 'static,
{
    Arc::new(
        move |info: JobSpec, settings: Option<&Path>| -> Result<Box<dyn Runnable>> {
            Ok(Box::new(Recipe::new(info, settings, make_job())?))
        },
    )
}

struct RegisteredRecipe {
    name: String,
    build: RecipeBuilder,
}

/// Registry of recipes by name
#[derive(Default)]
pub struct RecipeRegistry {
    recipes: Vec<RegisteredRecipe>,
}

impl RecipeRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the recipes shipped in this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("shell", recipe_builder(ShellJob::default));
        registry
    }

    /// Registers a recipe
    ///
    /// # Panics
    /// Panics if a recipe with the same name is already registered
    pub fn register(&mut self, name: impl Into<String>, build: RecipeBuilder) {
        let name = name.into();
        if self.contains(&name) {
            panic!("Recipe '{}' is already registered", name);
        }
        self.recipes.push(RegisteredRecipe { name, build });
    }

    /// Gets the builder of a recipe
    pub fn get(&self, name: &str) -> Result<&RecipeBuilder> {
        self.recipes
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.build)
            .ok_or_else(|| RecipeError::UnknownRecipe(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.iter().any(|r| r.name == name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.recipes.iter().map(|r| r.name.as_str()).collect()
    }

    /// Builds the runnable of a recipe for `info`
    pub fn build(
        &self,
        name: &str,
        info: JobSpec,
        settings_path: Option<&Path>,
    ) -> Result<Box<dyn Runnable>> {
        let build = self.get(name)?;
        build(info, settings_path)
    }

    /// Chain stage running the named recipe
    pub fn stage(&self, name: &str) -> Result<ChainStage> {
        Ok(ChainStage::recipe(name, Arc::clone(self.get(name)?)))
    }
}
