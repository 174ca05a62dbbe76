//! Error types for recipes

use kite_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for recipe operations
pub type Result<T> = std::result::Result<T, RecipeError>;

/// Errors raised while loading settings
///
/// All of these are configuration problems: they surface at load time and
/// the caller must fix the setup before retrying.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The settings file is neither YAML nor JSON
    #[error("Settings file {} has unrecognized extension '{extension}'", path.display())]
    UnsupportedExtension { path: PathBuf, extension: String },

    /// The settings file could not be decoded
    #[error("Failed to decode settings file {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The merged settings have the wrong shape
    #[error("Invalid settings: {0}")]
    Invalid(String),

    /// `SCRATCH_DIR` does not point to an existing directory
    #[error("Scratch directory does not exist: {}", .0.display())]
    ScratchNotFound(PathBuf),
}

/// Errors that escape a recipe, chain or registry
///
/// Failures inside the guarded part of a recipe run never show up here; they
/// are reported through [`RunOutcome::Failed`](crate::recipe::RunOutcome).
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Record(#[from] CoreError),

    /// Filesystem operation failed
    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The external program could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The job type produced an empty command line
    #[error("Empty command line")]
    EmptyCommand,

    /// A job type hook returned an error
    #[error("{hook} hook failed: {cause:#}")]
    Hook {
        hook: &'static str,
        cause: anyhow::Error,
    },

    /// No recipe is registered under this name
    #[error("Unknown recipe: {0}")]
    UnknownRecipe(String),

    /// Neither the caller nor the job selected a recipe
    #[error("No recipe name given and the job does not select one")]
    MissingRecipeName,

    /// A chain without any recipe stage cannot run or recover
    #[error("Chain has no recipe stage")]
    NoRecipeStage,

    /// A pipe ran before any recipe produced results
    #[error("Pipe '{0}' has no results to transform")]
    PipeWithoutResults(String),
}

impl RecipeError {
    /// Create an IO error for an action on a path
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Wrap an error returned by a job type hook
    pub fn hook(hook: &'static str, cause: anyhow::Error) -> Self {
        Self::Hook { hook, cause }
    }

    /// Check if this error comes from the settings layer
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Settings(_))
    }

    /// Check if this error is a failed registry lookup
    pub fn is_unknown_recipe(&self) -> bool {
        matches!(self, Self::UnknownRecipe(_) | Self::MissingRecipeName)
    }
}
