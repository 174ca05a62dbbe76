//! Kite recipe engine
//!
//! This crate runs single jobs of scientific computation pipelines.
//! It includes:
//! - The recipe lifecycle: working directory, scratch staging, external
//!   program, result parsing and copy-back
//! - Crash recovery by directory naming convention
//! - Chains of recipes and pipes accumulating run time
//! - Settings loading from environment and YAML/JSON files
//! - A registry mapping recipe names to builders

pub mod chain;
pub mod command;
pub mod config;
pub mod error;
pub mod fs;
pub mod host;
pub mod options;
pub mod parser;
pub mod pipes;
pub mod recipe;
pub mod recovery;
pub mod registry;
pub mod runner;
pub mod settings;
pub mod shell;

pub use chain::{ChainStage, RecipeChain};
pub use command::RunnerCommand;
pub use error::{RecipeError, Result, SettingsError};
pub use parser::{DiscoveredStats, OutputDir};
pub use pipes::{CopyWorkdirPipe, JobPipe, PassThroughPipe, SaveResultsPipe};
pub use recipe::{ExecutionFailure, FailurePhase, JobType, Recipe, RunOutcome, Runnable};
pub use recovery::{RecoveryAction, RecoveryContext};
pub use registry::{RecipeBuilder, RecipeRegistry, recipe_builder};
pub use runner::{ProcessOutput, ProgramRunner};
pub use settings::Settings;
pub use shell::ShellJob;
