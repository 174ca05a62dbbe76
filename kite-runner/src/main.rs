//! Kite Runner
//!
//! Runs or recovers a single job.
//!
//! The job specification, recipe override, settings file and action are
//! read from `KITE_*` environment variables (see [`config::Config`]). The
//! recipe is looked up in the built-in registry by name.

mod config;

use anyhow::{Context, Result};
use kite_recipes::{RecipeRegistry, RunOutcome, RunnerCommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Action, Config};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kite_runner=info,kite_recipes=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: jobinfo={}, action={:?}",
        config.jobinfo.display(),
        config.action
    );

    let registry = RecipeRegistry::builtin();
    let mut command = RunnerCommand::from_json(
        &config.jobinfo,
        config.recipe.as_deref(),
        config.settings.as_deref(),
        &registry,
    )
    .with_context(|| format!("Failed to prepare job {}", config.jobinfo.display()))?;

    match config.action {
        Action::Run => match command.run()? {
            RunOutcome::Completed(results) => {
                info!(
                    "Job finished with {} node(s) in {}",
                    results.nodes.len(),
                    results
                        .workdir
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                );
            }
            RunOutcome::Failed(failure) => {
                error!("Job failed, files kept in {}", failure.workdir.display());
                anyhow::bail!(failure);
            }
        },
        Action::Recover => {
            let spec = command.handle_errors(config.delete_scratch)?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }
    }

    Ok(())
}
