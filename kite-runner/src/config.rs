//! Runner configuration
//!
//! The runner takes no command-line arguments. Everything it needs comes
//! from `KITE_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

/// What the runner does with the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run the recipe
    Run,
    /// Inspect a failed run and print the specification to resubmit
    Recover,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(Action::Run),
            "recover" => Ok(Action::Recover),
            other => anyhow::bail!("Unknown action '{}', expected 'run' or 'recover'", other),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Job specification to process
    pub jobinfo: PathBuf,

    /// Recipe to use instead of the one the job selects
    pub recipe: Option<String>,

    /// Settings file; the environment is used when absent
    pub settings: Option<PathBuf>,

    pub action: Action,

    /// Remove the inspected directory after recovery
    pub delete_scratch: bool,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - KITE_JOBINFO (optional, default: jobinfo.json)
    /// - KITE_RECIPE (optional)
    /// - KITE_SETTINGS (optional)
    /// - KITE_ACTION (optional, run or recover, default: run)
    /// - KITE_DELETE_SCRATCH (optional, default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an explicit variable lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jobinfo = var("KITE_JOBINFO")
            .map(PathBuf::from)
            .unwrap_or(defaults.jobinfo);

        let action = match var("KITE_ACTION") {
            Some(value) => value.parse()?,
            None => defaults.action,
        };

        let delete_scratch = match var("KITE_DELETE_SCRATCH") {
            Some(value) => parse_bool(&value)?,
            None => defaults.delete_scratch,
        };

        Ok(Self {
            jobinfo,
            recipe: var("KITE_RECIPE"),
            settings: var("KITE_SETTINGS").map(PathBuf::from),
            action,
            delete_scratch,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.jobinfo.is_file() {
            anyhow::bail!("Job file {} does not exist", self.jobinfo.display());
        }

        if let Some(settings) = &self.settings {
            if !settings.is_file() {
                anyhow::bail!("Settings file {} does not exist", settings.display());
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobinfo: PathBuf::from("jobinfo.json"),
            recipe: None,
            settings: None,
            action: Action::Run,
            delete_scratch: false,
        }
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_vars(lookup(&[])).unwrap();
        assert_eq!(config.jobinfo, PathBuf::from("jobinfo.json"));
        assert_eq!(config.action, Action::Run);
        assert!(config.recipe.is_none());
        assert!(config.settings.is_none());
        assert!(!config.delete_scratch);
    }

    #[test]
    fn test_from_vars() {
        let config = Config::from_vars(lookup(&[
            ("KITE_JOBINFO", "/jobs/1/jobinfo.json"),
            ("KITE_RECIPE", "shell"),
            ("KITE_SETTINGS", "/etc/kite/settings.yaml"),
            ("KITE_ACTION", "Recover"),
            ("KITE_DELETE_SCRATCH", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.jobinfo, PathBuf::from("/jobs/1/jobinfo.json"));
        assert_eq!(config.recipe.as_deref(), Some("shell"));
        assert_eq!(config.settings, Some(PathBuf::from("/etc/kite/settings.yaml")));
        assert_eq!(config.action, Action::Recover);
        assert!(config.delete_scratch);
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = Config::from_vars(lookup(&[("KITE_RECIPE", ""), ("KITE_ACTION", " ")])).unwrap();
        assert!(config.recipe.is_none());
        assert_eq!(config.action, Action::Run);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_vars(lookup(&[("KITE_ACTION", "retry")])).is_err());
        assert!(Config::from_vars(lookup(&[("KITE_DELETE_SCRATCH", "maybe")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            jobinfo: dir.path().join("jobinfo.json"),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        std::fs::write(&config.jobinfo, "{}").unwrap();
        assert!(config.validate().is_ok());

        config.settings = Some(dir.path().join("settings.yaml"));
        assert!(config.validate().is_err());
    }
}
