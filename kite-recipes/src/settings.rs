//! Runtime settings for recipes
//!
//! Settings are layered: defaults, then process environment, then an
//! optional settings file (see [`crate::config`]). Keys are upper-case.
//! The environment only supplies declared keys such as `SCRATCH_DIR`;
//! any other key in the file is kept in [`Settings::extra`] for job types
//! to read.

use kite_core::domain::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{decode_config, expand_file};
use crate::error::SettingsError;

/// Keys the environment layer may set
const ENV_KEYS: &[&str] = &["SCRATCH_DIR"];

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root under which temporary run directories are created
    #[serde(rename = "SCRATCH_DIR", default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    #[serde(flatten)]
    pub extra: Record,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            extra: Record::new(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(std::env::vars())
    }

    /// Load settings from an explicit set of environment variables
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, SettingsError> {
        Self::from_layers(env_layer(vars), Record::new())
    }

    /// Load settings from a file layered over the process environment
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        Self::from_file_with_vars(path, std::env::vars())
    }

    /// Load settings from a file layered over an explicit environment
    ///
    /// The same variables are used to expand `$VAR` references in the file.
    pub fn from_file_with_vars(
        path: &Path,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, SettingsError> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let text = expand_file(path, |name| vars.get(name).cloned())?;
        let file = decode_config(path, &text)?;

        Self::from_layers(env_layer(vars), file)
    }

    /// Use the settings file when given and present, else the environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                tracing::debug!(
                    "Settings file {} not found, using environment",
                    path.display()
                );
                Self::from_env()
            }
            None => Self::from_env(),
        }
    }

    fn from_layers(env: Record, file: Record) -> Result<Self, SettingsError> {
        let mut merged = env;
        merged.extend(file);

        let settings: Settings = serde_json::from_value(Value::Object(merged))
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.scratch_dir.is_dir() {
            return Err(SettingsError::ScratchNotFound(self.scratch_dir.clone()));
        }

        Ok(())
    }

    /// Absolute scratch root
    pub fn scratch(&self) -> PathBuf {
        std::path::absolute(&self.scratch_dir).unwrap_or_else(|_| self.scratch_dir.clone())
    }

    /// Read an extension setting as a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

fn env_layer(vars: impl IntoIterator<Item = (String, String)>) -> Record {
    vars.into_iter()
        .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}
