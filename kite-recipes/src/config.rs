//! Settings file loading
//!
//! Settings files are YAML (`.yaml`, `.yml`) or JSON (`.json`). Before
//! decoding, the raw text is expanded:
//! - `${_self_}` is replaced by the absolute directory containing the file,
//!   so a settings file can point at paths next to itself
//! - `$VAR` and `${VAR}` are replaced from the environment; unknown
//!   variables are left as written

use kite_core::domain::Record;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

/// Marker replaced by the directory of the settings file
pub const SELF_MARKER: &str = "${_self_}";

/// Reads a settings file and expands its variables
pub fn expand_file(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, SettingsError> {
    let text = fs::read_to_string(path).map_err(|e| SettingsError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(expand_text(&text, &file_root(path), lookup))
}

/// Expands the `${_self_}` marker, then environment variables
pub fn expand_text(text: &str, root: &Path, lookup: impl Fn(&str) -> Option<String>) -> String {
    expand_vars(&text.replace(SELF_MARKER, &root.to_string_lossy()), lookup)
}

/// Decodes expanded settings text according to the file extension
pub fn decode_config(path: &Path, text: &str) -> Result<Record, SettingsError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let value: Value = match extension {
        "yaml" | "yml" => serde_yaml::from_str(text).map_err(|e| SettingsError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        "json" => serde_json::from_str(text).map_err(|e| SettingsError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        other => {
            return Err(SettingsError::UnsupportedExtension {
                path: path.to_path_buf(),
                extension: other.to_string(),
            });
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Record::new()),
        _ => Err(SettingsError::Invalid(format!(
            "{} must contain a mapping of setting names",
            path.display()
        ))),
    }
}

fn file_root(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Shell-style `$NAME` / `${NAME}` substitution
fn expand_vars(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        match Some(name).filter(|n| !n.is_empty()).and_then(&lookup) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                out.push_str(&after[..consumed]);
            }
        }

        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}
