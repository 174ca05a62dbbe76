//! Directory copy helpers
//!
//! Staging a run and copying it back both merge one tree into another:
//! directories are merged recursively and files in the destination are
//! overwritten. Core dumps (`core.*`) are never copied, and an entry that is
//! the destination itself is skipped so copying a directory into one of its
//! own children terminates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{RecipeError, Result};

/// Prefix of core dump files left behind by crashed programs
const CORE_DUMP_PREFIX: &str = "core.";

/// Merge the contents of `src` into `dst`, creating `dst` if needed
pub fn smart_copy(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| RecipeError::io("create", dst, e))?;
    let guard = resolve(dst);
    copy_into(src, dst, &guard)
}

/// Copy `src` into a new directory `dst`
///
/// Fails if `dst` already exists.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir(dst).map_err(|e| RecipeError::io("create", dst, e))?;
    smart_copy(src, dst)
}

/// Move a directory, copying when `src` and `dst` are on different filesystems
///
/// Any other rename failure is returned as is. A failed copy removes the
/// partial `dst` and leaves `src` in place.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {}
        Err(e) => return Err(RecipeError::io("move", src, e)),
    }

    tracing::debug!(
        "{} is on another filesystem, copying to {}",
        src.display(),
        dst.display()
    );
    if let Err(e) = copy_tree(src, dst) {
        let _ = fs::remove_dir_all(dst);
        return Err(e);
    }
    fs::remove_dir_all(src).map_err(|e| RecipeError::io("remove", src, e))
}

fn copy_into(src: &Path, dst: &Path, guard: &Path) -> Result<()> {
    let entries = fs::read_dir(src).map_err(|e| RecipeError::io("read", src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| RecipeError::io("read", src, e))?;
        let name = entry.file_name();

        if name.to_string_lossy().starts_with(CORE_DUMP_PREFIX) {
            tracing::debug!("Skipping core dump {}", entry.path().display());
            continue;
        }

        let from = entry.path();
        if resolve(&from) == guard {
            continue;
        }

        let to = dst.join(&name);
        if from.is_dir() {
            fs::create_dir_all(&to).map_err(|e| RecipeError::io("create", &to, e))?;
            copy_into(&from, &to, guard)?;
        } else {
            fs::copy(&from, &to).map_err(|e| RecipeError::io("copy", &from, e))?;
        }
    }

    Ok(())
}

fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
