//! Chains of real recipes
#![cfg(unix)]

use kite_core::JsonRecord;
use kite_core::domain::{JobResult, JobSpec};
use kite_recipes::{
    ChainStage, CopyWorkdirPipe, Recipe, RecipeBuilder, RecipeChain, RecipeRegistry, Runnable,
    SaveResultsPipe, Settings, ShellJob,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builder placing working directories in `basedir`
fn shell_in(basedir: PathBuf, scratch: PathBuf, cmd: &'static str) -> RecipeBuilder {
    Arc::new(
        move |mut info: JobSpec, _: Option<&Path>| -> kite_recipes::Result<Box<dyn Runnable>> {
            info.options.insert("cmd".to_string(), json!(["sh", "-c", cmd]));
            let settings = Settings {
                scratch_dir: scratch.clone(),
                ..Settings::default()
            };
            Ok(Box::new(Recipe::from_parts(
                info,
                settings,
                ShellJob,
                basedir.clone(),
            )))
        },
    )
}

fn mkdirs(root: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let dir = root.join(name);
            fs::create_dir(&dir).unwrap();
            dir
        })
        .collect()
}

#[test]
fn test_second_stage_resumes_from_copy() {
    let root = tempfile::tempdir().unwrap();
    let dirs = mkdirs(root.path(), &["first", "second", "scratch", "saved"]);

    let mut chain = RecipeChain::new(JobSpec::new("relax"), None)
        .then(ChainStage::recipe(
            "first",
            shell_in(dirs[0].clone(), dirs[2].clone(), "echo one > one.txt"),
        ))
        .then(ChainStage::pipe(SaveResultsPipe::new(&dirs[3])))
        .then(ChainStage::pipe(CopyWorkdirPipe))
        .then(ChainStage::recipe(
            "second",
            shell_in(dirs[1].clone(), dirs[2].clone(), "cat one.txt > two.txt"),
        ));

    let results = chain.run().unwrap().into_result().unwrap();

    let workdir = results.workdir.clone().unwrap();
    assert!(workdir.starts_with(&dirs[1]));
    assert_eq!(fs::read_to_string(workdir.join("two.txt")).unwrap(), "one\n");

    let first = JobResult::from_dir(&dirs[3]).unwrap();
    let first_workdir = first.workdir.unwrap();
    assert!(first_workdir.join("one.txt").exists());
    assert!(!first_workdir.join("two.txt").exists());

    let first_seconds = first.runstats.duration.seconds().unwrap();
    let total = results.runstats.duration.seconds().unwrap();
    assert!(total >= first_seconds);
    assert_eq!(results.job.uuid, chain.info.job.uuid);
}

#[test]
fn test_failed_stage_ends_chain() {
    let root = tempfile::tempdir().unwrap();
    let dirs = mkdirs(root.path(), &["first", "second", "scratch"]);

    let mut chain = RecipeChain::new(JobSpec::new("relax"), None)
        .then(ChainStage::recipe(
            "first",
            shell_in(dirs[0].clone(), dirs[2].clone(), "exit 1"),
        ))
        .then(ChainStage::recipe(
            "second",
            shell_in(dirs[1].clone(), dirs[2].clone(), "true"),
        ));

    let outcome = chain.run().unwrap();
    assert!(outcome.failure().unwrap().workdir.starts_with(&dirs[0]));
    assert_eq!(fs::read_dir(&dirs[1]).unwrap().count(), 0);
}

#[test]
fn test_registry_stage() {
    let registry = RecipeRegistry::builtin();
    let chain = RecipeChain::new(JobSpec::new("shell"), None)
        .then(registry.stage("shell").unwrap())
        .then(ChainStage::pipe(CopyWorkdirPipe));

    let names: Vec<&str> = chain.stages().iter().map(ChainStage::name).collect();
    assert_eq!(names, vec!["shell", "CopyWorkdirPipe"]);
    assert!(registry.stage("missing").is_err());
}
