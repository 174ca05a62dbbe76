//! Job specification types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::status::Status;
use crate::error::{CoreError, Result};
use crate::record::JsonRecord;

/// Free-form JSON object used for options, inputs and entity records
pub type Record = Map<String, Value>;

/// Formats a creation time as fixed-width UTC Unix seconds
///
/// Folder names embed this label, and crash recovery picks the greatest
/// folder name, so the label must sort in chronological order.
pub fn timestamp_label(at: DateTime<Utc>) -> String {
    format!("{:010}", at.timestamp())
}

/// Job descriptor shared by specifications and results
///
/// Known keys are typed. Any other key is kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Legacy numeric identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Kept as written; generated values are v4 UUIDs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Status as a plain string, validated by callers against [`Status`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Effective options, echoed into terminal descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Record>,

    #[serde(flatten)]
    pub extra: Record,
}

impl JobDescriptor {
    /// Returns the UUID, generating and caching one on first access
    pub fn ensure_uuid(&mut self) -> String {
        self.uuid
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone()
    }

    /// First 8 characters of the UUID, generating it if needed
    pub fn short_id(&mut self) -> String {
        self.ensure_uuid().chars().take(8).collect()
    }

    /// Returns the stable identifier of the job
    ///
    /// The UUID wins when present; otherwise the legacy id is rendered as
    /// `id_<n>`.
    pub fn identifier(&self) -> Result<String> {
        if let Some(uuid) = &self.uuid {
            return Ok(uuid.clone());
        }

        if let Some(id) = self.id {
            return Ok(format!("id_{}", id));
        }

        Err(CoreError::MissingIdentifier)
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = Some(status.as_str().to_string());
    }
}

/// Selects the recipe that should process a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub extra: Record,
}

/// A unit of work handed to a recipe (`jobinfo.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job: JobDescriptor,
    pub recipe: RecipeSelector,

    /// Recipe-specific overrides of the default options
    #[serde(default)]
    pub options: Record,

    /// Input records, opaque to the engine
    #[serde(default)]
    pub inputs: Vec<Record>,

    /// Working directory of a previous stage or run to resume from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

impl JobSpec {
    /// Creates an empty specification for the given recipe
    pub fn new(recipe: impl Into<String>) -> Self {
        Self {
            job: JobDescriptor::default(),
            recipe: RecipeSelector {
                name: Some(recipe.into()),
                extra: Record::new(),
            },
            options: Record::new(),
            inputs: Vec::new(),
            workdir: None,
        }
    }

    /// Returns the job UUID, generating it on first access
    ///
    /// The generated value is stored in the job descriptor, so every later
    /// call (and every persisted copy) sees the same UUID.
    pub fn uuid(&mut self) -> String {
        self.job.ensure_uuid()
    }

    /// First 8 characters of the UUID
    pub fn short_id(&mut self) -> String {
        self.job.short_id()
    }

    pub fn id(&self) -> Result<String> {
        self.job.identifier()
    }

    pub fn recipe_name(&self) -> &str {
        self.recipe.name.as_deref().unwrap_or("unnamed")
    }

    pub fn status(&self) -> Option<&str> {
        self.job.status.as_deref()
    }

    /// Recipe name plus short id, shared by every run of this job
    pub fn folder_prefix(&mut self) -> String {
        let short_id = self.short_id();
        format!("{}_{}", self.recipe_name(), short_id)
    }

    /// Folder prefix plus the current timestamp
    pub fn folder_name(&mut self) -> String {
        self.folder_name_at(Utc::now())
    }

    /// Folder prefix plus the timestamp of `at`
    pub fn folder_name_at(&mut self, at: DateTime<Utc>) -> String {
        format!("{}_{}", self.folder_prefix(), timestamp_label(at))
    }

    /// Returns a copy of this specification with its status replaced
    pub fn with_status(mut self, status: Status) -> Self {
        self.job.set_status(status);
        self
    }
}

impl JsonRecord for JobSpec {
    const FILE_NAME: &'static str = "jobinfo.json";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INFO: &str = r#"{
        "job": {"id": 1, "uuid": "7615c560-d3d8-4b9e-9a56-6a4e4e3b8f21", "status": "ready", "priority": 3},
        "recipe": {"name": "test_recipe", "package": "kite_test"},
        "options": {"cutoff": 5.0, "relax": {"steps": 100}},
        "inputs": [{"formula": "H2O", "attributes": {"source": "test"}}]
    }"#;

    fn info() -> JobSpec {
        JobSpec::decode(INFO.as_bytes()).unwrap()
    }

    #[test]
    fn test_decode_fields() {
        let info = info();
        let raw: Value = serde_json::from_str(INFO).unwrap();

        assert_eq!(info.job.id, Some(1));
        assert_eq!(info.status(), Some("ready"));
        assert_eq!(info.job.extra.get("priority"), Some(&serde_json::json!(3)));
        assert_eq!(info.recipe_name(), "test_recipe");
        assert_eq!(Value::Object(info.options.clone()), raw["options"]);
        assert_eq!(info.inputs.len(), 1);
        assert_eq!(Value::Object(info.inputs[0].clone()), raw["inputs"][0]);
        assert!(info.workdir.is_none());
    }

    #[test]
    fn test_round_trip() {
        let mut info = info();
        info.workdir = Some(PathBuf::from("/data/previous"));

        let decoded = JobSpec::decode(&info.encode().unwrap()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_round_trip_file() {
        let dir = tempfile::tempdir().unwrap();
        let info = info();

        info.to_json(dir.path().join("test.json")).unwrap();
        let loaded = JobSpec::from_json(dir.path().join("test.json")).unwrap();
        assert_eq!(loaded, info);

        info.to_json(dir.path().join(JobSpec::file_name())).unwrap();
        assert_eq!(JobSpec::from_dir(dir.path()).unwrap(), info);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(info().short_id(), "7615c560");
    }

    #[test]
    fn test_folder_name() {
        let at = Utc.with_ymd_and_hms(2022, 7, 26, 0, 0, 0).unwrap();
        let name = info().folder_name_at(at);
        assert_eq!(name, "test_recipe_7615c560_1658793600");
    }

    #[test]
    fn test_folder_prefix_unnamed_recipe() {
        let mut info = info();
        info.recipe.name = None;
        assert_eq!(info.folder_prefix(), "unnamed_7615c560");
    }

    #[test]
    fn test_generated_uuid_is_stable() {
        let mut info = JobSpec::new("test_recipe");
        assert!(info.job.uuid.is_none());

        let first = info.uuid();
        let second = info.uuid();
        assert_eq!(first, second);
        assert_eq!(info.job.uuid.as_deref(), Some(first.as_str()));
        assert_eq!(info.id().unwrap(), first);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_uuid_kept_as_written() {
        let raw = r#"{"job": {"uuid": "ABCDEF12-legacy"}, "recipe": {"name": "r"}}"#;
        let mut info = JobSpec::decode(raw.as_bytes()).unwrap();

        assert_eq!(info.short_id(), "ABCDEF12");
        assert_eq!(info.id().unwrap(), "ABCDEF12-legacy");

        let encoded: Value = serde_json::from_slice(&info.encode().unwrap()).unwrap();
        assert_eq!(encoded["job"]["uuid"], "ABCDEF12-legacy");
    }

    #[test]
    fn test_legacy_id() {
        let mut info = JobSpec::new("test_recipe");
        info.job.id = Some(42);
        assert_eq!(info.id().unwrap(), "id_42");
    }

    #[test]
    fn test_missing_identifier() {
        let info = JobSpec::new("test_recipe");
        assert!(matches!(info.id(), Err(CoreError::MissingIdentifier)));
    }

    #[test]
    fn test_with_status_keeps_other_fields() {
        let original = info();
        let errored = original.clone().with_status(Status::Error);

        assert_eq!(errored.status(), Some("error"));
        assert_eq!(errored.job.uuid, original.job.uuid);
        assert_eq!(errored.job.extra, original.job.extra);
        assert_eq!(errored.options, original.options);
        assert_eq!(errored.inputs, original.inputs);
    }

    #[test]
    fn test_timestamp_label_is_fixed_width() {
        let early = Utc.timestamp_opt(5, 0).unwrap();
        let late = Utc.timestamp_opt(1_658_793_600, 0).unwrap();

        assert_eq!(timestamp_label(early), "0000000005");
        assert!(timestamp_label(early) < timestamp_label(late));
    }
}
