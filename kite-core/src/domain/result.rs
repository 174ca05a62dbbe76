//! Job result types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::job::{JobDescriptor, Record};
use crate::domain::runstats::RunStats;
use crate::error::Result;
use crate::record::JsonRecord;

/// Result for one computed entity
///
/// The wire keys (`chemnode`, `calcnodes`) match the descriptor files the
/// rest of the pipeline already exchanges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// Entity descriptor; recipes may inject extra keys such as `attributes`
    #[serde(rename = "chemnode")]
    pub entity: Record,

    /// Sub-computation results attached to the entity
    #[serde(rename = "calcnodes", default)]
    pub calcs: Vec<Record>,
}

impl NodeResult {
    pub fn new(entity: Record) -> Self {
        Self {
            entity,
            calcs: Vec::new(),
        }
    }
}

/// Outcome of a successful recipe execution (`jobresults.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job: JobDescriptor,

    #[serde(default)]
    pub runstats: RunStats,

    #[serde(default)]
    pub nodes: Vec<NodeResult>,

    /// Durable working directory; whoever receives the result owns it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

impl JobResult {
    pub fn new(runstats: RunStats, nodes: Vec<NodeResult>) -> Self {
        Self {
            job: JobDescriptor::default(),
            runstats,
            nodes,
            workdir: None,
        }
    }

    /// Returns the job UUID, generating it on first access
    pub fn uuid(&mut self) -> String {
        self.job.ensure_uuid()
    }

    pub fn short_id(&mut self) -> String {
        self.job.short_id()
    }

    pub fn id(&self) -> Result<String> {
        self.job.identifier()
    }
}

impl JsonRecord for JobResult {
    const FILE_NAME: &'static str = "jobresults.json";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::runstats::RunDuration;
    use serde_json::json;

    const RESULTS: &str = r#"{
        "job": {"id": 1, "uuid": "7615c560-d3d8-4b9e-9a56-6a4e4e3b8f21", "status": "done", "options": {"cutoff": 5.0}},
        "runstats": {"host": "node01", "cluster": "10.0.0.1", "duration": 12.5, "ncores": 4, "ngpus": 1, "pkgversion": "kite 0.1.0"},
        "nodes": [
            {
                "chemnode": {"formula": "H2O", "attributes": {"source": "test"}},
                "calcnodes": [{"energy": -1.5, "forces": [[0.0, 0.1, 0.2]]}]
            },
            {"chemnode": {"formula": "CO2"}}
        ]
    }"#;

    #[test]
    fn test_decode_results() {
        let results = JobResult::decode(RESULTS.as_bytes()).unwrap();

        assert_eq!(results.job.status.as_deref(), Some("done"));
        assert_eq!(results.runstats.host, "node01");
        assert_eq!(results.runstats.duration, RunDuration::Seconds(12.5));
        assert_eq!(results.nodes.len(), 2);
        assert_eq!(results.nodes[0].calcs.len(), 1);
        assert!(results.nodes[1].calcs.is_empty());
        assert_eq!(results.nodes[1].entity.get("formula"), Some(&json!("CO2")));
    }

    #[test]
    fn test_round_trip_nested() {
        let mut results = JobResult::decode(RESULTS.as_bytes()).unwrap();
        results.workdir = Some(PathBuf::from("/jobs/relax_1"));

        let decoded = JobResult::decode(&results.encode().unwrap()).unwrap();
        assert_eq!(decoded, results);
    }

    #[test]
    fn test_nodes_default_empty() {
        let results = JobResult::decode(br#"{"job": {"id": 3}}"#).unwrap();
        assert!(results.nodes.is_empty());
        assert_eq!(results.id().unwrap(), "id_3");
    }

    #[test]
    fn test_wire_keys() {
        let node = NodeResult::new(json!({"formula": "H2"}).as_object().cloned().unwrap());
        let value = serde_json::to_value(&node).unwrap();

        assert!(value.get("chemnode").is_some());
        assert_eq!(value["calcnodes"], json!([]));
    }
}
