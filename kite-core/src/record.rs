//! JSON persistence for records
//!
//! Every record is stored as a single JSON document under a fixed file name
//! (`jobinfo.json`, `jobresults.json`, `runstats.json`).

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{CoreError, Result};

/// A record that round-trips through a JSON file
pub trait JsonRecord: Serialize + DeserializeOwned {
    /// Conventional file name for this record inside a job directory
    const FILE_NAME: &'static str;

    fn file_name() -> &'static str {
        Self::FILE_NAME
    }

    /// Encodes the record as JSON bytes
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a record from JSON bytes
    fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Writes the record to `path`, replacing any existing file
    fn to_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.encode()?;
        fs::write(path, data).map_err(|e| CoreError::io(path, e))
    }

    /// Reads a record from `path`
    fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| CoreError::io(path, e))?;
        Self::decode(&data)
    }

    /// Reads the record stored under [`Self::FILE_NAME`] in `dir`
    fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(dir.as_ref().join(Self::FILE_NAME))
    }
}
