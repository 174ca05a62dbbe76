//! Job status values

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

/// Closed set of job statuses
///
/// Descriptors store statuses as plain strings; use [`Status::has_value`] or
/// [`FromStr`] to validate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Building,
    Ready,
    Doing,
    Done,
    Error,
    Parsing,
    /// Wildcard used when filtering; no job is ever in this state
    Any,
    Archive,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Building,
        Status::Ready,
        Status::Doing,
        Status::Done,
        Status::Error,
        Status::Parsing,
        Status::Any,
        Status::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Building => "building",
            Status::Ready => "ready",
            Status::Doing => "doing",
            Status::Done => "done",
            Status::Error => "error",
            Status::Parsing => "parsing",
            Status::Any => "any",
            Status::Archive => "archive",
        }
    }

    pub fn values() -> impl Iterator<Item = &'static str> {
        Status::ALL.iter().map(Status::as_str)
    }

    pub fn has_value(value: &str) -> bool {
        Status::values().any(|v| v == value)
    }

    /// Checks a stored status string against this status, honouring `any`
    pub fn matches(&self, status: &str) -> bool {
        *self == Status::Any || self.as_str() == status
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}
