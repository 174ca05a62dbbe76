//! Core domain types
//!
//! These records are passed between recipes, pipes and chains. They are plain
//! values: whichever stage currently holds one owns it.

pub mod job;
pub mod result;
pub mod runstats;
pub mod status;

pub use job::{JobDescriptor, JobSpec, Record, RecipeSelector, timestamp_label};
pub use result::{JobResult, NodeResult};
pub use runstats::{RunDuration, RunStats, round_seconds};
pub use status::Status;
