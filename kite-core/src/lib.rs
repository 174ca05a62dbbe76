//! Kite Core
//!
//! Core records for the Kite recipe engine.
//!
//! This crate contains:
//! - Domain types: job specifications, results, run statistics and statuses
//! - Persistence: the JSON record trait behind `jobinfo.json` and friends
//!
//! Execution logic lives in `kite-recipes`.

pub mod domain;
pub mod error;
pub mod record;

pub use error::{CoreError, Result};
pub use record::JsonRecord;
