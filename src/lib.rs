pub mod analysis;
pub mod challenge;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod recorder;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use analysis::{analyze, analyze_at, Insight, InsightSummary};
pub use error::{Result, SaveFailure, TrackerError};
pub use service::{FinishedRun, RunTracker};
