//! Synchronizer run orchestration.

mod runner;
mod stats;

pub use runner::{RunConfig, Runner};
pub use stats::RunStats;
