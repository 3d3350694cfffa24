//! LinkedIn Easy Apply automation: a WebDriver-driven browser, a hosted
//! language model for free-text answers, and a SQLite record of every attempt.

pub mod apply;
pub mod browser;
pub mod cli;
pub mod core;
pub mod environment;
pub mod linkedin;
pub mod runner;
pub mod types;
pub mod utils;

pub use crate::core::{ConfigManager, JobStore};
pub use runner::{AutoApplyRunner, RunError, RunSummary};
