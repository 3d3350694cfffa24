// src/core/mod.rs
//! Configuration, persistence and the language model gateway

pub mod config_manager;
pub mod database;
pub mod llm_client;
pub mod store;

pub use config_manager::ConfigManager;
pub use database::{Database, JobRepository};
pub use llm_client::{LanguageModel, LlmClient};
pub use store::JobStore;
