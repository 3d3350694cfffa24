// src/linkedin/mod.rs
//! LinkedIn page adapters

pub mod assistant;
pub mod challenge;
pub mod discovery;
pub mod login;
pub mod modal;
pub mod orientation;
pub mod selectors;

pub use selectors::SelectorConfig;
