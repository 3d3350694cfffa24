// src/types/mod.rs
pub mod job;
pub mod profile;

pub use job::{
    ApplicationAttempt, AttemptStatus, FieldType, FormFieldRecord, JobRecord, JobStatus,
    StoreStats, TransitionError,
};
pub use profile::Profile;
