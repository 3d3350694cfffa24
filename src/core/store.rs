// src/core/store.rs
//! Persistence facade that never fails its callers.
//!
//! Job search and applying keep going when the database is missing or a
//! statement fails: every failure is logged and the operation degrades to a
//! no-op (writes) or a neutral answer (reads).

use std::path::Path;
use tracing::{info, warn};

use crate::core::Database;
use crate::types::{ApplicationAttempt, FormFieldRecord, JobRecord, StoreStats};

pub struct JobStore {
    db: Option<Database>,
}

impl JobStore {
    /// Open the database, or continue without one if that fails
    pub async fn open(database_path: &Path) -> Self {
        match Database::new(database_path).await {
            Ok(db) => Self { db: Some(db) },
            Err(e) => {
                warn!("Database setup failed: {:#}", e);
                warn!("Continuing without database functionality");
                Self { db: None }
            }
        }
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Some(db) }
    }

    pub fn disabled() -> Self {
        Self { db: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub async fn upsert_job(&self, job: &JobRecord) {
        let Some(db) = &self.db else {
            warn!("Database is disabled, skipping save of job {}", job.job_id);
            return;
        };

        match db.jobs().upsert(job).await {
            Ok(()) => {
                info!(
                    "Saved job details for {} at {} - Status: {}",
                    job.title, job.company, job.status
                );
                if let Some(reason) = &job.failure_reason {
                    info!("Job {} reason: {}", job.job_id, reason);
                }
            }
            Err(e) => {
                warn!("Error saving job details: {:#}", e);
                warn!("Continuing without saving to database");
            }
        }
    }

    pub async fn append_form_field(&self, field: &FormFieldRecord) {
        let Some(db) = &self.db else {
            return;
        };

        if let Err(e) = db.jobs().insert_form_field(field).await {
            warn!("Error saving form field: {:#}", e);
        }
    }

    pub async fn append_attempt(&self, attempt: &ApplicationAttempt) {
        let Some(db) = &self.db else {
            warn!(
                "Database is disabled, skipping attempt log for job {}",
                attempt.job_id
            );
            return;
        };

        match db.jobs().insert_attempt(attempt).await {
            Ok(()) => info!(
                "Logged application attempt for job {} - Status: {}",
                attempt.job_id, attempt.status
            ),
            Err(e) => warn!("Error logging application attempt: {:#}", e),
        }
    }

    /// `false` whenever the answer cannot be read
    pub async fn is_applied(&self, job_id: &str) -> bool {
        let Some(db) = &self.db else {
            warn!("Database is disabled, assuming not applied");
            return false;
        };

        match db.jobs().is_applied(job_id).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Error checking if already applied: {:#}", e);
                false
            }
        }
    }

    pub async fn list_applied(&self) -> Vec<JobRecord> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        db.jobs().list_applied().await.unwrap_or_else(|e| {
            warn!("Error getting applied jobs: {:#}", e);
            Vec::new()
        })
    }

    pub async fn get_stats(&self) -> StoreStats {
        let Some(db) = &self.db else {
            return StoreStats::default();
        };

        db.jobs().stats().await.unwrap_or_else(|e| {
            warn!("Error getting database stats: {:#}", e);
            StoreStats::default()
        })
    }
}
