// src/core/database.rs
//! SQLite persistence for jobs, form fields and application attempts

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use crate::types::{
    ApplicationAttempt, AttemptStatus, FormFieldRecord, JobRecord, JobStatus, StoreStats,
};

// ===== Core Database Connection Management =====

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create new database connection with automatic setup
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!(
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Single-connection in-memory database
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn jobs(&self) -> JobRepository<'_> {
        JobRepository::new(&self.pool)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                job_url TEXT,
                description TEXT,
                requirements TEXT,
                status TEXT NOT NULL CHECK (status IN ('PENDING', 'SKIPPED', 'APPLIED', 'FAILED', 'ERROR')),
                failure_reason TEXT,
                applied_at TEXT,
                updated_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS form_fields (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                field_type TEXT NOT NULL CHECK (field_type IN ('text', 'select', 'radio', 'checkbox', 'textarea', 'file', 'other')),
                field_label TEXT NOT NULL,
                field_value TEXT,
                field_options TEXT,
                is_required BOOLEAN NOT NULL DEFAULT FALSE,
                is_filled BOOLEAN NOT NULL DEFAULT FALSE,
                error_message TEXT,
                FOREIGN KEY (job_id) REFERENCES jobs (job_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS application_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                attempt_time TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('SUCCESS', 'FAILED', 'ERROR')),
                error_message TEXT,
                step_reached TEXT,
                form_data TEXT,
                FOREIGN KEY (job_id) REFERENCES jobs (job_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_applied_at ON jobs(applied_at);")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_form_fields_job_id ON form_fields(job_id);")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_application_attempts_job_id ON application_attempts(job_id);",
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }
}

// ===== Row Models =====

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    title: String,
    company: String,
    location: String,
    job_url: Option<String>,
    description: Option<String>,
    requirements: Option<String>,
    status: String,
    failure_reason: Option<String>,
    applied_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Self {
            status: row.status.parse()?,
            job_id: row.job_id,
            title: row.title,
            company: row.company,
            location: row.location,
            job_url: row.job_url,
            description: row.description,
            requirements: row.requirements,
            failure_reason: row.failure_reason,
            applied_at: row.applied_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FormFieldRow {
    job_id: String,
    field_type: String,
    field_label: String,
    field_value: Option<String>,
    field_options: Option<String>,
    is_required: bool,
    is_filled: bool,
    error_message: Option<String>,
}

impl TryFrom<FormFieldRow> for FormFieldRecord {
    type Error = anyhow::Error;

    fn try_from(row: FormFieldRow) -> Result<Self> {
        let options = row
            .field_options
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()
            .context("Corrupted field_options column")?;

        Ok(Self {
            field_type: row.field_type.parse()?,
            job_id: row.job_id,
            label: row.field_label,
            value: row.field_value,
            options,
            is_required: row.is_required,
            is_filled: row.is_filled,
            error_message: row.error_message,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    job_id: String,
    attempt_time: DateTime<Utc>,
    status: String,
    error_message: Option<String>,
    step_reached: Option<String>,
    form_data: Option<String>,
}

impl TryFrom<AttemptRow> for ApplicationAttempt {
    type Error = anyhow::Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        let status = match row.status.as_str() {
            "SUCCESS" => AttemptStatus::Success,
            "FAILED" => AttemptStatus::Failed,
            "ERROR" => AttemptStatus::Error,
            other => anyhow::bail!("Unknown attempt status: {}", other),
        };
        let form_data = row
            .form_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("Corrupted form_data column")?;

        Ok(Self {
            job_id: row.job_id,
            attempt_time: row.attempt_time,
            status,
            error_message: row.error_message,
            step_reached: row.step_reached,
            form_data,
        })
    }
}

const JOB_COLUMNS: &str = "job_id, title, company, location, job_url, description, requirements, \
                           status, failure_reason, applied_at, updated_at";

// ===== Job Repository =====

pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or fully replace the row for `job.job_id`.
    ///
    /// Every mutable column takes the new value, including NULLs. Child rows
    /// in `form_fields` and `application_attempts` are preserved.
    pub async fn upsert(&self, job: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, title, company, location, job_url, description,
                              requirements, status, failure_reason, applied_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                title = excluded.title,
                company = excluded.company,
                location = excluded.location,
                job_url = excluded.job_url,
                description = excluded.description,
                requirements = excluded.requirements,
                status = excluded.status,
                failure_reason = excluded.failure_reason,
                applied_at = excluded.applied_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.job_url)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(job.status.as_str())
        .bind(&job.failure_reason)
        .bind(job.applied_at)
        .bind(job.updated_at)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to upsert job {}", job.job_id))?;

        Ok(())
    }

    pub async fn insert_form_field(&self, field: &FormFieldRecord) -> Result<()> {
        let options = field
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO form_fields (job_id, field_type, field_label, field_value, field_options,
                                     is_required, is_filled, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&field.job_id)
        .bind(field.field_type.as_str())
        .bind(&field.label)
        .bind(&field.value)
        .bind(options)
        .bind(field.is_required)
        .bind(field.is_filled)
        .bind(&field.error_message)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to save form field '{}'", field.label))?;

        Ok(())
    }

    pub async fn insert_attempt(&self, attempt: &ApplicationAttempt) -> Result<()> {
        let form_data = attempt
            .form_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO application_attempts (job_id, attempt_time, status, error_message,
                                              step_reached, form_data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.job_id)
        .bind(attempt.attempt_time)
        .bind(attempt.status.as_str())
        .bind(&attempt.error_message)
        .bind(&attempt.step_reached)
        .bind(form_data)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to log attempt for job {}", attempt.job_id))?;

        Ok(())
    }

    pub async fn find(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE job_id = ?",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(JobRecord::try_from).transpose()
    }

    pub async fn is_applied(&self, job_id: &str) -> Result<bool> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM jobs WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(self.pool)
                .await?;

        Ok(status.as_deref() == Some(JobStatus::Applied.as_str()))
    }

    /// Applied jobs, most recent first
    pub async fn list_applied(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE status = ? ORDER BY applied_at DESC",
            JOB_COLUMNS
        ))
        .bind(JobStatus::Applied.as_str())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    pub async fn form_fields(&self, job_id: &str) -> Result<Vec<FormFieldRecord>> {
        let rows = sqlx::query_as::<_, FormFieldRow>(
            r#"
            SELECT job_id, field_type, field_label, field_value, field_options,
                   is_required, is_filled, error_message
            FROM form_fields
            WHERE job_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(FormFieldRecord::try_from).collect()
    }

    pub async fn attempts(&self, job_id: &str) -> Result<Vec<ApplicationAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT job_id, attempt_time, status, error_message, step_reached, form_data
            FROM application_attempts
            WHERE job_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(ApplicationAttempt::try_from).collect()
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let (total_jobs, unique_jobs): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT job_id) FROM jobs")
                .fetch_one(self.pool)
                .await?;

        let total_fields: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM form_fields")
            .fetch_one(self.pool)
            .await?;

        let applied_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(JobStatus::Applied.as_str())
            .fetch_one(self.pool)
            .await?;

        Ok(StoreStats {
            total_jobs,
            unique_jobs,
            total_fields,
            applied_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    #[tokio::test]
    async fn test_upsert_replaces_row() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.jobs();

        let mut job = JobRecord::pending("100", "Rust Engineer", "Acme", "Remote")
            .with_url("https://www.linkedin.com/jobs/view/100/");
        job.description = Some("Build things".into());
        repo.upsert(&job).await.unwrap();

        let mut replacement = JobRecord::pending("100", "Rust Engineer", "Acme", "Remote");
        replacement
            .transition(JobStatus::Failed, Some("modal not found".into()))
            .unwrap();
        repo.upsert(&replacement).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.unique_jobs, 1);

        let stored = repo.find("100").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("modal not found"));
        // Replace, not merge: the earlier description and URL are gone
        assert_eq!(stored.description, None);
        assert_eq!(stored.job_url, None);
    }

    #[tokio::test]
    async fn test_applied_listing_and_stats() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.jobs();

        let mut applied = JobRecord::pending("1", "A", "B", "C");
        applied.transition(JobStatus::Applied, None).unwrap();
        repo.upsert(&applied).await.unwrap();

        let mut skipped = JobRecord::pending("2", "D", "E", "F");
        skipped
            .transition(JobStatus::Skipped, Some("No apply button found".into()))
            .unwrap();
        repo.upsert(&skipped).await.unwrap();

        repo.insert_form_field(&FormFieldRecord {
            job_id: "1".into(),
            field_type: FieldType::Select,
            label: "Authorized to work?".into(),
            value: Some("Yes".into()),
            options: Some(vec!["Yes".into(), "No".into()]),
            is_required: true,
            is_filled: true,
            error_message: None,
        })
        .await
        .unwrap();

        assert!(repo.is_applied("1").await.unwrap());
        assert!(!repo.is_applied("2").await.unwrap());
        assert!(!repo.is_applied("missing").await.unwrap());

        let listed = repo.list_applied().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].job_id, "1");

        let stats = repo.stats().await.unwrap();
        assert_eq!(
            stats,
            StoreStats {
                total_jobs: 2,
                unique_jobs: 2,
                total_fields: 1,
                applied_count: 1,
            }
        );

        let fields = repo.form_fields("1").await.unwrap();
        assert_eq!(
            fields[0].options.as_deref(),
            Some(&["Yes".to_string(), "No".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_attempt_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.jobs();
        repo.upsert(&JobRecord::pending("7", "t", "c", "l"))
            .await
            .unwrap();

        repo.insert_attempt(&ApplicationAttempt {
            job_id: "7".into(),
            attempt_time: Utc::now(),
            status: AttemptStatus::Failed,
            error_message: Some("too many steps".into()),
            step_reached: Some("step 10".into()),
            form_data: Some(serde_json::json!({"Email": "ada@example.com"})),
        })
        .await
        .unwrap();

        let attempts = repo.attempts("7").await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert_eq!(attempts[0].step_reached.as_deref(), Some("step 10"));
        assert_eq!(
            attempts[0].form_data.as_ref().unwrap()["Email"],
            "ada@example.com"
        );
    }
}
