// src/types/job.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

// ===== Job Status =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Skipped,
    Applied,
    Failed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Skipped => "SKIPPED",
            Self::Applied => "APPLIED",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
        }
    }

    /// Every status except `PENDING` ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Statuses that carry a `failure_reason`
    pub fn carries_reason(&self) -> bool {
        matches!(self, Self::Skipped | Self::Failed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SKIPPED" => Ok(Self::Skipped),
            "APPLIED" => Ok(Self::Applied),
            "FAILED" => Ok(Self::Failed),
            "ERROR" => Ok(Self::Error),
            other => anyhow::bail!("Unknown job status: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {job_id}: cannot move from terminal status {from} to {to}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

// ===== Job Record =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_url: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub status: JobStatus,
    pub failure_reason: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// New `PENDING` record; blank scraped values fall back to the unknown sentinels
    pub fn pending(job_id: &str, title: &str, company: &str, location: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            title: non_blank_or(title, UNKNOWN_TITLE),
            company: non_blank_or(company, UNKNOWN_COMPANY),
            location: non_blank_or(location, UNKNOWN_LOCATION),
            job_url: None,
            description: None,
            requirements: None,
            status: JobStatus::Pending,
            failure_reason: None,
            applied_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.job_url = Some(url.into());
        self
    }

    /// Move to `next`. A record in a terminal status never changes again.
    pub fn transition(
        &mut self,
        next: JobStatus,
        reason: Option<String>,
    ) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                job_id: self.job_id.clone(),
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.failure_reason = if next.carries_reason() { reason } else { None };
        if next == JobStatus::Applied {
            self.applied_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

// ===== Form Fields =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Select,
    Radio,
    Checkbox,
    Textarea,
    File,
    Other,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Textarea => "textarea",
            Self::File => "file",
            Self::Other => "other",
        }
    }

    /// Map an HTML tag / `type` attribute pair onto the closed field set
    pub fn from_html(tag: &str, input_type: Option<&str>) -> Self {
        match tag.to_lowercase().as_str() {
            "select" => Self::Select,
            "textarea" => Self::Textarea,
            "input" => match input_type.map(|t| t.to_lowercase()).as_deref() {
                None | Some("") | Some("text") | Some("email") | Some("tel") | Some("number")
                | Some("url") | Some("search") => Self::Text,
                Some("radio") => Self::Radio,
                Some("checkbox") => Self::Checkbox,
                Some("file") => Self::File,
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "select" => Ok(Self::Select),
            "radio" => Ok(Self::Radio),
            "checkbox" => Ok(Self::Checkbox),
            "textarea" => Ok(Self::Textarea),
            "file" => Ok(Self::File),
            "other" => Ok(Self::Other),
            other => anyhow::bail!("Unknown field type: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldRecord {
    pub job_id: String,
    pub field_type: FieldType,
    pub label: String,
    pub value: Option<String>,
    pub options: Option<Vec<String>>,
    pub is_required: bool,
    pub is_filled: bool,
    pub error_message: Option<String>,
}

// ===== Application Attempts =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttemptStatus {
    Success,
    Failed,
    Error,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationAttempt {
    pub job_id: String,
    pub attempt_time: DateTime<Utc>,
    pub status: AttemptStatus,
    pub error_message: Option<String>,
    pub step_reached: Option<String>,
    pub form_data: Option<serde_json::Value>,
}

// ===== Store Statistics =====

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_jobs: i64,
    pub unique_jobs: i64,
    pub total_fields: i64,
    pub applied_count: i64,
}
