// src/runner.rs
//! One auto-apply run: log in, search, then walk each candidate in turn.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::apply::{ApplicationWalk, FieldResolver, WalkOutcome};
use crate::browser::{BrowserError, BrowserSession};
use crate::core::{ConfigManager, JobStore};
use crate::linkedin::assistant::JobAssistant;
use crate::linkedin::challenge::ChallengeHandler;
use crate::linkedin::discovery::{JobDiscovery, JobSummary};
use crate::linkedin::login::{AuthError, LoginFlow};
use crate::linkedin::modal::{ApplyTrigger, LinkedInModal};
use crate::types::{JobRecord, JobStatus};

pub const REASON_NOT_EASY_APPLY: &str = "Not an Easy Apply job";
pub const REASON_NO_APPLY_BUTTON: &str = "No apply button found";

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("browser session lost: {0}")]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub processed: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: usize,
    pub already_applied: usize,
    pub no_jobs_found: bool,
}

impl RunSummary {
    fn record(&mut self, status: JobStatus) {
        self.processed += 1;
        match status {
            JobStatus::Applied => self.applied += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Error => self.errors += 1,
            JobStatus::Pending => {}
        }
    }
}

pub struct AutoApplyRunner<'a> {
    session: &'a dyn BrowserSession,
    config: &'a ConfigManager,
    store: &'a JobStore,
    assistant: &'a JobAssistant,
    /// Statuses reached in this run; a terminal entry is never revisited
    ledger: HashMap<String, JobStatus>,
}

impl<'a> AutoApplyRunner<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        config: &'a ConfigManager,
        store: &'a JobStore,
        assistant: &'a JobAssistant,
    ) -> Self {
        Self {
            session,
            config,
            store,
            assistant,
            ledger: HashMap::new(),
        }
    }

    pub async fn run(
        &mut self,
        keywords: &str,
        location: &str,
        max_applications: usize,
    ) -> Result<RunSummary, RunError> {
        let config = self.config;

        LoginFlow::new(
            self.session,
            &config.selectors,
            &config.credentials,
            &config.login,
            &config.challenge,
        )
        .login()
        .await?;

        let mut handler = ChallengeHandler::new(self.session, &config.selectors, &config.challenge);
        if !handler.handle_challenge().await.resolved {
            warn!("Verification still pending after login, continuing anyway");
        }

        let discovery = JobDiscovery::new(self.session, &config.selectors, &config.discovery);
        if !discovery
            .search(keywords, location, config.search.easy_apply_only)
            .await
        {
            warn!("Search results could not be confirmed, looking for job cards anyway");
        }

        let candidates = discovery.list_candidates(config.search.max_jobs).await;
        let mut summary = RunSummary {
            candidates: candidates.len(),
            ..RunSummary::default()
        };

        if candidates.is_empty() {
            warn!("No jobs found for '{}' in '{}'", keywords, location);
            summary.no_jobs_found = true;
            return Ok(summary);
        }

        for (index, candidate) in candidates.iter().enumerate() {
            if summary.applied >= max_applications {
                info!("Reached {} applications, stopping", max_applications);
                break;
            }

            info!(
                "Processing job {}/{}: {} at {}",
                index + 1,
                candidates.len(),
                candidate.title,
                candidate.company
            );

            let Some(mut job) = self.prepare(&discovery, candidate).await else {
                continue;
            };

            if let Some(status) = self.ledger.get(&job.job_id).filter(|s| s.is_terminal()) {
                debug!("Job {} already {} in this run", job.job_id, status);
                continue;
            }
            if self.store.is_applied(&job.job_id).await {
                info!("Already applied to {} at {}, skipping", job.title, job.company);
                summary.already_applied += 1;
                continue;
            }

            let status = match self.process_job(&discovery, &mut job).await {
                Ok(status) => status,
                Err(BrowserError::SessionClosed) => {
                    error!("Browser session closed while processing {}", job.job_id);
                    return Err(RunError::Browser(BrowserError::SessionClosed));
                }
                Err(e) => {
                    error!("Error processing job {}: {}", job.job_id, e);
                    if job.transition(JobStatus::Error, Some(e.to_string())).is_ok() {
                        self.store.upsert_job(&job).await;
                    }
                    job.status
                }
            };

            self.ledger.insert(job.job_id.clone(), status);
            summary.record(status);
        }

        let stats = self.store.get_stats().await;
        info!(
            "Run finished: {} applied, {} skipped, {} failed, {} errors",
            summary.applied, summary.skipped, summary.failed, summary.errors
        );
        info!(
            "Database: {} jobs ({} unique), {} form fields, {} applications",
            stats.total_jobs, stats.unique_jobs, stats.total_fields, stats.applied_count
        );

        Ok(summary)
    }

    /// Open the card and build its record; `None` when the job can't be identified
    async fn prepare(&self, discovery: &JobDiscovery<'_>, candidate: &JobSummary) -> Option<JobRecord> {
        if !discovery.open_job(candidate).await {
            warn!("Could not open {}, moving on", candidate.title);
            return None;
        }

        let Some(job_id) = discovery.current_job_id().await else {
            warn!("No job id for {}, moving on", candidate.title);
            return None;
        };

        let mut job = JobRecord::pending(
            &job_id,
            &candidate.title,
            &candidate.company,
            &candidate.location,
        );
        if let Some(url) = discovery.current_job_url().await {
            job = job.with_url(url);
        }
        Some(job)
    }

    async fn process_job(
        &self,
        discovery: &JobDiscovery<'_>,
        job: &mut JobRecord,
    ) -> Result<JobStatus, BrowserError> {
        self.store.upsert_job(job).await;

        if let Some(html) = discovery.job_description_html().await {
            if let Some((description, requirements)) =
                self.assistant.extract_job_details(&html).await
            {
                job.description = Some(description);
                job.requirements = Some(requirements);
            }
        }

        let (should_apply, reason) = self
            .assistant
            .analyze_job(
                &job.title,
                &job.company,
                job.description.as_deref(),
                job.requirements.as_deref(),
            )
            .await;
        if !should_apply {
            info!("Skipping {} at {}: {}", job.title, job.company, reason);
            return Ok(self.skip(job, reason).await);
        }

        let modal = LinkedInModal::new(self.session, &self.config.selectors);
        let trigger = match modal.find_trigger().await? {
            ApplyTrigger::EasyApply(trigger) => trigger,
            ApplyTrigger::External => {
                return Ok(self.skip(job, REASON_NOT_EASY_APPLY.to_string()).await)
            }
            ApplyTrigger::Missing => {
                return Ok(self.skip(job, REASON_NO_APPLY_BUTTON.to_string()).await)
            }
        };

        modal.open(&trigger).await?;

        let resolver = FieldResolver::new(self.assistant.profile(), self.assistant);
        let walk = ApplicationWalk::new(&modal, resolver, self.store, &self.config.walk);
        match walk.run(job).await {
            WalkOutcome::Applied => info!("Applied to {} at {}", job.title, job.company),
            other => info!("Application to {} at {} ended: {}", job.title, job.company, other),
        }

        Ok(job.status)
    }

    async fn skip(&self, job: &mut JobRecord, reason: String) -> JobStatus {
        if let Err(e) = job.transition(JobStatus::Skipped, Some(reason)) {
            warn!("{}", e);
        }
        self.store.upsert_job(job).await;
        job.status
    }
}
