// src/apply/walk.rs
//! The Easy Apply walk: a bounded state machine from "modal expected" to
//! "application sent" or a recorded failure.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::apply::fields::{FieldDecision, FieldResolver};
use crate::browser::{BrowserError, ElementHandle};
use crate::core::JobStore;
use crate::types::{ApplicationAttempt, AttemptStatus, FieldType, FormFieldRecord, JobRecord, JobStatus};

pub const REASON_MODAL_NOT_FOUND: &str = "modal not found";
pub const REASON_NO_ACTION: &str = "no submit or next button found";
pub const REASON_TOO_MANY_STEPS: &str = "too many steps";

#[derive(Debug, Clone, PartialEq)]
pub struct WalkConfig {
    /// Upper bound on form pages collected for one application
    pub max_steps: usize,
    pub modal_probes: usize,
    pub modal_probe_timeout: Duration,
    pub confirmation_timeout: Duration,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            modal_probes: 2,
            modal_probe_timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(10),
        }
    }
}

/// One visible input (or input group) inside the apply modal
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub handle: ElementHandle,
    pub field_type: FieldType,
    pub label: String,
    pub current_value: Option<String>,
    pub options: Vec<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
    Submit,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Rejected(String),
    TimedOut,
}

/// What the walk needs from the apply dialog
#[async_trait]
pub trait ApplyModal: Send + Sync {
    async fn wait_for_modal(&self, timeout: Duration) -> Result<bool, BrowserError>;
    /// Visible fields of the current page, in document order
    async fn collect_fields(&self) -> Result<Vec<FormField>, BrowserError>;
    async fn fill(&self, field: &FormField, value: &str) -> Result<(), BrowserError>;
    /// Submit wins over Next/Continue/Review when both are present
    async fn find_action(&self) -> Result<Option<ModalAction>, BrowserError>;
    async fn click_action(&self, action: ModalAction) -> Result<(), BrowserError>;
    async fn wait_for_confirmation(&self, timeout: Duration) -> Result<Confirmation, BrowserError>;
    /// `false` when there was nothing to dismiss
    async fn dismiss(&self) -> Result<bool, BrowserError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The page did not offer what the walk needed
    Expected,
    /// A browser error escaped the modal adapter
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkFailure {
    pub kind: FailureKind,
    pub reason: String,
    pub step_reached: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    AwaitingModal,
    CollectingFields { step: usize },
    AwaitingAction { step: usize, action: ModalAction },
    Sent,
    Failed(WalkFailure),
}

impl WalkState {
    fn step_reached(&self) -> String {
        match self {
            Self::AwaitingModal => "modal".to_string(),
            Self::CollectingFields { step } => format!("step {}", step),
            Self::AwaitingAction {
                action: ModalAction::Submit,
                ..
            } => "submit".to_string(),
            Self::AwaitingAction { step, .. } => format!("step {}", step),
            Self::Sent => "submit".to_string(),
            Self::Failed(failure) => failure.step_reached.clone(),
        }
    }

    fn is_final(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    Applied,
    Failed(String),
    Error(String),
}

impl fmt::Display for WalkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

pub struct ApplicationWalk<'a> {
    modal: &'a dyn ApplyModal,
    resolver: FieldResolver<'a>,
    store: &'a JobStore,
    config: &'a WalkConfig,
}

impl<'a> ApplicationWalk<'a> {
    pub fn new(
        modal: &'a dyn ApplyModal,
        resolver: FieldResolver<'a>,
        store: &'a JobStore,
        config: &'a WalkConfig,
    ) -> Self {
        Self {
            modal,
            resolver,
            store,
            config,
        }
    }

    /// Drive the modal for `job`, which must not already be terminal.
    /// Records one attempt and one terminal upsert.
    pub async fn run(&self, job: &mut JobRecord) -> WalkOutcome {
        info!("Starting Easy Apply for {} at {}", job.title, job.company);

        let mut form_data = Map::new();
        let mut state = WalkState::AwaitingModal;

        while !state.is_final() {
            let step_reached = state.step_reached();
            state = match self.advance(state, job, &mut form_data).await {
                Ok(next) => next,
                Err(e) => {
                    error!("Browser error during application at {}: {}", step_reached, e);
                    WalkState::Failed(WalkFailure {
                        kind: FailureKind::Unexpected,
                        reason: e.to_string(),
                        step_reached,
                    })
                }
            };
            debug!("Walk state for {}: {:?}", job.job_id, state);
        }

        self.finish(job, state, form_data).await
    }

    async fn advance(
        &self,
        state: WalkState,
        job: &JobRecord,
        form_data: &mut Map<String, Value>,
    ) -> Result<WalkState, BrowserError> {
        match state {
            WalkState::AwaitingModal => {
                for probe in 1..=self.config.modal_probes {
                    if self
                        .modal
                        .wait_for_modal(self.config.modal_probe_timeout)
                        .await?
                    {
                        info!("Easy Apply modal opened");
                        return Ok(WalkState::CollectingFields { step: 1 });
                    }
                    debug!("Modal probe {}/{} failed", probe, self.config.modal_probes);
                }
                Ok(expected_failure(REASON_MODAL_NOT_FOUND, "modal"))
            }

            WalkState::CollectingFields { step } => {
                if step > self.config.max_steps {
                    warn!("Gave up after {} form steps", self.config.max_steps);
                    return Ok(expected_failure(
                        REASON_TOO_MANY_STEPS,
                        &format!("step {}", self.config.max_steps),
                    ));
                }

                self.fill_page(step, job, form_data).await?;

                match self.modal.find_action().await? {
                    Some(action) => Ok(WalkState::AwaitingAction { step, action }),
                    None => Ok(expected_failure(REASON_NO_ACTION, &format!("step {}", step))),
                }
            }

            WalkState::AwaitingAction {
                step,
                action: ModalAction::Next,
            } => {
                info!("Moving to step {}", step + 1);
                self.modal.click_action(ModalAction::Next).await?;
                Ok(WalkState::CollectingFields { step: step + 1 })
            }

            WalkState::AwaitingAction {
                action: ModalAction::Submit,
                ..
            } => {
                info!("Submitting application");
                self.modal.click_action(ModalAction::Submit).await?;
                match self
                    .modal
                    .wait_for_confirmation(self.config.confirmation_timeout)
                    .await?
                {
                    Confirmation::Confirmed => Ok(WalkState::Sent),
                    Confirmation::Rejected(message) => Ok(expected_failure(
                        &format!("submission rejected: {}", message),
                        "submit",
                    )),
                    Confirmation::TimedOut => {
                        Ok(expected_failure("no confirmation after submit", "submit"))
                    }
                }
            }

            state @ (WalkState::Sent | WalkState::Failed(_)) => Ok(state),
        }
    }

    async fn fill_page(
        &self,
        step: usize,
        job: &JobRecord,
        form_data: &mut Map<String, Value>,
    ) -> Result<(), BrowserError> {
        let fields = self.modal.collect_fields().await?;
        info!("Step {}: {} fields", step, fields.len());

        for field in &fields {
            let decision = self.resolver.resolve(field, job).await;

            let (value, is_filled, error_message) = match decision {
                FieldDecision::Keep => (field.current_value.clone(), true, None),
                FieldDecision::Skip => (None, false, None),
                FieldDecision::Fill { value, source } => {
                    match self.modal.fill(field, &value).await {
                        Ok(()) => {
                            info!("Filled field '{}' with '{}' ({:?})", field.label, value, source);
                            (Some(value), true, None)
                        }
                        Err(BrowserError::SessionClosed) => return Err(BrowserError::SessionClosed),
                        Err(e) => {
                            warn!("Error filling field '{}': {}", field.label, e);
                            (Some(value), false, Some(e.to_string()))
                        }
                    }
                }
            };

            if let Some(value) = value.as_ref().filter(|_| is_filled) {
                form_data.insert(field.label.clone(), Value::String(value.clone()));
            }

            self.store
                .append_form_field(&FormFieldRecord {
                    job_id: job.job_id.clone(),
                    field_type: field.field_type,
                    label: field.label.clone(),
                    value,
                    options: (!field.options.is_empty()).then(|| field.options.clone()),
                    is_required: field.required,
                    is_filled,
                    error_message,
                })
                .await;
        }
        Ok(())
    }

    async fn finish(
        &self,
        job: &mut JobRecord,
        state: WalkState,
        form_data: Map<String, Value>,
    ) -> WalkOutcome {
        let (status, attempt_status, reason, step_reached, outcome) = match state {
            WalkState::Sent => (
                JobStatus::Applied,
                AttemptStatus::Success,
                None,
                "submit".to_string(),
                WalkOutcome::Applied,
            ),
            WalkState::Failed(failure) => {
                let (status, attempt_status, outcome) = match failure.kind {
                    FailureKind::Expected => (
                        JobStatus::Failed,
                        AttemptStatus::Failed,
                        WalkOutcome::Failed(failure.reason.clone()),
                    ),
                    FailureKind::Unexpected => (
                        JobStatus::Error,
                        AttemptStatus::Error,
                        WalkOutcome::Error(failure.reason.clone()),
                    ),
                };
                (
                    status,
                    attempt_status,
                    Some(failure.reason),
                    failure.step_reached,
                    outcome,
                )
            }
            other => {
                let reason = format!("walk stopped in state {:?}", other);
                (
                    JobStatus::Error,
                    AttemptStatus::Error,
                    Some(reason.clone()),
                    other.step_reached(),
                    WalkOutcome::Error(reason),
                )
            }
        };

        if let Err(e) = job.transition(status, reason.clone()) {
            warn!("{}", e);
        }
        self.store.upsert_job(job).await;

        self.store
            .append_attempt(&ApplicationAttempt {
                job_id: job.job_id.clone(),
                attempt_time: Utc::now(),
                status: attempt_status,
                error_message: reason,
                step_reached: Some(step_reached),
                form_data: (!form_data.is_empty()).then_some(Value::Object(form_data)),
            })
            .await;

        match &outcome {
            WalkOutcome::Applied => {
                info!("Successfully applied to {} at {}", job.title, job.company);
                match self.modal.dismiss().await {
                    Ok(true) => debug!("Dismissed confirmation dialog"),
                    Ok(false) => debug!("No confirmation dialog to dismiss"),
                    Err(e) => debug!("Dismiss failed: {}", e),
                }
            }
            other => warn!("Application to {} ended: {}", job.title, other),
        }

        outcome
    }
}

fn expected_failure(reason: &str, step_reached: &str) -> WalkState {
    WalkState::Failed(WalkFailure {
        kind: FailureKind::Expected,
        reason: reason.to_string(),
        step_reached: step_reached.to_string(),
    })
}
