// src/apply/fields.rs
//! Value resolution for a single form field

use tracing::{debug, info, warn};

use crate::apply::walk::FormField;
use crate::linkedin::assistant::{FieldAnswer, JobAssistant};
use crate::types::{FieldType, JobRecord, Profile};
use crate::utils::normalize_label;

pub const CHECKED: &str = "checked";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Profile,
    CoverLetter,
    Assistant,
    RequiredDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDecision {
    /// Already has a value; never overwritten
    Keep,
    Fill { value: String, source: AnswerSource },
    Skip,
}

/// Option text to select: exact match on `candidate`, otherwise the first option
pub fn choose_option(options: &[String], candidate: &str) -> Option<String> {
    options
        .iter()
        .find(|option| option.as_str() == candidate)
        .or_else(|| options.first())
        .cloned()
}

pub struct FieldResolver<'a> {
    profile: &'a Profile,
    assistant: &'a JobAssistant,
}

impl<'a> FieldResolver<'a> {
    pub fn new(profile: &'a Profile, assistant: &'a JobAssistant) -> Self {
        Self { profile, assistant }
    }

    pub async fn resolve(&self, field: &FormField, job: &JobRecord) -> FieldDecision {
        if field
            .current_value
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
        {
            debug!("Keeping prefilled field '{}'", field.label);
            return FieldDecision::Keep;
        }

        let (candidate, source) = match self.candidate(field, job).await {
            Some((value, source)) => (Some(value), source),
            None => (None, AnswerSource::Assistant),
        };

        let decision = match candidate.and_then(|value| self.shape(field, &value)) {
            Some(value) => FieldDecision::Fill { value, source },
            None if field.required => match self.required_default(field) {
                Some(value) => {
                    info!(
                        "Required field '{}' had no answer, using default '{}'",
                        field.label, value
                    );
                    FieldDecision::Fill {
                        value,
                        source: AnswerSource::RequiredDefault,
                    }
                }
                None => {
                    match field.field_type {
                        FieldType::File => warn!(
                            "Required upload '{}' left empty: profile has no resume_path",
                            field.label
                        ),
                        _ => warn!(
                            "Required field '{}' left empty: no options to choose from",
                            field.label
                        ),
                    }
                    FieldDecision::Skip
                }
            },
            None => FieldDecision::Skip,
        };

        debug!("Field '{}' ({}): {:?}", field.label, field.field_type, decision);
        decision
    }

    async fn candidate(&self, field: &FormField, job: &JobRecord) -> Option<(String, AnswerSource)> {
        if let Some(answer) = self.profile.lookup(&field.label) {
            return Some((answer.to_string(), AnswerSource::Profile));
        }

        if field.field_type == FieldType::Textarea
            && normalize_label(&field.label).contains("cover letter")
        {
            return self
                .assistant
                .generate_cover_letter(job)
                .await
                .map(|letter| (letter, AnswerSource::CoverLetter));
        }

        if field.field_type == FieldType::File {
            return None;
        }

        let options = (!field.options.is_empty()).then_some(field.options.as_slice());
        let answer = match field.field_type {
            FieldType::Radio | FieldType::Checkbox => {
                self.assistant
                    .answer_screening_question(&field.label, options)
                    .await
            }
            _ => {
                self.assistant
                    .suggest_field_value(&field.label, field.field_type, options)
                    .await
            }
        };

        match answer {
            FieldAnswer::Value(value) => Some((value, AnswerSource::Assistant)),
            FieldAnswer::Skip => None,
        }
    }

    /// Fit a raw answer to what the field can hold
    fn shape(&self, field: &FormField, value: &str) -> Option<String> {
        match field.field_type {
            FieldType::Select | FieldType::Radio => choose_option(&field.options, value),
            FieldType::Checkbox => is_affirmative(value).then(|| CHECKED.to_string()),
            _ => {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        }
    }

    fn required_default(&self, field: &FormField) -> Option<String> {
        match field.field_type {
            FieldType::Select | FieldType::Radio => field.options.first().cloned(),
            FieldType::Checkbox => Some(CHECKED.to_string()),
            FieldType::File => self
                .profile
                .resume_path
                .as_ref()
                .map(|p| p.display().to_string()),
            FieldType::Text | FieldType::Textarea | FieldType::Other => {
                Some(self.profile.default_answer().to_string())
            }
        }
    }
}

fn is_affirmative(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "checked" | "agree" | "i agree" | "accept"
    )
}
