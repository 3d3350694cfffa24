// src/linkedin/assistant.rs
//! Prompts and reply parsing for every decision delegated to the language model.
//!
//! The model is free-form, so each reply goes through a strict parser. A reply
//! that does not fit the expected shape is treated like a failed call and the
//! caller gets the documented fallback.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::llm_client::{CompletionRequest, GatewayError, LanguageModel};
use crate::types::{FieldType, JobRecord, Profile};
use crate::utils::{clean_text, html_to_text, truncate_chars};

pub const FIT_FALLBACK_REASON: &str = "AI analysis failed, proceeding anyway";

const SKIP_SENTINEL: &str = "SKIP";
const COVER_LETTER_SYSTEM_PROMPT: &str =
    "You are a professional cover letter writer. Be concise and professional.";
const COVER_LETTER_TEMPERATURE: f32 = 0.7;
const COVER_LETTER_MAX_TOKENS: u32 = 500;
const VERDICT_DELIMITERS: &[char] = &[',', ':', '-', '.', ';'];

/// Answer for one form field or screening question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAnswer {
    Value(String),
    Skip,
}

pub struct JobAssistant {
    model: Arc<dyn LanguageModel>,
    profile: Arc<Profile>,
    prompt_char_limit: usize,
}

impl JobAssistant {
    pub fn new(model: Arc<dyn LanguageModel>, profile: Arc<Profile>, prompt_char_limit: usize) -> Self {
        Self {
            model,
            profile,
            prompt_char_limit,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    async fn ask(&self, prompt: String) -> Result<String, GatewayError> {
        self.send(CompletionRequest::new(prompt)).await
    }

    async fn send(&self, mut request: CompletionRequest) -> Result<String, GatewayError> {
        request.prompt = truncate_chars(&request.prompt, self.prompt_char_limit);
        debug!(
            "Prompt ({} chars): {}",
            request.prompt.chars().count(),
            request.prompt
        );
        self.model.complete(request).await
    }

    /// Description and requirements summarised from the posting's HTML
    pub async fn extract_job_details(&self, html: &str) -> Option<(String, String)> {
        let text = html_to_text(html);
        if text.is_empty() {
            debug!("Job description is empty, nothing to extract");
            return None;
        }

        let prompt = format!(
            "Extract key points from this job posting. Reply with exactly two lines: \
             'Description: <summary>' and 'Requirements: <key requirements>'.\n\n{}",
            text
        );

        match self.ask(prompt).await.and_then(|reply| parse_job_details(&reply)) {
            Ok(details) => Some(details),
            Err(e) => {
                warn!("Failed to extract job details: {}", e);
                None
            }
        }
    }

    /// Whether the candidate should apply, with the model's reason.
    /// Any failure proceeds with the application.
    pub async fn analyze_job(
        &self,
        title: &str,
        company: &str,
        description: Option<&str>,
        requirements: Option<&str>,
    ) -> (bool, String) {
        let mut prompt = format!(
            "Job: {} at {}. Candidate skills: {}.",
            title,
            company,
            self.profile.key_skills()
        );
        if let Some(requirements) = requirements {
            prompt.push_str(&format!(" Requirements: {}.", requirements));
        }
        if let Some(description) = description {
            prompt.push_str(&format!(" Description: {}.", description));
        }
        prompt.push_str(" Is this a match? Answer 'yes' or 'no', then a short reason.");

        match self.ask(prompt).await.and_then(|reply| parse_fit_verdict(&reply)) {
            Ok((should_apply, reason)) => {
                info!(
                    "Fit analysis for {} at {}: {} ({})",
                    title,
                    company,
                    if should_apply { "apply" } else { "skip" },
                    reason
                );
                (should_apply, reason)
            }
            Err(e) => {
                warn!("Could not analyze job with AI: {}", e);
                (true, FIT_FALLBACK_REASON.to_string())
            }
        }
    }

    pub async fn suggest_field_value(
        &self,
        label: &str,
        field_type: FieldType,
        options: Option<&[String]>,
    ) -> FieldAnswer {
        let mut prompt = format!(
            "Fill a job application form field for {}. Skills: {}.",
            self.candidate_name(),
            self.profile.key_skills()
        );
        if let Some(phone) = &self.profile.phone {
            prompt.push_str(&format!(" Phone: {}.", phone));
        }
        if !self.profile.email.is_empty() {
            prompt.push_str(&format!(" Email: {}.", self.profile.email));
        }
        prompt.push_str(&format!(" Field: '{}' ({}).", clean_text(label), field_type));
        push_options(&mut prompt, options);
        prompt.push_str(" Reply with the value only, or SKIP if it cannot be answered.");

        self.answer(prompt, label).await
    }

    pub async fn answer_screening_question(
        &self,
        question: &str,
        options: Option<&[String]>,
    ) -> FieldAnswer {
        let mut prompt = format!(
            "Answer this job screening question for {} based on the resume. Skills: {}.",
            self.candidate_name(),
            self.profile.key_skills()
        );
        if let Some(experience) = self.profile.latest_experience() {
            prompt.push_str(&format!(
                " Current role: {} at {}.",
                experience.title, experience.company
            ));
        }
        prompt.push_str(&format!(" Q: {}", clean_text(question)));
        push_options(&mut prompt, options);
        prompt.push_str(" Reply with the answer only, or SKIP.");

        self.answer(prompt, question).await
    }

    pub async fn generate_cover_letter(&self, job: &JobRecord) -> Option<String> {
        let experience = self
            .profile
            .latest_experience()
            .map(|e| format!("{} at {}", e.title, e.company))
            .unwrap_or_default();

        let prompt = format!(
            "Write a brief cover letter for {} applying to {} at {}. My experience: {}. Skills: {}.",
            self.candidate_name(),
            job.title,
            job.company,
            experience,
            self.profile.key_skills()
        );

        let request = CompletionRequest::new(prompt)
            .with_system(COVER_LETTER_SYSTEM_PROMPT)
            .with_temperature(COVER_LETTER_TEMPERATURE)
            .with_max_tokens(COVER_LETTER_MAX_TOKENS);

        match self.send(request).await {
            Ok(letter) => Some(letter),
            Err(e) => {
                warn!("Failed to generate cover letter: {}", e);
                None
            }
        }
    }

    async fn answer(&self, prompt: String, label: &str) -> FieldAnswer {
        match self.ask(prompt).await {
            Ok(reply) => parse_field_answer(&reply),
            Err(e) => {
                warn!("No suggestion for '{}': {}", clean_text(label), e);
                FieldAnswer::Skip
            }
        }
    }

    fn candidate_name(&self) -> &str {
        if self.profile.name.is_empty() {
            "the candidate"
        } else {
            &self.profile.name
        }
    }
}

fn push_options(prompt: &mut String, options: Option<&[String]>) {
    if let Some(options) = options.filter(|o| !o.is_empty()) {
        prompt.push_str(&format!(" Options: {}.", options.join(" | ")));
    }
}

/// Two non-empty lines: labelled `Description:`/`Requirements:`, or the first two
pub fn parse_job_details(reply: &str) -> Result<(String, String), GatewayError> {
    let lines: Vec<&str> = reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let labelled = |prefix: &str| {
        lines.iter().find_map(|line| {
            strip_prefix_ci(line, prefix)
                .map(|rest| rest.trim().to_string())
                .filter(|rest| !rest.is_empty())
        })
    };

    if let (Some(description), Some(requirements)) =
        (labelled("description:"), labelled("requirements:"))
    {
        return Ok((description, requirements));
    }

    match lines.as_slice() {
        [first, second, ..] => Ok((first.to_string(), second.to_string())),
        _ => Err(GatewayError::Malformed(format!(
            "expected two lines of job details, got: {}",
            truncate_chars(reply, 80)
        ))),
    }
}

/// `yes`/`no` prefix, then an optional delimiter and reason
pub fn parse_fit_verdict(reply: &str) -> Result<(bool, String), GatewayError> {
    let trimmed = reply.trim();
    let malformed = || {
        GatewayError::Malformed(format!(
            "expected a yes/no verdict, got: {}",
            truncate_chars(trimmed, 80)
        ))
    };

    let (verdict, rest) = if let Some(rest) = strip_prefix_ci(trimmed, "yes") {
        (true, rest)
    } else if let Some(rest) = strip_prefix_ci(trimmed, "no") {
        (false, rest)
    } else {
        return Err(malformed());
    };

    let reason = match rest.chars().next() {
        None => "",
        Some(c) if VERDICT_DELIMITERS.contains(&c) => &rest[c.len_utf8()..],
        Some(c) if c.is_whitespace() => rest,
        Some(_) => return Err(malformed()),
    };

    let reason = reason.trim();
    let reason = if reason.is_empty() { trimmed } else { reason };
    Ok((verdict, reason.to_string()))
}

pub fn parse_field_answer(reply: &str) -> FieldAnswer {
    let value = reply.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(SKIP_SENTINEL) {
        FieldAnswer::Skip
    } else {
        FieldAnswer::Value(value.to_string())
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm_client::testing::ScriptedModel;

    fn build(model: ScriptedModel) -> (JobAssistant, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let profile = Profile::from_toml(
            r#"
name = "Ada Lovelace"
email = "ada@example.com"
[skills]
programming_languages = ["Rust", "Python"]
frameworks = ["Tokio"]
[[experience]]
title = "Engineer"
company = "Analytical Engines"
"#,
        )
        .unwrap();
        (
            JobAssistant::new(model.clone(), Arc::new(profile), 1000),
            model,
        )
    }

    #[test]
    fn test_parse_fit_verdict() {
        assert_eq!(
            parse_fit_verdict("Yes, strong Rust overlap").unwrap(),
            (true, "strong Rust overlap".to_string())
        );
        assert_eq!(
            parse_fit_verdict("no - needs Java").unwrap(),
            (false, "needs Java".to_string())
        );
        assert_eq!(
            parse_fit_verdict("NO: senior only").unwrap(),
            (false, "senior only".to_string())
        );
        assert_eq!(parse_fit_verdict("yes").unwrap(), (true, "yes".to_string()));
        assert!(parse_fit_verdict("Yesterday I thought so").is_err());
        assert!(parse_fit_verdict("Maybe, hard to say").is_err());
        assert!(parse_fit_verdict("").is_err());
    }

    #[test]
    fn test_parse_job_details() {
        assert_eq!(
            parse_job_details("Requirements: 5y Rust\nDescription: Backend role").unwrap(),
            ("Backend role".to_string(), "5y Rust".to_string())
        );
        assert_eq!(
            parse_job_details("\nBuild APIs\n\nKnow SQL\nextra").unwrap(),
            ("Build APIs".to_string(), "Know SQL".to_string())
        );
        assert!(parse_job_details("only one line").is_err());
    }

    #[test]
    fn test_parse_field_answer() {
        assert_eq!(parse_field_answer(" skip \n"), FieldAnswer::Skip);
        assert_eq!(parse_field_answer(""), FieldAnswer::Skip);
        assert_eq!(
            parse_field_answer(" 5 years "),
            FieldAnswer::Value("5 years".to_string())
        );
    }

    #[tokio::test]
    async fn test_analyze_job_falls_back_on_gateway_failure() {
        let (assistant, _) = build(ScriptedModel::new().fail(GatewayError::EmptyResponse));
        let verdict = assistant.analyze_job("Dev", "Acme", None, None).await;
        assert_eq!(verdict, (true, FIT_FALLBACK_REASON.to_string()));

        let (assistant, _) = build(ScriptedModel::new().reply("Perhaps"));
        let verdict = assistant.analyze_job("Dev", "Acme", None, None).await;
        assert_eq!(verdict, (true, FIT_FALLBACK_REASON.to_string()));
    }

    #[tokio::test]
    async fn test_analyze_job_uses_key_skills() {
        let (assistant, model) = build(ScriptedModel::new().reply("No, requires COBOL"));
        let verdict = assistant
            .analyze_job("Dev", "Acme", Some("Legacy work"), Some("COBOL"))
            .await;
        assert_eq!(verdict, (false, "requires COBOL".to_string()));
        assert!(model.prompts()[0].contains("Rust, Python, Tokio"));
    }

    #[tokio::test]
    async fn test_prompts_are_clipped() {
        let model = Arc::new(ScriptedModel::new().reply("Description: a\nRequirements: b"));
        let assistant = JobAssistant::new(model.clone(), Arc::new(Profile::default()), 50);
        let html = format!("<p>{}</p>", "word ".repeat(200));

        let details = assistant.extract_job_details(&html).await;
        assert_eq!(details, Some(("a".to_string(), "b".to_string())));
        assert_eq!(model.prompts()[0].chars().count(), 50);
    }

    #[tokio::test]
    async fn test_field_suggestion_skip_and_failure() {
        let (assistant, _) = build(
            ScriptedModel::new()
                .reply("SKIP")
                .fail(GatewayError::Api {
                    status: 500,
                    message: "boom".into(),
                })
                .reply("Yes"),
        );

        assert_eq!(
            assistant
                .suggest_field_value("Salary", FieldType::Text, None)
                .await,
            FieldAnswer::Skip
        );
        assert_eq!(
            assistant
                .answer_screening_question("Relocate?", None)
                .await,
            FieldAnswer::Skip
        );
        let options = vec!["Yes".to_string(), "No".to_string()];
        assert_eq!(
            assistant
                .answer_screening_question("Authorized to work?", Some(&options))
                .await,
            FieldAnswer::Value("Yes".to_string())
        );
    }

    #[tokio::test]
    async fn test_cover_letter_mentions_latest_role() {
        let (assistant, model) = build(ScriptedModel::new().reply("Dear team, ..."));
        let job = JobRecord::pending("1", "Rust Dev", "Acme", "Remote");
        assert_eq!(
            assistant.generate_cover_letter(&job).await.as_deref(),
            Some("Dear team, ...")
        );
        assert!(model.prompts()[0].contains("Engineer at Analytical Engines"));

        let request = &model.requests()[0];
        assert_eq!(request.system_prompt.as_deref(), Some(COVER_LETTER_SYSTEM_PROMPT));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(500));
    }
}
