// src/types/profile.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_ANSWER: &str = "N/A";

/// Résumé data used to answer application forms.
///
/// Loaded from a TOML file such as:
///
/// ```toml
/// name = "Ada Lovelace"
/// email = "ada@example.com"
/// default_answer = "N/A"
///
/// [skills]
/// programming_languages = ["Rust", "Python"]
/// frameworks = ["Tokio"]
///
/// [[experience]]
/// title = "Engineer"
/// company = "Analytical Engines"
///
/// [answers]
/// "Mobile phone number" = "+1 555 0100"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub resume_path: Option<PathBuf>,
    #[serde(default)]
    pub default_answer: Option<String>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub experience: Vec<Experience>,
    /// Exact field label -> value
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub programming_languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Profile {
    /// Load the profile, falling back to an empty one when the file is absent
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Profile not found at {}, form answers will rely on the language model",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        let profile = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse profile: {}", path.display()))?;

        info!(
            "Loaded profile for {} with {} fixed answers",
            profile.name,
            profile.answers.len()
        );
        Ok(profile)
    }

    /// Startup check: a configured résumé must point at a real file
    pub fn validate(&self) -> Result<()> {
        match &self.resume_path {
            Some(path) if !path.is_file() => {
                anyhow::bail!("Resume file from profile not found: {}", path.display())
            }
            Some(_) => Ok(()),
            None => {
                warn!("Profile has no resume_path, required upload fields will be left empty");
                Ok(())
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid profile TOML")
    }

    /// Deterministic answer for a field label (exact match on the trimmed label)
    pub fn lookup(&self, label: &str) -> Option<&str> {
        self.answers.get(label.trim()).map(String::as_str)
    }

    pub fn default_answer(&self) -> &str {
        self.default_answer
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_ANSWER)
    }

    /// Short skill summary used in prompts: three languages and two frameworks
    pub fn key_skills(&self) -> String {
        self.skills
            .programming_languages
            .iter()
            .take(3)
            .chain(self.skills.frameworks.iter().take(2))
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn latest_experience(&self) -> Option<&Experience> {
        self.experience.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "Ada Lovelace"
email = "ada@example.com"

[skills]
programming_languages = ["Rust", "Python", "Go", "C"]
frameworks = ["Tokio", "Axum", "Rocket"]

[[experience]]
title = "Engineer"
company = "Analytical Engines"

[answers]
"Mobile phone number" = "+1 555 0100"
"#;

    #[test]
    fn test_parse_and_lookup() {
        let profile = Profile::from_toml(SAMPLE).unwrap();
        assert_eq!(profile.lookup("Mobile phone number"), Some("+1 555 0100"));
        assert_eq!(profile.lookup("  Mobile phone number "), Some("+1 555 0100"));
        assert_eq!(profile.lookup("mobile phone number"), None);
        assert_eq!(profile.key_skills(), "Rust, Python, Go, Tokio, Axum");
        assert_eq!(profile.latest_experience().unwrap().company, "Analytical Engines");
    }

    #[test]
    fn test_default_answer_falls_back() {
        let mut profile = Profile::default();
        assert_eq!(profile.default_answer(), "N/A");
        profile.default_answer = Some("  ".into());
        assert_eq!(profile.default_answer(), "N/A");
        profile.default_answer = Some("Yes".into());
        assert_eq!(profile.default_answer(), "Yes");
    }

    #[test]
    fn test_validate_checks_resume_file() {
        let mut profile = Profile::default();
        assert!(profile.validate().is_ok());

        profile.resume_path = Some(PathBuf::from("/nonexistent/resume.pdf"));
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/resume.pdf"));

        let resume = tempfile::NamedTempFile::new().unwrap();
        profile.resume_path = Some(resume.path().to_path_buf());
        assert!(profile.validate().is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_gives_default_profile() {
        let profile = Profile::load(Path::new("/nonexistent/resume.toml"))
            .await
            .unwrap();
        assert!(profile.answers.is_empty());
    }
}
