// src/core/config_manager.rs
//! Process-wide configuration, read once at startup and passed by reference

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::apply::WalkConfig;
use crate::environment::Environment;
use crate::linkedin::challenge::ChallengeConfig;
use crate::linkedin::discovery::DiscoveryConfig;
use crate::linkedin::login::LoginConfig;
use crate::linkedin::selectors::SelectorConfig;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: Environment,
    pub credentials: Credentials,
    pub search: SearchConfig,
    pub browser: BrowserConfig,
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub walk: WalkConfig,
    pub challenge: ChallengeConfig,
    pub discovery: DiscoveryConfig,
    pub login: LoginConfig,
    pub selectors: SelectorConfig,
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub keywords: String,
    pub location: String,
    pub max_jobs: usize,
    pub easy_apply_only: bool,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub prompt_char_limit: usize,
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub database_path: PathBuf,
    pub profile_path: PathBuf,
    pub selectors_path: Option<PathBuf>,
    pub log_dir: PathBuf,
}

impl ConfigManager {
    /// Load all configuration from the process environment
    pub fn load(environment: Environment) -> Result<Self> {
        info!("Loading configuration for environment: {}", environment);
        let config = Self::from_lookup(environment, |key| std::env::var(key).ok())?;
        info!(
            "Search: '{}' in '{}' (max {} jobs), WebDriver: {}",
            config.search.keywords,
            config.search.location,
            config.search.max_jobs,
            config.browser.webdriver_url
        );
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(environment: Environment, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let credentials = Credentials {
            email: get("LINKEDIN_EMAIL"),
            password: get("LINKEDIN_PASSWORD"),
        };

        let search = SearchConfig {
            keywords: get("JOB_SEARCH_KEYWORDS").unwrap_or_else(|| "Full Stack".to_string()),
            location: get("JOB_SEARCH_LOCATION")
                .unwrap_or_else(|| "San Francisco Bay Area".to_string()),
            max_jobs: parse_or(&get, "MAX_JOBS", 25)?,
            easy_apply_only: true,
        };

        let probe_timeout = Duration::from_secs(parse_or(&get, "BROWSER_TIMEOUT", 10)?);
        let browser = BrowserConfig {
            webdriver_url: get("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".to_string()),
            headless: parse_or(&get, "BROWSER_HEADLESS", environment.is_production())?,
        };

        let llm = LlmConfig {
            api_url: get("LLM_API_URL").unwrap_or_else(|| "https://api.aimlapi.com/v1".to_string()),
            api_key: get("LLM_API_KEY"),
            model: get("LLM_MODEL")
                .unwrap_or_else(|| "mistralai/Mistral-7B-Instruct-v0.2".to_string()),
            timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 60)?),
            prompt_char_limit: parse_or(&get, "LLM_PROMPT_CHAR_LIMIT", 1000)?,
        };

        let paths = PathsConfig {
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("linkedin_applications.db")),
            profile_path: get("PROFILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/resume.toml")),
            selectors_path: get("SELECTORS_PATH").map(PathBuf::from),
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".logs")),
        };

        let walk = WalkConfig {
            max_steps: parse_or(&get, "MAX_WALK_STEPS", WalkConfig::default().max_steps)?,
            modal_probe_timeout: probe_timeout,
            confirmation_timeout: probe_timeout,
            ..WalkConfig::default()
        };

        let challenge = ChallengeConfig {
            manual_timeout: Duration::from_secs(parse_or(&get, "CHALLENGE_TIMEOUT_SECS", 300)?),
            ..ChallengeConfig::default()
        };

        let discovery = DiscoveryConfig {
            search_timeout: probe_timeout,
            details_timeout: probe_timeout,
            ..DiscoveryConfig::default()
        };

        let selectors = SelectorConfig::load(paths.selectors_path.as_deref())?;

        Ok(Self {
            environment,
            credentials,
            search,
            browser,
            llm,
            paths,
            walk,
            challenge,
            discovery,
            login: LoginConfig::default(),
            selectors,
        })
    }

    /// Ensure directories for the database and logs exist
    pub async fn ensure_directories(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.paths.log_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create log directory: {}",
                    self.paths.log_dir.display()
                )
            })?;

        if let Some(db_parent) = self.paths.database_path.parent() {
            if !db_parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(db_parent).await.with_context(|| {
                    format!("Failed to create database directory: {}", db_parent.display())
                })?;
            }
        }

        Ok(())
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ConfigManager::from_lookup(Environment::Development, lookup(&[])).unwrap();
        assert_eq!(config.search.keywords, "Full Stack");
        assert_eq!(config.search.max_jobs, 25);
        assert!(config.search.easy_apply_only);
        assert!(!config.browser.headless);
        assert_eq!(config.walk.modal_probe_timeout, Duration::from_secs(10));
        assert_eq!(config.discovery.details_timeout, Duration::from_secs(10));
        assert_eq!(config.walk.max_steps, 10);
        assert_eq!(config.challenge.manual_timeout, Duration::from_secs(300));
        assert!(config.credentials.email.is_none());
        assert_eq!(
            config.paths.database_path,
            PathBuf::from("linkedin_applications.db")
        );
    }

    #[test]
    fn test_overrides_and_production_headless() {
        let config = ConfigManager::from_lookup(
            Environment::Production,
            lookup(&[
                ("LINKEDIN_EMAIL", "ada@example.com"),
                ("LINKEDIN_PASSWORD", "hunter2"),
                ("MAX_JOBS", "5"),
                ("BROWSER_TIMEOUT", "4"),
                ("MAX_WALK_STEPS", "6"),
                ("JOB_SEARCH_KEYWORDS", "Rust"),
            ]),
        )
        .unwrap();

        assert!(config.browser.headless);
        assert_eq!(config.search.max_jobs, 5);
        assert_eq!(config.search.keywords, "Rust");
        assert_eq!(config.walk.max_steps, 6);
        assert_eq!(config.walk.modal_probe_timeout, Duration::from_secs(4));
        assert_eq!(config.discovery.search_timeout, Duration::from_secs(4));
        assert_eq!(config.credentials.email.as_deref(), Some("ada@example.com"));
        assert!(!format!("{:?}", config.credentials).contains("hunter2"));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = ConfigManager::from_lookup(
            Environment::Development,
            lookup(&[("MAX_JOBS", "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("MAX_JOBS"));
    }
}
