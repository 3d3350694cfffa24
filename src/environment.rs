// src/environment.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Deployment environment, selected with `AUTOAPPLY_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn get_environment() -> Self {
        let raw = std::env::var("AUTOAPPLY_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "development".to_string());
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" => Self::Staging,
            _ => Self::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn dotenv_file(&self) -> &'static str {
        match self {
            Self::Development => ".env.local",
            Self::Staging => ".env.staging",
            Self::Production => ".env.production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        if self.is_production() {
            "info"
        } else {
            "debug"
        }
    }

    /// Load the environment's dotenv file into the process environment.
    ///
    /// Runs before logging is installed, so the caller reports the result.
    /// Variables already set in the process win over the file.
    pub fn load_dotenv(&self) -> bool {
        let file = self.dotenv_file();
        if !Path::new(file).exists() {
            return false;
        }

        dotenvy::from_filename(file).is_ok()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
