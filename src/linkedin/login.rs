// src/linkedin/login.rs
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::browser::{locate_first, wait_for_any, BrowserError, BrowserSession};
use crate::core::config_manager::Credentials;
use crate::linkedin::challenge::{is_checkpoint_url, ChallengeConfig, ChallengeHandler};
use crate::linkedin::selectors::SelectorConfig;

pub const LOGIN_URL: &str = "https://www.linkedin.com/login";

const RATE_LIMIT_MARKER: &str = "tooManyAttempts";
const LOGGED_IN_PATHS: &[&str] = &["/feed", "/jobs"];
const COUNTDOWN_STEP: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("LinkedIn credentials are missing (set LINKEDIN_EMAIL and LINKEDIN_PASSWORD)")]
    MissingCredentials,
    #[error("login failed after {attempts} attempts")]
    Exhausted { attempts: usize },
    #[error("browser failure during login: {0}")]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginConfig {
    pub max_attempts: usize,
    pub rate_limit_cooldown: Duration,
    /// How long to watch for the result of one submission
    pub outcome_timeout: Duration,
    pub poll_interval: Duration,
    pub field_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(60),
            outcome_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(3),
            field_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginOutcome {
    LoggedIn,
    RateLimited,
    Checkpoint,
    Pending,
}

/// Judged on the path only; query strings carry redirect targets
fn classify_url(url: &str) -> LoginOutcome {
    let Ok(parsed) = Url::parse(url) else {
        return LoginOutcome::Pending;
    };
    let path = parsed.path();

    if path.contains(RATE_LIMIT_MARKER) {
        LoginOutcome::RateLimited
    } else if LOGGED_IN_PATHS.iter().any(|p| path.starts_with(p)) {
        LoginOutcome::LoggedIn
    } else if is_checkpoint_url(path) {
        LoginOutcome::Checkpoint
    } else {
        LoginOutcome::Pending
    }
}

pub struct LoginFlow<'a> {
    session: &'a dyn BrowserSession,
    selectors: &'a SelectorConfig,
    credentials: &'a Credentials,
    config: &'a LoginConfig,
    challenge: &'a ChallengeConfig,
}

impl<'a> LoginFlow<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        selectors: &'a SelectorConfig,
        credentials: &'a Credentials,
        config: &'a LoginConfig,
        challenge: &'a ChallengeConfig,
    ) -> Self {
        Self {
            session,
            selectors,
            credentials,
            config,
            challenge,
        }
    }

    pub async fn login(&self) -> Result<(), AuthError> {
        let (Some(email), Some(password)) = (
            self.credentials.email.as_deref(),
            self.credentials.password.as_deref(),
        ) else {
            error!("Missing LinkedIn credentials in environment variables");
            return Err(AuthError::MissingCredentials);
        };

        info!("Starting LinkedIn login process...");

        for attempt in 1..=self.config.max_attempts {
            info!("Login attempt {}/{}", attempt, self.config.max_attempts);

            match self.attempt(email, password).await {
                Ok(LoginOutcome::LoggedIn) => {
                    info!("Successfully logged in to LinkedIn");
                    return Ok(());
                }
                Ok(LoginOutcome::RateLimited) => {
                    warn!(
                        "Hit rate limit, waiting {}s before retry",
                        self.config.rate_limit_cooldown.as_secs()
                    );
                    self.cooldown().await;
                    continue;
                }
                Ok(LoginOutcome::Checkpoint) => {
                    info!("Security check after login, handing over to verification");
                    let mut handler =
                        ChallengeHandler::new(self.session, self.selectors, self.challenge);
                    if handler.handle_challenge().await.resolved {
                        info!("Successfully logged in to LinkedIn after verification");
                        return Ok(());
                    }
                    warn!("Verification was not completed");
                }
                Ok(LoginOutcome::Pending) => {
                    warn!("Login attempt {} did not reach the feed", attempt);
                }
                Err(BrowserError::SessionClosed) => {
                    return Err(AuthError::Browser(BrowserError::SessionClosed));
                }
                Err(e) => {
                    error!("Error during login attempt {}: {}", attempt, e);
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(AuthError::Exhausted {
            attempts: self.config.max_attempts,
        })
    }

    async fn attempt(&self, email: &str, password: &str) -> Result<LoginOutcome, BrowserError> {
        let current = self.session.current_url().await?;
        if !current.contains("linkedin.com/login") {
            debug!("Not on login page, navigating to it");
            self.session.navigate(LOGIN_URL).await?;
        }

        let Some(username) = wait_for_any(
            self.session,
            &self.selectors.username_input,
            self.config.field_timeout,
            self.config.poll_interval,
        )
        .await
        else {
            let url = self.session.current_url().await?;
            warn!("Login form not found on {}", url);
            return Ok(classify_url(&url));
        };

        let password_field = locate_first(self.session, &self.selectors.password_input)
            .await
            .ok_or_else(|| BrowserError::NoSuchElement("password input".to_string()))?;
        let submit = locate_first(self.session, &self.selectors.login_submit)
            .await
            .ok_or_else(|| BrowserError::NoSuchElement("login button".to_string()))?;

        self.session.clear(&username).await?;
        self.session.clear(&password_field).await?;
        self.session.type_text(&username, email).await?;
        self.session.type_text(&password_field, password).await?;
        self.session.click(&submit).await?;

        self.await_outcome().await
    }

    async fn await_outcome(&self) -> Result<LoginOutcome, BrowserError> {
        let deadline = Instant::now() + self.config.outcome_timeout;
        loop {
            let url = self.session.current_url().await?;
            match classify_url(&url) {
                LoginOutcome::Pending => {}
                outcome => return Ok(outcome),
            }
            if locate_first(self.session, &self.selectors.logged_in_markers)
                .await
                .is_some()
            {
                return Ok(LoginOutcome::LoggedIn);
            }
            if Instant::now() >= deadline {
                debug!("No login outcome within {:?}, last URL {}", self.config.outcome_timeout, url);
                return Ok(LoginOutcome::Pending);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn cooldown(&self) {
        let mut remaining = self.config.rate_limit_cooldown;
        while !remaining.is_zero() {
            info!("Rate limit cooldown: {} seconds remaining...", remaining.as_secs());
            let step = remaining.min(COUNTDOWN_STEP);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        if let Err(e) = self.session.navigate(LOGIN_URL).await {
            warn!("Failed to return to login page: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeElement};
    use crate::browser::{ElementHandle, Locator, SelectorChain};

    fn first(chain: &SelectorChain) -> Locator {
        chain.locators()[0].clone()
    }

    fn credentials() -> Credentials {
        Credentials {
            email: Some("ada@example.com".into()),
            password: Some("hunter2".into()),
        }
    }

    /// Login form whose submit button runs `on_submit`
    fn login_page(
        selectors: &SelectorConfig,
    ) -> (FakeBrowser, ElementHandle, ElementHandle, ElementHandle) {
        let browser = FakeBrowser::new();
        browser.set_url("about:blank");
        let username = browser.add(FakeElement::new("input"));
        let password = browser.add(FakeElement::new("input").attr("type", "password"));
        let submit = browser.add(FakeElement::new("button").text("Sign in"));
        browser.bind(first(&selectors.username_input), vec![username.clone()]);
        browser.bind(first(&selectors.password_input), vec![password.clone()]);
        browser.bind(first(&selectors.login_submit), vec![submit.clone()]);
        (browser, username, password, submit)
    }

    #[test]
    fn test_classify_url() {
        assert_eq!(
            classify_url("https://www.linkedin.com/checkpoint/challengesV2/inapp/tooManyAttempts"),
            LoginOutcome::RateLimited
        );
        assert_eq!(classify_url("https://www.linkedin.com/feed/"), LoginOutcome::LoggedIn);
        assert_eq!(
            classify_url("https://www.linkedin.com/checkpoint/lg/login-submit"),
            LoginOutcome::Checkpoint
        );
        assert_eq!(classify_url(LOGIN_URL), LoginOutcome::Pending);
        assert_eq!(
            classify_url("https://www.linkedin.com/jobs/search/?keywords=Rust"),
            LoginOutcome::LoggedIn
        );
        assert_eq!(
            classify_url("https://www.linkedin.com/uas/login?session_redirect=https%3A%2F%2Fwww.linkedin.com%2Ffeed%2F"),
            LoginOutcome::Pending
        );
        assert_eq!(classify_url("not a url"), LoginOutcome::Pending);
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let selectors = SelectorConfig::default();
        let browser = FakeBrowser::new();
        let creds = Credentials {
            email: Some("ada@example.com".into()),
            password: None,
        };
        let config = LoginConfig::default();
        let challenge = ChallengeConfig::default();

        let flow = LoginFlow::new(&browser, &selectors, &creds, &config, &challenge);
        assert!(matches!(flow.login().await, Err(AuthError::MissingCredentials)));
        assert!(browser.navigations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_login_types_credentials() {
        let selectors = SelectorConfig::default();
        let (browser, username, password, submit) = login_page(&selectors);
        browser.on_click(&submit, |state| {
            state.url = "https://www.linkedin.com/feed/".into();
        });
        let creds = credentials();
        let config = LoginConfig::default();
        let challenge = ChallengeConfig::default();

        let flow = LoginFlow::new(&browser, &selectors, &creds, &config, &challenge);
        flow.login().await.unwrap();

        assert_eq!(browser.navigations(), vec![LOGIN_URL.to_string()]);
        assert_eq!(browser.value_of(&username), "ada@example.com");
        assert_eq!(browser.value_of(&password), "hunter2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cools_down_then_retries() {
        let selectors = SelectorConfig::default();
        let (browser, _, _, submit) = login_page(&selectors);
        let mut submissions = 0;
        browser.on_click(&submit, move |state| {
            submissions += 1;
            state.url = if submissions == 1 {
                "https://www.linkedin.com/checkpoint/challengesV2/inapp/tooManyAttempts".into()
            } else {
                "https://www.linkedin.com/feed/".into()
            };
        });
        let creds = credentials();
        let config = LoginConfig::default();
        let challenge = ChallengeConfig::default();

        let started = Instant::now();
        let flow = LoginFlow::new(&browser, &selectors, &creds, &config, &challenge);
        flow.login().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(browser.clicks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_attempts() {
        let selectors = SelectorConfig::default();
        let (browser, _, _, submit) = login_page(&selectors);
        let creds = credentials();
        let config = LoginConfig::default();
        let challenge = ChallengeConfig::default();

        let flow = LoginFlow::new(&browser, &selectors, &creds, &config, &challenge);
        match flow.login().await {
            Err(AuthError::Exhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(
            browser.clicks().iter().filter(|c| **c == submit).count(),
            3
        );
    }
}
