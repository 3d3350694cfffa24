// src/linkedin/selectors.rs
//! Page selector chains, built in and overridable from YAML.
//!
//! The site changes its markup often, so every logical element is an ordered
//! fallback list. A YAML file only needs the chains it wants to replace:
//!
//! ```yaml
//! job_cards:
//!   - div.job-card-container
//!   - "xpath://li[contains(@class, 'jobs-search-results__list-item')]"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::browser::SelectorChain;

fn chain(locators: &[&str]) -> SelectorChain {
    SelectorChain::new(locators.iter().copied())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    // Login
    pub username_input: SelectorChain,
    pub password_input: SelectorChain,
    pub login_submit: SelectorChain,
    pub logged_in_markers: SelectorChain,

    // Verification
    pub challenge_frames: SelectorChain,
    pub challenge_markers: SelectorChain,
    pub checkpoint_markers: SelectorChain,
    pub verify_button: SelectorChain,
    pub puzzle_images: SelectorChain,
    pub puzzle_instruction: SelectorChain,
    pub authenticated_page: SelectorChain,

    // Search and job cards
    pub results_container: SelectorChain,
    pub job_cards: SelectorChain,
    pub card_title: SelectorChain,
    pub card_company: SelectorChain,
    pub card_location: SelectorChain,
    pub job_details_pane: SelectorChain,
    pub job_description: SelectorChain,
    pub page_not_found: SelectorChain,
    pub go_to_feed: SelectorChain,

    // Easy Apply
    pub apply_button: SelectorChain,
    pub easy_apply_modal: SelectorChain,
    pub form_groupings: SelectorChain,
    pub field_label: SelectorChain,
    pub field_inputs: SelectorChain,
    pub select_options: SelectorChain,
    pub option_label: SelectorChain,
    pub submit_button: SelectorChain,
    pub next_button: SelectorChain,
    pub application_sent: SelectorChain,
    pub form_errors: SelectorChain,
    pub dismiss_button: SelectorChain,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            username_input: chain(&["#username", "input[name='session_key']"]),
            password_input: chain(&["#password", "input[name='session_password']"]),
            login_submit: chain(&["button[type='submit']", "xpath://button[contains(., 'Sign in')]"]),
            logged_in_markers: chain(&[
                "div.global-nav",
                "input.search-global-typeahead__input",
                ".feed-identity-module",
            ]),

            challenge_frames: chain(&["iframe"]),
            challenge_markers: chain(&[
                "xpath://h1[contains(text(), 'Verification')]",
                "xpath://div[contains(text(), 'Please solve this puzzle')]",
                "xpath://div[contains(text(), 'security check')]",
            ]),
            checkpoint_markers: chain(&[
                "xpath://div[contains(text(), 'security check')]",
                "xpath://div[contains(@class, 'challenge')]",
                "xpath://iframe[contains(@title, 'verification')]",
                "xpath://iframe[contains(@title, 'challenge')]",
            ]),
            verify_button: chain(&[
                "xpath://button[text()='Verify']",
                "xpath://button[contains(text(), 'Verify')]",
            ]),
            puzzle_images: chain(&["img"]),
            puzzle_instruction: chain(&[
                "xpath://*[contains(text(), 'Pick') or contains(text(), 'Select')]",
                "xpath://*[contains(text(), 'upright')]",
            ]),
            authenticated_page: chain(&[
                "xpath://div[contains(@class, 'jobs-search-box')]",
                "xpath://header[contains(@class, 'global-nav')]",
                "xpath://div[contains(@class, 'jobs-search-results')]",
                "xpath://div[contains(@class, 'jobs-search-two-pane')]",
                "div.global-nav",
            ]),

            results_container: chain(&[
                "ul.jobs-search__results-list",
                "div.jobs-search-results-list",
                "div.jobs-search__job-card-list",
                "li.jobs-search-results__list-item",
                "div.job-card-container",
                "xpath://div[contains(@class, 'jobs-search-results')]",
            ]),
            job_cards: chain(&[
                "div.job-card-container",
                "li.jobs-search-results__list-item",
                "li.scaffold-layout__list-item",
            ]),
            card_title: chain(&[
                "h3.job-card-title",
                ".job-card-list__title",
                ".artdeco-entity-lockup__title",
            ]),
            card_company: chain(&[
                "h4.job-card-company-name",
                ".job-card-container__primary-description",
                ".artdeco-entity-lockup__subtitle",
            ]),
            card_location: chain(&[
                "div.job-card-location",
                ".job-card-container__metadata-item",
                ".artdeco-entity-lockup__caption",
            ]),
            job_details_pane: chain(&[
                "div.jobs-details",
                "div.jobs-search__job-details",
                "div.jobs-search__job-details--container",
                "div[data-job-id]",
            ]),
            job_description: chain(&[
                "div.jobs-description",
                ".jobs-description-content__text",
                "#job-details",
            ]),
            page_not_found: chain(&[
                "xpath://h1[contains(text(), 'Page not found')]",
                "xpath://div[contains(@class, 'not-found')]",
                "xpath://div[contains(@class, 'error-page')]",
                "xpath://div[contains(text(), 'Uh oh, we can')]",
            ]),
            go_to_feed: chain(&["xpath://a[text()='Go to your feed']"]),

            apply_button: chain(&[
                "button.jobs-apply-button",
                "button[aria-label*='Easy Apply']",
                "button.jobs-apply-button--top-card",
                ".jobs-s-apply button",
                "xpath://*[contains(@class, 'jobs-apply-button')]",
            ]),
            easy_apply_modal: chain(&[
                "div[data-test-modal-id='easy-apply-modal']",
                ".jobs-easy-apply-modal",
                "div[role='dialog']",
            ]),
            form_groupings: chain(&[
                "div.jobs-easy-apply-form-section__grouping",
                "div.fb-dash-form-element",
                "fieldset",
            ]),
            field_label: chain(&[
                "label",
                "legend",
                "span.jobs-easy-apply-form-element__label",
            ]),
            field_inputs: chain(&["input:not([type='hidden']), select, textarea"]),
            select_options: chain(&["option"]),
            option_label: chain(&["xpath:following-sibling::label"]),
            submit_button: chain(&[
                "button[aria-label='Submit application']",
                "xpath://button[contains(., 'Submit application')]",
            ]),
            next_button: chain(&[
                "button[aria-label='Continue to next step']",
                "button[aria-label='Review your application']",
                "xpath://button[contains(., 'Next') or contains(., 'Review') or contains(., 'Continue')]",
            ]),
            application_sent: chain(&[
                "xpath://*[contains(text(), 'application was sent')]",
                "xpath://span[contains(text(), 'Application sent')]",
                "xpath://div[contains(text(), 'successfully submitted')]",
            ]),
            form_errors: chain(&[
                ".artdeco-inline-feedback--error",
                "xpath://*[contains(@class, 'error') and @role='alert']",
            ]),
            dismiss_button: chain(&["button[aria-label='Dismiss']"]),
        }
    }
}

impl SelectorConfig {
    /// Defaults, overridden by the YAML file at `path` when one is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            info!(
                "Selector overrides not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selector overrides: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse selector overrides: {}", path.display()))?;

        info!("Loaded selector overrides from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
