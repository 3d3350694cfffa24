// src/linkedin/discovery.rs
//! Job search and candidate enumeration on the jobs results page

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{
    locate_all, locate_first, text_within, wait_for_any, BrowserSession, ElementHandle,
};
use crate::linkedin::selectors::SelectorConfig;
use crate::types::job::{UNKNOWN_COMPANY, UNKNOWN_LOCATION, UNKNOWN_TITLE};
use crate::utils::job_id_from_url;

pub const JOBS_SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";
pub const JOBS_HOME_URL: &str = "https://www.linkedin.com/jobs/";

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Consecutive passes without a new card before giving up
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub scroll_delay: Duration,
    pub search_timeout: Duration,
    pub details_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            scroll_delay: Duration::from_secs(1),
            search_timeout: Duration::from_secs(10),
            details_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// A job card scraped from the results list
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub title: String,
    pub company: String,
    pub location: String,
    pub handle: ElementHandle,
}

pub struct JobDiscovery<'a> {
    session: &'a dyn BrowserSession,
    selectors: &'a SelectorConfig,
    config: &'a DiscoveryConfig,
}

impl<'a> JobDiscovery<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        selectors: &'a SelectorConfig,
        config: &'a DiscoveryConfig,
    ) -> Self {
        Self {
            session,
            selectors,
            config,
        }
    }

    pub fn search_url(keywords: &str, location: &str, easy_apply_only: bool) -> String {
        let mut url = match Url::parse(JOBS_SEARCH_URL) {
            Ok(url) => url,
            Err(_) => return JOBS_SEARCH_URL.to_string(),
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("keywords", keywords);
            query.append_pair("location", location);
            if easy_apply_only {
                query.append_pair("f_AL", "true");
            }
        }
        url.into()
    }

    /// Open the results page. `false` only means results could not be confirmed.
    pub async fn search(&self, keywords: &str, location: &str, easy_apply_only: bool) -> bool {
        let url = Self::search_url(keywords, location, easy_apply_only);
        info!("Searching for '{}' jobs in '{}'", keywords, location);

        if let Err(e) = self.session.navigate(&url).await {
            warn!("Failed to open job search: {}", e);
            return false;
        }

        let found = wait_for_any(
            self.session,
            &self.selectors.results_container,
            self.config.search_timeout,
            self.config.poll_interval,
        )
        .await
        .is_some();

        if found {
            info!("Search results loaded");
        } else {
            let current = self.session.current_url().await.unwrap_or_default();
            warn!("Could not verify search results. Current URL: {}", current);
        }
        found
    }

    /// Collect up to `max_count` job cards, scrolling to load more
    pub async fn list_candidates(&self, max_count: usize) -> Vec<JobSummary> {
        let mut jobs = Vec::new();
        let mut seen: HashSet<ElementHandle> = HashSet::new();
        let mut retries = 0;

        while jobs.len() < max_count && retries < self.config.max_retries {
            let cards = locate_all(self.session, &self.selectors.job_cards).await;
            debug!("Found {} job cards on page", cards.len());

            let mut added = 0;
            for card in &cards {
                if jobs.len() >= max_count {
                    break;
                }
                if !seen.insert(card.clone()) {
                    continue;
                }
                let summary = self.read_card(card).await;
                info!(
                    "Found job: {} at {} ({})",
                    summary.title, summary.company, summary.location
                );
                jobs.push(summary);
                added += 1;
            }

            if added == 0 {
                retries += 1;
                info!(
                    "No new jobs found, retry {}/{}",
                    retries, self.config.max_retries
                );
                tokio::time::sleep(self.config.retry_delay).await;
            }

            if jobs.len() < max_count {
                if let Some(last) = cards.last() {
                    if let Err(e) = self.session.scroll_into_view(last).await {
                        debug!("Scrolling to load more jobs failed: {}", e);
                    }
                    tokio::time::sleep(self.config.scroll_delay).await;
                }
            }
        }

        info!("Found {} jobs in total", jobs.len());
        jobs
    }

    async fn read_card(&self, card: &ElementHandle) -> JobSummary {
        let title = text_within(self.session, card, &self.selectors.card_title).await;
        let company = text_within(self.session, card, &self.selectors.card_company).await;
        let location = text_within(self.session, card, &self.selectors.card_location).await;

        JobSummary {
            title: title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            company: company.unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
            location: location.unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            handle: card.clone(),
        }
    }

    /// Click a card and wait for its details pane
    pub async fn open_job(&self, job: &JobSummary) -> bool {
        if let Err(e) = self.session.scroll_into_view(&job.handle).await {
            debug!("Could not scroll to job card: {}", e);
        }
        if let Err(e) = self.session.click(&job.handle).await {
            warn!("Error clicking job {}: {}", job.title, e);
            return false;
        }

        if locate_first(self.session, &self.selectors.page_not_found)
            .await
            .is_some()
        {
            info!("Page not found error detected");
            self.recover_from_not_found().await;
            return false;
        }

        let loaded = wait_for_any(
            self.session,
            &self.selectors.job_details_pane,
            self.config.details_timeout,
            self.config.poll_interval,
        )
        .await
        .is_some();

        if loaded {
            info!("Job details loaded");
        } else {
            warn!("Job details did not load for {}", job.title);
        }
        loaded
    }

    async fn recover_from_not_found(&self) {
        if let Some(feed) = locate_first(self.session, &self.selectors.go_to_feed).await {
            if self.session.click(&feed).await.is_ok() {
                info!("Clicked 'Go to your feed' button");
                let url = self.session.current_url().await.unwrap_or_default();
                if url.contains("/feed") || url.contains("/jobs") {
                    return;
                }
            }
        }

        info!("Redirecting to jobs page");
        if let Err(e) = self.session.navigate(JOBS_HOME_URL).await {
            warn!("Failed to navigate back to jobs page: {}", e);
        }
    }

    pub async fn current_job_id(&self) -> Option<String> {
        let url = match self.session.current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not read current URL: {}", e);
                return None;
            }
        };
        let id = job_id_from_url(&url);
        if id.is_none() {
            debug!("No job id in URL {}", url);
        }
        id
    }

    /// Markup of the open job's description, falling back to its text
    pub async fn job_description_html(&self) -> Option<String> {
        let element = locate_first(self.session, &self.selectors.job_description).await?;
        match self.session.attribute(&element, "innerHTML").await {
            Ok(Some(html)) if !html.trim().is_empty() => Some(html),
            _ => self
                .session
                .text(&element)
                .await
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }

    /// Job URL for the open job, normalised to the canonical view page
    pub async fn current_job_url(&self) -> Option<String> {
        self.current_job_id()
            .await
            .map(|id| format!("https://www.linkedin.com/jobs/view/{}/", id))
    }
}
