// src/browser/mod.rs
//! Browser session abstraction and the lookup helpers built on top of it.
//!
//! Adapters never call `find_all` directly for page lookups. They go through
//! `locate_first` and friends, which walk an ordered `SelectorChain` and turn
//! a miss into `None` instead of an error.

pub mod webdriver;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

pub use webdriver::WebDriverSession;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("webdriver error {status}: {message}")]
    Protocol { status: u16, message: String },
    #[error("webdriver transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("browser session is closed")]
    SessionClosed,
}

/// Opaque reference to an element owned by the remote browser
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// One way of finding elements. Strings prefixed with `xpath:` are XPath,
/// everything else (optionally prefixed with `css:`) is a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(expr) = raw.strip_prefix("xpath:") {
            Self::XPath(expr.trim().to_string())
        } else if let Some(sel) = raw.strip_prefix("css:") {
            Self::Css(sel.trim().to_string())
        } else {
            Self::Css(raw.to_string())
        }
    }

    /// W3C location strategy name
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css selector",
            Self::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl From<String> for Locator {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{}", s),
            Self::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// Ordered fallback list of locators for one logical page element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorChain(pub Vec<Locator>);

impl SelectorChain {
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Locator>,
    {
        Self(locators.into_iter().map(Into::into).collect())
    }

    pub fn locators(&self) -> &[Locator] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SelectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Capabilities the LinkedIn adapters need from a live browser
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<String, BrowserError>;
    async fn refresh(&self) -> Result<(), BrowserError>;

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, BrowserError>;
    async fn find_within(
        &self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    async fn text(&self, element: &ElementHandle) -> Result<String, BrowserError>;
    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;
    /// Live form value, which can differ from the `value` attribute
    async fn value(&self, element: &ElementHandle) -> Result<String, BrowserError>;
    async fn tag_name(&self, element: &ElementHandle) -> Result<String, BrowserError>;
    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, BrowserError>;
    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, BrowserError>;
    async fn is_selected(&self, element: &ElementHandle) -> Result<bool, BrowserError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError>;
    async fn clear(&self, element: &ElementHandle) -> Result<(), BrowserError>;
    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError>;
    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// `None` switches back to the top-level document
    async fn switch_to_frame(&self, frame: Option<&ElementHandle>) -> Result<(), BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// First element matched by the first locator in the chain that matches anything
pub async fn locate_first(
    session: &dyn BrowserSession,
    chain: &SelectorChain,
) -> Option<ElementHandle> {
    locate_all(session, chain).await.into_iter().next()
}

/// All elements matched by the first locator in the chain that matches anything
pub async fn locate_all(session: &dyn BrowserSession, chain: &SelectorChain) -> Vec<ElementHandle> {
    for locator in chain.locators() {
        match session.find_all(locator).await {
            Ok(found) if !found.is_empty() => return found,
            Ok(_) => {}
            Err(e) => debug!("Lookup {} failed: {}", locator, e),
        }
    }
    debug!("No element matched {}", chain);
    Vec::new()
}

pub async fn locate_within(
    session: &dyn BrowserSession,
    parent: &ElementHandle,
    chain: &SelectorChain,
) -> Option<ElementHandle> {
    locate_all_within(session, parent, chain)
        .await
        .into_iter()
        .next()
}

pub async fn locate_all_within(
    session: &dyn BrowserSession,
    parent: &ElementHandle,
    chain: &SelectorChain,
) -> Vec<ElementHandle> {
    for locator in chain.locators() {
        match session.find_within(parent, locator).await {
            Ok(found) if !found.is_empty() => return found,
            Ok(_) => {}
            Err(e) => debug!("Lookup {} under {} failed: {}", locator, parent.id(), e),
        }
    }
    debug!("No element under {} matched {}", parent.id(), chain);
    Vec::new()
}

/// Trimmed, non-empty text of the first match under `parent`
pub async fn text_within(
    session: &dyn BrowserSession,
    parent: &ElementHandle,
    chain: &SelectorChain,
) -> Option<String> {
    let element = locate_within(session, parent, chain).await?;
    match session.text(&element).await {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            debug!("Reading text of {} failed: {}", chain, e);
            None
        }
    }
}

/// Poll the chain until something matches or the deadline passes
pub async fn wait_for_any(
    session: &dyn BrowserSession,
    chain: &SelectorChain,
    timeout: Duration,
    poll_interval: Duration,
) -> Option<ElementHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = locate_first(session, chain).await {
            return Some(found);
        }
        if Instant::now() >= deadline {
            debug!("Timed out after {:?} waiting for {}", timeout, chain);
            return None;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeBrowser, FakeElement};
    use super::*;

    #[test]
    fn test_locator_parsing() {
        assert_eq!(Locator::parse("#username"), Locator::css("#username"));
        assert_eq!(Locator::parse("css: .card"), Locator::css(".card"));
        assert_eq!(
            Locator::parse("xpath://button[.='Verify']"),
            Locator::xpath("//button[.='Verify']")
        );
        assert_eq!(Locator::xpath("//a").strategy(), "xpath");
        assert_eq!(Locator::css("a").to_string(), "css:a");
    }

    #[test]
    fn test_chain_deserializes_from_yaml_list() {
        let chain: SelectorChain =
            serde_yaml::from_str("- .primary\n- \"xpath://div[@role='dialog']\"\n").unwrap();
        assert_eq!(
            chain,
            SelectorChain(vec![
                Locator::css(".primary"),
                Locator::xpath("//div[@role='dialog']")
            ])
        );
    }

    #[tokio::test]
    async fn test_locate_first_falls_through_the_chain() {
        let browser = FakeBrowser::new();
        let second = browser.add(FakeElement::new("div").text("found"));
        browser.bind(Locator::css(".second"), vec![second.clone()]);

        let chain = SelectorChain::new([".first", ".second"]);
        assert_eq!(locate_first(&browser, &chain).await, Some(second));

        let missing = SelectorChain::new([".nope"]);
        assert_eq!(locate_first(&browser, &missing).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_any_gives_up_at_deadline() {
        let browser = FakeBrowser::new();
        let chain = SelectorChain::new([".never"]);
        let started = Instant::now();

        let found = wait_for_any(
            &browser,
            &chain,
            Duration::from_secs(3),
            Duration::from_millis(500),
        )
        .await;

        assert!(found.is_none());
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
