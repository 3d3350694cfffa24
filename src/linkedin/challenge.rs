// src/linkedin/challenge.rs
//! Security verification handling: detection, automatic attempts, then a
//! bounded wait for a human to finish the check in the browser window.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::{locate_all, locate_first, BrowserSession, ElementHandle};
use crate::linkedin::orientation::{orientation_from_data_url, Orientation};
use crate::linkedin::selectors::SelectorConfig;

const CHECKPOINT_URL_MARKERS: &[&str] = &["checkpoint", "challenge"];

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeConfig {
    /// Upper bound on waiting for a human to solve the check
    pub manual_timeout: Duration,
    pub poll_interval: Duration,
    /// How often to look for a normal page after clicking Verify
    pub ack_probes: usize,
    pub ack_probe_interval: Duration,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            manual_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
            ack_probes: 2,
            ack_probe_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Clear,
    ChallengeDetected,
    AwaitingResolution,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeResolution {
    pub resolved: bool,
}

pub struct ChallengeHandler<'a> {
    session: &'a dyn BrowserSession,
    selectors: &'a SelectorConfig,
    config: &'a ChallengeConfig,
    state: ChallengeState,
}

impl<'a> ChallengeHandler<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        selectors: &'a SelectorConfig,
        config: &'a ChallengeConfig,
    ) -> Self {
        Self {
            session,
            selectors,
            config,
            state: ChallengeState::Clear,
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// Resolve any verification on the current page. Always returns with the
    /// top-level document selected.
    pub async fn handle_challenge(&mut self) -> ChallengeResolution {
        self.state = ChallengeState::Clear;
        let resolved = self.run().await;

        if let Err(e) = self.session.switch_to_frame(None).await {
            warn!("Failed to switch back to the main document: {}", e);
        }

        // The page behind a solved check is often stale until reloaded
        if self.state == ChallengeState::Resolved {
            info!("Reloading page after verification");
            if let Err(e) = self.session.refresh().await {
                warn!("Failed to reload page after verification: {}", e);
            }
        }

        ChallengeResolution { resolved }
    }

    async fn run(&mut self) -> bool {
        let frames = locate_all(self.session, &self.selectors.challenge_frames).await;
        debug!("Scanning {} frames for verification", frames.len());

        for frame in &frames {
            if !self.frame_has_challenge(frame).await {
                continue;
            }

            info!("Found verification frame");
            self.state = ChallengeState::ChallengeDetected;

            if self.try_automatic(frame).await {
                info!("Verification completed automatically");
                self.state = ChallengeState::Resolved;
                return true;
            }
            break;
        }

        if self.state == ChallengeState::Clear && self.top_level_checkpoint().await {
            info!("Checkpoint page detected");
            self.state = ChallengeState::ChallengeDetected;
        }

        if self.state == ChallengeState::Clear {
            return true;
        }

        self.wait_for_manual_resolution().await
    }

    /// Leaves the frame selected when it holds a challenge, the top-level
    /// document otherwise
    async fn frame_has_challenge(&self, frame: &ElementHandle) -> bool {
        if let Err(e) = self.session.switch_to_frame(Some(frame)).await {
            debug!("Could not enter frame {}: {}", frame.id(), e);
            return false;
        }

        if locate_first(self.session, &self.selectors.challenge_markers)
            .await
            .is_some()
        {
            return true;
        }

        debug!("Frame {} is not a verification frame", frame.id());
        if let Err(e) = self.session.switch_to_frame(None).await {
            warn!("Failed to leave frame {}: {}", frame.id(), e);
        }
        false
    }

    /// Expects `frame` to be selected; returns with the top-level document selected
    async fn try_automatic(&mut self, frame: &ElementHandle) -> bool {
        let Some(verify) = locate_first(self.session, &self.selectors.verify_button).await else {
            info!("No verify button in frame {}", frame.id());
            return false;
        };

        let images = locate_all(self.session, &self.selectors.puzzle_images).await;
        if images.len() > 1 {
            info!("Found {} puzzle images, attempting to solve", images.len());
            self.select_puzzle_images(&images).await;
        } else {
            info!("Simple verification, clicking verify button");
        }

        if let Err(e) = self.session.click(&verify).await {
            warn!("Failed to click verify button: {}", e);
            return false;
        }

        if let Err(e) = self.session.switch_to_frame(None).await {
            warn!("Failed to switch back to the main document: {}", e);
            return false;
        }

        for probe in 1..=self.config.ack_probes {
            tokio::time::sleep(self.config.ack_probe_interval).await;
            if self.challenge_gone().await {
                return true;
            }
            debug!(
                "Verification still present after probe {}/{}",
                probe, self.config.ack_probes
            );
        }
        false
    }

    async fn select_puzzle_images(&self, images: &[ElementHandle]) {
        let instruction = match locate_first(self.session, &self.selectors.puzzle_instruction).await
        {
            Some(element) => self.session.text(&element).await.unwrap_or_default(),
            None => String::new(),
        };
        info!("Puzzle instruction: {}", instruction);

        let Some(wanted) = wanted_orientation(&instruction) else {
            warn!("Could not understand puzzle instruction, leaving images unselected");
            return;
        };

        for (index, image) in images.iter().enumerate() {
            if !self.session.is_displayed(image).await.unwrap_or(false) {
                continue;
            }
            let src = match self.session.attribute(image, "src").await {
                Ok(Some(src)) if src.starts_with("data:image") => src,
                _ => continue,
            };

            let orientation = orientation_from_data_url(&src);
            info!("Image {} orientation: {}", index, orientation);

            if orientation == wanted {
                match self.session.click(image).await {
                    Ok(()) => info!("Selected image {}", index),
                    Err(e) => warn!("Failed to select image {}: {}", index, e),
                }
            }
        }
    }

    async fn top_level_checkpoint(&self) -> bool {
        if let Ok(url) = self.session.current_url().await {
            if is_checkpoint_url(&url) {
                return true;
            }
        }
        locate_first(self.session, &self.selectors.checkpoint_markers)
            .await
            .is_some()
    }

    /// Top-level document must be selected
    async fn challenge_gone(&self) -> bool {
        if locate_first(self.session, &self.selectors.authenticated_page)
            .await
            .is_some()
        {
            return true;
        }
        if self.top_level_checkpoint().await {
            return false;
        }

        let frames = locate_all(self.session, &self.selectors.challenge_frames).await;
        for frame in &frames {
            if self.frame_has_challenge(frame).await {
                if let Err(e) = self.session.switch_to_frame(None).await {
                    warn!("Failed to leave frame {}: {}", frame.id(), e);
                }
                return false;
            }
        }
        true
    }

    async fn wait_for_manual_resolution(&mut self) -> bool {
        self.state = ChallengeState::AwaitingResolution;
        if let Err(e) = self.session.switch_to_frame(None).await {
            warn!("Failed to switch back to the main document: {}", e);
        }

        warn!(
            "Automatic verification failed, please complete it in the browser (waiting up to {}s)",
            self.config.manual_timeout.as_secs()
        );

        let deadline = Instant::now() + self.config.manual_timeout;
        loop {
            if self.challenge_gone().await {
                info!("Verification completed - back on normal page");
                self.state = ChallengeState::Resolved;
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Gave up waiting for verification after {}s",
                    self.config.manual_timeout.as_secs()
                );
                return false;
            }

            info!(
                "Still waiting for verification to complete ({}s left)",
                (deadline - now).as_secs()
            );
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

pub fn is_checkpoint_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    CHECKPOINT_URL_MARKERS.iter().any(|m| lower.contains(m))
}

fn wanted_orientation(instruction: &str) -> Option<Orientation> {
    let lower = instruction.to_lowercase();
    if lower.contains("upside down") {
        Some(Orientation::Down)
    } else if lower.contains("up") {
        Some(Orientation::Up)
    } else {
        None
    }
}
