// src/linkedin/modal.rs
//! LinkedIn's Easy Apply dialog behind the `ApplyModal` capability

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::apply::{ApplyModal, Confirmation, FormField, ModalAction, CHECKED};
use crate::browser::{
    locate_all, locate_all_within, locate_first, text_within, wait_for_any,
    BrowserError, BrowserSession, ElementHandle, SelectorChain,
};
use crate::linkedin::selectors::SelectorConfig;
use crate::types::FieldType;
use crate::utils::{clean_text, normalize_label};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const EASY_APPLY_MARKER: &str = "easy apply";
const UNLABELLED_FIELD: &str = "Unlabelled field";

/// What the job page offers for applying
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyTrigger {
    EasyApply(ElementHandle),
    /// An apply button that leaves for an external site
    External,
    Missing,
}

pub struct LinkedInModal<'a> {
    session: &'a dyn BrowserSession,
    selectors: &'a SelectorConfig,
}

impl<'a> LinkedInModal<'a> {
    pub fn new(session: &'a dyn BrowserSession, selectors: &'a SelectorConfig) -> Self {
        Self { session, selectors }
    }

    /// Inspect the apply button on the open job
    pub async fn find_trigger(&self) -> Result<ApplyTrigger, BrowserError> {
        let Some(button) = locate_first(self.session, &self.selectors.apply_button).await else {
            return Ok(ApplyTrigger::Missing);
        };

        let text = self.session.text(&button).await?;
        let aria = self
            .session
            .attribute(&button, "aria-label")
            .await?
            .unwrap_or_default();

        if normalize_label(&text).contains(EASY_APPLY_MARKER)
            || normalize_label(&aria).contains(EASY_APPLY_MARKER)
        {
            Ok(ApplyTrigger::EasyApply(button))
        } else {
            debug!("Apply button is not Easy Apply: '{}'", clean_text(&text));
            Ok(ApplyTrigger::External)
        }
    }

    /// Click the trigger found by `find_trigger`
    pub async fn open(&self, trigger: &ElementHandle) -> Result<(), BrowserError> {
        if let Err(e) = self.session.scroll_into_view(trigger).await {
            debug!("Could not scroll to Easy Apply button: {}", e);
        }
        info!("Clicking Easy Apply button");
        self.session.click(trigger).await
    }

    async fn root(&self) -> Option<ElementHandle> {
        locate_first(self.session, &self.selectors.easy_apply_modal).await
    }

    /// Search inside the dialog when it can be found, else the whole page
    async fn find_in_modal(&self, chain: &SelectorChain) -> Vec<ElementHandle> {
        match self.root().await {
            Some(root) => {
                let found = locate_all_within(self.session, &root, chain).await;
                if found.is_empty() {
                    locate_all(self.session, chain).await
                } else {
                    found
                }
            }
            None => locate_all(self.session, chain).await,
        }
    }

    async fn first_usable(&self, chain: &SelectorChain) -> Result<Option<ElementHandle>, BrowserError> {
        for candidate in self.find_in_modal(chain).await {
            if self.session.is_displayed(&candidate).await?
                && self.session.is_enabled(&candidate).await?
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn read_group(&self, group: &ElementHandle) -> Result<Option<FormField>, BrowserError> {
        if !self.session.is_displayed(group).await? {
            return Ok(None);
        }

        let mut inputs = Vec::new();
        for input in locate_all_within(self.session, group, &self.selectors.field_inputs).await {
            if self.session.is_displayed(&input).await? {
                inputs.push(input);
            }
        }
        let Some(first) = inputs.first().cloned() else {
            return Ok(None);
        };

        let tag = self.session.tag_name(&first).await?;
        let input_type = self.session.attribute(&first, "type").await?;
        let field_type = FieldType::from_html(&tag, input_type.as_deref());

        let raw_label = match text_within(self.session, group, &self.selectors.field_label).await {
            Some(label) => label,
            None => self.fallback_label(&first).await?,
        };
        let (label, starred) = split_required_marker(&raw_label);
        let required = starred || self.is_marked_required(&first).await?;

        let field = match field_type {
            FieldType::Select => {
                let (options, current_value) = self.select_options(&first).await?;
                FormField {
                    handle: first,
                    field_type,
                    label,
                    current_value,
                    options,
                    required,
                }
            }
            FieldType::Radio => {
                let mut options = Vec::new();
                let mut current_value = None;
                for radio in &inputs {
                    let option = self.radio_label(radio).await?;
                    if self.session.is_selected(radio).await? {
                        current_value = Some(option.clone());
                    }
                    options.push(option);
                }
                FormField {
                    handle: group.clone(),
                    field_type,
                    label,
                    current_value,
                    options,
                    required,
                }
            }
            FieldType::Checkbox => {
                let current_value = self
                    .session
                    .is_selected(&first)
                    .await?
                    .then(|| CHECKED.to_string());
                FormField {
                    handle: first,
                    field_type,
                    label,
                    current_value,
                    options: Vec::new(),
                    required,
                }
            }
            _ => {
                let value = self.session.value(&first).await?;
                let current_value = (!value.trim().is_empty()).then_some(value);
                FormField {
                    handle: first,
                    field_type,
                    label,
                    current_value,
                    options: Vec::new(),
                    required,
                }
            }
        };

        Ok(Some(field))
    }

    async fn fallback_label(&self, input: &ElementHandle) -> Result<String, BrowserError> {
        for name in ["aria-label", "placeholder", "name"] {
            if let Some(value) = self.session.attribute(input, name).await? {
                let value = clean_text(&value);
                if !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        Ok(UNLABELLED_FIELD.to_string())
    }

    async fn is_marked_required(&self, input: &ElementHandle) -> Result<bool, BrowserError> {
        if self.session.attribute(input, "required").await?.is_some() {
            return Ok(true);
        }
        Ok(self
            .session
            .attribute(input, "aria-required")
            .await?
            .is_some_and(|v| v.eq_ignore_ascii_case("true")))
    }

    /// Real options of a select and the selected one, placeholders excluded
    async fn select_options(
        &self,
        select: &ElementHandle,
    ) -> Result<(Vec<String>, Option<String>), BrowserError> {
        let mut options = Vec::new();
        let mut selected = None;
        for option in locate_all_within(self.session, select, &self.selectors.select_options).await {
            let text = clean_text(&self.session.text(&option).await?);
            if is_placeholder_option(&text) {
                continue;
            }
            if self.session.is_selected(&option).await? {
                selected = Some(text.clone());
            }
            options.push(text);
        }
        Ok((options, selected))
    }

    async fn radio_label(&self, radio: &ElementHandle) -> Result<String, BrowserError> {
        if let Some(label) = text_within(self.session, radio, &self.selectors.option_label).await {
            return Ok(clean_text(&label));
        }
        Ok(self
            .session
            .attribute(radio, "value")
            .await?
            .map(|v| clean_text(&v))
            .unwrap_or_default())
    }

    async fn click_matching_option(&self, field: &FormField, value: &str) -> Result<(), BrowserError> {
        match field.field_type {
            FieldType::Select => {
                for option in
                    locate_all_within(self.session, &field.handle, &self.selectors.select_options)
                        .await
                {
                    if clean_text(&self.session.text(&option).await?) == value {
                        return self.session.click(&option).await;
                    }
                }
            }
            _ => {
                for radio in
                    locate_all_within(self.session, &field.handle, &self.selectors.field_inputs).await
                {
                    if self.radio_label(&radio).await? == value {
                        return self.session.click(&radio).await;
                    }
                }
            }
        }
        Err(BrowserError::NoSuchElement(format!(
            "option '{}' for '{}'",
            value, field.label
        )))
    }
}

#[async_trait]
impl ApplyModal for LinkedInModal<'_> {
    async fn wait_for_modal(&self, timeout: Duration) -> Result<bool, BrowserError> {
        Ok(
            wait_for_any(self.session, &self.selectors.easy_apply_modal, timeout, POLL_INTERVAL)
                .await
                .is_some(),
        )
    }

    async fn collect_fields(&self) -> Result<Vec<FormField>, BrowserError> {
        let groups = self.find_in_modal(&self.selectors.form_groupings).await;
        let mut fields = Vec::with_capacity(groups.len());

        for group in &groups {
            match self.read_group(group).await {
                Ok(Some(field)) => {
                    debug!(
                        "Found {} field '{}' (required: {})",
                        field.field_type, field.label, field.required
                    );
                    fields.push(field);
                }
                Ok(None) => {}
                Err(BrowserError::NoSuchElement(what)) => {
                    debug!("Form group went stale while reading: {}", what);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(fields)
    }

    async fn fill(&self, field: &FormField, value: &str) -> Result<(), BrowserError> {
        match field.field_type {
            FieldType::Select | FieldType::Radio => self.click_matching_option(field, value).await,
            FieldType::Checkbox => {
                let wanted = value == CHECKED;
                if self.session.is_selected(&field.handle).await? != wanted {
                    self.session.click(&field.handle).await?;
                }
                Ok(())
            }
            FieldType::File => self.session.type_text(&field.handle, value).await,
            FieldType::Text | FieldType::Textarea | FieldType::Other => {
                self.session.clear(&field.handle).await?;
                self.session.type_text(&field.handle, value).await
            }
        }
    }

    async fn find_action(&self) -> Result<Option<ModalAction>, BrowserError> {
        if self.first_usable(&self.selectors.submit_button).await?.is_some() {
            return Ok(Some(ModalAction::Submit));
        }
        if self.first_usable(&self.selectors.next_button).await?.is_some() {
            return Ok(Some(ModalAction::Next));
        }
        Ok(None)
    }

    async fn click_action(&self, action: ModalAction) -> Result<(), BrowserError> {
        let chain = match action {
            ModalAction::Submit => &self.selectors.submit_button,
            ModalAction::Next => &self.selectors.next_button,
        };
        let button = self
            .first_usable(chain)
            .await?
            .ok_or_else(|| BrowserError::NoSuchElement(format!("{:?} button", action)))?;

        if let Err(e) = self.session.scroll_into_view(&button).await {
            debug!("Could not scroll to {:?} button: {}", action, e);
        }
        self.session.click(&button).await
    }

    async fn wait_for_confirmation(&self, timeout: Duration) -> Result<Confirmation, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if locate_first(self.session, &self.selectors.application_sent)
                .await
                .is_some()
            {
                info!("Application confirmation shown");
                return Ok(Confirmation::Confirmed);
            }

            for error in locate_all(self.session, &self.selectors.form_errors).await {
                let message = clean_text(&self.session.text(&error).await?);
                if !message.is_empty() {
                    warn!("Form rejected submission: {}", message);
                    return Ok(Confirmation::Rejected(message));
                }
            }

            if Instant::now() >= deadline {
                return Ok(Confirmation::TimedOut);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn dismiss(&self) -> Result<bool, BrowserError> {
        let Some(button) = locate_first(self.session, &self.selectors.dismiss_button).await else {
            return Ok(false);
        };
        self.session.click(&button).await?;
        Ok(true)
    }
}

/// Strip a trailing required marker: `"Phone *"` -> `("Phone", true)`
fn split_required_marker(raw: &str) -> (String, bool) {
    let cleaned = clean_text(raw);
    let starred = cleaned.contains('*');
    let label = clean_text(&cleaned.replace('*', ""));
    if label.is_empty() {
        (UNLABELLED_FIELD.to_string(), starred)
    } else {
        (label, starred)
    }
}

fn is_placeholder_option(text: &str) -> bool {
    let text = normalize_label(text);
    text.is_empty() || text == "select an option" || text == "select"
}
