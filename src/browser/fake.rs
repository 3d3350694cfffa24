// src/browser/fake.rs
//! Scripted in-memory browser for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{BrowserError, BrowserSession, ElementHandle, Locator};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub tag: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub value: String,
    pub displayed: bool,
    pub enabled: bool,
    pub selected: bool,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: String::new(),
            attributes: HashMap::new(),
            value: String::new(),
            displayed: true,
            enabled: true,
            selected: false,
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    Top,
    Frame(ElementHandle),
    Within(ElementHandle),
}

#[derive(Default)]
pub struct FakeState {
    pub url: String,
    frame: Option<ElementHandle>,
    next_id: usize,
    elements: HashMap<ElementHandle, FakeElement>,
    bindings: HashMap<(Scope, Locator), Vec<ElementHandle>>,
    pub clicks: Vec<ElementHandle>,
    pub typed: Vec<(ElementHandle, String)>,
    pub navigations: Vec<String>,
    pub frame_switches: Vec<Option<ElementHandle>>,
    pub refreshes: usize,
    pub closed: bool,
    click_failures: HashMap<ElementHandle, fn() -> BrowserError>,
}

impl FakeState {
    pub fn add(&mut self, element: FakeElement) -> ElementHandle {
        self.next_id += 1;
        let handle = ElementHandle(format!("el-{}", self.next_id));
        self.elements.insert(handle.clone(), element);
        handle
    }

    pub fn bind(&mut self, locator: Locator, handles: Vec<ElementHandle>) {
        self.bindings.insert((Scope::Top, locator), handles);
    }

    pub fn bind_in_frame(
        &mut self,
        frame: &ElementHandle,
        locator: Locator,
        handles: Vec<ElementHandle>,
    ) {
        self.bindings
            .insert((Scope::Frame(frame.clone()), locator), handles);
    }

    pub fn bind_within(
        &mut self,
        parent: &ElementHandle,
        locator: Locator,
        handles: Vec<ElementHandle>,
    ) {
        self.bindings
            .insert((Scope::Within(parent.clone()), locator), handles);
    }

    pub fn unbind(&mut self, locator: &Locator) {
        self.bindings.remove(&(Scope::Top, locator.clone()));
    }

    pub fn unbind_in_frame(&mut self, frame: &ElementHandle, locator: &Locator) {
        self.bindings
            .remove(&(Scope::Frame(frame.clone()), locator.clone()));
    }

    /// Every later click on `handle` fails with `error()`
    pub fn fail_clicks(&mut self, handle: &ElementHandle, error: fn() -> BrowserError) {
        self.click_failures.insert(handle.clone(), error);
    }

    pub fn element_mut(&mut self, handle: &ElementHandle) -> Option<&mut FakeElement> {
        self.elements.get_mut(handle)
    }

    fn element(&self, handle: &ElementHandle) -> Result<&FakeElement, BrowserError> {
        self.elements
            .get(handle)
            .ok_or_else(|| BrowserError::NoSuchElement(handle.id().to_string()))
    }
}

type ClickHook = Box<dyn FnMut(&mut FakeState) + Send>;

/// Elements are registered up front and bound to the exact locators the
/// code under test will ask for. Click hooks mutate the page.
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<FakeState>,
    hooks: Mutex<HashMap<ElementHandle, ClickHook>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add(&self, element: FakeElement) -> ElementHandle {
        self.with_state(|s| s.add(element))
    }

    pub fn bind(&self, locator: Locator, handles: Vec<ElementHandle>) {
        self.with_state(|s| s.bind(locator, handles));
    }

    pub fn bind_in_frame(&self, frame: &ElementHandle, locator: Locator, handles: Vec<ElementHandle>) {
        self.with_state(|s| s.bind_in_frame(frame, locator, handles));
    }

    pub fn bind_within(&self, parent: &ElementHandle, locator: Locator, handles: Vec<ElementHandle>) {
        self.with_state(|s| s.bind_within(parent, locator, handles));
    }

    pub fn set_url(&self, url: &str) {
        self.with_state(|s| s.url = url.to_string());
    }

    pub fn on_click(&self, handle: &ElementHandle, hook: impl FnMut(&mut FakeState) + Send + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .insert(handle.clone(), Box::new(hook));
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.with_state(|s| s.clicks.clone())
    }

    pub fn typed(&self) -> Vec<(ElementHandle, String)> {
        self.with_state(|s| s.typed.clone())
    }

    pub fn navigations(&self) -> Vec<String> {
        self.with_state(|s| s.navigations.clone())
    }

    pub fn refreshes(&self) -> usize {
        self.with_state(|s| s.refreshes)
    }

    pub fn fail_clicks(&self, handle: &ElementHandle, error: fn() -> BrowserError) {
        self.with_state(|s| s.fail_clicks(handle, error));
    }

    pub fn current_frame(&self) -> Option<ElementHandle> {
        self.with_state(|s| s.frame.clone())
    }

    pub fn value_of(&self, handle: &ElementHandle) -> String {
        self.with_state(|s| s.elements.get(handle).map(|e| e.value.clone()).unwrap_or_default())
    }

    pub fn is_checked(&self, handle: &ElementHandle) -> bool {
        self.with_state(|s| s.elements.get(handle).map(|e| e.selected).unwrap_or(false))
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.with_state(|s| {
            s.url = url.to_string();
            s.navigations.push(url.to_string());
        });
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.with_state(|s| s.url.clone()))
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        self.with_state(|s| s.refreshes += 1);
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, BrowserError> {
        Ok(self.with_state(|s| {
            let scope = match &s.frame {
                Some(frame) => Scope::Frame(frame.clone()),
                None => Scope::Top,
            };
            s.bindings
                .get(&(scope, locator.clone()))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        Ok(self.with_state(|s| {
            s.bindings
                .get(&(Scope::Within(parent.clone()), locator.clone()))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.text.clone()))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.attributes.get(name).cloned()))
    }

    async fn value(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.value.clone()))
    }

    async fn tag_name(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.tag.clone()))
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.displayed))
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.enabled))
    }

    async fn is_selected(&self, element: &ElementHandle) -> Result<bool, BrowserError> {
        self.with_state(|s| s.element(element).map(|e| e.selected))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.with_state(|s| -> Result<(), BrowserError> {
            if let Some(error) = s.click_failures.get(element) {
                return Err(error());
            }
            let el = s
                .elements
                .get_mut(element)
                .ok_or_else(|| BrowserError::NoSuchElement(element.id().to_string()))?;
            match el.attributes.get("type").map(String::as_str) {
                Some("checkbox") => el.selected = !el.selected,
                Some("radio") => el.selected = true,
                _ if el.tag == "option" => el.selected = true,
                _ => {}
            }
            s.clicks.push(element.clone());
            Ok(())
        })?;

        let mut hooks = self.hooks.lock().unwrap();
        if let Some(hook) = hooks.get_mut(element) {
            let mut state = self.state.lock().unwrap();
            hook(&mut state);
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.with_state(|s| {
            s.elements
                .get_mut(element)
                .map(|e| e.value.clear())
                .ok_or_else(|| BrowserError::NoSuchElement(element.id().to_string()))
        })
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.with_state(|s| -> Result<(), BrowserError> {
            let el = s
                .elements
                .get_mut(element)
                .ok_or_else(|| BrowserError::NoSuchElement(element.id().to_string()))?;
            el.value.push_str(text);
            s.typed.push((element.clone(), text.to_string()));
            Ok(())
        })
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.with_state(|s| s.element(element).map(|_| ()))
    }

    async fn switch_to_frame(&self, frame: Option<&ElementHandle>) -> Result<(), BrowserError> {
        self.with_state(|s| {
            s.frame = frame.cloned();
            s.frame_switches.push(frame.cloned());
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.with_state(|s| s.closed = true);
        Ok(())
    }
}
