use std::collections::HashMap;
use std::time::Duration;

use super::{BrowserError, BrowserResult, Page};

/// State of one element on a `MockPage`
#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    pub visible: bool,
    pub enabled: bool,
    pub text: String,
    /// Number of `<option>` children, for select elements
    pub options: usize,
}

impl MockElement {
    /// A visible, enabled element with the given text
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            visible: true,
            enabled: true,
            text: text.into(),
            options: 0,
        }
    }

    /// An element present in the DOM but not displayed
    pub fn hidden() -> Self {
        Self {
            visible: false,
            enabled: true,
            text: String::new(),
            options: 0,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_options(mut self, options: usize) -> Self {
        self.options = options;
        self
    }
}

/// A scripted in-memory page for testing.
///
/// Elements are keyed by the exact selector string used to query them, so a
/// test states which selectors "exist" on the page. Clicks can reveal further
/// elements, modelling UI that reacts to actions (e.g. a cart badge).
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    elements: HashMap<String, Vec<MockElement>>,
    reveals: HashMap<String, Vec<(String, MockElement)>>,
    delayed: Vec<(Duration, String, MockElement)>,
    html: String,
    screenshot: Vec<u8>,
    failing: HashMap<String, String>,
    navigation_fault: Option<String>,
    never_idle: bool,
    /// URLs navigated to, in order
    pub navigations: Vec<String>,
    /// Selectors clicked, in order
    pub clicks: Vec<String>,
    /// (selector, index) pairs chosen via `select_option`
    pub selections: Vec<(String, usize)>,
    /// Total time spent in fixed waits
    pub waited: Duration,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one element matching `selector`
    pub fn with_element(mut self, selector: impl Into<String>, element: MockElement) -> Self {
        self.elements.entry(selector.into()).or_default().push(element);
        self
    }

    /// Add `n` identical elements matching `selector`
    pub fn with_elements(mut self, selector: impl Into<String>, element: MockElement, n: usize) -> Self {
        let slot = self.elements.entry(selector.into()).or_default();
        slot.extend(std::iter::repeat_n(element, n));
        self
    }

    /// After `trigger` is clicked, `selector` starts matching `element`
    pub fn reveal_on_click(
        mut self,
        trigger: impl Into<String>,
        selector: impl Into<String>,
        element: MockElement,
    ) -> Self {
        self.reveals
            .entry(trigger.into())
            .or_default()
            .push((selector.into(), element));
        self
    }

    /// `selector` starts matching `element` once `after` has been waited in total
    pub fn appear_after(mut self, after: Duration, selector: impl Into<String>, element: MockElement) -> Self {
        self.delayed.push((after, selector.into(), element));
        self
    }

    /// Queries against `selector` fail with a command error
    pub fn failing_on(mut self, selector: impl Into<String>, message: impl Into<String>) -> Self {
        self.failing.insert(selector.into(), message.into());
        self
    }

    /// `navigate` fails with a command error
    pub fn failing_navigation(mut self, message: impl Into<String>) -> Self {
        self.navigation_fault = Some(message.into());
        self
    }

    /// `wait_for_idle` always times out
    pub fn never_idle(mut self) -> Self {
        self.never_idle = true;
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = png;
        self
    }

    fn first(&self, selector: &str) -> BrowserResult<Option<&MockElement>> {
        if let Some(message) = self.failing.get(selector) {
            return Err(BrowserError::Command(message.clone()));
        }
        Ok(self.elements.get(selector).and_then(|els| els.first()))
    }

    fn require(&self, selector: &str) -> BrowserResult<&MockElement> {
        self.first(selector)?
            .ok_or_else(|| BrowserError::NotFound(selector.to_string()))
    }
}

impl Page for MockPage {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        if let Some(message) = &self.navigation_fault {
            return Err(BrowserError::Command(message.clone()));
        }
        self.navigations.push(url.to_string());
        Ok(())
    }

    fn wait_for_idle(&mut self, timeout: Duration) -> BrowserResult<()> {
        if self.never_idle {
            return Err(BrowserError::Timeout(timeout, "network idle".to_string()));
        }
        Ok(())
    }

    fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        self.first(selector)?;
        Ok(self.elements.get(selector).map_or(0, Vec::len))
    }

    fn is_visible(&mut self, selector: &str) -> BrowserResult<bool> {
        Ok(self.first(selector)?.is_some_and(|el| el.visible))
    }

    fn is_enabled(&mut self, selector: &str) -> BrowserResult<bool> {
        Ok(self.require(selector)?.enabled)
    }

    fn text_content(&mut self, selector: &str) -> BrowserResult<Option<String>> {
        Ok(self.first(selector)?.map(|el| el.text.clone()))
    }

    fn click(&mut self, selector: &str) -> BrowserResult<()> {
        let el = self.require(selector)?;
        if !el.visible {
            return Err(BrowserError::Command(format!(
                "element `{}` is not interactable",
                selector
            )));
        }
        self.clicks.push(selector.to_string());
        if let Some(revealed) = self.reveals.remove(selector) {
            for (sel, element) in revealed {
                self.elements.insert(sel, vec![element]);
            }
        }
        Ok(())
    }

    fn select_option(&mut self, selector: &str, index: usize) -> BrowserResult<()> {
        let el = self.require(selector)?;
        if index >= el.options {
            return Err(BrowserError::Command(format!(
                "option index {} out of range ({} options)",
                index, el.options
            )));
        }
        self.selections.push((selector.to_string(), index));
        Ok(())
    }

    fn wait(&mut self, duration: Duration) {
        self.waited += duration;
        let waited = self.waited;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|(after, _, _)| *after <= waited);
        self.delayed = pending;
        for (_, selector, element) in due {
            self.elements.entry(selector).or_default().push(element);
        }
    }

    fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        Ok(self.screenshot.clone())
    }

    fn html(&mut self) -> BrowserResult<String> {
        Ok(self.html.clone())
    }
}
