//! Abstract page driver trait.
//!
//! Every behavior in the engine talks to the page through `PageDriver`, so
//! the whole dispatch/orchestration stack runs against either a live CDP
//! session or the scripted `MockDriver`. The trait takes `&mut self`
//! throughout: a session is exclusively owned by one run and behaviors borrow
//! it for a single step.

use crate::locator::Locator;
use crate::result::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// ELEMENT HANDLE
// =============================================================================

/// Handle to a resolved DOM element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Identifier (the winning selector expression)
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Element text content
    pub text_content: Option<String>,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text_content: None,
        }
    }

    /// Attach text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }
}

// =============================================================================
// KEYS
// =============================================================================

/// Keyboard inputs the engine simulates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Arrow down (autocomplete fallback navigation)
    ArrowDown,
    /// Enter
    Enter,
    /// Delete
    Delete,
    /// Select-all chord (Ctrl+A)
    SelectAll,
}

impl Key {
    /// Display name used in logs and mock call history
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArrowDown => "ArrowDown",
            Self::Enter => "Enter",
            Self::Delete => "Delete",
            Self::SelectAll => "SelectAll",
        }
    }
}

// =============================================================================
// PAGE DRIVER TRAIT
// =============================================================================

/// Abstract driver for one live page.
///
/// Implementations: `CdpSession` (chromiumoxide, behind the `browser`
/// feature) and `MockDriver` for unit tests.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to a URL
    async fn navigate(&mut self, url: &str) -> EngineResult<()>;

    /// Evaluate JavaScript in the page context
    async fn eval(&mut self, script: &str) -> EngineResult<serde_json::Value>;

    /// Query for an element, returning a handle when present
    async fn query(&mut self, locator: &Locator) -> EngineResult<Option<ElementHandle>>;

    /// True when the element is rendered and visible
    async fn is_visible(&mut self, locator: &Locator) -> EngineResult<bool>;

    /// True when the element is visible, enabled and inside the viewport
    async fn is_clickable(&mut self, locator: &Locator) -> EngineResult<bool>;

    /// Native click on the element
    async fn click_native(&mut self, locator: &Locator) -> EngineResult<()>;

    /// Script-dispatched click (`el.click()` from JS)
    async fn click_script(&mut self, locator: &Locator) -> EngineResult<()>;

    /// Pointer-simulated click (synthesized mouse events at the element)
    async fn click_pointer(&mut self, locator: &Locator) -> EngineResult<()>;

    /// Native clear of an input's value
    async fn clear(&mut self, locator: &Locator) -> EngineResult<()>;

    /// Type text into the element character by character
    async fn type_text(
        &mut self,
        locator: &Locator,
        text: &str,
        per_char_delay_ms: u64,
    ) -> EngineResult<()>;

    /// Assign an input's value directly
    async fn set_value(&mut self, locator: &Locator, value: &str) -> EngineResult<()>;

    /// Dispatch bubbling synthetic events on the element
    async fn dispatch_events(&mut self, locator: &Locator, events: &[&str]) -> EngineResult<()>;

    /// Send key presses to the element
    async fn press_keys(&mut self, locator: &Locator, keys: &[Key]) -> EngineResult<()>;

    /// Select an option of a `<select>` by value
    async fn select_option(&mut self, locator: &Locator, value: &str) -> EngineResult<()>;

    /// Read the element's displayed text
    async fn read_text(&mut self, locator: &Locator) -> EngineResult<String>;

    /// Read a checkbox's checked state
    async fn is_checked(&mut self, locator: &Locator) -> EngineResult<bool>;

    /// Scroll the element into view
    async fn scroll_into_view(&mut self, locator: &Locator) -> EngineResult<()>;

    /// Current page URL
    async fn current_url(&mut self) -> EngineResult<String>;

    /// Close the session
    async fn close(&mut self) -> EngineResult<()>;
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// A scripted page element for `MockDriver`
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Selector expression this element answers to
    pub selector: String,
    /// Tag name
    pub tag: String,
    /// Displayed text
    pub text: String,
    /// Current input value
    pub value: String,
    /// Rendered and visible
    pub visible: bool,
    /// Enabled (not disabled)
    pub enabled: bool,
    /// Inside the viewport
    pub in_viewport: bool,
    /// Checkbox checked state
    pub checked: bool,
}

impl MockElement {
    /// A visible, enabled, in-viewport element
    #[must_use]
    pub fn new(selector: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into(),
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            in_viewport: true,
            checked: false,
        }
    }

    /// Set displayed text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Mark the element as hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark the element as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark the element as scrolled out of the viewport
    #[must_use]
    pub const fn off_screen(mut self) -> Self {
        self.in_viewport = false;
        self
    }

    /// Set the checkbox state
    #[must_use]
    pub const fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

/// Mock driver for unit testing the engine without a browser.
///
/// Elements are matched by exact selector expression. Click and type failures
/// can be injected per selector to exercise the fallback ladders, and an
/// increment binding turns clicks on one selector into count mutations on
/// another so counter flows can be tested end to end.
#[derive(Debug, Default)]
pub struct MockDriver {
    /// Current URL
    pub current_url: String,
    /// Scripted elements
    pub elements: Vec<MockElement>,
    /// Recorded calls, `method:detail` format
    pub call_history: Vec<String>,
    /// Selectors whose presence query errors
    pub query_failures: Vec<String>,
    /// Selectors whose visibility probe errors
    pub visibility_failures: Vec<String>,
    /// Selectors whose clickability probe errors
    pub clickable_failures: Vec<String>,
    /// Selectors whose native click errors
    pub native_click_failures: Vec<String>,
    /// Selectors whose script click errors
    pub script_click_failures: Vec<String>,
    /// Selectors whose pointer click errors
    pub pointer_click_failures: Vec<String>,
    /// Selectors whose char-by-char typing errors
    pub type_failures: Vec<String>,
    /// Selectors whose native clear errors
    pub clear_failures: Vec<String>,
    /// Selectors whose scroll-into-view errors
    pub scroll_failures: Vec<String>,
    /// (button selector, counter selector): a click bumps the counter's text
    pub increment_bindings: Vec<(String, String)>,
    /// Scripted eval results matched by script substring
    pub eval_results: Vec<(String, serde_json::Value)>,
    /// Whether close() has run
    pub closed: bool,
    /// External flag flipped on close, for callers that give up ownership
    pub close_flag: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,
}

impl MockDriver {
    /// Create an empty mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scripted element
    pub fn add_element(&mut self, element: MockElement) {
        self.elements.push(element);
    }

    /// Bind clicks on `button` to increments of the number shown at `counter`
    pub fn bind_increment(&mut self, button: impl Into<String>, counter: impl Into<String>) {
        self.increment_bindings.push((button.into(), counter.into()));
    }

    /// Make presence queries for `selector` fail
    pub fn fail_query(&mut self, selector: impl Into<String>) {
        self.query_failures.push(selector.into());
    }

    /// Make visibility probes for `selector` fail
    pub fn fail_visibility(&mut self, selector: impl Into<String>) {
        self.visibility_failures.push(selector.into());
    }

    /// Make clickability probes for `selector` fail
    pub fn fail_clickable(&mut self, selector: impl Into<String>) {
        self.clickable_failures.push(selector.into());
    }

    /// Make native clicks on `selector` fail
    pub fn fail_native_click(&mut self, selector: impl Into<String>) {
        self.native_click_failures.push(selector.into());
    }

    /// Make script clicks on `selector` fail
    pub fn fail_script_click(&mut self, selector: impl Into<String>) {
        self.script_click_failures.push(selector.into());
    }

    /// Make pointer clicks on `selector` fail
    pub fn fail_pointer_click(&mut self, selector: impl Into<String>) {
        self.pointer_click_failures.push(selector.into());
    }

    /// Make char-by-char typing into `selector` fail
    pub fn fail_typing(&mut self, selector: impl Into<String>) {
        self.type_failures.push(selector.into());
    }

    /// Make native clears of `selector` fail
    pub fn fail_clear(&mut self, selector: impl Into<String>) {
        self.clear_failures.push(selector.into());
    }

    /// Make scroll-into-view on `selector` fail
    pub fn fail_scroll(&mut self, selector: impl Into<String>) {
        self.scroll_failures.push(selector.into());
    }

    /// Script an eval result for any script containing `fragment`
    pub fn set_eval_result(&mut self, fragment: impl Into<String>, value: serde_json::Value) {
        self.eval_results.push((fragment.into(), value));
    }

    /// Flip `flag` when the session closes. Lets a test that hands the
    /// driver away still observe release.
    pub fn notify_close(&mut self, flag: std::sync::Arc<std::sync::atomic::AtomicBool>) {
        self.close_flag = Some(flag);
    }

    /// Look up a scripted element by selector
    #[must_use]
    pub fn element(&self, selector: &str) -> Option<&MockElement> {
        self.find(selector)
    }

    /// Recorded call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// True when any recorded call starts with `method`
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    fn find(&self, selector: &str) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.selector == selector)
    }

    fn find_mut(&mut self, selector: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.selector == selector)
    }

    fn require(&self, selector: &str) -> EngineResult<&MockElement> {
        self.find(selector).ok_or_else(|| EngineError::Input {
            message: format!("no mock element for {selector}"),
        })
    }

    fn apply_click_effects(&mut self, selector: &str) {
        // Toggle checkbox state on any click
        if let Some(element) = self.find_mut(selector) {
            element.checked = !element.checked;
        }
        // Bump bound counters
        let bindings: Vec<String> = self
            .increment_bindings
            .iter()
            .filter(|(button, _)| button == selector)
            .map(|(_, counter)| counter.clone())
            .collect();
        for counter in bindings {
            if let Some(element) = self.find_mut(&counter) {
                let current: u32 = element.text.trim().parse().unwrap_or(0);
                element.text = (current + 1).to_string();
            }
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> EngineResult<()> {
        self.call_history.push(format!("navigate:{url}"));
        self.current_url = url.to_string();
        Ok(())
    }

    async fn eval(&mut self, script: &str) -> EngineResult<serde_json::Value> {
        self.call_history.push(format!("eval:{script}"));
        for (fragment, value) in &self.eval_results {
            if script.contains(fragment.as_str()) {
                return Ok(value.clone());
            }
        }
        Ok(serde_json::Value::Null)
    }

    async fn query(&mut self, locator: &Locator) -> EngineResult<Option<ElementHandle>> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("query:{selector}"));
        if self.query_failures.contains(&selector) {
            return Err(EngineError::Page {
                message: format!("query failed on {selector}"),
            });
        }
        Ok(self.find(&selector).map(|e| {
            ElementHandle::new(e.selector.clone(), e.tag.clone()).with_text(e.text.clone())
        }))
    }

    async fn is_visible(&mut self, locator: &Locator) -> EngineResult<bool> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("is_visible:{selector}"));
        if self.visibility_failures.contains(&selector) {
            return Err(EngineError::Page {
                message: format!("visibility probe failed on {selector}"),
            });
        }
        Ok(self.find(&selector).is_some_and(|e| e.visible))
    }

    async fn is_clickable(&mut self, locator: &Locator) -> EngineResult<bool> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("is_clickable:{selector}"));
        if self.clickable_failures.contains(&selector) {
            return Err(EngineError::Page {
                message: format!("clickability probe failed on {selector}"),
            });
        }
        Ok(self
            .find(&selector)
            .is_some_and(|e| e.visible && e.enabled && e.in_viewport))
    }

    async fn click_native(&mut self, locator: &Locator) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("click_native:{selector}"));
        self.require(&selector)?;
        if self.native_click_failures.contains(&selector) {
            return Err(EngineError::Input {
                message: format!("native click intercepted on {selector}"),
            });
        }
        self.apply_click_effects(&selector);
        Ok(())
    }

    async fn click_script(&mut self, locator: &Locator) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("click_script:{selector}"));
        self.require(&selector)?;
        if self.script_click_failures.contains(&selector) {
            return Err(EngineError::Script {
                message: format!("script click failed on {selector}"),
            });
        }
        self.apply_click_effects(&selector);
        Ok(())
    }

    async fn click_pointer(&mut self, locator: &Locator) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("click_pointer:{selector}"));
        self.require(&selector)?;
        if self.pointer_click_failures.contains(&selector) {
            return Err(EngineError::Input {
                message: format!("pointer click failed on {selector}"),
            });
        }
        self.apply_click_effects(&selector);
        Ok(())
    }

    async fn clear(&mut self, locator: &Locator) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("clear:{selector}"));
        if self.clear_failures.contains(&selector) {
            return Err(EngineError::Input {
                message: format!("clear failed on {selector}"),
            });
        }
        if let Some(element) = self.find_mut(&selector) {
            element.value.clear();
        }
        Ok(())
    }

    async fn type_text(
        &mut self,
        locator: &Locator,
        text: &str,
        _per_char_delay_ms: u64,
    ) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history
            .push(format!("type_text:{selector}:{text}"));
        if self.type_failures.contains(&selector) {
            return Err(EngineError::Input {
                message: format!("typing failed on {selector}"),
            });
        }
        if let Some(element) = self.find_mut(&selector) {
            element.value.push_str(text);
        }
        Ok(())
    }

    async fn set_value(&mut self, locator: &Locator, value: &str) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history
            .push(format!("set_value:{selector}:{value}"));
        if let Some(element) = self.find_mut(&selector) {
            element.value = value.to_string();
        }
        Ok(())
    }

    async fn dispatch_events(&mut self, locator: &Locator, events: &[&str]) -> EngineResult<()> {
        self.call_history.push(format!(
            "dispatch_events:{}:{}",
            locator.raw(),
            events.join("+")
        ));
        Ok(())
    }

    async fn press_keys(&mut self, locator: &Locator, keys: &[Key]) -> EngineResult<()> {
        let names: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        self.call_history
            .push(format!("press_keys:{}:{}", locator.raw(), names.join("+")));
        Ok(())
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history
            .push(format!("select_option:{selector}:{value}"));
        self.require(&selector)?;
        if let Some(element) = self.find_mut(&selector) {
            element.value = value.to_string();
        }
        Ok(())
    }

    async fn read_text(&mut self, locator: &Locator) -> EngineResult<String> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("read_text:{selector}"));
        Ok(self.require(&selector)?.text.clone())
    }

    async fn is_checked(&mut self, locator: &Locator) -> EngineResult<bool> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("is_checked:{selector}"));
        Ok(self.require(&selector)?.checked)
    }

    async fn scroll_into_view(&mut self, locator: &Locator) -> EngineResult<()> {
        let selector = locator.raw().to_string();
        self.call_history.push(format!("scroll_into_view:{selector}"));
        if self.scroll_failures.contains(&selector) {
            return Err(EngineError::Page {
                message: format!("scroll failed on {selector}"),
            });
        }
        Ok(())
    }

    async fn current_url(&mut self) -> EngineResult<String> {
        Ok(self.current_url.clone())
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.call_history.push("close".to_string());
        self.closed = true;
        if let Some(flag) = &self.close_flag {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
        Ok(())
    }
}
