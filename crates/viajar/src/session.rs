//! Browser session over the Chrome DevTools Protocol.
//!
//! With the `browser` feature enabled, `CdpSession` drives a real Chromium
//! via chromiumoxide and implements [`PageDriver`](crate::driver::PageDriver).
//! Without the feature only [`SessionConfig`] is available and tests run
//! against the mock driver.

/// Launch configuration for a browser session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Path to the Chromium binary (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Chromium sandbox (disable in containers)
    pub sandbox: bool,
    /// CDP request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1400,
            window_height: 900,
            chrome_path: None,
            sandbox: true,
            request_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the browser window size
    #[must_use]
    pub const fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set the Chromium binary path
    #[must_use]
    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Disable the Chromium sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the CDP request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }
}

// ============================================================================
// Real CDP implementation (when the `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::SessionConfig;
    use crate::driver::{ElementHandle, Key, PageDriver};
    use crate::locator::{Locator, LocatorKind};
    use crate::result::{EngineError, EngineResult};
    use crate::wait::settle;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, MouseButton,
    };
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page;
    use futures::StreamExt;
    use std::time::Duration;
    use tracing::debug;

    /// Attribute used to hand XPath matches over to the CSS element API
    const TARGET_ATTR: &str = "data-viajar-target";

    fn launch_failed(error: impl std::fmt::Display) -> EngineError {
        EngineError::SessionLaunch {
            message: error.to_string(),
        }
    }

    fn script_failed(error: impl std::fmt::Display) -> EngineError {
        EngineError::Script {
            message: error.to_string(),
        }
    }

    fn input_failed(error: impl std::fmt::Display) -> EngineError {
        EngineError::Input {
            message: error.to_string(),
        }
    }

    fn lookup_failed(locator: &Locator, error: impl std::fmt::Display) -> EngineError {
        EngineError::Page {
            message: format!("element lookup failed at {locator}: {error}"),
        }
    }

    fn no_element(locator: &Locator) -> EngineError {
        EngineError::Page {
            message: format!("no element at {locator}"),
        }
    }

    /// A live browser session owned by one test run
    #[derive(Debug)]
    pub struct CdpSession {
        browser: CdpBrowser,
        page: Page,
        handler: tokio::task::JoinHandle<()>,
        url: String,
        tag_seq: u64,
    }

    impl CdpSession {
        /// Launch a fresh browser and open a blank page.
        ///
        /// # Errors
        ///
        /// Returns [`EngineError::SessionLaunch`] when the browser cannot be
        /// started or the first page cannot be opened.
        pub async fn launch(config: SessionConfig) -> EngineResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.window_width, config.window_height)
                .request_timeout(Duration::from_millis(config.request_timeout_ms));
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chrome_path {
                builder = builder.chrome_executable(path);
            }
            let cdp_config = builder.build().map_err(launch_failed)?;

            let (browser, mut events) = CdpBrowser::launch(cdp_config).await.map_err(launch_failed)?;
            let handler = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(launch_failed)?;
            debug!("browser session launched");

            Ok(Self {
                browser,
                page,
                handler,
                url: String::from("about:blank"),
                tag_seq: 0,
            })
        }

        /// Obtain a CDP element handle for the locator.
        ///
        /// CSS goes straight to the element API. XPath matches are first
        /// tagged with a per-session attribute value, then fetched by CSS,
        /// which gives both kinds the same handle type.
        async fn locate(&mut self, locator: &Locator) -> EngineResult<Element> {
            match locator.kind() {
                LocatorKind::Css => self
                    .page
                    .find_element(locator.raw())
                    .await
                    .map_err(|e| lookup_failed(locator, e)),
                LocatorKind::XPath => {
                    self.tag_seq += 1;
                    let tag = self.tag_seq;
                    let script = format!(
                        "(() => {{ const el = {}; if (!el) return false; \
                         el.setAttribute('{TARGET_ATTR}', '{tag}'); return true; }})()",
                        locator.to_query()
                    );
                    let tagged = self
                        .page
                        .evaluate(script)
                        .await
                        .map_err(script_failed)?
                        .into_value::<bool>()
                        .unwrap_or(false);
                    if !tagged {
                        return Err(no_element(locator));
                    }
                    self.page
                        .find_element(format!("[{TARGET_ATTR}='{tag}']"))
                        .await
                        .map_err(|e| lookup_failed(locator, e))
                }
            }
        }

        async fn eval_script(&mut self, script: String) -> EngineResult<serde_json::Value> {
            let result = self.page.evaluate(script).await.map_err(script_failed)?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        }

        /// Dispatch a raw key-down/key-up pair to the focused element.
        async fn dispatch_key(&mut self, key: &str) -> EngineResult<()> {
            let down = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyDown)
                .key(key.to_string())
                .build()
                .map_err(input_failed)?;
            self.page.execute(down).await.map_err(input_failed)?;

            let up = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyUp)
                .key(key.to_string())
                .build()
                .map_err(input_failed)?;
            self.page.execute(up).await.map_err(input_failed)?;
            Ok(())
        }
    }

    #[async_trait]
    impl PageDriver for CdpSession {
        async fn navigate(&mut self, url: &str) -> EngineResult<()> {
            self.page
                .goto(url)
                .await
                .map_err(|e| EngineError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            self.url = url.to_string();
            Ok(())
        }

        async fn eval(&mut self, script: &str) -> EngineResult<serde_json::Value> {
            self.eval_script(script.to_string()).await
        }

        async fn query(&mut self, locator: &Locator) -> EngineResult<Option<ElementHandle>> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return null; \
                 return {{ tag: el.tagName.toLowerCase(), \
                 text: (el.textContent || '').trim().slice(0, 200) }}; }})()",
                locator.to_query()
            );
            let value = self.eval_script(script).await?;
            if value.is_null() {
                return Ok(None);
            }
            let tag = value
                .get("tag")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let text = value.get("text").and_then(|v| v.as_str()).unwrap_or("");
            Ok(Some(
                ElementHandle::new(locator.raw(), tag).with_text(text),
            ))
        }

        async fn is_visible(&mut self, locator: &Locator) -> EngineResult<bool> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; \
                 const r = el.getBoundingClientRect(); \
                 const s = window.getComputedStyle(el); \
                 return r.width > 0 && r.height > 0 && \
                 s.visibility !== 'hidden' && s.display !== 'none'; }})()",
                locator.to_query()
            );
            Ok(self.eval_script(script).await?.as_bool().unwrap_or(false))
        }

        async fn is_clickable(&mut self, locator: &Locator) -> EngineResult<bool> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; \
                 const r = el.getBoundingClientRect(); \
                 const s = window.getComputedStyle(el); \
                 const visible = r.width > 0 && r.height > 0 && \
                 s.visibility !== 'hidden' && s.display !== 'none'; \
                 const viewport = r.top < (window.innerHeight || document.documentElement.clientHeight) && \
                 r.bottom > 0; \
                 return visible && viewport && el.disabled !== true; }})()",
                locator.to_query()
            );
            Ok(self.eval_script(script).await?.as_bool().unwrap_or(false))
        }

        async fn click_native(&mut self, locator: &Locator) -> EngineResult<()> {
            let element = self.locate(locator).await?;
            element.click().await.map_err(input_failed)?;
            Ok(())
        }

        async fn click_script(&mut self, locator: &Locator) -> EngineResult<()> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
                locator.to_query()
            );
            let clicked = self.eval_script(script).await?.as_bool().unwrap_or(false);
            if clicked {
                Ok(())
            } else {
                Err(no_element(locator))
            }
        }

        async fn click_pointer(&mut self, locator: &Locator) -> EngineResult<()> {
            let element = self.locate(locator).await?;
            let element = element.scroll_into_view().await.map_err(input_failed)?;
            let point = element.clickable_point().await.map_err(input_failed)?;

            let press = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MousePressed)
                .x(point.x)
                .y(point.y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(input_failed)?;
            self.page.execute(press).await.map_err(input_failed)?;

            let release = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseReleased)
                .x(point.x)
                .y(point.y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(input_failed)?;
            self.page.execute(release).await.map_err(input_failed)?;
            Ok(())
        }

        async fn clear(&mut self, locator: &Locator) -> EngineResult<()> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; \
                 el.focus(); if ('value' in el) {{ el.value = ''; }} return true; }})()",
                locator.to_query()
            );
            let cleared = self.eval_script(script).await?.as_bool().unwrap_or(false);
            if cleared {
                Ok(())
            } else {
                Err(no_element(locator))
            }
        }

        async fn type_text(
            &mut self,
            locator: &Locator,
            text: &str,
            per_char_delay_ms: u64,
        ) -> EngineResult<()> {
            let element = self.locate(locator).await?;
            let element = element.click().await.map_err(input_failed)?;
            for ch in text.chars() {
                element
                    .type_str(ch.to_string())
                    .await
                    .map_err(input_failed)?;
                if per_char_delay_ms > 0 {
                    settle(per_char_delay_ms).await;
                }
            }
            Ok(())
        }

        async fn set_value(&mut self, locator: &Locator, value: &str) -> EngineResult<()> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; el.value = {value:?}; return true; }})()",
                locator.to_query()
            );
            let set = self.eval_script(script).await?.as_bool().unwrap_or(false);
            if set {
                Ok(())
            } else {
                Err(no_element(locator))
            }
        }

        async fn dispatch_events(&mut self, locator: &Locator, events: &[&str]) -> EngineResult<()> {
            let names = events
                .iter()
                .map(|event| format!("'{event}'"))
                .collect::<Vec<_>>()
                .join(", ");
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; \
                 [{names}].forEach(t => el.dispatchEvent(new Event(t, {{ bubbles: true }}))); \
                 return true; }})()",
                locator.to_query()
            );
            let fired = self.eval_script(script).await?.as_bool().unwrap_or(false);
            if fired {
                Ok(())
            } else {
                Err(no_element(locator))
            }
        }

        async fn press_keys(&mut self, locator: &Locator, keys: &[Key]) -> EngineResult<()> {
            let focus = format!(
                "(() => {{ const el = {}; if (!el) return false; el.focus(); return true; }})()",
                locator.to_query()
            );
            let focused = self.eval_script(focus).await?.as_bool().unwrap_or(false);
            if !focused {
                return Err(no_element(locator));
            }
            for key in keys {
                match key {
                    // CDP has no select-all key; select the input's text instead
                    Key::SelectAll => {
                        let script = format!(
                            "(() => {{ const el = {}; if (el && el.select) {{ el.select(); }} }})()",
                            locator.to_query()
                        );
                        self.eval_script(script).await?;
                    }
                    other => self.dispatch_key(other.as_str()).await?,
                }
            }
            Ok(())
        }

        async fn select_option(&mut self, locator: &Locator, value: &str) -> EngineResult<()> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return false; el.value = {value:?}; return true; }})()",
                locator.to_query()
            );
            let selected = self.eval_script(script).await?.as_bool().unwrap_or(false);
            if selected {
                Ok(())
            } else {
                Err(no_element(locator))
            }
        }

        async fn read_text(&mut self, locator: &Locator) -> EngineResult<String> {
            let script = format!(
                "(() => {{ const el = {}; return el ? (el.textContent || '').trim() : null; }})()",
                locator.to_query()
            );
            match self.eval_script(script).await? {
                serde_json::Value::String(text) => Ok(text),
                serde_json::Value::Null => Err(no_element(locator)),
                other => Ok(other.to_string()),
            }
        }

        async fn is_checked(&mut self, locator: &Locator) -> EngineResult<bool> {
            let script = format!(
                "(() => {{ const el = {}; if (!el) return null; return el.checked === true; }})()",
                locator.to_query()
            );
            match self.eval_script(script).await? {
                serde_json::Value::Bool(checked) => Ok(checked),
                _ => Err(no_element(locator)),
            }
        }

        async fn scroll_into_view(&mut self, locator: &Locator) -> EngineResult<()> {
            let element = self.locate(locator).await?;
            element.scroll_into_view().await.map_err(input_failed)?;
            Ok(())
        }

        async fn current_url(&mut self) -> EngineResult<String> {
            Ok(self.url.clone())
        }

        async fn close(&mut self) -> EngineResult<()> {
            self.browser
                .close()
                .await
                .map_err(|e| EngineError::Page {
                    message: format!("browser close failed: {e}"),
                })?;
            self.handler.abort();
            debug!("browser session closed");
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::CdpSession;
