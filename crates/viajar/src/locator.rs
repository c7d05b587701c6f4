//! Locator parsing and element resolution.
//!
//! Catalog rows carry element locators as a single pipe-delimited string of
//! alternatives, ordered most-preferred first. Each alternative is classified
//! as CSS or XPath from its shape, and [`resolve`] walks the alternatives in
//! order, escalating through three wait strategies per candidate before
//! giving up with [`EngineError::ElementNotFound`].

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{EngineError, EngineResult};
use crate::wait::{settle, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;

// =============================================================================
// LOCATOR
// =============================================================================

/// How a locator expression addresses the DOM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorKind {
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
}

/// A single locator alternative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    raw: String,
    kind: LocatorKind,
}

impl Locator {
    /// Classify and wrap one locator expression.
    ///
    /// Expressions starting with `/`, `(` or `.//` are treated as XPath,
    /// everything else as CSS. Leading and trailing whitespace is dropped.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into().trim().to_string();
        let kind = if raw.starts_with('/') || raw.starts_with('(') || raw.starts_with(".//") {
            LocatorKind::XPath
        } else {
            LocatorKind::Css
        };
        Self { raw, kind }
    }

    /// The raw locator expression
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The locator's addressing kind
    #[must_use]
    pub const fn kind(&self) -> LocatorKind {
        self.kind
    }

    /// True for XPath expressions
    #[must_use]
    pub const fn is_xpath(&self) -> bool {
        matches!(self.kind, LocatorKind::XPath)
    }

    /// JavaScript expression that evaluates to the element or null
    #[must_use]
    pub fn to_query(&self) -> String {
        match self.kind {
            LocatorKind::Css => format!("document.querySelector({:?})", self.raw),
            LocatorKind::XPath => format!(
                "document.evaluate({:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                self.raw
            ),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

// =============================================================================
// LOCATOR SET
// =============================================================================

/// Ordered locator alternatives for one element.
///
/// Serialized as the original pipe-delimited string so catalog rows round-trip
/// through JSON untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct LocatorSet {
    candidates: Vec<Locator>,
}

impl LocatorSet {
    /// Split a pipe-delimited locator string into ordered alternatives.
    ///
    /// Empty segments are skipped, so `"#a||#b"` and `"#a | #b"` both yield
    /// two candidates.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let candidates = raw
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Locator::parse)
            .collect();
        Self { candidates }
    }

    /// The alternatives in preference order
    #[must_use]
    pub fn candidates(&self) -> &[Locator] {
        &self.candidates
    }

    /// The most-preferred alternative
    #[must_use]
    pub fn first(&self) -> Option<&Locator> {
        self.candidates.first()
    }

    /// Number of alternatives
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True when no alternatives were given
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Iterate the alternatives in preference order
    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.candidates.iter()
    }
}

impl fmt::Display for LocatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.candidates.iter().map(Locator::raw).collect();
        write!(f, "{}", joined.join(" | "))
    }
}

impl From<LocatorSet> for String {
    fn from(set: LocatorSet) -> Self {
        set.to_string()
    }
}

impl From<String> for LocatorSet {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// A successfully located element together with the locator that found it
#[derive(Debug, Clone)]
pub struct ResolvedElement {
    /// The winning locator alternative
    pub locator: Locator,
    /// Handle to the located element
    pub element: ElementHandle,
}

/// Locate an element by walking the alternatives in order.
///
/// Per candidate, three strategies escalate back to back, each with its own
/// timeout: a clickable wait (visible, enabled, in viewport), a visible-only
/// wait, and a tolerant polling loop that keeps probing through transient
/// driver errors up to a longer ceiling. The first strategy to produce an
/// element wins and later candidates are never consulted. When every strategy
/// of every candidate has failed, the error carries the full alternative
/// list.
///
/// # Errors
///
/// [`EngineError::InvalidStep`] when the set is empty and
/// [`EngineError::ElementNotFound`] when no alternative matched.
pub async fn resolve<D: PageDriver + ?Sized>(
    driver: &mut D,
    set: &LocatorSet,
    policy: &WaitPolicy,
) -> EngineResult<ResolvedElement> {
    if set.is_empty() {
        return Err(EngineError::InvalidStep {
            message: "step has no locator alternatives".to_string(),
        });
    }

    for locator in set.iter() {
        match wait_clickable(driver, locator, policy).await {
            Ok(Some(element)) => {
                debug!(locator = %locator, "resolved by clickable wait");
                return Ok(ResolvedElement {
                    locator: locator.clone(),
                    element,
                });
            }
            Ok(None) => debug!(locator = %locator, "clickable wait timed out"),
            Err(error) => debug!(locator = %locator, %error, "clickable wait aborted"),
        }

        match wait_visible(driver, locator, policy).await {
            Ok(Some(element)) => {
                debug!(locator = %locator, "resolved by visibility wait");
                return Ok(ResolvedElement {
                    locator: locator.clone(),
                    element,
                });
            }
            Ok(None) => debug!(locator = %locator, "visibility wait timed out"),
            Err(error) => debug!(locator = %locator, %error, "visibility wait aborted"),
        }

        if let Some(element) = poll_displayed(driver, locator, policy).await {
            debug!(locator = %locator, "resolved by tolerant polling");
            return Ok(ResolvedElement {
                locator: locator.clone(),
                element,
            });
        }
        debug!(locator = %locator, "all strategies exhausted, trying next alternative");
    }

    Err(EngineError::ElementNotFound {
        locator: set.to_string(),
    })
}

/// Re-query for a handle after a probe accepted the element. Probes answer
/// from the live DOM, so a failed or empty re-query still synthesizes a
/// handle from the locator rather than discarding the acceptance.
async fn handle_for<D: PageDriver + ?Sized>(driver: &mut D, locator: &Locator) -> ElementHandle {
    match driver.query(locator).await {
        Ok(Some(element)) => element,
        Ok(None) | Err(_) => ElementHandle::new(locator.raw(), "unknown"),
    }
}

/// Wait for the element to be clickable. A probe error aborts the wait so
/// the caller can escalate to the next strategy.
pub(crate) async fn wait_clickable<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    policy: &WaitPolicy,
) -> EngineResult<Option<ElementHandle>> {
    let deadline = Instant::now() + policy.wait_timeout();
    loop {
        if driver.is_clickable(locator).await? {
            return Ok(Some(handle_for(driver, locator).await));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        settle(policy.poll_interval_ms).await;
    }
}

/// Wait for the element to be visible, ignoring enablement and viewport
/// position. A probe error aborts the wait.
async fn wait_visible<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    policy: &WaitPolicy,
) -> EngineResult<Option<ElementHandle>> {
    let deadline = Instant::now() + policy.wait_timeout();
    loop {
        if driver.is_visible(locator).await? {
            return Ok(Some(handle_for(driver, locator).await));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        settle(policy.poll_interval_ms).await;
    }
}

/// Poll for a present and displayed element up to the polling ceiling,
/// swallowing probe errors between attempts.
async fn poll_displayed<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    policy: &WaitPolicy,
) -> Option<ElementHandle> {
    let deadline = Instant::now() + policy.poll_ceiling();
    loop {
        if let Ok(Some(element)) = driver.query(locator).await {
            if matches!(driver.is_visible(locator).await, Ok(true)) {
                return Some(element);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        settle(policy.poll_interval_ms.max(1)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};

    mod locator_tests {
        use super::*;

        #[test]
        fn test_css_classification() {
            assert_eq!(Locator::parse("#fromCity").kind(), LocatorKind::Css);
            assert_eq!(Locator::parse(".search-btn").kind(), LocatorKind::Css);
            assert_eq!(Locator::parse("button[type='submit']").kind(), LocatorKind::Css);
            assert_eq!(Locator::parse("div > span").kind(), LocatorKind::Css);
        }

        #[test]
        fn test_xpath_classification() {
            assert!(Locator::parse("//input[@id='from']").is_xpath());
            assert!(Locator::parse("/html/body/div").is_xpath());
            assert!(Locator::parse("(//button)[2]").is_xpath());
            assert!(Locator::parse(".//span[@class='price']").is_xpath());
        }

        #[test]
        fn test_parse_trims_whitespace() {
            let locator = Locator::parse("  #from  ");
            assert_eq!(locator.raw(), "#from");
            assert_eq!(locator.kind(), LocatorKind::Css);
        }

        #[test]
        fn test_leading_space_before_xpath_still_xpath() {
            assert!(Locator::parse("  //div[@role='listbox']").is_xpath());
        }

        #[test]
        fn test_css_query_generation() {
            let query = Locator::parse("#search").to_query();
            assert_eq!(query, "document.querySelector(\"#search\")");
        }

        #[test]
        fn test_xpath_query_generation() {
            let query = Locator::parse("//button[text()='Search']").to_query();
            assert!(query.starts_with("document.evaluate("));
            assert!(query.contains("FIRST_ORDERED_NODE_TYPE"));
            assert!(query.ends_with(".singleNodeValue"));
        }

        #[test]
        fn test_query_escapes_quotes() {
            let query = Locator::parse("input[placeholder=\"From\"]").to_query();
            assert!(query.contains("\\\"From\\\""));
        }
    }

    mod locator_set_tests {
        use super::*;

        #[test]
        fn test_parse_preserves_order() {
            let set = LocatorSet::parse("#from | //input[@id='from'] | .from-field");
            assert_eq!(set.len(), 3);
            assert_eq!(set.candidates()[0].raw(), "#from");
            assert_eq!(set.candidates()[1].raw(), "//input[@id='from']");
            assert_eq!(set.candidates()[2].raw(), ".from-field");
        }

        #[test]
        fn test_parse_skips_empty_segments() {
            let set = LocatorSet::parse("#a||#b| ");
            assert_eq!(set.len(), 2);
            assert_eq!(set.first().unwrap().raw(), "#a");
        }

        #[test]
        fn test_empty_string_gives_empty_set() {
            assert!(LocatorSet::parse("").is_empty());
            assert!(LocatorSet::parse("  |  ").is_empty());
        }

        #[test]
        fn test_display_joins_with_pipes() {
            let set = LocatorSet::parse("#a|//b");
            assert_eq!(set.to_string(), "#a | //b");
        }

        #[test]
        fn test_serde_round_trip() {
            let set = LocatorSet::parse("#from | //input[@id='from']");
            let json = serde_json::to_string(&set).unwrap();
            assert_eq!(json, "\"#from | //input[@id='from']\"");
            let back: LocatorSet = serde_json::from_str(&json).unwrap();
            assert_eq!(back, set);
        }
    }

    mod locator_property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Catalog rows are free text, so parse must hold its invariants
            // on anything
            #[test]
            fn prop_parse_candidates_are_trimmed_and_non_empty(raw in ".{0,120}") {
                let set = LocatorSet::parse(&raw);
                for candidate in set.iter() {
                    prop_assert!(!candidate.raw().is_empty());
                    prop_assert_eq!(candidate.raw(), candidate.raw().trim());
                    prop_assert!(!candidate.raw().contains('|'));
                }
            }

            #[test]
            fn prop_kind_matches_leading_syntax(raw in "[/(.#a-z][a-z0-9/@\\[\\]'=-]{0,40}") {
                let locator = Locator::parse(raw.as_str());
                let text = locator.raw();
                let xpath = text.starts_with('/')
                    || text.starts_with('(')
                    || text.starts_with(".//");
                prop_assert_eq!(locator.is_xpath(), xpath);
            }
        }
    }

    mod resolve_tests {
        use super::*;

        fn policy() -> WaitPolicy {
            WaitPolicy::immediate()
        }

        #[tokio::test]
        async fn test_first_candidate_resolves_by_clickable_wait() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#from", "input"));
            let set = LocatorSet::parse("#from | .from-fallback");

            let resolved = resolve(&mut driver, &set, &policy()).await.unwrap();
            assert_eq!(resolved.locator.raw(), "#from");
            assert_eq!(resolved.element.tag_name, "input");
            // The first candidate satisfied the clickable wait, so the
            // fallback was never probed
            assert!(!driver.was_called("is_clickable:.from-fallback"));
        }

        #[tokio::test]
        async fn test_disabled_element_resolves_by_visibility_wait() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#search", "button").disabled());
            let set = LocatorSet::parse("#search");

            let resolved = resolve(&mut driver, &set, &policy()).await.unwrap();
            assert_eq!(resolved.locator.raw(), "#search");
            assert!(driver.was_called("is_visible:#search"));
        }

        #[tokio::test]
        async fn test_hidden_element_is_not_found() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#banner", "div").hidden());
            let set = LocatorSet::parse("#banner");

            let error = resolve(&mut driver, &set, &policy()).await.unwrap_err();
            assert!(matches!(error, EngineError::ElementNotFound { .. }));
        }

        #[tokio::test]
        async fn test_falls_back_to_second_candidate() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("//input[@id='to']", "input"));
            let set = LocatorSet::parse("#to | //input[@id='to']");

            let resolved = resolve(&mut driver, &set, &policy()).await.unwrap();
            assert_eq!(resolved.locator.raw(), "//input[@id='to']");
            assert!(resolved.locator.is_xpath());
        }

        #[tokio::test]
        async fn test_clickable_probe_error_escalates_to_visibility() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#flaky", "button"));
            driver.fail_clickable("#flaky");
            let set = LocatorSet::parse("#flaky");

            let resolved = resolve(&mut driver, &set, &policy()).await.unwrap();
            assert_eq!(resolved.locator.raw(), "#flaky");
            assert!(driver.was_called("is_visible:#flaky"));
        }

        #[tokio::test]
        async fn test_handle_synthesized_when_requery_fails() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#ghost", "button"));
            driver.fail_query("#ghost");
            let set = LocatorSet::parse("#ghost");

            let resolved = resolve(&mut driver, &set, &policy()).await.unwrap();
            assert_eq!(resolved.element.id, "#ghost");
            assert_eq!(resolved.element.tag_name, "unknown");
        }

        #[tokio::test]
        async fn test_all_candidates_exhausted_reports_full_set() {
            let mut driver = MockDriver::new();
            let set = LocatorSet::parse("#a | #b");

            let error = resolve(&mut driver, &set, &policy()).await.unwrap_err();
            match error {
                EngineError::ElementNotFound { locator } => {
                    assert_eq!(locator, "#a | #b");
                }
                other => panic!("expected ElementNotFound, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_empty_set_is_invalid_step() {
            let mut driver = MockDriver::new();
            let set = LocatorSet::parse("");

            let error = resolve(&mut driver, &set, &policy()).await.unwrap_err();
            assert!(matches!(error, EngineError::InvalidStep { .. }));
        }

        #[tokio::test]
        async fn test_wait_clickable_times_out_on_missing_element() {
            let mut driver = MockDriver::new();
            let locator = Locator::parse("#missing");

            let outcome = wait_clickable(&mut driver, &locator, &policy())
                .await
                .unwrap();
            assert!(outcome.is_none());
            assert!(driver.call_count("is_clickable:#missing") >= 1);
        }

        #[tokio::test]
        async fn test_wait_visible_times_out_on_hidden_element() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#hidden", "div").hidden());
            let locator = Locator::parse("#hidden");

            let outcome = wait_visible(&mut driver, &locator, &policy()).await.unwrap();
            assert!(outcome.is_none());
        }

        #[tokio::test]
        async fn test_wait_visible_aborts_on_probe_error() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#err", "div"));
            driver.fail_visibility("#err");
            let locator = Locator::parse("#err");

            assert!(wait_visible(&mut driver, &locator, &policy()).await.is_err());
        }

        #[tokio::test]
        async fn test_poll_displayed_swallows_probe_errors() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#err", "div"));
            driver.fail_visibility("#err");
            let locator = Locator::parse("#err");

            // Visibility probes error on every attempt; the tolerant loop
            // keeps polling until the ceiling instead of bailing out
            let outcome = poll_displayed(&mut driver, &locator, &policy()).await;
            assert!(outcome.is_none());
            assert!(driver.call_count("is_visible:#err") >= 2);
        }
    }
}
