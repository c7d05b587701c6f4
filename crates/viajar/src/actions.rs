//! Resilient low-level page interactions.
//!
//! Every primitive is generic over [`PageDriver`] so the same code paths run
//! against a live browser or the mock. Clicks and text entry escalate through
//! fallback strategies before failing; cosmetic aids (scroll, highlight,
//! clear) never raise and instead return a success flag the caller may
//! ignore.

use crate::driver::{Key, PageDriver};
use crate::locator::{wait_clickable, Locator, LocatorSet};
use crate::params::is_truthy;
use crate::result::{EngineError, EngineResult};
use crate::wait::{settle, WaitPolicy};
use tracing::{debug, warn};

/// Settle after scrolling, before each click attempt
pub(crate) const CLICK_SETTLE_MS: u64 = 200;
/// Pause between failed click attempts
pub(crate) const CLICK_RETRY_GAP_MS: u64 = 300;
/// Settle after a robust clear, before typing
pub(crate) const CLEAR_SETTLE_MS: u64 = 200;
/// Per-character delay while typing
pub(crate) const CHAR_DELAY_MS: u64 = 50;
/// Settle after typing and dispatching events
pub(crate) const TEXT_SETTLE_MS: u64 = 300;
/// Settle after a standalone scroll-into-view
pub(crate) const SCROLL_SETTLE_MS: u64 = 300;
/// How long the highlight border stays on
pub(crate) const HIGHLIGHT_FLASH_MS: u64 = 300;
/// Clickable-wait ceiling for checkbox lookup
pub(crate) const CHECKBOX_WAIT_MS: u64 = 3_000;
/// Settle after toggling a checkbox
pub(crate) const CHECKBOX_TOGGLE_SETTLE_MS: u64 = 100;

/// Click strategies in escalation order
#[derive(Debug, Clone, Copy)]
enum ClickStrategy {
    Native,
    Script,
    Pointer,
}

impl ClickStrategy {
    const ALL: [Self; 3] = [Self::Native, Self::Script, Self::Pointer];

    const fn name(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Script => "script",
            Self::Pointer => "pointer",
        }
    }
}

/// Click an element, escalating through native, script-dispatched and
/// pointer-simulated clicks.
///
/// Each attempt scrolls the element into view (failure swallowed) and
/// settles briefly first; failed attempts pause before the next strategy.
/// When all three strategies fail, only the last attempt's cause is
/// reported.
///
/// # Errors
///
/// [`EngineError::ActionFailed`] when every strategy failed.
pub async fn robust_click<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
) -> EngineResult<()> {
    let mut last_cause = String::new();
    for (attempt, strategy) in ClickStrategy::ALL.iter().enumerate() {
        if let Err(error) = driver.scroll_into_view(locator).await {
            debug!(locator = %locator, %error, "pre-click scroll failed");
        }
        settle(CLICK_SETTLE_MS).await;

        let outcome = match strategy {
            ClickStrategy::Native => driver.click_native(locator).await,
            ClickStrategy::Script => driver.click_script(locator).await,
            ClickStrategy::Pointer => driver.click_pointer(locator).await,
        };
        match outcome {
            Ok(()) => {
                debug!(locator = %locator, strategy = strategy.name(), "click succeeded");
                return Ok(());
            }
            Err(error) => {
                debug!(
                    locator = %locator,
                    strategy = strategy.name(),
                    %error,
                    "click attempt failed"
                );
                last_cause = error.to_string();
                if attempt + 1 < ClickStrategy::ALL.len() {
                    settle(CLICK_RETRY_GAP_MS).await;
                }
            }
        }
    }
    Err(EngineError::ActionFailed {
        action: "click".to_string(),
        message: format!("all click strategies failed on {locator}: {last_cause}"),
    })
}

/// Clear a field and type `text` character by character, then dispatch
/// synthetic `input`/`change` events so the SPA notices the edit.
///
/// Any failure on that path falls back to assigning the value directly plus
/// the same synthetic events, so the field still ends in the desired state.
///
/// # Errors
///
/// [`EngineError::ActionFailed`] when the direct-assignment fallback fails
/// too.
pub async fn enter_text<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    text: &str,
) -> EngineResult<()> {
    match type_with_events(driver, locator, text).await {
        Ok(()) => Ok(()),
        Err(error) => {
            warn!(locator = %locator, %error, "char typing failed, assigning value directly");
            assign_value(driver, locator, text)
                .await
                .map_err(|fallback| EngineError::ActionFailed {
                    action: "text input".to_string(),
                    message: format!("typing and direct assignment both failed on {locator}: {fallback}"),
                })
        }
    }
}

async fn type_with_events<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    text: &str,
) -> EngineResult<()> {
    let _ = best_effort_clear(driver, locator).await;
    settle(CLEAR_SETTLE_MS).await;
    driver.type_text(locator, text, CHAR_DELAY_MS).await?;
    driver.dispatch_events(locator, &["input", "change"]).await?;
    settle(TEXT_SETTLE_MS).await;
    Ok(())
}

async fn assign_value<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    text: &str,
) -> EngineResult<()> {
    driver.set_value(locator, text).await?;
    driver.dispatch_events(locator, &["input", "change"]).await?;
    Ok(())
}

/// Empty a field using every available technique: native clear, select-all
/// plus delete, and a forced empty value. Never raises; the flag reports
/// whether the whole sequence went through.
pub async fn best_effort_clear<D: PageDriver + ?Sized>(driver: &mut D, locator: &Locator) -> bool {
    if let Err(error) = clear_sequence(driver, locator).await {
        warn!(locator = %locator, %error, "clear failed");
        return false;
    }
    true
}

async fn clear_sequence<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
) -> EngineResult<()> {
    driver.clear(locator).await?;
    driver
        .press_keys(locator, &[Key::SelectAll, Key::Delete])
        .await?;
    driver.set_value(locator, "").await?;
    Ok(())
}

/// Scroll the element to the center of the viewport and settle. Never
/// raises; the flag reports whether the scroll went through.
pub async fn best_effort_scroll<D: PageDriver + ?Sized>(driver: &mut D, locator: &Locator) -> bool {
    match driver.scroll_into_view(locator).await {
        Ok(()) => {
            settle(SCROLL_SETTLE_MS).await;
            true
        }
        Err(error) => {
            warn!(locator = %locator, %error, "scroll into view failed");
            false
        }
    }
}

/// Flash a red border around the element so a watching human can follow the
/// run. Never raises; the flag reports whether both style flips went
/// through.
pub async fn best_effort_highlight<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
) -> bool {
    if let Err(error) = highlight_sequence(driver, locator).await {
        warn!(locator = %locator, %error, "highlight failed");
        return false;
    }
    true
}

async fn highlight_sequence<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
) -> EngineResult<()> {
    let query = locator.to_query();
    let apply =
        format!("(() => {{ const el = {query}; if (el) el.style.border = '3px solid red'; }})()");
    let restore = format!("(() => {{ const el = {query}; if (el) el.style.border = ''; }})()");
    driver.eval(&apply).await?;
    settle(HIGHLIGHT_FLASH_MS).await;
    driver.eval(&restore).await?;
    Ok(())
}

/// Drive a checkbox to the state named by `value` (truthy spellings: TRUE,
/// 1, YES). Reads the current state first and only toggles on a mismatch, so
/// repeated applications are no-ops. Returns whether a toggle happened.
///
/// # Errors
///
/// [`EngineError::ElementNotFound`] when no candidate becomes clickable
/// within the short checkbox wait, [`EngineError::ActionFailed`] when the
/// state read or the toggle click fails.
pub async fn set_checkbox<D: PageDriver + ?Sized>(
    driver: &mut D,
    locators: &LocatorSet,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<bool> {
    let desired = is_truthy(value);
    let locator = resolve_checkbox(driver, locators, policy).await?;
    let current = driver
        .is_checked(&locator)
        .await
        .map_err(|error| checkbox_failed(&locator, &error))?;
    if current == desired {
        debug!(locator = %locator, desired, "checkbox already in desired state");
        return Ok(false);
    }
    driver
        .click_script(&locator)
        .await
        .map_err(|error| checkbox_failed(&locator, &error))?;
    settle(CHECKBOX_TOGGLE_SETTLE_MS).await;
    debug!(locator = %locator, desired, "checkbox toggled");
    Ok(true)
}

fn checkbox_failed(locator: &Locator, error: &EngineError) -> EngineError {
    EngineError::ActionFailed {
        action: "checkbox set".to_string(),
        message: format!("checkbox interaction failed on {locator}: {error}"),
    }
}

/// Locate the checkbox to operate on.
///
/// A candidate mentioning `fc-checkbox` tries the `#fc-checkbox` id lookup
/// first; every candidate then gets a short clickable wait. Probe errors
/// count as misses.
async fn resolve_checkbox<D: PageDriver + ?Sized>(
    driver: &mut D,
    locators: &LocatorSet,
    policy: &WaitPolicy,
) -> EngineResult<Locator> {
    if locators.is_empty() {
        return Err(EngineError::InvalidStep {
            message: "checkbox step has no locator alternatives".to_string(),
        });
    }
    let short = policy
        .clone()
        .with_wait_timeout(policy.wait_timeout_ms.min(CHECKBOX_WAIT_MS));
    for candidate in locators.iter() {
        if candidate.raw().contains("fc-checkbox") {
            let by_id = Locator::parse("#fc-checkbox");
            if let Ok(Some(_)) = wait_clickable(driver, &by_id, &short).await {
                return Ok(by_id);
            }
        }
        if let Ok(Some(_)) = wait_clickable(driver, candidate, &short).await {
            return Ok(candidate.clone());
        }
    }
    Err(EngineError::ElementNotFound {
        locator: locators.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};

    fn policy() -> WaitPolicy {
        WaitPolicy::immediate()
    }

    mod robust_click_tests {
        use super::*;

        #[tokio::test]
        async fn test_native_click_succeeds_first() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#btn", "button"));
            let locator = Locator::parse("#btn");

            robust_click(&mut driver, &locator).await.unwrap();
            assert_eq!(driver.call_count("click_native"), 1);
            assert_eq!(driver.call_count("click_script"), 0);
            assert_eq!(driver.call_count("click_pointer"), 0);
            assert!(driver.was_called("scroll_into_view:#btn"));
        }

        #[tokio::test]
        async fn test_falls_back_to_script_click() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#btn", "button"));
            driver.fail_native_click("#btn");
            let locator = Locator::parse("#btn");

            robust_click(&mut driver, &locator).await.unwrap();
            assert_eq!(driver.call_count("click_native"), 1);
            assert_eq!(driver.call_count("click_script"), 1);
            assert_eq!(driver.call_count("click_pointer"), 0);
        }

        #[tokio::test]
        async fn test_falls_back_to_pointer_click() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#btn", "button"));
            driver.fail_native_click("#btn");
            driver.fail_script_click("#btn");
            let locator = Locator::parse("#btn");

            robust_click(&mut driver, &locator).await.unwrap();
            assert_eq!(driver.call_count("click_pointer"), 1);
        }

        #[tokio::test]
        async fn test_exhaustion_reports_last_cause() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#btn", "button"));
            driver.fail_native_click("#btn");
            driver.fail_script_click("#btn");
            driver.fail_pointer_click("#btn");
            let locator = Locator::parse("#btn");

            let error = robust_click(&mut driver, &locator).await.unwrap_err();
            match error {
                EngineError::ActionFailed { action, message } => {
                    assert_eq!(action, "click");
                    assert!(message.contains("pointer click failed"));
                }
                other => panic!("expected ActionFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_scroll_failure_does_not_block_click() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#btn", "button"));
            driver.fail_scroll("#btn");
            let locator = Locator::parse("#btn");

            robust_click(&mut driver, &locator).await.unwrap();
            assert_eq!(driver.call_count("click_native"), 1);
        }
    }

    mod enter_text_tests {
        use super::*;

        #[tokio::test]
        async fn test_happy_path_clears_types_and_dispatches() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#from", "input"));
            let locator = Locator::parse("#from");

            enter_text(&mut driver, &locator, "New Delhi").await.unwrap();
            assert!(driver.was_called("clear:#from"));
            assert!(driver.was_called("press_keys:#from:SelectAll+Delete"));
            assert!(driver.was_called("type_text:#from:New Delhi"));
            assert!(driver.was_called("dispatch_events:#from:input+change"));
            assert_eq!(driver.element("#from").unwrap().value, "New Delhi");
        }

        #[tokio::test]
        async fn test_typing_failure_falls_back_to_direct_assignment() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#from", "input"));
            driver.fail_typing("#from");
            let locator = Locator::parse("#from");

            enter_text(&mut driver, &locator, "Mumbai").await.unwrap();
            // The fallback assigned the full value and dispatched events once
            assert!(driver.was_called("set_value:#from:Mumbai"));
            assert_eq!(driver.call_count("dispatch_events"), 1);
            assert_eq!(driver.element("#from").unwrap().value, "Mumbai");
        }

        #[tokio::test]
        async fn test_clear_failure_does_not_stop_typing() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#from", "input"));
            driver.fail_clear("#from");
            let locator = Locator::parse("#from");

            enter_text(&mut driver, &locator, "Goa").await.unwrap();
            assert!(driver.was_called("type_text:#from:Goa"));
        }
    }

    mod best_effort_tests {
        use super::*;

        #[tokio::test]
        async fn test_clear_reports_success() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#field", "input"));
            let locator = Locator::parse("#field");

            assert!(best_effort_clear(&mut driver, &locator).await);
            assert!(driver.was_called("set_value:#field:"));
        }

        #[tokio::test]
        async fn test_clear_reports_failure_without_raising() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#field", "input"));
            driver.fail_clear("#field");
            let locator = Locator::parse("#field");

            assert!(!best_effort_clear(&mut driver, &locator).await);
        }

        #[tokio::test]
        async fn test_scroll_reports_flag_both_ways() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#a", "div"));
            driver.add_element(MockElement::new("#b", "div"));
            driver.fail_scroll("#b");

            assert!(best_effort_scroll(&mut driver, &Locator::parse("#a")).await);
            assert!(!best_effort_scroll(&mut driver, &Locator::parse("#b")).await);
        }

        #[tokio::test]
        async fn test_highlight_applies_and_restores_border() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#cell", "td"));
            let locator = Locator::parse("#cell");

            assert!(best_effort_highlight(&mut driver, &locator).await);
            let evals: Vec<&String> = driver
                .history()
                .iter()
                .filter(|c| c.starts_with("eval:"))
                .collect();
            assert_eq!(evals.len(), 2);
            assert!(evals[0].contains("3px solid red"));
            assert!(evals[1].contains("el.style.border = ''"));
        }
    }

    mod set_checkbox_tests {
        use super::*;

        #[tokio::test]
        async fn test_truthy_value_checks_unchecked_box() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#terms", "input"));
            let locators = LocatorSet::parse("#terms");

            let toggled = set_checkbox(&mut driver, &locators, "TRUE", &policy())
                .await
                .unwrap();
            assert!(toggled);
            assert_eq!(driver.call_count("click_script"), 1);
            assert!(driver.element("#terms").unwrap().checked);
        }

        #[tokio::test]
        async fn test_second_application_is_a_no_op() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#terms", "input"));
            let locators = LocatorSet::parse("#terms");

            assert!(set_checkbox(&mut driver, &locators, "yes", &policy()).await.unwrap());
            assert!(!set_checkbox(&mut driver, &locators, "yes", &policy()).await.unwrap());
            // One toggle in total; the second application read state and left
            // the page untouched
            assert_eq!(driver.call_count("click_script"), 1);
            assert!(driver.element("#terms").unwrap().checked);
        }

        #[tokio::test]
        async fn test_falsy_value_on_unchecked_box_is_a_no_op() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#terms", "input"));
            let locators = LocatorSet::parse("#terms");

            let toggled = set_checkbox(&mut driver, &locators, "FALSE", &policy())
                .await
                .unwrap();
            assert!(!toggled);
            assert_eq!(driver.call_count("click_script"), 0);
        }

        #[tokio::test]
        async fn test_fc_checkbox_candidate_prefers_id_lookup() {
            let mut driver = MockDriver::new();
            driver.add_element(MockElement::new("#fc-checkbox", "input"));
            let locators = LocatorSet::parse("//label[contains(@class,'fc-checkbox')]");

            let toggled = set_checkbox(&mut driver, &locators, "1", &policy())
                .await
                .unwrap();
            assert!(toggled);
            assert!(driver.was_called("click_script:#fc-checkbox"));
        }

        #[tokio::test]
        async fn test_no_clickable_candidate_is_not_found() {
            let mut driver = MockDriver::new();
            let locators = LocatorSet::parse("#missing | .also-missing");

            let error = set_checkbox(&mut driver, &locators, "TRUE", &policy())
                .await
                .unwrap_err();
            assert!(matches!(error, EngineError::ElementNotFound { .. }));
        }

        #[tokio::test]
        async fn test_empty_locator_set_is_invalid_step() {
            let mut driver = MockDriver::new();
            let locators = LocatorSet::parse("");

            let error = set_checkbox(&mut driver, &locators, "TRUE", &policy())
                .await
                .unwrap_err();
            assert!(matches!(error, EngineError::InvalidStep { .. }));
        }
    }
}
