//! Step dispatch: routing plus the high-level page behaviors.
//!
//! [`route`] is a pure function of the step's action, its normalized element
//! role and the resolved value; it returns the [`Behavior`] to run.
//! [`perform`] routes and then drives the behavior against the page. Unknown
//! action types and age steps without a child index are logged and treated as
//! successful no-ops so a newer catalog row never kills an older engine.

use crate::actions::{enter_text, robust_click, set_checkbox};
use crate::driver::{Key, PageDriver};
use crate::locator::{resolve, Locator, LocatorSet};
use crate::result::{EngineError, EngineResult};
use crate::step::{ActionType, ElementRole, StepDefinition};
use crate::wait::{settle, WaitPolicy};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Settle after a completed page interaction
pub(crate) const POST_ACTION_SETTLE_MS: u64 = 300;
/// Wait for autocomplete suggestions after typing a city
pub(crate) const SUGGESTION_WAIT_MS: u64 = 800;
/// Wait for the calendar widget to render after opening it
pub(crate) const CALENDAR_RENDER_MS: u64 = 500;
/// Settle between counter increments
pub(crate) const COUNTER_SETTLE_MS: u64 = 200;
/// Extra increment attempts past the arithmetic minimum
const COUNTER_ATTEMPT_SLACK: u32 = 2;

/// JavaScript expression counting rendered child age dropdowns
const AGE_DROPDOWN_COUNT_QUERY: &str =
    "document.querySelectorAll(\"select[id*='child-age']\").length";

// =============================================================================
// ROUTING
// =============================================================================

/// Date shortcut the quick-date widgets expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOption {
    /// Today's date
    Today,
    /// Tomorrow's date
    Tomorrow,
    /// The day after tomorrow
    DayAfterTomorrow,
}

impl DateOption {
    /// Recognize a date shortcut in a resolved value.
    ///
    /// Today and Tomorrow match exactly (case-insensitive); the day-after
    /// variant also matches any value containing "day after".
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        if upper.contains("DAY AFTER") || upper == "DAY-AFTER-TOMORROW" {
            return Some(Self::DayAfterTomorrow);
        }
        match upper.as_str() {
            "TODAY" => Some(Self::Today),
            "TOMORROW" => Some(Self::Tomorrow),
            _ => None,
        }
    }

    /// Visible labels the shortcut control may carry
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Today => &["Today"],
            Self::Tomorrow => &["Tomorrow"],
            Self::DayAfterTomorrow => &["Day After Tomorrow", "Day-After-Tomorrow"],
        }
    }
}

/// Traveller counter family in the search widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Adult passengers
    Adult,
    /// Child passengers
    Children,
    /// Hotel rooms
    Room,
}

impl CounterKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Adult => "adult",
            Self::Children => "children",
            Self::Room => "room",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Adult => "Adults",
            Self::Children => "Children",
            Self::Room => "Rooms",
        }
    }

    /// Candidates for the counter's increment control
    #[must_use]
    pub fn increment_locators(self) -> LocatorSet {
        LocatorSet::parse(&format!(
            "[data-testid='{}-increment'] | //p[contains(text(),'{}')]/following::button[1]",
            self.as_str(),
            self.label()
        ))
    }

    /// Candidates for the counter's displayed count
    #[must_use]
    pub fn count_locators(self) -> LocatorSet {
        LocatorSet::parse(&format!(
            "[data-testid='{}-count'] | //p[contains(text(),'{}')]/following::span[1]",
            self.as_str(),
            self.label()
        ))
    }
}

/// The behavior a step routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Navigate the session to the resolved URL and wait for the SPA
    Navigate,
    /// City autocomplete: click, type, pick a suggestion
    CityAutocomplete,
    /// Resolve and robust-click the step's element
    GenericClick,
    /// Open the calendar and pick a day cell
    DatePicker,
    /// Click a date shortcut control
    QuickDate(DateOption),
    /// Click a date shortcut inside the bus date widget
    BusQuickDate(DateOption),
    /// Open the class selector and pick the matching option
    TravelClassSelect,
    /// Close the travellers popup, tolerating its absence
    DismissTravellersPopup,
    /// Converge a traveller counter onto the target count
    Counter(CounterKind),
    /// Counter flow against the step's own locators
    GenericCount,
    /// Set the age dropdown for the numbered child
    ChildAge(u32),
    /// Drive a checkbox to the requested state
    CheckboxSet,
    /// Logged no-op
    Ignored(&'static str),
}

fn name_mentions_bus(element_name: &str) -> bool {
    element_name.to_ascii_lowercase().contains("bus")
}

/// Route a step to its behavior.
///
/// Pure: no page access, no logging. The same action type can route
/// differently by element role or by the resolved value.
#[must_use]
pub fn route(step: &StepDefinition, value: &str) -> Behavior {
    let role = step.role();
    match &step.action {
        ActionType::OpenBrowser => Behavior::Navigate,
        ActionType::ClickAndSelect => {
            if role.is_city_field() {
                Behavior::CityAutocomplete
            } else {
                Behavior::GenericClick
            }
        }
        ActionType::ClickAndSelectDate => Behavior::DatePicker,
        ActionType::ClickQuickDate => {
            let option = DateOption::parse(value).unwrap_or(DateOption::Tomorrow);
            match option {
                DateOption::Today => Behavior::BusQuickDate(option),
                DateOption::Tomorrow if name_mentions_bus(&step.element_name) => {
                    Behavior::BusQuickDate(option)
                }
                _ => Behavior::QuickDate(option),
            }
        }
        ActionType::ClickBusQuickDate => {
            Behavior::BusQuickDate(DateOption::parse(value).unwrap_or(DateOption::Tomorrow))
        }
        ActionType::Click => match role {
            ElementRole::TravelClass => Behavior::TravelClassSelect,
            ElementRole::DoneButton => Behavior::DismissTravellersPopup,
            _ => match DateOption::parse(value) {
                Some(DateOption::Tomorrow) if name_mentions_bus(&step.element_name) => {
                    Behavior::BusQuickDate(DateOption::Tomorrow)
                }
                Some(option) => Behavior::QuickDate(option),
                None => Behavior::GenericClick,
            },
        },
        ActionType::SelectCount => match role {
            ElementRole::RoomsCount => Behavior::Counter(CounterKind::Room),
            ElementRole::AdultsCount => Behavior::Counter(CounterKind::Adult),
            ElementRole::ChildrenCount => Behavior::Counter(CounterKind::Children),
            _ => Behavior::GenericCount,
        },
        ActionType::ClickAndSelectAge => match role {
            ElementRole::Child(n) => Behavior::ChildAge(n),
            _ => Behavior::Ignored("age step without a child index"),
        },
        ActionType::HandleCheckbox => Behavior::CheckboxSet,
        ActionType::Other(_) => Behavior::Ignored("unknown action type"),
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Route and run one step against the page.
///
/// # Errors
///
/// Surfaces the behavior's failure: [`EngineError::ElementNotFound`],
/// [`EngineError::ActionFailed`] or [`EngineError::InvalidStep`] at the step
/// level.
pub async fn perform<D: PageDriver + ?Sized>(
    driver: &mut D,
    step: &StepDefinition,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let behavior = route(step, value);
    debug!(
        action = %step.action,
        element = %step.element_name,
        ?behavior,
        "dispatching step"
    );
    match behavior {
        Behavior::Navigate => navigate_and_settle(driver, value, policy).await,
        Behavior::CityAutocomplete => city_autocomplete(driver, step, value, policy).await,
        Behavior::GenericClick => click_element(driver, &step.locators, policy).await,
        Behavior::DatePicker => pick_calendar_date(driver, step, value, policy).await,
        Behavior::QuickDate(option) => {
            click_element(driver, &quick_date_locators(option, false), policy).await
        }
        Behavior::BusQuickDate(option) => {
            click_element(driver, &quick_date_locators(option, true), policy).await
        }
        Behavior::TravelClassSelect => select_travel_class(driver, step, value, policy).await,
        Behavior::DismissTravellersPopup => dismiss_travellers_popup(driver, step, policy).await,
        Behavior::Counter(kind) => set_counter(driver, kind, value, policy).await,
        Behavior::GenericCount => set_generic_count(driver, step, value, policy).await,
        Behavior::ChildAge(child) => select_child_age(driver, child, value, policy).await,
        Behavior::CheckboxSet => set_checkbox(driver, &step.locators, value, policy)
            .await
            .map(|_| ()),
        Behavior::Ignored(reason) => {
            warn!(
                action = %step.action,
                element = %step.element_name,
                reason,
                "step ignored"
            );
            Ok(())
        }
    }
}

// =============================================================================
// BEHAVIORS
// =============================================================================

async fn navigate_and_settle<D: PageDriver + ?Sized>(
    driver: &mut D,
    url: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    info!(url, "navigating");
    driver.navigate(url).await?;
    wait_for_spa_ready(driver, policy).await;
    Ok(())
}

/// Wait for the document to report readiness, then give the SPA an extra
/// settle for client-side rendering. Never fails: a stubborn page is the
/// next step's problem.
async fn wait_for_spa_ready<D: PageDriver + ?Sized>(driver: &mut D, policy: &WaitPolicy) {
    let deadline = Instant::now() + policy.wait_timeout();
    loop {
        match driver.eval("document.readyState").await {
            Ok(state) if state == serde_json::json!("complete") => break,
            Ok(_) | Err(_) => {}
        }
        if Instant::now() >= deadline {
            debug!("page readiness wait timed out");
            break;
        }
        settle(policy.poll_interval_ms.max(1)).await;
    }
    settle(policy.spa_settle_ms).await;
}

/// Resolve and robust-click, with the standard post-action settle.
async fn click_element<D: PageDriver + ?Sized>(
    driver: &mut D,
    locators: &LocatorSet,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let target = resolve(driver, locators, policy).await?;
    robust_click(driver, &target.locator).await?;
    settle(POST_ACTION_SETTLE_MS).await;
    Ok(())
}

fn suggestion_queries(city: &str) -> [String; 2] {
    [
        format!("//*[contains(text(),'{city}')][1]"),
        format!("//div[contains(@class,'autocomplete')]//*[contains(text(),'{city}')]"),
    ]
}

/// City autocomplete: click the input, type the city, then pick the first
/// clickable suggestion. Falls back to keyboard arrow-down plus enter when
/// the suggestion list never yields a clickable hit.
async fn city_autocomplete<D: PageDriver + ?Sized>(
    driver: &mut D,
    step: &StepDefinition,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let input = resolve(driver, &step.locators, policy).await?;
    robust_click(driver, &input.locator).await?;
    settle(POST_ACTION_SETTLE_MS).await;

    enter_text(driver, &input.locator, value).await?;
    settle(SUGGESTION_WAIT_MS).await;

    for query in suggestion_queries(value) {
        let suggestion = Locator::parse(query);
        match driver.is_clickable(&suggestion).await {
            Ok(true) => {
                robust_click(driver, &suggestion).await?;
                settle(POST_ACTION_SETTLE_MS).await;
                debug!(city = value, "suggestion clicked");
                return Ok(());
            }
            Ok(false) => {}
            Err(error) => debug!(%error, "suggestion probe failed"),
        }
    }

    debug!(city = value, "no clickable suggestion, using keyboard fallback");
    driver
        .press_keys(&input.locator, &[Key::ArrowDown, Key::Enter])
        .await
        .map_err(|error| EngineError::ActionFailed {
            action: "city select".to_string(),
            message: format!("keyboard fallback failed on {}: {error}", input.locator),
        })?;
    settle(POST_ACTION_SETTLE_MS).await;
    Ok(())
}

fn day_cell_queries(value: &str) -> [String; 2] {
    [
        format!("//*[@aria-label and contains(@aria-label,'{value}')]"),
        format!("//td[contains(normalize-space(.),'{value}')]"),
    ]
}

/// Open the calendar from the step's input and click the first visible day
/// cell matching the requested date. Falls back to the quick-date shortcuts
/// when no cell matches.
async fn pick_calendar_date<D: PageDriver + ?Sized>(
    driver: &mut D,
    step: &StepDefinition,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    click_element(driver, &step.locators, policy).await?;
    settle(CALENDAR_RENDER_MS).await;

    for query in day_cell_queries(value) {
        let cell = Locator::parse(query);
        if let Ok(true) = driver.is_clickable(&cell).await {
            robust_click(driver, &cell).await?;
            settle(POST_ACTION_SETTLE_MS).await;
            debug!(date = value, "day cell clicked");
            return Ok(());
        }
    }

    debug!(date = value, "no matching day cell, trying quick-date shortcuts");
    let option = DateOption::parse(value).unwrap_or(DateOption::Tomorrow);
    click_element(driver, &quick_date_locators(option, false), policy).await
}

/// Shortcut control candidates for a date option. The bus variant scopes to
/// the bus date widget first and keeps the unscoped candidates as fallback.
fn quick_date_locators(option: DateOption, bus_scoped: bool) -> LocatorSet {
    let mut parts = Vec::new();
    for label in option.labels() {
        if bus_scoped {
            parts.push(format!(
                "//div[contains(@class,'bus')]//button[normalize-space(.)='{label}']"
            ));
        }
        parts.push(format!("//button[normalize-space(.)='{label}']"));
        parts.push(format!("//*[normalize-space(text())='{label}']"));
    }
    LocatorSet::parse(&parts.join(" | "))
}

fn travel_class_option_locators(value: &str) -> LocatorSet {
    LocatorSet::parse(&format!(
        "//li[normalize-space(.)='{value}'] | //*[@role='option' and normalize-space(.)='{value}']"
    ))
}

/// Open the class selector from the step's control, then click the option
/// matching the requested class.
async fn select_travel_class<D: PageDriver + ?Sized>(
    driver: &mut D,
    step: &StepDefinition,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    click_element(driver, &step.locators, policy).await?;
    let option = resolve(driver, &travel_class_option_locators(value), policy).await?;
    robust_click(driver, &option.locator).await?;
    settle(POST_ACTION_SETTLE_MS).await;
    Ok(())
}

/// Close the travellers popup. The popup may already be closed, so every
/// failure is downgraded to a log line.
async fn dismiss_travellers_popup<D: PageDriver + ?Sized>(
    driver: &mut D,
    step: &StepDefinition,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    match click_element(driver, &step.locators, policy).await {
        Ok(()) => Ok(()),
        Err(error) => {
            warn!(%error, "travellers popup dismissal skipped");
            Ok(())
        }
    }
}

fn parse_count(value: &str) -> EngineResult<u32> {
    value.trim().parse().map_err(|_| EngineError::InvalidStep {
        message: format!("count value is not a number: {value:?}"),
    })
}

async fn read_count<D: PageDriver + ?Sized>(
    driver: &mut D,
    display: &Locator,
) -> EngineResult<u32> {
    let text = driver
        .read_text(display)
        .await
        .map_err(|error| EngineError::ActionFailed {
            action: "count read".to_string(),
            message: format!("could not read count at {display}: {error}"),
        })?;
    text.trim().parse().map_err(|_| EngineError::ActionFailed {
        action: "count read".to_string(),
        message: format!("count display at {display} is not numeric: {text:?}"),
    })
}

/// Click the increment control until the displayed count reaches the target.
///
/// Zero clicks when already on target. A displayed count above the target
/// fails fast: the widgets expose no decrement control worth guessing at.
async fn converge_counter<D: PageDriver + ?Sized>(
    driver: &mut D,
    increment: &Locator,
    display: &Locator,
    target: u32,
) -> EngineResult<()> {
    let mut current = read_count(driver, display).await?;
    if current == target {
        debug!(target, "count already on target");
        return Ok(());
    }
    if current > target {
        return Err(EngineError::ActionFailed {
            action: "count select".to_string(),
            message: format!(
                "current count {current} exceeds target {target} and no decrement control is defined"
            ),
        });
    }

    let max_attempts = (target - current) + COUNTER_ATTEMPT_SLACK;
    let mut attempts = 0;
    while current < target {
        if attempts >= max_attempts {
            return Err(EngineError::ActionFailed {
                action: "count select".to_string(),
                message: format!("count stuck at {current} after {attempts} increments (target {target})"),
            });
        }
        robust_click(driver, increment).await?;
        settle(COUNTER_SETTLE_MS).await;
        attempts += 1;
        current = read_count(driver, display).await?;
    }
    if current != target {
        return Err(EngineError::ActionFailed {
            action: "count select".to_string(),
            message: format!("count overshot to {current} (target {target})"),
        });
    }
    debug!(target, attempts, "count converged");
    Ok(())
}

/// Counter flow for a known traveller counter: resolve the kind's increment
/// and display controls, converge, and for children wait until the matching
/// number of age dropdowns rendered.
async fn set_counter<D: PageDriver + ?Sized>(
    driver: &mut D,
    kind: CounterKind,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let target = parse_count(value)?;
    let increment = resolve(driver, &kind.increment_locators(), policy).await?;
    let display = resolve(driver, &kind.count_locators(), policy).await?;
    converge_counter(driver, &increment.locator, &display.locator, target).await?;
    if kind == CounterKind::Children && target > 0 {
        wait_for_age_dropdowns(driver, target, policy).await?;
    }
    Ok(())
}

/// Counter flow against the step's own locators: the resolved control is
/// clicked to focus the widget, then doubles as increment and display.
async fn set_generic_count<D: PageDriver + ?Sized>(
    driver: &mut D,
    step: &StepDefinition,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let target = parse_count(value)?;
    let control = resolve(driver, &step.locators, policy).await?;
    robust_click(driver, &control.locator).await?;
    settle(POST_ACTION_SETTLE_MS).await;
    converge_counter(driver, &control.locator, &control.locator, target).await
}

/// Poll until at least `expected` child age dropdowns are rendered.
async fn wait_for_age_dropdowns<D: PageDriver + ?Sized>(
    driver: &mut D,
    expected: u32,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let deadline = Instant::now() + policy.wait_timeout();
    loop {
        if let Ok(value) = driver.eval(AGE_DROPDOWN_COUNT_QUERY).await {
            if value.as_u64().unwrap_or(0) >= u64::from(expected) {
                debug!(expected, "age dropdowns rendered");
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(EngineError::ActionFailed {
                action: "children count".to_string(),
                message: format!("{expected} child age dropdowns did not render"),
            });
        }
        settle(policy.poll_interval_ms.max(1)).await;
    }
}

fn child_age_locators(child: u32) -> LocatorSet {
    LocatorSet::parse(&format!("(//select[contains(@id,'child-age')])[{child}]"))
}

fn child_age_failed(child: u32, value: &str, error: &EngineError) -> EngineError {
    EngineError::ActionFailed {
        action: "child age".to_string(),
        message: format!("could not select age {value} for child {child}: {error}"),
    }
}

/// Pick the age for the numbered child from its dropdown and fire a change
/// event so the SPA registers the selection.
async fn select_child_age<D: PageDriver + ?Sized>(
    driver: &mut D,
    child: u32,
    value: &str,
    policy: &WaitPolicy,
) -> EngineResult<()> {
    let dropdown = resolve(driver, &child_age_locators(child), policy).await?;
    driver
        .select_option(&dropdown.locator, value)
        .await
        .map_err(|error| child_age_failed(child, value, &error))?;
    driver
        .dispatch_events(&dropdown.locator, &["change"])
        .await
        .map_err(|error| child_age_failed(child, value, &error))?;
    settle(POST_ACTION_SETTLE_MS).await;
    Ok(())
}
