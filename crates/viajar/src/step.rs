//! Step catalog model.
//!
//! A step couples a symbolic element name, a set of alternative locators, an
//! action tag and a sequence position. Action tags and element names arrive
//! as free text from the catalog database; both are normalized into enums
//! here so routing decisions stay out of string-matching code.

use crate::locator::LocatorSet;
use serde::{Deserialize, Serialize};

// =============================================================================
// ACTION TYPE
// =============================================================================

/// Behavior family selected by a step's action tag.
///
/// Tags the engine does not recognize are preserved in `Other` so the step
/// can be logged and skipped instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ActionType {
    /// Start the session and navigate to the mode's site
    OpenBrowser,
    /// Click, with element-name sub-routing (city fields get autocomplete)
    ClickAndSelect,
    /// Calendar date-picker selection
    ClickAndSelectDate,
    /// Date shortcut, value/name sub-routed between generic and bus widgets
    ClickQuickDate,
    /// Date shortcut scoped to the bus widget
    ClickBusQuickDate,
    /// Plain click, with travel-class/popup/date-shortcut sub-routing
    Click,
    /// Drive a counter control to a target count
    SelectCount,
    /// Pick a child's age from the age dropdowns
    ClickAndSelectAge,
    /// Set a checkbox to the desired state
    HandleCheckbox,
    /// Unrecognized tag, kept verbatim for logging
    Other(String),
}

impl ActionType {
    /// Parse a catalog tag, case-insensitively.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_uppercase().as_str() {
            "OPEN_BROWSER" => Self::OpenBrowser,
            "CLICK_AND_SELECT" => Self::ClickAndSelect,
            "CLICK_AND_SELECT_DATE" => Self::ClickAndSelectDate,
            "CLICK_QUICK_DATE" => Self::ClickQuickDate,
            "CLICK_BUS_QUICK_DATE" => Self::ClickBusQuickDate,
            "CLICK" => Self::Click,
            "SELECT_COUNT" => Self::SelectCount,
            "CLICK_AND_SELECT_AGE" => Self::ClickAndSelectAge,
            "HANDLE_CHECKBOX" => Self::HandleCheckbox,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    /// The canonical tag string.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::OpenBrowser => "OPEN_BROWSER",
            Self::ClickAndSelect => "CLICK_AND_SELECT",
            Self::ClickAndSelectDate => "CLICK_AND_SELECT_DATE",
            Self::ClickQuickDate => "CLICK_QUICK_DATE",
            Self::ClickBusQuickDate => "CLICK_BUS_QUICK_DATE",
            Self::Click => "CLICK",
            Self::SelectCount => "SELECT_COUNT",
            Self::ClickAndSelectAge => "CLICK_AND_SELECT_AGE",
            Self::HandleCheckbox => "HANDLE_CHECKBOX",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for ActionType {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.as_tag().to_string()
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

// =============================================================================
// ELEMENT ROLE
// =============================================================================

/// Normalized element name, the sub-routing key for dispatch.
///
/// The raw name stays on the step; the role only captures the identities the
/// dispatch table distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementRole {
    /// Origin city input
    From,
    /// Destination city input
    To,
    /// Destination input (hotel search)
    Destination,
    /// Travel class selector
    TravelClass,
    /// Travellers popup confirm button
    DoneButton,
    /// Rooms counter
    RoomsCount,
    /// Adults counter
    AdultsCount,
    /// Children counter
    ChildrenCount,
    /// Age dropdown for the n-th child (1-based as named in the catalog)
    Child(u32),
    /// Any other element
    Other,
}

impl ElementRole {
    /// Normalize a symbolic element name into its routing role.
    #[must_use]
    pub fn normalize(element_name: &str) -> Self {
        let upper = element_name.trim().to_uppercase();
        match upper.as_str() {
            "FROM" => return Self::From,
            "TO" => return Self::To,
            "DESTINATION" => return Self::Destination,
            "TRAVELCLASS" => return Self::TravelClass,
            "DONEBUTTON" => return Self::DoneButton,
            "ROOMSCOUNT" => return Self::RoomsCount,
            "ADULTSCOUNT" => return Self::AdultsCount,
            "CHILDRENCOUNT" => return Self::ChildrenCount,
            _ => {}
        }
        if upper.starts_with("CHILD") {
            let digits: String = upper.chars().filter(char::is_ascii_digit).collect();
            if let Ok(n) = digits.parse::<u32>() {
                return Self::Child(n);
            }
        }
        Self::Other
    }

    /// True for the city inputs that take the autocomplete flow.
    #[must_use]
    pub const fn is_city_field(self) -> bool {
        matches!(self, Self::From | Self::To | Self::Destination)
    }
}

// =============================================================================
// STEP DEFINITION
// =============================================================================

/// One row of the step catalog, immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Symbolic element name, drives dispatch and value resolution
    pub element_name: String,
    /// Ordered locator alternatives
    pub locators: LocatorSet,
    /// Behavior family
    pub action: ActionType,
    /// Free-text assertion hint, carried through but not enforced
    pub expected_result: String,
    /// Execution position; steps run in ascending order
    pub order: u32,
}

impl StepDefinition {
    /// Build a step from raw catalog fields.
    #[must_use]
    pub fn new(
        element_name: impl Into<String>,
        locator: &str,
        action_tag: &str,
        expected_result: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            element_name: element_name.into(),
            locators: LocatorSet::parse(locator),
            action: ActionType::parse(action_tag),
            expected_result: expected_result.into(),
            order,
        }
    }

    /// The normalized routing role of this step's element name.
    #[must_use]
    pub fn role(&self) -> ElementRole {
        ElementRole::normalize(&self.element_name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod action_type_tests {
        use super::*;

        #[test]
        fn test_parse_known_tags() {
            assert_eq!(ActionType::parse("OPEN_BROWSER"), ActionType::OpenBrowser);
            assert_eq!(ActionType::parse("CLICK_AND_SELECT"), ActionType::ClickAndSelect);
            assert_eq!(
                ActionType::parse("CLICK_AND_SELECT_DATE"),
                ActionType::ClickAndSelectDate
            );
            assert_eq!(ActionType::parse("CLICK_QUICK_DATE"), ActionType::ClickQuickDate);
            assert_eq!(
                ActionType::parse("CLICK_BUS_QUICK_DATE"),
                ActionType::ClickBusQuickDate
            );
            assert_eq!(ActionType::parse("CLICK"), ActionType::Click);
            assert_eq!(ActionType::parse("SELECT_COUNT"), ActionType::SelectCount);
            assert_eq!(
                ActionType::parse("CLICK_AND_SELECT_AGE"),
                ActionType::ClickAndSelectAge
            );
            assert_eq!(ActionType::parse("HANDLE_CHECKBOX"), ActionType::HandleCheckbox);
        }

        #[test]
        fn test_parse_is_case_insensitive() {
            assert_eq!(ActionType::parse("open_browser"), ActionType::OpenBrowser);
            assert_eq!(ActionType::parse("Click"), ActionType::Click);
            assert_eq!(ActionType::parse("  select_count  "), ActionType::SelectCount);
        }

        #[test]
        fn test_unknown_tag_preserved() {
            let action = ActionType::parse("SWIPE_LEFT");
            assert_eq!(action, ActionType::Other("SWIPE_LEFT".to_string()));
            assert_eq!(action.as_tag(), "SWIPE_LEFT");
        }

        #[test]
        fn test_tag_round_trip() {
            for tag in [
                "OPEN_BROWSER",
                "CLICK_AND_SELECT",
                "CLICK_AND_SELECT_DATE",
                "CLICK_QUICK_DATE",
                "CLICK_BUS_QUICK_DATE",
                "CLICK",
                "SELECT_COUNT",
                "CLICK_AND_SELECT_AGE",
                "HANDLE_CHECKBOX",
            ] {
                assert_eq!(ActionType::parse(tag).as_tag(), tag);
            }
        }

        #[test]
        fn test_display() {
            assert_eq!(format!("{}", ActionType::Click), "CLICK");
        }

        #[test]
        fn test_serde_as_string() {
            let json = serde_json::to_string(&ActionType::HandleCheckbox).unwrap();
            assert_eq!(json, "\"HANDLE_CHECKBOX\"");
            let back: ActionType = serde_json::from_str("\"click\"").unwrap();
            assert_eq!(back, ActionType::Click);
        }
    }

    mod element_role_tests {
        use super::*;

        #[test]
        fn test_exact_roles() {
            assert_eq!(ElementRole::normalize("FROM"), ElementRole::From);
            assert_eq!(ElementRole::normalize("TO"), ElementRole::To);
            assert_eq!(ElementRole::normalize("DESTINATION"), ElementRole::Destination);
            assert_eq!(ElementRole::normalize("TRAVELCLASS"), ElementRole::TravelClass);
            assert_eq!(ElementRole::normalize("DONEBUTTON"), ElementRole::DoneButton);
            assert_eq!(ElementRole::normalize("ROOMSCOUNT"), ElementRole::RoomsCount);
            assert_eq!(ElementRole::normalize("ADULTSCOUNT"), ElementRole::AdultsCount);
            assert_eq!(ElementRole::normalize("CHILDRENCOUNT"), ElementRole::ChildrenCount);
        }

        #[test]
        fn test_normalize_is_case_insensitive() {
            assert_eq!(ElementRole::normalize("from"), ElementRole::From);
            assert_eq!(ElementRole::normalize(" TravelClass "), ElementRole::TravelClass);
        }

        #[test]
        fn test_child_with_numeric_suffix() {
            assert_eq!(ElementRole::normalize("CHILD 1"), ElementRole::Child(1));
            assert_eq!(ElementRole::normalize("Child 2"), ElementRole::Child(2));
            assert_eq!(ElementRole::normalize("CHILD3"), ElementRole::Child(3));
            assert_eq!(ElementRole::normalize("child 10"), ElementRole::Child(10));
        }

        #[test]
        fn test_child_without_digits_is_other() {
            assert_eq!(ElementRole::normalize("CHILD"), ElementRole::Other);
        }

        #[test]
        fn test_childrencount_is_not_child() {
            // Starts with CHILD but matches the counter role exactly
            assert_eq!(ElementRole::normalize("ChildrenCount"), ElementRole::ChildrenCount);
        }

        #[test]
        fn test_unknown_name_is_other() {
            assert_eq!(ElementRole::normalize("SearchButton"), ElementRole::Other);
        }

        #[test]
        fn test_city_fields() {
            assert!(ElementRole::From.is_city_field());
            assert!(ElementRole::To.is_city_field());
            assert!(ElementRole::Destination.is_city_field());
            assert!(!ElementRole::TravelClass.is_city_field());
            assert!(!ElementRole::Other.is_city_field());
        }
    }

    mod step_definition_tests {
        use super::*;

        #[test]
        fn test_new_parses_fields() {
            let step = StepDefinition::new(
                "FROM",
                "//input[@id='from'] | #from-input",
                "CLICK_AND_SELECT",
                "Origin selected",
                2,
            );
            assert_eq!(step.element_name, "FROM");
            assert_eq!(step.action, ActionType::ClickAndSelect);
            assert_eq!(step.locators.candidates().len(), 2);
            assert_eq!(step.expected_result, "Origin selected");
            assert_eq!(step.order, 2);
        }

        #[test]
        fn test_role_from_element_name() {
            let step = StepDefinition::new("Child 2", "//select", "CLICK_AND_SELECT_AGE", "", 7);
            assert_eq!(step.role(), ElementRole::Child(2));
        }

        #[test]
        fn test_serde_round_trip() {
            let step = StepDefinition::new("TO", "//input[@id='to']", "CLICK_AND_SELECT", "", 3);
            let json = serde_json::to_string(&step).unwrap();
            let back: StepDefinition = serde_json::from_str(&json).unwrap();
            assert_eq!(back, step);
        }
    }
}
