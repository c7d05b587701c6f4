//! Run parameters and step value resolution.
//!
//! A run carries a mode (which travel vertical the site serves) and a bag of
//! caller-supplied field values. [`resolve_value`] maps a step's symbolic
//! element name to the concrete value the behavior will use, falling through
//! a fixed precedence: explicit field match, name-fragment match, then a
//! generic placeholder.

use crate::result::EngineError;
use crate::step::{ActionType, StepDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// MODE
// =============================================================================

/// Travel vertical a run targets. Selects the site path and catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Flight search flows
    Flight,
    /// Bus search flows
    Bus,
    /// Train search flows
    Train,
    /// Hotel search flows
    Hotel,
}

impl Mode {
    /// All supported modes
    pub const ALL: [Self; 4] = [Self::Flight, Self::Bus, Self::Train, Self::Hotel];

    /// Parse a mode name, case-insensitively
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flight" => Some(Self::Flight),
            "bus" => Some(Self::Bus),
            "train" => Some(Self::Train),
            "hotel" => Some(Self::Hotel),
            _ => None,
        }
    }

    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Bus => "bus",
            Self::Train => "train",
            Self::Hotel => "hotel",
        }
    }

    /// Site path segment for this vertical
    #[must_use]
    pub const fn site_path(self) -> &'static str {
        match self {
            Self::Flight => "flights",
            Self::Bus => "buses",
            Self::Train => "trains",
            Self::Hotel => "hotels",
        }
    }

    /// Full site URL for this vertical under `base`
    #[must_use]
    pub fn site_url(self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.site_path())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| EngineError::InvalidStep {
            message: format!("unknown mode: {s}"),
        })
    }
}

// =============================================================================
// PARAMETER BAG
// =============================================================================

/// Caller-supplied run parameters: the mode plus logical field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterBag {
    /// Travel vertical for this run
    pub mode: Mode,
    values: BTreeMap<String, String>,
}

impl ParameterBag {
    /// An empty bag for the given mode
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            values: BTreeMap::new(),
        }
    }

    /// Build a bag from a JSON object, stringifying scalar values.
    ///
    /// Strings pass through, numbers render in decimal, booleans become
    /// `TRUE`/`FALSE` so they satisfy the checkbox truthiness convention, and
    /// anything else keeps its compact JSON form.
    #[must_use]
    pub fn from_json(mode: Mode, fields: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut bag = Self::new(mode);
        for (key, value) in fields {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(true) => "TRUE".to_string(),
                serde_json::Value::Bool(false) => "FALSE".to_string(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            bag.insert(key.clone(), rendered);
        }
        bag
    }

    /// Insert a field value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style insert for test setup
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a field value, case-insensitively
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a field value with a fallback default
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Number of field values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no field values were supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// VALUE RESOLUTION
// =============================================================================

/// True for the truthy checkbox spellings TRUE, 1 and YES, case-insensitively
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_uppercase().as_str(),
        "TRUE" | "1" | "YES"
    )
}

/// Resolve a step's concrete value from its symbolic element name.
///
/// Precedence: `OPEN_BROWSER` steps always get the mode's site URL; then an
/// explicit field match against the bag (with per-field defaults); then a
/// name-fragment match for date shortcuts and checkboxes; then `"N/A"`.
#[must_use]
pub fn resolve_value(step: &StepDefinition, bag: &ParameterBag, base_url: &str) -> String {
    if step.action == ActionType::OpenBrowser {
        return bag.mode.site_url(base_url);
    }

    let name = step.element_name.trim().to_ascii_lowercase();
    match name.as_str() {
        "from" | "source" => return bag.get_or("source", "New Delhi").to_string(),
        "to" | "destination" => return bag.get_or("destination", "Mumbai").to_string(),
        "date" | "departure" | "departuredate" => {
            return bag.get_or("date", "Tomorrow").to_string();
        }
        "returndate" | "return" => return bag.get_or("returnDate", "").to_string(),
        "checkin" | "checkindate" => return bag.get_or("checkIn", "Today").to_string(),
        "checkout" | "checkoutdate" => return bag.get_or("checkOut", "Tomorrow").to_string(),
        "passengers" | "adults" | "adultscount" => {
            return bag.get_or("passengers", "1").to_string();
        }
        "children" | "childrencount" => return bag.get_or("children", "0").to_string(),
        "infants" | "infantscount" => return bag.get_or("infants", "0").to_string(),
        "rooms" | "roomscount" => return bag.get_or("rooms", "1").to_string(),
        "travelclass" | "class" => return bag.get_or("travelClass", "Economy").to_string(),
        _ => {}
    }

    // Fragment matches run against the name with separators stripped so
    // "DAY-AFTER-TOMORROW", "Day After Tomorrow" and "DayAfterTomorrow" all
    // normalize the same way. The day-after check runs before the plain
    // tomorrow check because the longer name contains the shorter fragment.
    let squashed: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    if squashed.contains("dayafter") {
        return "Day-After-Tomorrow".to_string();
    }
    if squashed.contains("today") {
        return "Today".to_string();
    }
    if squashed.contains("tomorrow") {
        return "Tomorrow".to_string();
    }
    if squashed.contains("checkbox") {
        return "TRUE".to_string();
    }

    "N/A".to_string()
}
