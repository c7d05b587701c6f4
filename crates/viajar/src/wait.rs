//! Wait policy for page synchronization.
//!
//! Two tiers govern every bounded wait in the engine: a fast precise tier for
//! clickable/visible checks, and a slow tolerant polling tier that rides out
//! SPA re-renders. Settle delays smooth over animation and event listeners.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for the precise wait tier (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default ceiling for the tolerant polling tier (45 seconds)
pub const DEFAULT_POLL_CEILING_MS: u64 = 45_000;

/// Default polling interval for the tolerant tier (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default page-load timeout (60 seconds)
pub const DEFAULT_PAGE_LOAD_TIMEOUT_MS: u64 = 60_000;

/// Settle delay after the SPA reports ready (1 second)
pub const DEFAULT_SPA_SETTLE_MS: u64 = 1_000;

/// Delay between consecutive steps of a run (500ms)
pub const DEFAULT_STEP_DELAY_MS: u64 = 500;

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timing knobs for the engine's bounded waits.
///
/// These strongly influence the flakiness vs. run-duration trade-off, so every
/// knob is caller-configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Timeout for clickable/visible waits in milliseconds
    pub wait_timeout_ms: u64,
    /// Ceiling for the tolerant polling search in milliseconds
    pub poll_ceiling_ms: u64,
    /// Interval between tolerant polls in milliseconds
    pub poll_interval_ms: u64,
    /// Page-load timeout in milliseconds
    pub page_load_timeout_ms: u64,
    /// Settle delay after readiness checks in milliseconds
    pub spa_settle_ms: u64,
    /// Delay between consecutive steps in milliseconds
    pub step_delay_ms: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_ceiling_ms: DEFAULT_POLL_CEILING_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            page_load_timeout_ms: DEFAULT_PAGE_LOAD_TIMEOUT_MS,
            spa_settle_ms: DEFAULT_SPA_SETTLE_MS,
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
        }
    }
}

impl WaitPolicy {
    /// Create a policy with the defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy with near-zero delays, for driving mock pages in tests
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            wait_timeout_ms: 50,
            poll_ceiling_ms: 50,
            poll_interval_ms: 5,
            page_load_timeout_ms: 100,
            spa_settle_ms: 0,
            step_delay_ms: 0,
        }
    }

    /// Set the precise wait timeout
    #[must_use]
    pub const fn with_wait_timeout(mut self, ms: u64) -> Self {
        self.wait_timeout_ms = ms;
        self
    }

    /// Set the tolerant polling ceiling
    #[must_use]
    pub const fn with_poll_ceiling(mut self, ms: u64) -> Self {
        self.poll_ceiling_ms = ms;
        self
    }

    /// Set the tolerant polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the page-load timeout
    #[must_use]
    pub const fn with_page_load_timeout(mut self, ms: u64) -> Self {
        self.page_load_timeout_ms = ms;
        self
    }

    /// Set the SPA settle delay
    #[must_use]
    pub const fn with_spa_settle(mut self, ms: u64) -> Self {
        self.spa_settle_ms = ms;
        self
    }

    /// Set the inter-step delay
    #[must_use]
    pub const fn with_step_delay(mut self, ms: u64) -> Self {
        self.step_delay_ms = ms;
        self
    }

    /// Precise wait timeout as a Duration
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Tolerant polling ceiling as a Duration
    #[must_use]
    pub const fn poll_ceiling(&self) -> Duration {
        Duration::from_millis(self.poll_ceiling_ms)
    }

    /// Tolerant polling interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Sleep for the given number of milliseconds; zero returns immediately.
pub async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
