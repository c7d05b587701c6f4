//! Viajar: step-driven end-to-end test engine for travel booking flows.
//!
//! Test cases live in a catalog as ordered symbolic steps (element name,
//! pipe-separated locator candidates, action tag, expected result). The
//! engine resolves each locator against the live page through escalating
//! strategies, routes the step to a page behavior with retries and
//! fallbacks, and aggregates per-step outcomes into a run report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Step catalog │───►│  Dispatcher  │───►│  Resolver +  │
//! │ (DB rows)    │    │  (routing)   │    │  primitives  │
//! └──────────────┘    └──────────────┘    └──────┬───────┘
//!        ▲                                       │
//!        │            ┌──────────────┐    ┌──────▼───────┐
//!        └────────────│    Runner    │◄───│ Page session │
//!                     │ (RunResult)  │    │ (CDP / mock) │
//!                     └──────────────┘    └──────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod actions;
mod dispatch;
mod driver;
mod locator;
mod params;
mod report;
mod result;
mod runner;
mod session;
mod step;
mod wait;

pub use actions::{
    best_effort_clear, best_effort_highlight, best_effort_scroll, enter_text, robust_click,
    set_checkbox,
};
pub use dispatch::{perform, route, Behavior, CounterKind, DateOption};
pub use driver::{ElementHandle, Key, MockDriver, MockElement, PageDriver};
pub use locator::{resolve, Locator, LocatorKind, LocatorSet, ResolvedElement};
pub use params::{is_truthy, resolve_value, Mode, ParameterBag};
pub use report::{RunOutcome, RunResult, StepOutcome, StepResult};
pub use result::{EngineError, EngineResult};
pub use runner::{Runner, RunnerConfig};
#[cfg(feature = "browser")]
pub use session::CdpSession;
pub use session::SessionConfig;
pub use step::{ActionType, ElementRole, StepDefinition};
pub use wait::{settle, WaitPolicy};
