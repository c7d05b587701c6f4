//! Run and step result reporting.
//!
//! One [`StepResult`] is produced per consumed step, in catalog order, and is
//! immutable once recorded. The [`RunResult`] aggregates them and carries the
//! run identity, counts and timing handed back to the caller and persisted by
//! the service layer.

use crate::params::{Mode, ParameterBag};
use crate::step::StepDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// OUTCOMES
// =============================================================================

/// Terminal outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    /// The behavior completed
    Passed,
    /// The behavior failed; later steps still run
    Failed,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Terminal outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// Every step passed
    Passed,
    /// At least one step failed
    Failed,
    /// The run aborted before steps could execute
    Error,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// =============================================================================
// STEP RESULT
// =============================================================================

/// Recorded outcome of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based position in the run
    pub step_number: u32,
    /// Symbolic element name from the catalog
    pub element_name: String,
    /// Action tag from the catalog
    pub action_type: String,
    /// The step's locator alternatives, pipe-joined
    pub locator: String,
    /// Concrete value the behavior ran with
    pub resolved_value: String,
    /// Free-text assertion hint from the catalog
    pub expected_result: String,
    /// Terminal outcome
    pub outcome: StepOutcome,
    /// Success detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    /// Record a passed step
    #[must_use]
    pub fn passed(
        step: &StepDefinition,
        step_number: u32,
        resolved_value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step_number,
            element_name: step.element_name.clone(),
            action_type: step.action.to_string(),
            locator: step.locators.to_string(),
            resolved_value: resolved_value.into(),
            expected_result: step.expected_result.clone(),
            outcome: StepOutcome::Passed,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Record a failed step
    #[must_use]
    pub fn failed(
        step: &StepDefinition,
        step_number: u32,
        resolved_value: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_number,
            element_name: step.element_name.clone(),
            action_type: step.action.to_string(),
            locator: step.locators.to_string(),
            resolved_value: resolved_value.into(),
            expected_result: step.expected_result.clone(),
            outcome: StepOutcome::Failed,
            message: None,
            error: Some(error.into()),
        }
    }

    /// True for passed steps
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Passed)
    }
}

// =============================================================================
// RUN RESULT
// =============================================================================

/// Aggregated result of one run.
///
/// `passed_count + failed_count == total_steps` holds for every constructor:
/// completed runs count their step results, aborted runs mark every step
/// failed (one synthetic failure when the catalog slice was empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identifier, `{MODE}_{testCaseId}_{unix-seconds}`
    pub run_id: String,
    /// Catalog test case this run executed
    pub test_case_id: String,
    /// Travel vertical
    pub mode: Mode,
    /// Terminal outcome
    pub outcome: RunOutcome,
    /// Steps consumed
    pub total_steps: usize,
    /// Steps that passed
    pub passed_count: usize,
    /// Steps that failed
    pub failed_count: usize,
    /// Wall-clock duration of the run
    pub execution_time_ms: u64,
    /// Parameters the run executed with
    pub parameters: ParameterBag,
    /// Per-step outcomes, in catalog order
    pub step_results: Vec<StepResult>,
    /// Top-level abort message on the error path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    /// Generate a run id from the mode, case id and current unix time
    #[must_use]
    pub fn new_run_id(mode: Mode, test_case_id: &str) -> String {
        let unix = chrono::Utc::now().timestamp();
        format!(
            "{}_{}_{}",
            mode.as_str().to_ascii_uppercase(),
            test_case_id,
            unix
        )
    }

    /// Aggregate a completed run from its step results.
    ///
    /// Outcome is `Passed` exactly when no step failed.
    #[must_use]
    pub fn completed(
        run_id: impl Into<String>,
        test_case_id: impl Into<String>,
        parameters: ParameterBag,
        step_results: Vec<StepResult>,
        execution_time_ms: u64,
    ) -> Self {
        let total_steps = step_results.len();
        let passed_count = step_results.iter().filter(|r| r.is_passed()).count();
        let failed_count = total_steps - passed_count;
        let outcome = if failed_count == 0 {
            RunOutcome::Passed
        } else {
            RunOutcome::Failed
        };
        Self {
            run_id: run_id.into(),
            test_case_id: test_case_id.into(),
            mode: parameters.mode,
            outcome,
            total_steps,
            passed_count,
            failed_count,
            execution_time_ms,
            parameters,
            step_results,
            error: None,
        }
    }

    /// Record a run that aborted before any step could execute.
    ///
    /// Every step is marked failed; an empty catalog slice still counts one
    /// synthetic failure so the aggregate never reports a clean zero.
    #[must_use]
    pub fn aborted(
        run_id: impl Into<String>,
        test_case_id: impl Into<String>,
        parameters: ParameterBag,
        planned_steps: usize,
        error: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        let total_steps = planned_steps.max(1);
        Self {
            run_id: run_id.into(),
            test_case_id: test_case_id.into(),
            mode: parameters.mode,
            outcome: RunOutcome::Error,
            total_steps,
            passed_count: 0,
            failed_count: total_steps,
            execution_time_ms,
            parameters,
            step_results: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_step(name: &str) -> StepDefinition {
        StepDefinition::new(name, "#loc", "CLICK", "clicks fine", 1)
    }

    fn bag() -> ParameterBag {
        ParameterBag::new(Mode::Flight)
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_step_outcome_serializes_screaming() {
            assert_eq!(
                serde_json::to_string(&StepOutcome::Passed).unwrap(),
                "\"PASSED\""
            );
            assert_eq!(
                serde_json::to_string(&StepOutcome::Failed).unwrap(),
                "\"FAILED\""
            );
        }

        #[test]
        fn test_run_outcome_serializes_screaming() {
            assert_eq!(serde_json::to_string(&RunOutcome::Error).unwrap(), "\"ERROR\"");
            let back: RunOutcome = serde_json::from_str("\"PASSED\"").unwrap();
            assert_eq!(back, RunOutcome::Passed);
        }

        #[test]
        fn test_display_matches_wire_form() {
            assert_eq!(RunOutcome::Failed.to_string(), "FAILED");
            assert_eq!(StepOutcome::Passed.to_string(), "PASSED");
        }
    }

    mod step_result_tests {
        use super::*;

        #[test]
        fn test_passed_carries_message_not_error() {
            let result = StepResult::passed(&sample_step("SearchButton"), 3, "N/A", "clicked");
            assert_eq!(result.step_number, 3);
            assert_eq!(result.element_name, "SearchButton");
            assert_eq!(result.action_type, "CLICK");
            assert!(result.is_passed());
            assert_eq!(result.message.as_deref(), Some("clicked"));
            assert!(result.error.is_none());
        }

        #[test]
        fn test_failed_carries_error_not_message() {
            let result =
                StepResult::failed(&sample_step("FROM"), 2, "New Delhi", "no candidate matched");
            assert!(!result.is_passed());
            assert!(result.message.is_none());
            assert_eq!(result.error.as_deref(), Some("no candidate matched"));
        }

        #[test]
        fn test_none_fields_are_omitted_from_json() {
            let result = StepResult::passed(&sample_step("X"), 1, "N/A", "ok");
            let json = serde_json::to_string(&result).unwrap();
            assert!(json.contains("\"message\""));
            assert!(!json.contains("\"error\""));
        }
    }

    mod run_result_tests {
        use super::*;

        fn passed_result(n: u32) -> StepResult {
            StepResult::passed(&sample_step("X"), n, "N/A", "ok")
        }

        fn failed_result(n: u32) -> StepResult {
            StepResult::failed(&sample_step("X"), n, "N/A", "boom")
        }

        #[test]
        fn test_run_id_format() {
            let run_id = RunResult::new_run_id(Mode::Flight, "TC001");
            assert!(run_id.starts_with("FLIGHT_TC001_"));
            let suffix = run_id.rsplit('_').next().unwrap();
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }

        #[test]
        fn test_completed_all_passed() {
            let result = RunResult::completed(
                "FLIGHT_TC001_1",
                "TC001",
                bag(),
                vec![passed_result(1), passed_result(2), passed_result(3)],
                1200,
            );
            assert_eq!(result.outcome, RunOutcome::Passed);
            assert_eq!(result.total_steps, 3);
            assert_eq!(result.passed_count, 3);
            assert_eq!(result.failed_count, 0);
            assert!(result.error.is_none());
        }

        #[test]
        fn test_completed_with_failure_is_failed() {
            let result = RunResult::completed(
                "FLIGHT_TC001_1",
                "TC001",
                bag(),
                vec![passed_result(1), failed_result(2), passed_result(3)],
                900,
            );
            assert_eq!(result.outcome, RunOutcome::Failed);
            assert_eq!(result.passed_count, 2);
            assert_eq!(result.failed_count, 1);
        }

        #[test]
        fn test_aborted_marks_all_planned_steps_failed() {
            let result = RunResult::aborted(
                "BUS_TC002_1",
                "TC002",
                ParameterBag::new(Mode::Bus),
                4,
                "browser refused to launch",
                30,
            );
            assert_eq!(result.outcome, RunOutcome::Error);
            assert_eq!(result.total_steps, 4);
            assert_eq!(result.failed_count, 4);
            assert_eq!(result.passed_count, 0);
            assert!(result.step_results.is_empty());
            assert_eq!(result.error.as_deref(), Some("browser refused to launch"));
        }

        #[test]
        fn test_aborted_empty_catalog_counts_one_failure() {
            let result = RunResult::aborted(
                "BUS_TC002_1",
                "TC002",
                ParameterBag::new(Mode::Bus),
                0,
                "browser refused to launch",
                12,
            );
            assert_eq!(result.total_steps, 1);
            assert_eq!(result.failed_count, 1);
        }
    }

    mod invariant_props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_counts_always_sum_to_total(outcomes in proptest::collection::vec(any::<bool>(), 0..40)) {
                let results: Vec<StepResult> = outcomes
                    .iter()
                    .enumerate()
                    .map(|(i, passed)| {
                        let n = u32::try_from(i).unwrap() + 1;
                        if *passed {
                            StepResult::passed(&sample_step("X"), n, "N/A", "ok")
                        } else {
                            StepResult::failed(&sample_step("X"), n, "N/A", "boom")
                        }
                    })
                    .collect();
                let run = RunResult::completed("R", "TC", bag(), results, 1);
                prop_assert_eq!(run.passed_count + run.failed_count, run.total_steps);
                let expect_passed = run.failed_count == 0;
                prop_assert_eq!(run.outcome == RunOutcome::Passed, expect_passed);
            }

            #[test]
            fn prop_aborted_counts_sum_to_total(planned in 0usize..50) {
                let run = RunResult::aborted(
                    "R",
                    "TC",
                    bag(),
                    planned,
                    "launch failed",
                    1,
                );
                prop_assert_eq!(run.passed_count + run.failed_count, run.total_steps);
                prop_assert_eq!(run.outcome, RunOutcome::Error);
            }
        }
    }
}
