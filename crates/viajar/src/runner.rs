//! Run orchestration.
//!
//! [`Runner::execute`] owns the full lifecycle of one test run: launch a
//! fresh session, walk the catalog steps in order, record a [`StepResult`]
//! per step, and release the session on every exit path. It never fails
//! outward; launch failures and step failures alike are folded into the
//! returned [`RunResult`].

use crate::dispatch::perform;
use crate::driver::PageDriver;
use crate::params::{resolve_value, ParameterBag};
use crate::report::{RunResult, StepResult};
use crate::result::EngineResult;
use crate::step::StepDefinition;
use crate::wait::{settle, WaitPolicy};
use std::future::Future;
use std::time::Instant;
use tracing::{error, info, warn};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Base URL of the site under test
    pub base_url: String,
    /// Timing knobs for waits and settles
    pub policy: WaitPolicy,
}

impl RunnerConfig {
    /// Configuration with the default wait policy
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            policy: WaitPolicy::new(),
        }
    }

    /// Replace the wait policy
    #[must_use]
    pub const fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Executes test runs against a page session
#[derive(Debug, Clone)]
pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    /// Create a runner
    #[must_use]
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// The runner's configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute one test run.
    ///
    /// `launch` produces the fresh session; a launch failure aborts the run
    /// with an ERROR result and every planned step counted as failed. Once
    /// the session is up, steps execute ascending by `order`; a failing step
    /// is recorded and the run continues, so a finished run always reports
    /// on every step. The session is released before returning, on the
    /// success and failure paths alike.
    pub async fn execute<D, F, Fut>(
        &self,
        test_case_id: &str,
        steps: &[StepDefinition],
        parameters: ParameterBag,
        launch: F,
    ) -> RunResult
    where
        D: PageDriver,
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<D>>,
    {
        let run_id = RunResult::new_run_id(parameters.mode, test_case_id);
        let started = Instant::now();
        info!(
            %run_id,
            test_case_id,
            mode = %parameters.mode,
            steps = steps.len(),
            "starting run"
        );

        let mut driver = match launch().await {
            Ok(driver) => driver,
            Err(launch_error) => {
                error!(%run_id, error = %launch_error, "session launch failed");
                return RunResult::aborted(
                    run_id,
                    test_case_id,
                    parameters,
                    steps.len(),
                    format!("session launch failed: {launch_error}"),
                    elapsed_ms(started),
                );
            }
        };

        let mut ordered: Vec<&StepDefinition> = steps.iter().collect();
        ordered.sort_by_key(|step| step.order);

        let mut step_results = Vec::with_capacity(ordered.len());
        for (index, step) in ordered.into_iter().enumerate() {
            let step_number = index as u32 + 1;
            let value = resolve_value(step, &parameters, &self.config.base_url);
            info!(
                step_number,
                element = %step.element_name,
                action = %step.action,
                value,
                "executing step"
            );
            match perform(&mut driver, step, &value, &self.config.policy).await {
                Ok(()) => {
                    step_results.push(StepResult::passed(step, step_number, &value, "completed"));
                }
                Err(step_error) => {
                    if step_error.is_step_level() {
                        warn!(step_number, error = %step_error, "step failed");
                    } else {
                        error!(step_number, error = %step_error, "step failed unexpectedly");
                    }
                    step_results.push(StepResult::failed(
                        step,
                        step_number,
                        &value,
                        step_error.to_string(),
                    ));
                }
            }
            settle(self.config.policy.step_delay_ms).await;
        }

        release(&mut driver, &run_id).await;

        let result = RunResult::completed(
            run_id,
            test_case_id,
            parameters,
            step_results,
            elapsed_ms(started),
        );
        info!(
            run_id = %result.run_id,
            outcome = %result.outcome,
            passed = result.passed_count,
            failed = result.failed_count,
            "run finished"
        );
        result
    }
}

/// Close the session, swallowing release failures with a log.
async fn release<D: PageDriver + ?Sized>(driver: &mut D, run_id: &str) {
    if let Err(close_error) = driver.close().await {
        warn!(run_id, error = %close_error, "session release failed");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
