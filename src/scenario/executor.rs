//! Sequential step execution and the abort policy.
use super::result::{AbortCause, ResultAggregator, ScenarioResult, ScenarioStatus, StepOutcome};
use super::step::Step;
use crate::error::{ScenarioError, StepPhase};
use crate::runner::{InvocationRequest, RunnerFactory, StepContext};
use crate::workspace::WorkspaceManager;
use std::fmt;
use std::path::Path;
use std::time::Instant;

/// Lifecycle of a scenario instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    NotStarted,
    Preparing,
    Running(usize),
    Completed,
    Aborted,
    SetupFailed,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScenarioState::Completed | ScenarioState::Aborted | ScenarioState::SetupFailed
        )
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioState::NotStarted => f.write_str("not_started"),
            ScenarioState::Preparing => f.write_str("preparing"),
            ScenarioState::Running(index) => write!(f, "running({index})"),
            ScenarioState::Completed => f.write_str("completed"),
            ScenarioState::Aborted => f.write_str("aborted"),
            ScenarioState::SetupFailed => f.write_str("setup_failed"),
        }
    }
}

enum StepRun {
    Passed(StepOutcome),
    Mismatch(StepOutcome, Vec<String>),
    Failed(Option<StepOutcome>, ScenarioError),
}

/// Drives one run from `Preparing` to a terminal state.
pub(super) struct ScenarioExecutor<'a> {
    state: &'a mut ScenarioState,
    factory: &'a mut dyn RunnerFactory,
}

impl<'a> ScenarioExecutor<'a> {
    pub(super) fn new(state: &'a mut ScenarioState, factory: &'a mut dyn RunnerFactory) -> Self {
        Self { state, factory }
    }

    pub(super) fn execute(mut self, manager: WorkspaceManager, steps: &mut [Step]) -> ScenarioResult {
        let span = tracing::info_span!("scenario", steps = steps.len());
        let _guard = span.enter();
        let mut aggregator = ResultAggregator::default();

        self.transition(ScenarioState::Preparing);
        let workspace = match manager.prepare() {
            Ok(workspace) => workspace,
            Err(error) => {
                tracing::warn!(error = %error, "workspace setup failed");
                self.transition(ScenarioState::SetupFailed);
                return aggregator.finish(ScenarioStatus::SetupFailed { error }, None);
            }
        };
        tracing::info!(workspace = %workspace.path().display(), "workspace ready");

        for (index, step) in steps.iter_mut().enumerate() {
            self.transition(ScenarioState::Running(index));
            let step_id = step.id().to_string();
            let run = {
                let step_span = tracing::info_span!("step", id = %step_id, index);
                let _step_guard = step_span.enter();
                run_step(step, index, workspace.path(), &mut *self.factory)
            };
            let cause = match run {
                StepRun::Passed(outcome) => {
                    aggregator.record(outcome);
                    continue;
                }
                StepRun::Mismatch(outcome, failures) => {
                    aggregator.record(outcome);
                    tracing::warn!(
                        step_id = %step_id,
                        failures = %failures.join("; "),
                        "step did not meet its expectation"
                    );
                    AbortCause::ExpectationMismatch { failures }
                }
                StepRun::Failed(outcome, error) => {
                    if let Some(outcome) = outcome {
                        aggregator.record(outcome);
                    }
                    tracing::warn!(step_id = %step_id, error = %error, "step raised");
                    AbortCause::Error(error)
                }
            };
            self.transition(ScenarioState::Aborted);
            tracing::info!(attempted = aggregator.len(), "scenario aborted");
            return aggregator.finish(
                ScenarioStatus::Aborted {
                    step_index: index,
                    step_id,
                    cause,
                },
                Some(workspace),
            );
        }

        self.transition(ScenarioState::Completed);
        tracing::info!(attempted = aggregator.len(), "scenario completed");
        aggregator.finish(ScenarioStatus::Completed, Some(workspace))
    }

    fn transition(&mut self, next: ScenarioState) {
        tracing::debug!(from = %self.state, to = %next, "scenario state");
        *self.state = next;
    }
}

fn run_step(
    step: &mut Step,
    index: usize,
    workspace: &Path,
    factory: &mut dyn RunnerFactory,
) -> StepRun {
    let step_id = step.id().to_string();
    tracing::info!(args = ?step.arguments(), "step starting");

    if let Some(before) = step.before.take() {
        if let Err(err) = before(workspace) {
            return StepRun::Failed(None, ScenarioError::step(&step_id, StepPhase::Before, err));
        }
    }

    let mut request = InvocationRequest {
        step_id: step_id.clone(),
        workspace: workspace.to_path_buf(),
        args: step.arguments().to_vec(),
        env: step.environment().clone(),
    };
    if let Some(configure) = step.configure_request.take() {
        if let Err(err) = configure(&mut request) {
            return StepRun::Failed(
                None,
                ScenarioError::step(&step_id, StepPhase::ConfigureRequest, err),
            );
        }
    }

    let context = StepContext {
        step_id: &step_id,
        index,
        workspace,
    };
    let mut handle = match factory.new_handle(&context) {
        Ok(handle) => handle,
        Err(err) => {
            return StepRun::Failed(
                None,
                ScenarioError::step(&step_id, StepPhase::CreateHandle, err),
            )
        }
    };

    let started = Instant::now();
    let raw = match handle.invoke(&request) {
        Ok(raw) => raw,
        Err(err) => {
            return StepRun::Failed(None, ScenarioError::step(&step_id, StepPhase::Invoke, err))
        }
    };
    let outcome = StepOutcome::new(&step_id, index, request.args, raw, started.elapsed());
    let failures = step.expectation().evaluate(&outcome);

    if let Some(after) = step.after.take() {
        if let Err(err) = after(workspace, &outcome) {
            let error = ScenarioError::step(&step_id, StepPhase::After, err);
            if failures.is_empty() {
                return StepRun::Failed(Some(outcome), error);
            }
            // The mismatch stays the reported cause.
            tracing::warn!(error = %error, "post-action failed after expectation mismatch");
        }
    }

    tracing::info!(
        success = outcome.is_success(),
        duration_ms = outcome.duration().as_millis(),
        "step finished"
    );
    if failures.is_empty() {
        StepRun::Passed(outcome)
    } else {
        StepRun::Mismatch(outcome, failures)
    }
}
