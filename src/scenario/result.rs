//! Step outcomes and the aggregate scenario result.
use crate::error::ScenarioError;
use crate::runner::InvocationResult;
use crate::workspace::Workspace;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Immutable record of one invocation.
#[derive(Clone)]
pub struct StepOutcome {
    step_id: String,
    index: usize,
    args: Vec<String>,
    success: bool,
    stdout: String,
    stderr: String,
    duration: Duration,
    detail: Option<Arc<dyn Any + Send + Sync>>,
}

impl StepOutcome {
    pub(crate) fn new(
        step_id: &str,
        index: usize,
        args: Vec<String>,
        result: InvocationResult,
        duration: Duration,
    ) -> Self {
        Self {
            step_id: step_id.to_string(),
            index,
            args,
            success: result.success,
            stdout: result.stdout,
            stderr: result.stderr,
            duration,
            detail: result.detail,
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Zero-based position in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The build tool's own result object, if the handle attached one of type `T`.
    pub fn detail<T: Any>(&self) -> Option<&T> {
        self.detail.as_deref().and_then(|detail| detail.downcast_ref::<T>())
    }

    pub fn raw_detail(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.detail.as_ref()
    }
}

impl fmt::Debug for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepOutcome")
            .field("step_id", &self.step_id)
            .field("index", &self.index)
            .field("args", &self.args)
            .field("success", &self.success)
            .field("stdout_bytes", &self.stdout.len())
            .field("stderr_bytes", &self.stderr.len())
            .field("duration", &self.duration)
            .field("has_detail", &self.detail.is_some())
            .finish()
    }
}

/// Why a scenario stopped before its last step.
#[derive(Debug)]
pub enum AbortCause {
    /// The outcome did not match the step's expectation.
    ExpectationMismatch { failures: Vec<String> },
    /// An action, the factory, or the handle raised.
    Error(ScenarioError),
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortCause::ExpectationMismatch { failures } => {
                write!(f, "expectation mismatch: {}", failures.join("; "))
            }
            AbortCause::Error(err) => write!(f, "{err}"),
        }
    }
}

/// Terminal status of one `run()`.
#[derive(Debug)]
pub enum ScenarioStatus {
    Completed,
    Aborted {
        step_index: usize,
        step_id: String,
        cause: AbortCause,
    },
    SetupFailed {
        error: ScenarioError,
    },
}

impl ScenarioStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ScenarioStatus::Completed => "completed",
            ScenarioStatus::Aborted { .. } => "aborted",
            ScenarioStatus::SetupFailed { .. } => "setup_failed",
        }
    }
}

/// Immutable, ordered record of a scenario run.
///
/// Holds the workspace, so an engine-provisioned temporary directory stays on
/// disk until the result is dropped.
#[derive(Debug)]
pub struct ScenarioResult {
    status: ScenarioStatus,
    outcomes: Vec<StepOutcome>,
    positions: HashMap<String, usize>,
    workspace: Option<Workspace>,
}

impl ScenarioResult {
    pub fn status(&self) -> &ScenarioStatus {
        &self.status
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, ScenarioStatus::Completed)
    }

    /// Id of the step the scenario stopped at, if it aborted.
    pub fn aborted_at(&self) -> Option<&str> {
        match &self.status {
            ScenarioStatus::Aborted { step_id, .. } => Some(step_id),
            _ => None,
        }
    }

    /// Outcomes of attempted steps in execution order.
    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.positions
            .get(step_id)
            .map(|position| &self.outcomes[*position])
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().map(StepOutcome::step_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Workspace directory, absent when setup failed.
    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::path)
    }

    /// Re-raise a non-completed result as the matching error.
    pub fn ensure_completed(self) -> Result<Self, ScenarioError> {
        match self.status {
            ScenarioStatus::Completed => Ok(self),
            ScenarioStatus::SetupFailed { error } => Err(error),
            ScenarioStatus::Aborted {
                cause: AbortCause::Error(error),
                ..
            } => Err(error),
            ScenarioStatus::Aborted {
                step_id,
                cause: AbortCause::ExpectationMismatch { failures },
                ..
            } => Err(ScenarioError::ExpectationMismatch { step_id, failures }),
        }
    }
}

/// Collects outcomes while the executor runs and seals them into a result.
#[derive(Debug, Default)]
pub(crate) struct ResultAggregator {
    outcomes: Vec<StepOutcome>,
    positions: HashMap<String, usize>,
}

impl ResultAggregator {
    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        self.positions
            .insert(outcome.step_id.clone(), self.outcomes.len());
        self.outcomes.push(outcome);
    }

    pub(crate) fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub(crate) fn finish(
        self,
        status: ScenarioStatus,
        workspace: Option<Workspace>,
    ) -> ScenarioResult {
        ScenarioResult {
            status,
            outcomes: self.outcomes,
            positions: self.positions,
            workspace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, index: usize, success: bool) -> StepOutcome {
        let result = if success {
            InvocationResult::success("ok")
        } else {
            InvocationResult::failure("boom")
        };
        StepOutcome::new(
            id,
            index,
            vec![id.to_string()],
            result,
            Duration::from_millis(5),
        )
    }

    #[test]
    fn aggregator_keeps_execution_order_and_lookup() {
        let mut aggregator = ResultAggregator::default();
        aggregator.record(outcome("build", 0, true));
        aggregator.record(outcome("build --offline", 1, false));
        let result = aggregator.finish(
            ScenarioStatus::Aborted {
                step_index: 1,
                step_id: "build --offline".to_string(),
                cause: AbortCause::ExpectationMismatch {
                    failures: vec!["expected build to succeed, but it failed".to_string()],
                },
            },
            None,
        );
        assert_eq!(
            result.step_ids().collect::<Vec<_>>(),
            ["build", "build --offline"]
        );
        assert!(result.outcome("build").expect("build").is_success());
        assert!(!result
            .outcome("build --offline")
            .expect("offline")
            .is_success());
        assert_eq!(result.aborted_at(), Some("build --offline"));
        assert_eq!(result.status().label(), "aborted");
        assert!(result.workspace_path().is_none());
    }

    #[test]
    fn ensure_completed_reraises_mismatch() {
        let mut aggregator = ResultAggregator::default();
        aggregator.record(outcome("check", 0, false));
        let result = aggregator.finish(
            ScenarioStatus::Aborted {
                step_index: 0,
                step_id: "check".to_string(),
                cause: AbortCause::ExpectationMismatch {
                    failures: vec!["nope".to_string()],
                },
            },
            None,
        );
        match result.ensure_completed() {
            Err(ScenarioError::ExpectationMismatch { step_id, failures }) => {
                assert_eq!(step_id, "check");
                assert_eq!(failures, ["nope"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn completed_result_passes_through() {
        let mut aggregator = ResultAggregator::default();
        aggregator.record(outcome("build", 0, true));
        let result = aggregator
            .finish(ScenarioStatus::Completed, None)
            .ensure_completed()
            .expect("completed");
        assert_eq!(result.len(), 1);
        assert!(result.is_completed());
    }
}
