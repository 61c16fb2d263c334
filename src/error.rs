//! Error taxonomy for scenario configuration and execution.
//!
//! Configuration problems surface before any workspace is touched. Step-level
//! failures are normally captured inside a `ScenarioResult`; the
//! `ExpectationMismatch` variant only exists so callers can re-raise one.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where inside a step an unexpected error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Before,
    ConfigureRequest,
    CreateHandle,
    Invoke,
    After,
}

impl StepPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepPhase::Before => "before",
            StepPhase::ConfigureRequest => "configure_request",
            StepPhase::CreateHandle => "create_handle",
            StepPhase::Invoke => "invoke",
            StepPhase::After => "after",
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while configuring or running a scenario.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Base directory unusable or the workspace population routine failed
    #[error("workspace setup failed for {}: {source:#}", path.display())]
    WorkspaceSetup {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Two steps registered under the same identifier
    #[error("duplicate step id '{id}'")]
    DuplicateStep { id: String },

    /// Step rejected at registration time
    #[error("invalid step '{id}': {reason}")]
    InvalidStep { id: String, reason: String },

    /// No steps registered when `run()` was called
    #[error("scenario has no steps")]
    EmptyScenario,

    /// No runner factory configured when `run()` was called
    #[error("scenario has no runner factory")]
    MissingRunnerFactory,

    /// `run()` called on a scenario that already ran
    #[error("scenario has already been executed")]
    AlreadyExecuted,

    /// Unexpected error from an action, the runner factory, or the handle
    #[error("step '{step_id}' failed during {phase}: {source:#}")]
    StepExecution {
        step_id: String,
        phase: StepPhase,
        #[source]
        source: anyhow::Error,
    },

    /// Step outcome did not match its expectation
    #[error("step '{step_id}' did not meet its expectation: {}", failures.join("; "))]
    ExpectationMismatch {
        step_id: String,
        failures: Vec<String>,
    },
}

impl ScenarioError {
    pub(crate) fn step(step_id: &str, phase: StepPhase, source: anyhow::Error) -> Self {
        ScenarioError::StepExecution {
            step_id: step_id.to_string(),
            phase,
            source,
        }
    }

    /// True for errors raised before any workspace is touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScenarioError::DuplicateStep { .. }
                | ScenarioError::InvalidStep { .. }
                | ScenarioError::EmptyScenario
                | ScenarioError::MissingRunnerFactory
                | ScenarioError::AlreadyExecuted
        )
    }
}
