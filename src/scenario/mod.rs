//! Scenario configuration and execution.
//!
//! A `Scenario` is built with chained `with_*` calls, validated when `run()`
//! is called, and executed exactly once. Steps run strictly in registration
//! order against one shared workspace; the first step that misses its
//! expectation or raises ends the run.
mod executor;
mod expect;
mod registry;
mod result;
mod step;

pub use executor::ScenarioState;
pub use expect::{ExpectedOutcome, Expectation, OutputExpectation};
pub use registry::StepRegistry;
pub use result::{AbortCause, ScenarioResult, ScenarioStatus, StepOutcome};
pub use step::{AfterAction, BeforeAction, RequestAction, Step};

use crate::error::ScenarioError;
use crate::runner::RunnerFactory;
use crate::workspace::{WorkspaceBuilder, WorkspaceManager};
use executor::ScenarioExecutor;
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for one multi-build exercise.
pub struct Scenario {
    base_dir: Option<PathBuf>,
    workspace_builder: Option<WorkspaceBuilder>,
    runner_factory: Option<Box<dyn RunnerFactory>>,
    steps: StepRegistry,
    state: ScenarioState,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    pub fn new() -> Self {
        Self {
            base_dir: None,
            workspace_builder: None,
            runner_factory: None,
            steps: StepRegistry::new(),
            state: ScenarioState::NotStarted,
        }
    }

    /// Run in `dir` instead of a fresh temporary directory.
    pub fn with_base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        if self.reject_reconfiguration("base directory") {
            return self;
        }
        self.base_dir = Some(dir.into());
        self
    }

    /// Populate the workspace once, before the first step.
    pub fn with_workspace<F>(mut self, builder: F) -> Self
    where
        F: FnOnce(&Path) -> anyhow::Result<()> + 'static,
    {
        if self.reject_reconfiguration("workspace builder") {
            return self;
        }
        self.workspace_builder = Some(Box::new(builder));
        self
    }

    pub fn with_runner_factory<R>(mut self, factory: R) -> Self
    where
        R: RunnerFactory + 'static,
    {
        if self.reject_reconfiguration("runner factory") {
            return self;
        }
        self.runner_factory = Some(Box::new(factory));
        self
    }

    /// Register steps; duplicate ids fail here, before anything runs.
    pub fn with_steps<F>(mut self, configure: F) -> Result<Self, ScenarioError>
    where
        F: FnOnce(&mut StepRegistry) -> Result<(), ScenarioError>,
    {
        if self.state != ScenarioState::NotStarted {
            return Err(ScenarioError::AlreadyExecuted);
        }
        configure(&mut self.steps)?;
        Ok(self)
    }

    pub fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    pub fn base_directory(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// Execute every step once and return the aggregate result.
    ///
    /// Configuration errors are returned before any workspace is touched and
    /// leave the scenario runnable once fixed. A workspace setup failure ends
    /// in a `SetupFailed` result; step failures end in `Aborted`.
    pub fn run(&mut self) -> Result<ScenarioResult, ScenarioError> {
        if self.state != ScenarioState::NotStarted {
            return Err(ScenarioError::AlreadyExecuted);
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::EmptyScenario);
        }
        let Some(mut factory) = self.runner_factory.take() else {
            return Err(ScenarioError::MissingRunnerFactory);
        };

        let manager = WorkspaceManager::new(self.base_dir.clone(), self.workspace_builder.take());
        let result = ScenarioExecutor::new(&mut self.state, factory.as_mut())
            .execute(manager, self.steps.steps_mut());
        debug_assert!(self.state.is_terminal());
        Ok(result)
    }

    fn reject_reconfiguration(&self, what: &str) -> bool {
        if self.state == ScenarioState::NotStarted {
            return false;
        }
        tracing::warn!(state = %self.state, "ignoring {what} change on an executed scenario");
        true
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("base_dir", &self.base_dir)
            .field("workspace_builder", &self.workspace_builder.is_some())
            .field("runner_factory", &self.runner_factory.is_some())
            .field("steps", &self.steps)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod tests;
