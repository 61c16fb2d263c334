//! Multi-build scenario engine.
//!
//! A [`Scenario`] runs an ordered list of build invocations against one shared
//! workspace, stops at the first step that misses its expectation, and returns
//! a [`ScenarioResult`] with one outcome per attempted step. The build tool
//! itself is supplied through a [`RunnerFactory`]; [`ProcessRunnerFactory`]
//! runs a real program, and any `FnMut() -> handle` closure works for tests.
//!
//! Plans ([`plan`]) describe scenarios in JSON, and [`report`] turns a result
//! into a JSON summary.
pub mod error;
pub mod plan;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod util;
pub mod workspace;

pub use error::{ScenarioError, StepPhase};
pub use plan::{load_plan, ScenarioPlan};
pub use report::ScenarioReport;
pub use runner::{
    InvocationHandle, InvocationRequest, InvocationResult, ProcessDetail, ProcessRunnerFactory,
    RunnerFactory, StepContext,
};
pub use scenario::{
    AbortCause, ExpectedOutcome, Expectation, OutputExpectation, Scenario, ScenarioResult,
    ScenarioState, ScenarioStatus, Step, StepOutcome, StepRegistry,
};
pub use workspace::{SeedEntry, Workspace, WorkspaceSeed};
