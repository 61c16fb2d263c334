//! Step definition and its builder.
use super::expect::{ExpectedOutcome, Expectation, OutputExpectation};
use super::result::StepOutcome;
use crate::runner::InvocationRequest;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Runs before the invocation and may mutate the workspace.
pub type BeforeAction = Box<dyn FnOnce(&Path) -> Result<()>>;
/// Adjusts the invocation request before the handle sees it.
pub type RequestAction = Box<dyn FnOnce(&mut InvocationRequest) -> Result<()>>;
/// Runs after the invocation with the recorded outcome.
pub type AfterAction = Box<dyn FnOnce(&Path, &StepOutcome) -> Result<()>>;

/// One named build invocation.
///
/// Hooks are `FnOnce`: a scenario runs once, so each hook fires at most once.
pub struct Step {
    id: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    expectation: Expectation,
    pub(crate) before: Option<BeforeAction>,
    pub(crate) configure_request: Option<RequestAction>,
    pub(crate) after: Option<AfterAction>,
}

impl Step {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            expectation: Expectation::success(),
            before: None,
            configure_request: None,
            after: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn expect_success(mut self) -> Self {
        self.expectation.set_outcome(ExpectedOutcome::Success);
        self
    }

    pub fn expect_failure(mut self) -> Self {
        self.expectation.set_outcome(ExpectedOutcome::Failure);
        self
    }

    /// Accept either result; only output checks and predicates apply.
    pub fn expect_any_outcome(mut self) -> Self {
        self.expectation.set_outcome(ExpectedOutcome::Any);
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }

    pub fn expect_output(self, output: OutputExpectation) -> Self {
        self.expect(Expectation::from_output(output))
    }

    pub fn expect_that<F>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&StepOutcome) -> bool + 'static,
    {
        self.expectation = self.expectation.with_predicate(description, check);
        self
    }

    pub fn before<F>(mut self, action: F) -> Self
    where
        F: FnOnce(&Path) -> Result<()> + 'static,
    {
        self.before = Some(Box::new(action));
        self
    }

    pub fn configure_request<F>(mut self, action: F) -> Self
    where
        F: FnOnce(&mut InvocationRequest) -> Result<()> + 'static,
    {
        self.configure_request = Some(Box::new(action));
        self
    }

    pub fn after<F>(mut self, action: F) -> Self
    where
        F: FnOnce(&Path, &StepOutcome) -> Result<()> + 'static,
    {
        self.after = Some(Box::new(action));
        self
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("expectation", &self.expectation)
            .field("before", &self.before.is_some())
            .field("configure_request", &self.configure_request.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}
