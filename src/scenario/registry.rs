//! Ordered, append-only step registry.
use super::step::Step;
use crate::error::ScenarioError;
use std::collections::HashSet;

/// Steps in registration order, unique by id.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
    ids: HashSet<String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, failing fast on an empty or already registered id.
    pub fn add(&mut self, step: Step) -> Result<&mut Self, ScenarioError> {
        if step.id().trim().is_empty() {
            return Err(ScenarioError::InvalidStep {
                id: step.id().to_string(),
                reason: "step id must not be empty".to_string(),
            });
        }
        if self.ids.contains(step.id()) {
            return Err(ScenarioError::DuplicateStep {
                id: step.id().to_string(),
            });
        }
        self.ids.insert(step.id().to_string());
        self.steps.push(step);
        Ok(self)
    }

    /// Build a step in place: `registry.step("build", |s| s.arg("build"))?`.
    pub fn step<F>(&mut self, id: impl Into<String>, configure: F) -> Result<&mut Self, ScenarioError>
    where
        F: FnOnce(Step) -> Step,
    {
        let id = id.into();
        let step = configure(Step::new(id.clone()));
        if step.id() != id {
            return Err(ScenarioError::InvalidStep {
                id,
                reason: "step id changed during configuration".to_string(),
            });
        }
        self.add(step)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(Step::id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
