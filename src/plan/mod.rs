//! JSON scenario plans.
//!
//! A plan describes one scenario declaratively: the program every step runs,
//! a seed for the shared workspace, and an ordered list of steps with their
//! arguments and output expectations. Plans are validated strictly before a
//! `Scenario` is built from them.
mod load;

pub use load::{load_plan, parse_plan, plan_stub, validate_plan};

use crate::runner::ProcessRunnerFactory;
use crate::scenario::{OutputExpectation, Scenario, Step};
use crate::workspace::WorkspaceSeed;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SCENARIO_PLAN_SCHEMA_VERSION: u32 = 1;

/// Top-level plan document.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioPlan {
    pub schema_version: u32,
    pub program: String,
    #[serde(default)]
    pub defaults: PlanDefaults,
    #[serde(default, skip_serializing_if = "WorkspaceSeed::is_empty")]
    pub workspace: WorkspaceSeed,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// Settings applied to every step unless a step overrides them.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlanDefaults {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

/// One step; exactly one of `args` and `command` must be set.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlanStep {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub expect: OutputExpectation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<WorkspaceSeed>,
}

impl PlanStep {
    /// Arguments passed to the program, splitting `command` like a shell would.
    pub fn argv(&self) -> Result<Vec<String>> {
        match (&self.args, &self.command) {
            (Some(args), None) => Ok(args.clone()),
            (None, Some(command)) => {
                let argv = shell_words::split(command)
                    .with_context(|| format!("parse command {command:?}"))?;
                if argv.is_empty() {
                    return Err(anyhow!("command must not be empty"));
                }
                Ok(argv)
            }
            (Some(_), Some(_)) => Err(anyhow!("set either args or command, not both")),
            (None, None) => Err(anyhow!("one of args or command is required")),
        }
    }
}

impl ScenarioPlan {
    pub fn timeout(&self) -> Option<Duration> {
        self.defaults
            .timeout_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    /// Build a runnable scenario backed by a `ProcessRunnerFactory`.
    ///
    /// The plan is validated first; `base_dir` is passed through to the
    /// workspace manager when set.
    pub fn into_scenario(self, base_dir: Option<&Path>) -> Result<Scenario> {
        validate_plan(&self)?;
        let factory = ProcessRunnerFactory::new(&self.program)?
            .with_env(self.defaults.env.clone())
            .with_timeout(self.timeout());

        let mut steps = Vec::with_capacity(self.steps.len());
        for plan_step in self.steps {
            let argv = plan_step
                .argv()
                .with_context(|| format!("step {}", plan_step.id))?;
            let mut step = Step::new(plan_step.id)
                .args(argv)
                .expect_output(plan_step.expect);
            for (key, value) in plan_step.env {
                step = step.env(key, value);
            }
            if let Some(seed) = plan_step.before {
                step = step.before(move |root: &Path| seed.materialize(root));
            }
            steps.push(step);
        }

        let mut scenario = Scenario::new().with_runner_factory(factory);
        if let Some(base_dir) = base_dir {
            scenario = scenario.with_base_directory(PathBuf::from(base_dir));
        }
        if !self.workspace.is_empty() {
            let seed = self.workspace;
            scenario = scenario.with_workspace(move |root: &Path| seed.materialize(root));
        }
        let scenario = scenario.with_steps(move |registry| {
            for step in steps {
                registry.add(step)?;
            }
            Ok(())
        })?;
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ExpectedOutcome;

    fn step(id: &str) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            args: None,
            command: None,
            env: BTreeMap::new(),
            expect: OutputExpectation::default(),
            before: None,
        }
    }

    #[test]
    fn argv_prefers_whichever_form_is_set() {
        let mut with_args = step("build");
        with_args.args = Some(vec!["build".to_string(), "--offline".to_string()]);
        assert_eq!(with_args.argv().unwrap(), ["build", "--offline"]);

        let mut with_command = step("quoted");
        with_command.command = Some("test --tests 'Foo Bar'".to_string());
        assert_eq!(with_command.argv().unwrap(), ["test", "--tests", "Foo Bar"]);

        let mut empty_args = step("default-target");
        empty_args.args = Some(Vec::new());
        assert!(empty_args.argv().unwrap().is_empty());
    }

    #[test]
    fn argv_rejects_ambiguous_or_missing_forms() {
        let mut both = step("both");
        both.args = Some(vec!["build".to_string()]);
        both.command = Some("build".to_string());
        assert!(both.argv().unwrap_err().to_string().contains("not both"));

        assert!(step("neither").argv().is_err());

        let mut blank = step("blank");
        blank.command = Some("   ".to_string());
        assert!(blank.argv().is_err());

        let mut unbalanced = step("unbalanced");
        unbalanced.command = Some("build 'oops".to_string());
        assert!(unbalanced.argv().is_err());
    }

    #[test]
    fn plan_parses_with_defaults_filled_in() {
        let plan: ScenarioPlan = serde_json::from_str(
            r#"{
                "schema_version": 1,
                "program": "/bin/sh",
                "steps": [
                    {"id": "probe", "command": "-c true", "expect": {"outcome": "any"}}
                ]
            }"#,
        )
        .expect("parse plan");
        assert!(plan.workspace.is_empty());
        assert!(plan.defaults.env.is_empty());
        assert_eq!(plan.timeout(), None);
        assert_eq!(plan.steps[0].expect.outcome, ExpectedOutcome::Any);
    }
}
