//! Step expectations.
//!
//! An expectation never raises: it returns the list of reasons the observed
//! outcome did not match, and an empty list means the step passed.
use super::result::StepOutcome;
use crate::runner::ProcessDetail;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pass/fail state the build is expected to report.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    #[default]
    Success,
    Failure,
    Any,
}

/// Declarative checks on captured output and process facts.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputExpectation {
    #[serde(default)]
    pub outcome: ExpectedOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stdout_contains_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stdout_contains_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stdout_regex_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stdout_regex_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_contains_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_contains_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_regex_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_regex_any: Vec<String>,
}

impl OutputExpectation {
    /// Patterns that fail to compile, reported before anything runs.
    pub fn invalid_patterns(&self) -> Vec<String> {
        self.stdout_regex_all
            .iter()
            .chain(&self.stdout_regex_any)
            .chain(&self.stderr_regex_all)
            .chain(&self.stderr_regex_any)
            .filter_map(|pattern| {
                Regex::new(pattern)
                    .err()
                    .map(|err| format!("{pattern:?}: {err}"))
            })
            .collect()
    }

    fn check(&self, outcome: &StepOutcome, failures: &mut Vec<String>) {
        match self.outcome {
            ExpectedOutcome::Success if !outcome.is_success() => {
                failures.push("expected build to succeed, but it failed".to_string());
            }
            ExpectedOutcome::Failure if outcome.is_success() => {
                failures.push("expected build to fail, but it succeeded".to_string());
            }
            _ => {}
        }

        let process = outcome.detail::<ProcessDetail>();
        if process.is_some_and(|detail| detail.timed_out) {
            failures.push("timed out".to_string());
        }
        if let Some(expected_code) = self.exit_code {
            match process {
                Some(detail) if detail.exit_code == Some(expected_code) => {}
                Some(detail) => failures.push(format!(
                    "expected exit_code {expected_code}, observed {:?}",
                    detail.exit_code
                )),
                None => failures.push(format!(
                    "expected exit_code {expected_code}, but the runner reported no exit code"
                )),
            }
        }

        let stdout = outcome.stdout();
        let stderr = outcome.stderr();
        check_contains_all(stdout, &self.stdout_contains_all, "stdout", failures);
        check_contains_any(stdout, &self.stdout_contains_any, "stdout", failures);
        check_regex_all(stdout, &self.stdout_regex_all, "stdout", failures);
        check_regex_any(stdout, &self.stdout_regex_any, "stdout", failures);
        check_contains_all(stderr, &self.stderr_contains_all, "stderr", failures);
        check_contains_any(stderr, &self.stderr_contains_any, "stderr", failures);
        check_regex_all(stderr, &self.stderr_regex_all, "stderr", failures);
        check_regex_any(stderr, &self.stderr_regex_any, "stderr", failures);
    }
}

type OutcomePredicate = Box<dyn Fn(&StepOutcome) -> bool>;

struct NamedPredicate {
    description: String,
    check: OutcomePredicate,
}

/// Full expectation for a step: declarative checks plus caller predicates.
#[derive(Default)]
pub struct Expectation {
    output: OutputExpectation,
    predicates: Vec<NamedPredicate>,
}

impl Expectation {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure() -> Self {
        Self::from_output(OutputExpectation {
            outcome: ExpectedOutcome::Failure,
            ..OutputExpectation::default()
        })
    }

    pub fn from_output(output: OutputExpectation) -> Self {
        Self {
            output,
            predicates: Vec::new(),
        }
    }

    pub fn outcome(&self) -> ExpectedOutcome {
        self.output.outcome
    }

    pub fn output(&self) -> &OutputExpectation {
        &self.output
    }

    pub(crate) fn set_outcome(&mut self, outcome: ExpectedOutcome) {
        self.output.outcome = outcome;
    }

    /// Add a caller predicate; `description` is reported when it returns false.
    pub fn with_predicate<F>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&StepOutcome) -> bool + 'static,
    {
        self.predicates.push(NamedPredicate {
            description: description.into(),
            check: Box::new(check),
        });
        self
    }

    /// Reasons the outcome does not match; empty when it does.
    pub fn evaluate(&self, outcome: &StepOutcome) -> Vec<String> {
        let mut failures = Vec::new();
        self.output.check(outcome, &mut failures);
        for predicate in &self.predicates {
            if !(predicate.check)(outcome) {
                failures.push(format!("predicate failed: {}", predicate.description));
            }
        }
        failures
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicates: Vec<&str> = self
            .predicates
            .iter()
            .map(|predicate| predicate.description.as_str())
            .collect();
        f.debug_struct("Expectation")
            .field("output", &self.output)
            .field("predicates", &predicates)
            .finish()
    }
}

fn check_contains_all(text: &str, needles: &[String], label: &str, failures: &mut Vec<String>) {
    for needle in needles {
        if !text.contains(needle) {
            failures.push(format!("{label} missing substring {needle:?}"));
        }
    }
}

fn check_contains_any(text: &str, needles: &[String], label: &str, failures: &mut Vec<String>) {
    if needles.is_empty() {
        return;
    }
    if !needles.iter().any(|needle| text.contains(needle)) {
        failures.push(format!("{label} missing any of {needles:?}"));
    }
}

fn check_regex_all(text: &str, patterns: &[String], label: &str, failures: &mut Vec<String>) {
    for pattern in patterns {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(text) {
                    failures.push(format!("{label} missing regex match {pattern:?}"));
                }
            }
            Err(err) => failures.push(format!("invalid {label} regex {pattern:?}: {err}")),
        }
    }
}

fn check_regex_any(text: &str, patterns: &[String], label: &str, failures: &mut Vec<String>) {
    if patterns.is_empty() {
        return;
    }
    let mut invalid = Vec::new();
    let mut any_match = false;
    for pattern in patterns {
        match Regex::new(pattern) {
            Ok(re) => {
                if re.is_match(text) {
                    any_match = true;
                    break;
                }
            }
            Err(err) => invalid.push(format!("{pattern:?}: {err}")),
        }
    }
    if !invalid.is_empty() {
        failures.push(format!(
            "invalid {label} regex_any patterns: {}",
            invalid.join("; ")
        ));
    }
    if !any_match {
        failures.push(format!("{label} missing any regex of {patterns:?}"));
    }
}

#[cfg(test)]
#[path = "expect_tests.rs"]
mod tests;
