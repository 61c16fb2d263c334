//! Machine-readable summary of one scenario run.
use crate::runner::ProcessDetail;
use crate::scenario::{AbortCause, ScenarioResult, ScenarioStatus, StepOutcome};
use crate::util::bounded_snippet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SCENARIO_REPORT_SCHEMA_VERSION: u32 = 1;
pub const SNIPPET_MAX_LINES: usize = 60;
pub const SNIPPET_MAX_BYTES: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioReport {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_step_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub step_count: usize,
    pub pass_count: usize,
    pub fail_count: usize,
    pub skipped_count: usize,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepReport {
    pub id: String,
    pub index: usize,
    pub args: Vec<String>,
    pub success: bool,
    pub passed: bool,
    pub duration_ms: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub timed_out: bool,
    pub stdout_snippet: String,
    pub stderr_snippet: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl ScenarioReport {
    /// Summarize `result`; `step_count` is the number of registered steps.
    pub fn from_result(
        result: &ScenarioResult,
        step_count: usize,
        plan_digest: Option<String>,
    ) -> Result<Self> {
        let generated_at_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("compute timestamp")?
            .as_millis();

        let (aborted_step_id, aborted_step_index, cause) = match result.status() {
            ScenarioStatus::Completed => (None, None, None),
            ScenarioStatus::Aborted {
                step_index,
                step_id,
                cause,
            } => (Some(step_id.clone()), Some(*step_index), Some(cause.to_string())),
            ScenarioStatus::SetupFailed { error } => (None, None, Some(format!("{error}"))),
        };

        let steps: Vec<StepReport> = result
            .outcomes()
            .iter()
            .map(|outcome| step_report(outcome, result.status()))
            .collect();
        let pass_count = steps.iter().filter(|step| step.passed).count();
        let mut fail_count = steps.len() - pass_count;
        let mut attempted = steps.len();
        if let ScenarioStatus::Aborted { step_index, .. } = result.status() {
            // A hook, factory or invoke error leaves no outcome for the aborting step.
            if !steps.iter().any(|step| step.index == *step_index) {
                fail_count += 1;
            }
            attempted = step_index + 1;
        }

        Ok(Self {
            schema_version: SCENARIO_REPORT_SCHEMA_VERSION,
            generated_at_epoch_ms,
            plan_digest,
            workspace: result
                .workspace_path()
                .map(|path| path.display().to_string()),
            status: result.status().label().to_string(),
            aborted_step_id,
            aborted_step_index,
            cause,
            step_count,
            pass_count,
            fail_count,
            skipped_count: step_count.saturating_sub(attempted),
            steps,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == ScenarioStatus::Completed.label()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create report dir {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("serialize scenario report")?;
        fs::write(path, text + "\n").with_context(|| format!("write report {}", path.display()))
    }
}

fn step_report(outcome: &StepOutcome, status: &ScenarioStatus) -> StepReport {
    let failures = match status {
        ScenarioStatus::Aborted {
            step_index, cause, ..
        } if *step_index == outcome.index() => match cause {
            AbortCause::ExpectationMismatch { failures } => failures.clone(),
            AbortCause::Error(error) => vec![error.to_string()],
        },
        _ => Vec::new(),
    };
    let process = outcome.detail::<ProcessDetail>();
    StepReport {
        id: outcome.step_id().to_string(),
        index: outcome.index(),
        args: outcome.args().to_vec(),
        success: outcome.is_success(),
        passed: failures.is_empty(),
        duration_ms: outcome.duration().as_millis(),
        exit_code: process.and_then(|detail| detail.exit_code),
        timed_out: process.is_some_and(|detail| detail.timed_out),
        stdout_snippet: bounded_snippet(outcome.stdout(), SNIPPET_MAX_LINES, SNIPPET_MAX_BYTES),
        stderr_snippet: bounded_snippet(outcome.stderr(), SNIPPET_MAX_LINES, SNIPPET_MAX_BYTES),
        failures,
    }
}
