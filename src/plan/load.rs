//! Plan loading and validation.
use super::{PlanStep, ScenarioPlan, SCENARIO_PLAN_SCHEMA_VERSION};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

const SCENARIO_PLAN_TEMPLATE: &str = include_str!("../../templates/scenario_plan.json");

/// Read, parse and validate a plan file.
pub fn load_plan(path: &Path) -> Result<ScenarioPlan> {
    let bytes = fs::read(path).with_context(|| format!("read scenario plan {}", path.display()))?;
    parse_plan(&bytes).with_context(|| format!("load scenario plan {}", path.display()))
}

/// Parse and validate plan JSON already in memory.
pub fn parse_plan(bytes: &[u8]) -> Result<ScenarioPlan> {
    let plan: ScenarioPlan = serde_json::from_slice(bytes).context("parse scenario plan JSON")?;
    validate_plan(&plan)?;
    Ok(plan)
}

/// Check a plan without touching the filesystem.
pub fn validate_plan(plan: &ScenarioPlan) -> Result<()> {
    if plan.schema_version != SCENARIO_PLAN_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported scenario plan schema_version {}",
            plan.schema_version
        ));
    }
    if plan.program.trim().is_empty() {
        return Err(anyhow!("program must not be empty"));
    }
    if let Some(timeout_seconds) = plan.defaults.timeout_seconds {
        if !timeout_seconds.is_finite() || timeout_seconds <= 0.0 {
            return Err(anyhow!("defaults.timeout_seconds must be > 0"));
        }
        Duration::try_from_secs_f64(timeout_seconds)
            .context("defaults.timeout_seconds out of range")?;
    }
    validate_env(&plan.defaults.env).context("validate defaults.env")?;
    plan.workspace
        .validate()
        .context("validate workspace seed")?;
    if plan.steps.is_empty() {
        return Err(anyhow!("scenario plan contains no steps"));
    }

    let mut ids = HashSet::new();
    for (idx, step) in plan.steps.iter().enumerate() {
        validate_step(step).with_context(|| format!("validate steps[{idx}] ({:?})", step.id))?;
        if !ids.insert(step.id.as_str()) {
            return Err(anyhow!("duplicate step id {:?}", step.id));
        }
    }
    Ok(())
}

fn validate_step(step: &PlanStep) -> Result<()> {
    if step.id.trim().is_empty() {
        return Err(anyhow!("id must not be empty"));
    }
    step.argv()?;
    validate_env(&step.env).context("validate env")?;
    let invalid = step.expect.invalid_patterns();
    if !invalid.is_empty() {
        return Err(anyhow!("invalid expect regex: {}", invalid.join("; ")));
    }
    if let Some(seed) = step.before.as_ref() {
        seed.validate().context("validate before seed")?;
    }
    Ok(())
}

fn validate_env(env: &BTreeMap<String, String>) -> Result<()> {
    for key in env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(anyhow!("invalid environment variable name {key:?}"));
        }
    }
    Ok(())
}

/// Render a starter plan, optionally for a specific program.
pub fn plan_stub(program: Option<&str>) -> Result<String> {
    let mut plan: ScenarioPlan =
        serde_json::from_str(SCENARIO_PLAN_TEMPLATE).context("parse scenario plan template")?;
    if let Some(program) = program {
        plan.program = program.to_string();
    }
    serde_json::to_string_pretty(&plan).context("serialize scenario plan stub")
}
