//! Library-level scenarios: a fake incremental build tool that keeps its
//! state in the shared workspace, so later steps see earlier builds.

use anyhow::{Context, Result};
use scenario_kit::{
    InvocationRequest, InvocationResult, Scenario, ScenarioError, ScenarioStatus, Step,
    StepOutcome,
};
use std::fs;
use std::path::Path;

/// Rebuilds `out.txt` from `src.txt` only when the source changed since the
/// last recorded build, mimicking an up-to-date check.
fn incremental_build(req: &InvocationRequest) -> Result<InvocationResult> {
    let src = fs::read_to_string(req.workspace.join("src.txt")).context("read source")?;
    let stamp = req.workspace.join(".build-stamp");
    let previous = fs::read_to_string(&stamp).ok();
    if req.args.iter().any(|arg| arg == "--offline") && previous.is_none() {
        return Ok(InvocationResult::failure(
            "no cached dependencies available offline",
        ));
    }
    if previous.as_deref() == Some(src.as_str()) && !req.args.iter().any(|arg| arg == "--rerun") {
        return Ok(InvocationResult::success("out.txt UP-TO-DATE"));
    }
    fs::write(req.workspace.join("out.txt"), src.to_uppercase())?;
    fs::write(&stamp, &src)?;
    Ok(InvocationResult::success("out.txt EXECUTED"))
}

fn executed(outcome: &StepOutcome) -> bool {
    outcome.stdout().contains("EXECUTED")
}

fn up_to_date(outcome: &StepOutcome) -> bool {
    outcome.stdout().contains("UP-TO-DATE")
}

fn scenario(base: &Path) -> Scenario {
    Scenario::new()
        .with_base_directory(base)
        .with_workspace(|root: &Path| {
            fs::write(root.join("src.txt"), "hello\n")?;
            Ok(())
        })
        .with_runner_factory(|| incremental_build)
}

#[test]
fn incremental_build_reuses_previous_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scenario = scenario(dir.path())
        .with_steps(|registry| {
            registry
                .step("first build", |s| {
                    s.arg("build").expect_that("executed", executed)
                })?
                .step("no-op build", |s| {
                    s.arg("build").expect_that("up to date", up_to_date)
                })?
                .step("after edit", |s| {
                    s.arg("build")
                        .before(|root: &Path| {
                            fs::write(root.join("src.txt"), "changed\n")?;
                            Ok(())
                        })
                        .expect_that("executed", executed)
                        .after(|root: &Path, _: &StepOutcome| {
                            let out = fs::read_to_string(root.join("out.txt"))?;
                            anyhow::ensure!(out == "CHANGED\n", "stale output {out:?}");
                            Ok(())
                        })
                })?
                .step("offline", |s| s.args(["build", "--offline"]))?;
            Ok(())
        })
        .expect("configure");

    let result = scenario.run().expect("run").ensure_completed().expect("completed");
    assert_eq!(
        result.step_ids().collect::<Vec<_>>(),
        ["first build", "no-op build", "after edit", "offline"]
    );
    assert!(up_to_date(result.outcome("offline").expect("offline")));
}

#[test]
fn offline_before_first_build_aborts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scenario = scenario(dir.path())
        .with_steps(|registry| {
            registry
                .step("build --offline", |s| s.args(["build", "--offline"]))?
                .step("build", |s| s.arg("build"))?;
            Ok(())
        })
        .expect("configure");

    let result = scenario.run().expect("run");
    assert_eq!(result.aborted_at(), Some("build --offline"));
    assert_eq!(result.len(), 1);
    assert!(!dir.path().join("out.txt").exists());
    assert!(matches!(result.status(), ScenarioStatus::Aborted { step_index: 0, .. }));

    match result.ensure_completed() {
        Err(ScenarioError::ExpectationMismatch { step_id, failures }) => {
            assert_eq!(step_id, "build --offline");
            assert_eq!(failures, ["expected build to succeed, but it failed"]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn temporary_workspace_lives_as_long_as_the_result() {
    let mut scenario = Scenario::new()
        .with_workspace(|root: &Path| {
            fs::write(root.join("src.txt"), "temp\n")?;
            Ok(())
        })
        .with_runner_factory(|| incremental_build)
        .with_steps(|registry| {
            registry.step("build", |s| s.arg("build"))?;
            Ok(())
        })
        .expect("configure");
    let result = scenario.run().expect("run");
    let workspace = result.workspace_path().expect("workspace").to_path_buf();
    assert!(workspace.join("out.txt").is_file());
    drop(result);
    assert!(!workspace.exists());
}
