//! End-to-end checks of the `skit` binary against plans that drive `/bin/sh`.
#![cfg(unix)]

mod common;

use common::{run_skit, shell_available, PlanFixture};
use serde_json::json;
use std::ffi::OsStr;

fn shell_plan(steps: serde_json::Value) -> serde_json::Value {
    json!({
        "schema_version": 1,
        "program": "/bin/sh",
        "defaults": { "env": { "GREETING": "hello" }, "timeout_seconds": 30.0 },
        "workspace": {
            "entries": [
                { "path": "src/input.txt", "kind": "file", "contents": "v1\n" }
            ]
        },
        "steps": steps
    })
}

#[test]
fn completed_plan_exits_zero_and_writes_report() {
    if !shell_available() {
        return;
    }
    let fixture = PlanFixture::new(&shell_plan(json!([
        {
            "id": "build",
            "args": ["-c", "mkdir -p out && cp src/input.txt out/result.txt && echo \"$GREETING built\""],
            "expect": { "stdout_contains_all": ["hello built"] }
        },
        {
            "id": "edit-and-rebuild",
            "command": "-c 'cp src/input.txt out/result.txt && cat out/result.txt'",
            "before": {
                "entries": [ { "path": "src/input.txt", "kind": "file", "contents": "v2\n" } ]
            },
            "expect": { "stdout_regex_all": ["(?m)^v2$"] }
        },
        {
            "id": "broken-on-purpose",
            "args": ["-c", "echo missing dependency >&2; exit 3"],
            "expect": { "outcome": "failure", "exit_code": 3, "stderr_contains_any": ["missing"] }
        }
    ])));
    let workspace = fixture.path("ws");
    let report_path = fixture.path("out/report.json");

    let run = run_skit([
        OsStr::new("run"),
        fixture.plan_path.as_os_str(),
        OsStr::new("--base-dir"),
        workspace.as_os_str(),
        OsStr::new("--report"),
        report_path.as_os_str(),
    ]);
    assert_eq!(run.exit_code, Some(0), "stdout: {}\nstderr: {}", run.stdout, run.stderr);
    assert!(run.stdout.contains("completed: 3 passed, 0 failed, 0 skipped"), "{}", run.stdout);

    let report = fixture.read_json("out/report.json");
    assert_eq!(report["status"], "completed");
    assert_eq!(report["step_count"], 3);
    assert_eq!(report["steps"][2]["exit_code"], 3);
    assert_eq!(report["steps"][2]["success"], false);
    assert_eq!(report["steps"][2]["passed"], true);
    assert_eq!(report["plan_digest"].as_str().map(str::len), Some(64));

    let result = std::fs::read_to_string(workspace.join("out/result.txt")).expect("result");
    assert_eq!(result, "v2\n");
}

#[test]
fn failing_step_aborts_and_exits_one() {
    if !shell_available() {
        return;
    }
    let fixture = PlanFixture::new(&shell_plan(json!([
        { "id": "build", "args": ["-c", "true"] },
        { "id": "build --offline", "args": ["-c", "echo offline >&2; exit 1"] },
        { "id": "never", "args": ["-c", "touch never-ran"] }
    ])));
    let workspace = fixture.path("ws");

    let run = run_skit([
        OsStr::new("run"),
        fixture.plan_path.as_os_str(),
        OsStr::new("--base-dir"),
        workspace.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_eq!(run.exit_code, Some(1), "stderr: {}", run.stderr);
    let report: serde_json::Value = serde_json::from_str(&run.stdout).expect("json report");
    assert_eq!(report["status"], "aborted");
    assert_eq!(report["aborted_step_id"], "build --offline");
    assert_eq!(report["aborted_step_index"], 1);
    assert_eq!(report["pass_count"], 1);
    assert_eq!(report["fail_count"], 1);
    assert_eq!(report["skipped_count"], 1);
    assert_eq!(report["steps"][1]["stderr_snippet"], "offline\n");
    assert!(!workspace.join("never-ran").exists());
}

#[test]
fn timeout_is_reported_per_step() {
    if !shell_available() {
        return;
    }
    let mut plan = shell_plan(json!([
        { "id": "hang", "args": ["-c", "exec sleep 5"], "expect": { "outcome": "any" } }
    ]));
    plan["defaults"]["timeout_seconds"] = json!(0.2);
    let fixture = PlanFixture::new(&plan);

    let run = run_skit([OsStr::new("run"), fixture.plan_path.as_os_str(), OsStr::new("--json")]);
    assert_eq!(run.exit_code, Some(1), "stderr: {}", run.stderr);
    let report: serde_json::Value = serde_json::from_str(&run.stdout).expect("json report");
    assert_eq!(report["steps"][0]["timed_out"], true);
    assert_eq!(report["steps"][0]["failures"][0], "timed out");
}

#[test]
fn validate_rejects_bad_plans_without_running() {
    let fixture = PlanFixture::new(&json!({
        "schema_version": 1,
        "program": "/bin/sh",
        "steps": [
            { "id": "build", "args": ["-c", "true"] },
            { "id": "build", "args": ["-c", "true"] }
        ]
    }));
    let run = run_skit([OsStr::new("validate"), fixture.plan_path.as_os_str()]);
    assert_eq!(run.exit_code, Some(1));
    assert!(run.stderr.contains("duplicate step id"), "{}", run.stderr);
}

#[test]
fn stub_round_trips_through_validate() {
    let stub = run_skit(["stub", "--program", "gradle"]);
    assert_eq!(stub.exit_code, Some(0), "{}", stub.stderr);
    let plan: serde_json::Value = serde_json::from_str(&stub.stdout).expect("stub json");
    assert_eq!(plan["program"], "gradle");

    let fixture = PlanFixture::new(&plan);
    let run = run_skit([OsStr::new("validate"), fixture.plan_path.as_os_str()]);
    assert_eq!(run.exit_code, Some(0), "{}", run.stderr);
    assert!(run.stdout.contains("ok (3 steps, program gradle)"), "{}", run.stdout);
}
