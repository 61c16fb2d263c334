use anyhow::{Context, Result};
use clap::Parser;
use scenario_kit::plan::{parse_plan, plan_stub};
use scenario_kit::report::ScenarioReport;
use scenario_kit::util::{format_command_line, sha256_hex};
use std::fs;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, RootArgs, RunArgs, StubArgs, ValidateArgs};

const LOG_ENV: &str = "SKIT_LOG";

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_logging(args.command.verbose());
    let outcome = match args.command {
        Command::Run(args) => run(&args),
        Command::Validate(args) => validate(&args).map(|()| true),
        Command::Stub(args) => stub(&args).map(|()| true),
    };
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether the scenario completed.
fn run(args: &RunArgs) -> Result<bool> {
    let bytes = fs::read(&args.plan)
        .with_context(|| format!("read scenario plan {}", args.plan.display()))?;
    let digest = sha256_hex(&bytes);
    let plan = parse_plan(&bytes)
        .with_context(|| format!("load scenario plan {}", args.plan.display()))?;
    let program = plan.program.clone();
    let step_count = plan.steps.len();

    let mut scenario = plan.into_scenario(args.base_dir.as_deref())?;
    let result = scenario.run().context("start scenario")?;
    let report = ScenarioReport::from_result(&result, step_count, Some(digest))?;

    if let Some(path) = args.report.as_deref() {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "report written");
    }
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize scenario report")?;
        println!("{text}");
    } else {
        print_summary(&report, &program);
    }
    Ok(report.is_completed())
}

fn print_summary(report: &ScenarioReport, program: &str) {
    for step in &report.steps {
        let mark = if step.passed { "ok" } else { "FAIL" };
        println!(
            "{mark:>4}  {}  ({} ms)  {}",
            step.id,
            step.duration_ms,
            format_command_line(program, &step.args)
        );
        for failure in &step.failures {
            println!("      - {failure}");
        }
    }
    println!(
        "{}: {} passed, {} failed, {} skipped",
        report.status, report.pass_count, report.fail_count, report.skipped_count
    );
    if let Some(cause) = report.cause.as_deref() {
        println!("cause: {cause}");
    }
    if let Some(workspace) = report.workspace.as_deref() {
        println!("workspace: {workspace}");
    }
}

fn validate(args: &ValidateArgs) -> Result<()> {
    let plan = scenario_kit::load_plan(&args.plan)?;
    println!(
        "{}: ok ({} steps, program {})",
        args.plan.display(),
        plan.steps.len(),
        plan.program
    );
    Ok(())
}

fn stub(args: &StubArgs) -> Result<()> {
    println!("{}", plan_stub(args.program.as_deref())?);
    Ok(())
}
