//! CLI argument parsing for `skit`.
//!
//! The CLI only loads a plan, runs it and reports; all behavior lives in the
//! library so tests can drive the same code without a process boundary.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "skit",
    version,
    about = "Run ordered build scenarios against a shared workspace",
    after_help = "Commands:\n  run <PLAN>        Execute a scenario plan and report each step\n  validate <PLAN>   Check a plan without running it\n  stub              Print a starter plan\n\nExamples:\n  skit stub --program gradle > plan.json\n  skit validate plan.json\n  skit run plan.json --report out/report.json\n  SKIT_LOG=debug skit run plan.json --base-dir /tmp/ws --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Validate(ValidateArgs),
    Stub(StubArgs),
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Execute a scenario plan")]
pub struct RunArgs {
    /// Scenario plan JSON
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Run in this directory instead of a fresh temporary one (kept afterwards)
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Write the JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Print the JSON report to stdout instead of a text summary
    #[arg(long)]
    pub json: bool,

    /// Log at debug level unless SKIT_LOG is set
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Validate a scenario plan without running it")]
pub struct ValidateArgs {
    /// Scenario plan JSON
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Log at debug level unless SKIT_LOG is set
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print a starter scenario plan")]
pub struct StubArgs {
    /// Program the stub's steps invoke
    #[arg(long, value_name = "NAME")]
    pub program: Option<String>,
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.verbose,
            Command::Validate(args) => args.verbose,
            Command::Stub(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let args = RootArgs::try_parse_from([
            "skit",
            "run",
            "plan.json",
            "--base-dir",
            "/tmp/ws",
            "--report",
            "out/report.json",
            "--json",
        ])
        .expect("parse");
        let Command::Run(run) = args.command else {
            panic!("expected run command");
        };
        assert_eq!(run.plan, PathBuf::from("plan.json"));
        assert_eq!(run.base_dir, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(run.report, Some(PathBuf::from("out/report.json")));
        assert!(run.json);
        assert!(!run.verbose);
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(RootArgs::try_parse_from(["skit"]).is_err());
        assert!(RootArgs::try_parse_from(["skit", "run"]).is_err());
    }
}
