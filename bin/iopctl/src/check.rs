//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "binary"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Suite listing and check runs for iopctl."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use iop_checks::{registry, run_suites, CheckScope, ReportFormat, RunOptions, Session};
use iop_common::HarnessConfig;
use tracing::info;

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Suites to run, in registry order; every suite when omitted.
    #[arg(long = "suite", value_name = "NAME", num_args = 1..)]
    suites: Vec<String>,

    /// Report format printed on stdout.
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Stop after the first failed or errored check.
    #[arg(long = "fail-fast", action = clap::ArgAction::SetTrue)]
    fail_fast: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

/// Run the selected suites and print the report. Any failed or errored check
/// makes the process exit with status 1.
pub fn run(config: HarnessConfig, command: CheckCommand) -> Result<ExitCode> {
    let session = Session::open(config).context("unable to open verification session")?;
    let options = RunOptions {
        suites: command.suites,
        fail_fast: command.fail_fast,
    };
    let report = run_suites(&session, &options)?;
    let rendered = report
        .render(command.format.into())
        .context("failed to render report")?;
    println!("{}", rendered);

    info!(
        passed = report.summary.passed,
        failed = report.summary.failed,
        skipped = report.summary.skipped,
        errored = report.summary.errored,
        "verification finished"
    );
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn list() {
    for suite in registry() {
        println!("{}  {}", suite.name, suite.description);
        for check in suite.checks {
            let marker = match check.scope {
                CheckScope::RootlessOnly => " [rootless]",
                CheckScope::Any => "",
            };
            println!("    {}  {}{}", check.name, check.description, marker);
        }
    }
}
