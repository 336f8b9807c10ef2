//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "binary"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Management API fixture verification for iopctl."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use iop_checks::Session;
use iop_common::HarnessConfig;
use iop_foreman::{fixtures, TeardownReport};
use tracing::{info, warn};

#[derive(Debug, Subcommand)]
pub enum FixturesCommand {
    /// Create and tear down every fixture, checking nothing is left behind.
    Verify(VerifyOptions),
}

#[derive(Debug, Args)]
pub struct VerifyOptions {
    /// Print the per-fixture counts as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,
}

pub fn run(config: HarnessConfig, command: FixturesCommand) -> Result<ExitCode> {
    match command {
        FixturesCommand::Verify(options) => verify(config, &options),
    }
}

fn verify(config: HarnessConfig, options: &VerifyOptions) -> Result<ExitCode> {
    let session = Session::open(config).context("unable to open verification session")?;
    let api = session.api().context("unable to reach the management API")?;
    let reports = fixtures::verify_all(api).context("fixture cycle failed")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", render(report));
        }
    }

    let residue = reports.iter().filter(|report| !report.is_clean()).count();
    if residue == 0 {
        info!(fixtures = reports.len(), "every fixture cleaned up after itself");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(residue, "fixtures left records behind");
        Ok(ExitCode::FAILURE)
    }
}

fn render(report: &TeardownReport) -> String {
    let status = if report.is_clean() { "clean" } else { "RESIDUE" };
    format!(
        "{:<8} {:<24} {:<32} before={} after={}",
        status, report.fixture, report.resource, report.before, report.after
    )
}
