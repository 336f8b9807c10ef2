//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "binary"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Verification CLI for IOP deployments."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use iop_common::{
    init_tracing, CertificateSource, DatabaseMode, HarnessConfig, LoadedHarnessConfig, RunLog,
};
use tracing::info;

mod check;
mod fixtures;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Verify an IOP deployment over SSH and the management API",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run check suites against the configured hosts.
    Check(check::CheckCommand),
    /// List every suite and its checks.
    List,
    /// Render and print the certificate configuration for the server.
    Certificates,
    #[command(subcommand, about = "Management API fixture actions")]
    Fixtures(fixtures::FixturesCommand),
    /// Print version information.
    Version,
}

/// Settings applied on top of the configuration file.
#[derive(Debug, Args)]
struct Overrides {
    /// Configuration file (defaults to IOP_CHECKS_CONFIG, then iop-checks.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SSH client configuration used to reach every host.
    #[arg(long = "ssh-config", global = true, value_name = "FILE")]
    ssh_config: Option<PathBuf>,

    /// Host alias of the server under test.
    #[arg(long, global = true, value_name = "ALIAS")]
    server: Option<String>,

    /// Rootless service account; pass an empty value for rootful deployments.
    #[arg(long, global = true, value_name = "USER")]
    user: Option<String>,

    #[arg(long = "certificate-source", global = true, value_enum)]
    certificate_source: Option<CertificateSource>,

    #[arg(long = "database-mode", global = true, value_enum)]
    database_mode: Option<DatabaseMode>,
}

impl Overrides {
    /// Resolve the configuration and start the run log, which must outlive
    /// the command.
    fn load(&self) -> Result<(HarnessConfig, RunLog)> {
        let loaded = match &self.config {
            Some(path) => LoadedHarnessConfig {
                config: HarnessConfig::from_path(path)?,
                source: Some(path.clone()),
            },
            None => HarnessConfig::load_with_source(HarnessConfig::DEFAULT_CANDIDATES)?,
        };
        let mut config = loaded.config;
        self.apply(&mut config);
        config.validate().context("invalid configuration after overrides")?;

        let run = init_tracing("iopctl", &config)?;
        match &loaded.source {
            Some(path) => info!(config_path = %path.display(), "configuration loaded"),
            None => info!("no configuration file found, using defaults"),
        }
        Ok((config, run))
    }

    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(path) = &self.ssh_config {
            config.targets.ssh_config = path.clone();
        }
        if let Some(server) = &self.server {
            config.targets.server = server.clone();
        }
        if let Some(user) = &self.user {
            config.deployment.user = Some(user.trim().to_owned()).filter(|user| !user.is_empty());
        }
        if let Some(source) = self.certificate_source {
            config.deployment.certificate_source = source;
        }
        if let Some(mode) = self.database_mode {
            config.deployment.database_mode = mode;
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            check::list();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check(cmd) => {
            let (config, _run) = cli.overrides.load()?;
            check::run(config, cmd)
        }
        Commands::Certificates => {
            let (config, _run) = cli.overrides.load()?;
            let certificates = iop_vars::load_certificates(
                &config.deployment.vars_dir,
                config.deployment.certificate_source,
                &config.server_fqdn(),
            )?;
            print!("{}", certificates.to_yaml()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Fixtures(cmd) => {
            let (config, _run) = cli.overrides.load()?;
            fixtures::run(config, cmd)
        }
    }
}
