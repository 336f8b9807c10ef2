//! ---
//! iop_section: "01-core-functionality"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Per-run tracing setup for harness binaries."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Each invocation is one verification run. It gets a run id, its own JSON
//! log file `<directory>/<prefix>-<run id>.log`, and a `run` span naming the
//! server, the deployment scope and the database mode. Every check event
//! is recorded inside that span, so a log file can be matched to the
//! report printed for the same run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};
use tracing::span::EnteredSpan;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::HarnessConfig;

const LOG_ENV: &str = "IOP_LOG";

/// Console log formats. The run file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One line per event without timestamps, for terminals.
    #[default]
    Compact,
    /// JSON lines with the enclosing run span, for CI collectors.
    Json,
}

/// Keeps the run span entered and the file writer flushing until dropped.
#[must_use = "dropping the run log closes the run span and flushes the log file"]
pub struct RunLog {
    run_id: String,
    path: PathBuf,
    _span: EnteredSpan,
    _guard: WorkerGuard,
}

impl RunLog {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<UTC timestamp>-<pid>`, sortable and unique per host.
pub fn run_id(started: DateTime<Utc>) -> String {
    format!("{}-{}", started.format("%Y%m%dT%H%M%SZ"), std::process::id())
}

/// `IOP_LOG`, then `RUST_LOG`, then the configured level. An invalid
/// directive is reported and skipped.
fn env_filter(default_level: &str) -> EnvFilter {
    for var in [LOG_ENV, EnvFilter::DEFAULT_ENV] {
        if let Ok(directive) = std::env::var(var) {
            match EnvFilter::try_new(&directive) {
                Ok(filter) => return filter,
                Err(err) => eprintln!("ignoring invalid {} directive '{}': {}", var, directive, err),
            }
        }
    }
    EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the subscriber for one run and enter its span.
///
/// Console output goes to stderr so reports printed on stdout stay clean.
/// When a subscriber is already installed (tests), the existing one keeps
/// receiving events and only the run span and file are created.
pub fn init_tracing(service_name: &str, config: &HarnessConfig) -> Result<RunLog> {
    let logging = &config.logging;
    fs::create_dir_all(&logging.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            logging.directory.display()
        )
    })?;

    let run_id = run_id(Utc::now());
    let prefix = logging.file_prefix.as_deref().unwrap_or(service_name);
    let file_name = format!("{}-{}.log", prefix, run_id);
    let path = logging.directory.join(&file_name);
    let (file_writer, guard) =
        tracing_appender::non_blocking(rolling::never(&logging.directory, &file_name));

    let console_layer = match logging.format {
        LogFormat::Compact => fmt::layer()
            .compact()
            .without_time()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };
    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(file_writer)
        .boxed();

    tracing_subscriber::registry()
        .with(env_filter(&logging.level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    let scope = match config.deployment.user.as_deref() {
        Some(_) => "rootless",
        None => "rootful",
    };
    let span = info_span!(
        "run",
        run_id = %run_id,
        server = %config.targets.server,
        scope,
        database = config.deployment.database_mode.as_str()
    )
    .entered();
    info!(service = service_name, log_file = %path.display(), "run started");

    Ok(RunLog {
        run_id,
        path,
        _span: span,
        _guard: guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_ids_sort_by_start_time() {
        let earlier = run_id(Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap());
        let later = run_id(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
        assert!(earlier.starts_with("20260301T090500Z-"));
        assert!(earlier < later);
    }

    #[test]
    fn each_run_writes_its_own_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = HarnessConfig::default();
        config.logging.directory = dir.path().join("logs");
        config.logging.file_prefix = Some("unit".into());

        let run = init_tracing("iop-common-test", &config).expect("tracing initialises");
        assert!(config.logging.directory.is_dir());
        assert!(run.path().starts_with(&config.logging.directory));
        let file_name = run.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(file_name, format!("unit-{}.log", run.run_id()));
    }

    #[test]
    fn formats_parse_from_config_names() {
        let config: HarnessConfig = "[logging]\nformat = \"json\"\nlevel = \"debug\"\n"
            .parse()
            .expect("logging section parses");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}
