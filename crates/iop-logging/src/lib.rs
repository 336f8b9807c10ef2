//! ---
//! iop_section: "03-logging"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Structured check logging adapters."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Check-scoped logging helpers shared by the verification crates.

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_test_writer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Host alias the event relates to.
    pub host: Option<&'a str>,
    /// Suite being executed.
    pub suite: Option<&'a str>,
    /// Individual check name.
    pub check: Option<&'a str>,
    /// Rootless service account, when relevant.
    pub user: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a host alias.
    pub fn with_host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }

    /// Attach a suite name.
    pub fn with_suite(mut self, suite: &'a str) -> Self {
        self.suite = Some(suite);
        self
    }

    /// Attach a check name.
    pub fn with_check(mut self, check: &'a str) -> Self {
        self.check = Some(check);
        self
    }

    /// Attach the service account.
    pub fn with_user(mut self, user: &'a str) -> Self {
        self.user = Some(user);
        self
    }
}

/// Final state of a single check, as reported in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcomeKind {
    /// Every assertion held.
    Passed,
    /// An assertion did not hold.
    Failed,
    /// The check does not apply to this deployment.
    Skipped,
    /// The check could not run (transport or API failure).
    Errored,
}

impl CheckOutcomeKind {
    /// Lowercase label used in logs and text reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcomeKind::Passed => "passed",
            CheckOutcomeKind::Failed => "failed",
            CheckOutcomeKind::Skipped => "skipped",
            CheckOutcomeKind::Errored => "errored",
        }
    }
}

/// Emit a standardized event recording the outcome of a check.
pub fn log_check_event(
    context: &LogContext<'_>,
    outcome: CheckOutcomeKind,
    duration_ms: u128,
    message: &str,
) {
    match outcome {
        CheckOutcomeKind::Passed => iop_info!(
            context = context,
            "check {} in {}ms",
            outcome.as_str(),
            duration_ms
        ),
        CheckOutcomeKind::Skipped => iop_info!(
            context = context,
            "check {} in {}ms: {}",
            outcome.as_str(),
            duration_ms,
            message
        ),
        CheckOutcomeKind::Failed => iop_warn!(
            context = context,
            "check {} in {}ms: {}",
            outcome.as_str(),
            duration_ms,
            message
        ),
        CheckOutcomeKind::Errored => iop_error!(
            context = context,
            "check {} in {}ms: {}",
            outcome.as_str(),
            duration_ms,
            message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new().with_host("quadlet").with_suite("kafka");
        iop_info!(context = ctx, "suite started");
        iop_debug!("debug message");
        iop_error!(context = ctx.with_check("topics"), "missing topics: {}", 2);
    }

    #[test]
    fn check_event_helper_emits_every_outcome() {
        init();
        let ctx = LogContext::new()
            .with_suite("engine")
            .with_check("engine_service")
            .with_user("foremanctl");
        for outcome in [
            CheckOutcomeKind::Passed,
            CheckOutcomeKind::Failed,
            CheckOutcomeKind::Skipped,
            CheckOutcomeKind::Errored,
        ] {
            log_check_event(&ctx, outcome, 12, "detail");
        }
    }

    #[test]
    fn outcome_labels_are_lowercase() {
        assert_eq!(CheckOutcomeKind::Errored.as_str(), "errored");
        assert_eq!(CheckOutcomeKind::Skipped.as_str(), "skipped");
    }
}
