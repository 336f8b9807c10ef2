//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Sequential suite execution with per-check outcome logging."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::time::Instant;

use iop_logging::{log_check_event, CheckOutcomeKind, LogContext};
use tracing::info_span;

use crate::error::{CheckFailure, SessionError};
use crate::registry::{select_suites, Check, CheckScope, Suite};
use crate::report::{CheckRecord, Report};
use crate::session::Session;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Suite names to run; every suite when empty.
    pub suites: Vec<String>,
    /// Stop after the first failed or errored check.
    pub fail_fast: bool,
}

/// Run one check and classify its result. Rootless-only checks are skipped
/// without touching the host when the deployment is rootful.
pub fn run_check(session: &Session, suite: &Suite, check: &Check) -> CheckRecord {
    let started = Instant::now();
    let result = if check.scope == CheckScope::RootlessOnly && !session.is_rootless() {
        Err(CheckFailure::Skipped(
            "only applies to rootless deployments".to_owned(),
        ))
    } else {
        (check.run)(session)
    };
    let duration_ms = started.elapsed().as_millis();

    let (outcome, message) = match result {
        Ok(()) => (CheckOutcomeKind::Passed, None),
        Err(failure) => (failure.outcome(), Some(failure.to_string())),
    };
    let context = LogContext::new()
        .with_host(session.server().alias())
        .with_suite(suite.name)
        .with_check(check.name);
    let context = match session.user() {
        Some(user) => context.with_user(user),
        None => context,
    };
    log_check_event(&context, outcome, duration_ms, message.as_deref().unwrap_or(""));

    CheckRecord {
        suite: suite.name.to_owned(),
        check: check.name.to_owned(),
        outcome,
        message,
        duration_ms: u64::try_from(duration_ms).unwrap_or(u64::MAX),
    }
}

/// Run the selected suites in registry order, one check at a time.
pub fn run_suites(session: &Session, options: &RunOptions) -> Result<Report, SessionError> {
    let suites = select_suites(&options.suites)?;
    let mut report = Report::new(session.server().alias(), session.user());

    'suites: for suite in suites {
        let _span = info_span!("suite", suite = suite.name).entered();
        for check in suite.checks {
            let record = run_check(session, suite, check);
            let stop = options.fail_fast
                && matches!(
                    record.outcome,
                    CheckOutcomeKind::Failed | CheckOutcomeKind::Errored
                );
            report.push(record);
            if stop {
                break 'suites;
            }
        }
    }
    report.finish();
    Ok(report)
}
