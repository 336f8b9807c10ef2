//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Deployment check suites, runner, and reports."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Verification suites for an IOP deployment.
//!
//! Open a [`Session`] against the configured hosts, pick suites from the
//! [`registry`], and hand both to [`run_suites`]. Each check is a plain
//! function over the session; the [`CheckFailure`] variant it returns
//! decides its outcome in the [`Report`].

#[macro_use]
mod macros;

pub mod error;
pub mod expect;
pub mod registry;
pub mod report;
pub mod runner;
pub mod session;
pub mod suites;

pub use error::{CheckFailure, CheckResult, SessionError};
pub use expect::ProbeExpectation;
pub use registry::{find_suite, registry, select_suites, Check, CheckScope, Suite};
pub use report::{CheckRecord, Report, ReportFormat, Summary};
pub use runner::{run_check, run_suites, RunOptions};
pub use session::Session;

pub use iop_logging::CheckOutcomeKind;
