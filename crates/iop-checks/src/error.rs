//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Check failure classification and session errors."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_foreman::ApiError;
use iop_logging::CheckOutcomeKind;
use iop_remote::RemoteError;
use iop_vars::TemplateError;
use thiserror::Error;

/// Why a check did not pass.
#[derive(Debug, Error)]
pub enum CheckFailure {
    /// An expectation about the deployment did not hold.
    #[error("{0}")]
    Assertion(String),
    /// The check does not apply to this deployment.
    #[error("{0}")]
    Skipped(String),
    /// The check could not observe the deployment, e.g. its helper
    /// container never ran.
    #[error("{0}")]
    Execution(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

pub type CheckResult = std::result::Result<(), CheckFailure>;

impl CheckFailure {
    pub fn assertion(message: impl Into<String>) -> Self {
        CheckFailure::Assertion(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        CheckFailure::Execution(message.into())
    }

    /// Report category. A command that ran and exited non-zero is a failed
    /// check; a host or API that could not be reached leaves it errored.
    pub fn outcome(&self) -> CheckOutcomeKind {
        match self {
            CheckFailure::Assertion(_) => CheckOutcomeKind::Failed,
            CheckFailure::Skipped(_) => CheckOutcomeKind::Skipped,
            CheckFailure::Execution(_) => CheckOutcomeKind::Errored,
            CheckFailure::Remote(err) => match err {
                RemoteError::CommandFailed { .. }
                | RemoteError::Decode { .. }
                | RemoteError::Unexpected { .. } => CheckOutcomeKind::Failed,
                _ => CheckOutcomeKind::Errored,
            },
            CheckFailure::Api(ApiError::TaskFailed { .. }) => CheckOutcomeKind::Failed,
            CheckFailure::Api(_) | CheckFailure::Template(_) => CheckOutcomeKind::Errored,
        }
    }
}

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("ssh configuration: {0}")]
    Remote(#[from] RemoteError),
    #[error("management API: {0}")]
    Api(#[from] ApiError),
    #[error("certificate configuration: {0}")]
    Template(#[from] TemplateError),
    #[error("unknown suite '{0}'")]
    UnknownSuite(String),
}
