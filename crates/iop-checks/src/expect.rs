//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Expectations applied to HTTP probe outcomes."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_remote::ProbeOutcome;

/// What a probe must show for its check to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeExpectation {
    /// curl ran and the endpoint answered with exactly this status.
    Status(u16),
    /// When curl ran, the endpoint answered with this status. A probe that
    /// could not run at all (e.g. the probe image is missing) passes.
    StatusIfRan(u16),
    /// curl completed a request; any HTTP status is accepted.
    Reachable,
    /// Some HTTP status came back, whatever curl's exit code.
    Responds,
}

impl ProbeExpectation {
    pub fn evaluate(&self, outcome: &ProbeOutcome) -> Result<(), String> {
        let status = outcome
            .http_status
            .map_or_else(|| "none".to_owned(), |code| code.to_string());
        match *self {
            ProbeExpectation::Status(expected) => {
                if outcome.exec_succeeded() && outcome.status_is(expected) {
                    Ok(())
                } else {
                    Err(format!(
                        "expected HTTP {}, got status {} (exit code {})",
                        expected, status, outcome.exit_code
                    ))
                }
            }
            ProbeExpectation::StatusIfRan(expected) => {
                if !outcome.exec_succeeded() || outcome.status_is(expected) {
                    Ok(())
                } else {
                    Err(format!("expected HTTP {}, got status {}", expected, status))
                }
            }
            ProbeExpectation::Reachable => {
                if outcome.exec_succeeded() {
                    Ok(())
                } else {
                    Err(format!(
                        "probe exited with {} (status {})",
                        outcome.exit_code, status
                    ))
                }
            }
            ProbeExpectation::Responds => {
                if outcome.responded() {
                    Ok(())
                } else {
                    Err(format!("no HTTP response (exit code {})", outcome.exit_code))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit_code: i32, http_status: Option<u16>) -> ProbeOutcome {
        ProbeOutcome {
            exit_code,
            http_status,
        }
    }

    #[test]
    fn strict_status_needs_both_fields() {
        let expect = ProbeExpectation::Status(200);
        assert!(expect.evaluate(&outcome(0, Some(200))).is_ok());
        assert!(expect.evaluate(&outcome(0, Some(503))).is_err());
        assert!(expect.evaluate(&outcome(125, None)).is_err());
    }

    #[test]
    fn status_if_ran_tolerates_probe_that_did_not_run() {
        let expect = ProbeExpectation::StatusIfRan(200);
        assert!(expect.evaluate(&outcome(125, None)).is_ok());
        assert!(expect.evaluate(&outcome(0, Some(200))).is_ok());
        let err = expect.evaluate(&outcome(0, Some(404))).unwrap_err();
        assert!(err.contains("404"));
    }

    #[test]
    fn reachable_and_responds_read_different_fields() {
        assert!(ProbeExpectation::Reachable
            .evaluate(&outcome(0, Some(500)))
            .is_ok());
        assert!(ProbeExpectation::Reachable
            .evaluate(&outcome(7, None))
            .is_err());
        assert!(ProbeExpectation::Responds
            .evaluate(&outcome(22, Some(404)))
            .is_ok());
        assert!(ProbeExpectation::Responds
            .evaluate(&outcome(7, None))
            .is_err());
    }
}
