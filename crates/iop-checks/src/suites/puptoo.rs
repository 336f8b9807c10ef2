//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Puptoo archive processor."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;

pub const SUITE: Suite = Suite {
    name: "puptoo",
    description: "Insights archive processor",
    checks: &[Check::new("puptoo_service", "puptoo unit is active", puptoo_service)],
};

fn puptoo_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-puptoo")
}
