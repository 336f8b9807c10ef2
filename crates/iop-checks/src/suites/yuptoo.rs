//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Yuptoo report processor."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;

pub const SUITE: Suite = Suite {
    name: "yuptoo",
    description: "Host report processor",
    checks: &[Check::new("yuptoo_service", "yuptoo unit is active", yuptoo_service)],
};

fn yuptoo_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-yuptoo")
}
