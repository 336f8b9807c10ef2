//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Upload ingress service and HTTP endpoint."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_remote::HttpProbe;

use crate::error::CheckResult;
use crate::expect::ProbeExpectation;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;

pub const SUITE: Suite = Suite {
    name: "ingress",
    description: "Upload ingress",
    checks: &[
        Check::new("ingress_service", "ingress unit is active", ingress_service),
        Check::new("ingress_http_endpoint", "answers 200 to a sidecar probe", ingress_http_endpoint),
    ],
};

fn ingress_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-ingress")
}

fn ingress_http_endpoint(session: &Session) -> CheckResult {
    let image = &session.config().deployment.images.ingress;
    common::probe(
        session,
        HttpProbe::from_sidecar(image.as_str(), None, "http://iop-core-ingress:8080/"),
        ProbeExpectation::StatusIfRan(200),
    )
}
