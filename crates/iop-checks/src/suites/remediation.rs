//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Remediations API service, ordering, environment, and endpoint."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_remote::HttpProbe;

use crate::error::CheckResult;
use crate::expect::ProbeExpectation;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;
use crate::{verify, verify_contains};

const SERVICE: &str = "iop-service-remediations-api";

pub const SUITE: Suite = Suite {
    name: "remediation",
    description: "Remediations API",
    checks: &[
        Check::new("remediation_api_service", "API unit is active", remediation_api_service),
        Check::new("remediation_api_service_dependencies", "starts after inventory and advisor", remediation_api_service_dependencies),
        Check::new("remediation_api_environment_variables", "optional backends disabled", remediation_api_environment_variables),
        Check::new("remediation_api_endpoint", "answers on localhost:9002", remediation_api_endpoint),
    ],
};

fn remediation_api_service(session: &Session) -> CheckResult {
    common::service_running(session, SERVICE)
}

fn remediation_api_service_dependencies(session: &Session) -> CheckResult {
    common::property_lists(
        session,
        SERVICE,
        "After",
        &[
            "iop-core-host-inventory-api.service",
            "iop-service-advisor-backend-api.service",
        ],
    )
}

fn remediation_api_environment_variables(session: &Session) -> CheckResult {
    let output = session.podman().inspect_format(SERVICE, "{{.Config.Env}}")?;
    verify!(output.succeeded(), "podman inspect exited with {}", output.exit_code);
    for variable in ["REDIS_ENABLED=false", "RBAC_ENFORCE=false", "DB_SSL_ENABLED=false"] {
        verify_contains!(output.stdout, variable);
    }
    Ok(())
}

fn remediation_api_endpoint(session: &Session) -> CheckResult {
    common::probe(
        session,
        HttpProbe::from_host("http://localhost:9002/"),
        ProbeExpectation::Responds,
    )
}
