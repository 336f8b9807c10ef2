//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Gateway service, listener, and TLS material."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;
use crate::verify;

pub const GATEWAY_PORT: u16 = 24443;

pub const SUITE: Suite = Suite {
    name: "gateway",
    description: "Gateway fronting the IOP services",
    checks: &[
        Check::new("gateway_service", "gateway unit is active", gateway_service),
        Check::new("gateway_port", "listener accepts connections", gateway_port),
        Check::new("gateway_secrets", "server, client, and relay secrets exist", gateway_secrets),
    ],
};

fn gateway_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-gateway")
}

fn gateway_port(session: &Session) -> CheckResult {
    verify!(
        session.server().port_reachable("localhost", GATEWAY_PORT)?,
        "localhost:{} is not reachable",
        GATEWAY_PORT
    );
    Ok(())
}

fn gateway_secrets(session: &Session) -> CheckResult {
    common::secrets_present(
        session,
        &[
            "iop-core-gateway-server-cert",
            "iop-core-gateway-server-key",
            "iop-core-gateway-server-ca-cert",
            "iop-core-gateway-client-cert",
            "iop-core-gateway-client-key",
            "iop-core-gateway-client-ca-cert",
            "iop-core-gateway-relay-conf",
        ],
    )
}
