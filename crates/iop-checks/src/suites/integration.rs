//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Cross-service liveness and endpoint reachability."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Endpoints are probed from inside their own container, from a sidecar on
//! the shared IOP network, and, for the gateway, with the relay's client
//! certificate.

use iop_remote::{ClientCert, HttpProbe};

use crate::error::CheckResult;
use crate::expect::ProbeExpectation;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common::{self, IOP_NETWORK};

pub const SUITE: Suite = Suite {
    name: "integration",
    description: "Every IOP service together",
    checks: &[
        Check::new("core_kafka_service", "kafka unit is active", core_kafka_service),
        Check::new("core_ingress_service", "ingress unit is active", core_ingress_service),
        Check::new("ingress_endpoint", "ingress answers from its container", ingress_endpoint),
        Check::new("core_puptoo_service", "puptoo unit is active", core_puptoo_service),
        Check::new("puptoo_metrics_endpoint", "puptoo metrics answer from its container", puptoo_metrics_endpoint),
        Check::new("core_yuptoo_service", "yuptoo unit is active", core_yuptoo_service),
        Check::new("yuptoo_endpoint", "yuptoo answers from its container", yuptoo_endpoint),
        Check::new("core_engine_service", "engine unit is active", core_engine_service),
        Check::new("core_gateway_service", "gateway unit is active", core_gateway_service),
        Check::new("gateway_endpoint", "gateway answers from its container", gateway_endpoint),
        Check::new("gateway_api_ingress_endpoint", "gateway routes /api/ingress", gateway_api_ingress_endpoint),
        Check::new("gateway_https_cert_auth", "gateway accepts the relay client certificate", gateway_https_cert_auth),
        Check::new("core_host_inventory_api_service", "inventory API unit is active", core_host_inventory_api_service),
        Check::new("inventory_mq_endpoint", "inventory consumer reachable on the IOP network", inventory_mq_endpoint),
        Check::new("inventory_api_health_endpoint", "inventory health answers 200 on the IOP network", inventory_api_health_endpoint),
        Check::new("advisor_backend_api_service", "advisor API unit is active", advisor_backend_api_service),
        Check::new("advisor_backend_service", "advisor backend unit is active", advisor_backend_service),
        Check::new("advisor_api_endpoint", "advisor API reachable on the IOP network", advisor_api_endpoint),
        Check::new("remediations_api_service", "remediations unit is active", remediations_api_service),
        Check::new("remediations_api_endpoint", "remediations answers from its container", remediations_api_endpoint),
    ],
};

/// Client certificate the smart proxy relay presents to the gateway.
fn relay_client_cert() -> ClientCert {
    ClientCert {
        cert: "/etc/nginx/smart-proxy-relay/certs/proxy.crt".to_owned(),
        key: "/etc/nginx/smart-proxy-relay/certs/proxy.key".to_owned(),
        ca_cert: "/etc/nginx/certs/ca.crt".to_owned(),
    }
}

fn in_container(session: &Session, container: &str, url: &str) -> CheckResult {
    common::probe(
        session,
        HttpProbe::from_container(container, url),
        ProbeExpectation::Reachable,
    )
}

fn core_kafka_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-kafka")
}

fn core_ingress_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-ingress")
}

fn ingress_endpoint(session: &Session) -> CheckResult {
    in_container(session, "iop-core-ingress", "http://localhost:8080/")
}

fn core_puptoo_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-puptoo")
}

fn puptoo_metrics_endpoint(session: &Session) -> CheckResult {
    in_container(session, "iop-core-puptoo", "http://localhost:8000/metrics")
}

fn core_yuptoo_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-yuptoo")
}

fn yuptoo_endpoint(session: &Session) -> CheckResult {
    in_container(session, "iop-core-yuptoo", "http://localhost:5005/")
}

fn core_engine_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-engine")
}

fn core_gateway_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-gateway")
}

fn gateway_endpoint(session: &Session) -> CheckResult {
    in_container(session, "iop-core-gateway", "http://localhost:24443/")
}

fn gateway_api_ingress_endpoint(session: &Session) -> CheckResult {
    in_container(session, "iop-core-gateway", "http://localhost:24443/api/ingress")
}

fn gateway_https_cert_auth(session: &Session) -> CheckResult {
    common::probe(
        session,
        HttpProbe::from_container("iop-core-gateway", "https://localhost:8443/")
            .with_client_cert(relay_client_cert()),
        ProbeExpectation::Status(200),
    )
}

fn core_host_inventory_api_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-host-inventory-api")
}

fn inventory_mq_endpoint(session: &Session) -> CheckResult {
    let image = &session.config().deployment.images.host_inventory_release;
    common::probe(
        session,
        HttpProbe::from_sidecar(
            image.as_str(),
            Some(IOP_NETWORK),
            "http://iop-core-host-inventory:9126/",
        ),
        ProbeExpectation::Reachable,
    )
}

fn inventory_api_health_endpoint(session: &Session) -> CheckResult {
    let image = &session.config().deployment.images.host_inventory_release;
    common::probe(
        session,
        HttpProbe::from_sidecar(
            image.as_str(),
            Some(IOP_NETWORK),
            "http://iop-core-host-inventory-api:8081/health",
        ),
        ProbeExpectation::Status(200),
    )
}

fn advisor_backend_api_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-service-advisor-backend-api")
}

fn advisor_backend_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-service-advisor-backend-service")
}

fn advisor_api_endpoint(session: &Session) -> CheckResult {
    let image = &session.config().deployment.images.advisor_backend;
    common::probe(
        session,
        HttpProbe::from_sidecar(
            image.as_str(),
            Some(IOP_NETWORK),
            "http://iop-service-advisor-backend-api:8000/",
        ),
        ProbeExpectation::Reachable,
    )
}

fn remediations_api_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-service-remediations-api")
}

fn remediations_api_endpoint(session: &Session) -> CheckResult {
    in_container(session, "iop-service-remediations-api", "http://localhost:9002/")
}
