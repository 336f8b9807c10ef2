//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Vulnerability metadata services, database secrets, and storage."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;

const REPOSCAN: &str = "iop-service-vmaas-reposcan";
const WEBAPP: &str = "iop-service-vmaas-webapp-go";

pub const SUITE: Suite = Suite {
    name: "vmaas",
    description: "Vulnerability metadata service",
    checks: &[
        Check::new("vmaas_reposcan_service", "reposcan unit is active", vmaas_reposcan_service),
        Check::new("vmaas_webapp_go_service", "webapp unit is active", vmaas_webapp_go_service),
        Check::new("vmaas_webapp_go_service_dependencies", "webapp starts after reposcan", vmaas_webapp_go_service_dependencies),
        Check::new("vmaas_webapp_go_service_wants", "webapp wants reposcan", vmaas_webapp_go_service_wants),
        Check::new("vmaas_database_secrets", "reposcan database secrets exist", vmaas_database_secrets),
        Check::new("vmaas_data_volume", "data volume exists", vmaas_data_volume),
    ],
};

fn vmaas_reposcan_service(session: &Session) -> CheckResult {
    common::service_running(session, REPOSCAN)
}

fn vmaas_webapp_go_service(session: &Session) -> CheckResult {
    common::service_running(session, WEBAPP)
}

fn vmaas_webapp_go_service_dependencies(session: &Session) -> CheckResult {
    common::property_lists(session, WEBAPP, "After", &["iop-service-vmaas-reposcan.service"])
}

fn vmaas_webapp_go_service_wants(session: &Session) -> CheckResult {
    common::property_lists(session, WEBAPP, "Wants", &["iop-service-vmaas-reposcan.service"])
}

fn vmaas_database_secrets(session: &Session) -> CheckResult {
    common::secrets_present(
        session,
        &[
            "iop-service-vmaas-reposcan-database-username",
            "iop-service-vmaas-reposcan-database-password",
            "iop-service-vmaas-reposcan-database-name",
            "iop-service-vmaas-reposcan-database-host",
            "iop-service-vmaas-reposcan-database-port",
        ],
    )
}

fn vmaas_data_volume(session: &Session) -> CheckResult {
    common::volume_present(session, "iop-service-vmaas-data")
}
