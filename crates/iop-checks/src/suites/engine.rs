//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Insights engine service, configuration, and broker connection."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;
use crate::verify;

const SERVICE: &str = "iop-core-engine";
const CONFIG_SECRET: &str = "iop-core-engine-config-yml";

pub const SUITE: Suite = Suite {
    name: "engine",
    description: "Rules engine consuming uploads from Kafka",
    checks: &[
        Check::new("engine_service", "engine unit is active", engine_service),
        Check::new("engine_secret", "configuration secret exists", engine_secret),
        Check::new("engine_config_content", "configuration names specs, rules, and broker", engine_config_content),
        Check::new("engine_service_dependencies", "starts after ingress and kafka", engine_service_dependencies),
        Check::new("engine_kafka_connectivity", "logs mention the broker", engine_kafka_connectivity),
    ],
};

fn engine_service(session: &Session) -> CheckResult {
    common::service_running(session, SERVICE)
}

fn engine_secret(session: &Session) -> CheckResult {
    common::secrets_present(session, &[CONFIG_SECRET])
}

fn engine_config_content(session: &Session) -> CheckResult {
    common::secret_contains(
        session,
        CONFIG_SECRET,
        &[
            "insights.specs.default",
            "insights_kafka_service.rules",
            "iop-core-kafka:9092",
        ],
    )
}

fn engine_service_dependencies(session: &Session) -> CheckResult {
    common::property_lists(
        session,
        SERVICE,
        "After",
        &["iop-core-ingress.service", "iop-core-kafka.service"],
    )
}

fn engine_kafka_connectivity(session: &Session) -> CheckResult {
    let output = session.podman().logs_matching(SERVICE, "kafka\\|bootstrap")?;
    verify!(output.succeeded(), "no kafka or bootstrap lines in {} logs", SERVICE);
    Ok(())
}
