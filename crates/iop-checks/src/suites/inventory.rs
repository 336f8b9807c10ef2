//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Host inventory services, API endpoints, and cleanup timer."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! The cleanup job is a oneshot unit started by its timer, so the unit is
//! expected to be enabled but inactive while the timer stays active.

use iop_remote::HttpProbe;

use crate::error::CheckResult;
use crate::expect::ProbeExpectation;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;
use crate::{verify, verify_contains};

const CLEANUP: &str = "iop-core-host-inventory-cleanup";
const API_BASE: &str = "http://iop-core-host-inventory-api:8081";

/// Directives the cleanup timer must carry.
pub const CLEANUP_TIMER_DIRECTIVES: &[&str] = &[
    "OnBootSec=10min",
    "OnUnitActiveSec=24h",
    "Persistent=true",
    "RandomizedDelaySec=300",
    "WantedBy=timers.target",
];

pub const SUITE: Suite = Suite {
    name: "inventory",
    description: "Host inventory",
    checks: &[
        Check::new("inventory_migrate_service", "migration unit is active", inventory_migrate_service),
        Check::new("inventory_mq_service", "message consumer unit is active", inventory_mq_service),
        Check::new("inventory_api_service", "API unit is active", inventory_api_service),
        Check::new("inventory_service_dependencies", "consumer starts after migration", inventory_service_dependencies),
        Check::new("inventory_api_endpoint", "health endpoint answers 200", inventory_api_endpoint),
        Check::new("inventory_hosts_endpoint", "hosts endpoint answers 200", inventory_hosts_endpoint),
        Check::new("inventory_cleanup_service", "cleanup job installed and idle", inventory_cleanup_service),
        Check::new("inventory_cleanup_service_enabled", "cleanup job is enabled", inventory_cleanup_service_enabled),
        Check::new("inventory_cleanup_timer", "cleanup timer is active", inventory_cleanup_timer),
        Check::new("inventory_cleanup_timer_config", "cleanup timer schedule", inventory_cleanup_timer_config),
    ],
};

fn inventory_migrate_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-host-inventory-migrate")
}

fn inventory_mq_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-host-inventory")
}

fn inventory_api_service(session: &Session) -> CheckResult {
    common::service_running(session, "iop-core-host-inventory-api")
}

fn inventory_service_dependencies(session: &Session) -> CheckResult {
    common::property_lists(
        session,
        "iop-core-host-inventory",
        "After",
        &["iop-core-host-inventory-migrate.service"],
    )
}

fn api_probe(session: &Session, path: &str) -> CheckResult {
    let image = &session.config().deployment.images.host_inventory;
    common::probe(
        session,
        HttpProbe::from_sidecar(image.as_str(), None, format!("{}{}", API_BASE, path)),
        ProbeExpectation::StatusIfRan(200),
    )
}

fn inventory_api_endpoint(session: &Session) -> CheckResult {
    api_probe(session, "/health")
}

fn inventory_hosts_endpoint(session: &Session) -> CheckResult {
    api_probe(session, "/api/inventory/v1/hosts")
}

fn inventory_cleanup_service(session: &Session) -> CheckResult {
    let path = session.quadlet_path(&format!("{}.container", CLEANUP))?;
    common::regular_file(session, &path)?;
    verify!(
        !session.service(CLEANUP).is_running()?,
        "{} is a oneshot job but is active",
        CLEANUP
    );
    Ok(())
}

fn inventory_cleanup_service_enabled(session: &Session) -> CheckResult {
    common::service_enabled(session, CLEANUP)
}

fn inventory_cleanup_timer(session: &Session) -> CheckResult {
    common::service_running(session, &format!("{}.timer", CLEANUP))
}

fn inventory_cleanup_timer_config(session: &Session) -> CheckResult {
    let path = session.unit_path(&format!("{}.timer", CLEANUP))?;
    common::regular_file(session, &path)?;
    let content = session.server().file(&path).content_string()?;
    for directive in CLEANUP_TIMER_DIRECTIVES {
        verify_contains!(content, directive);
    }
    Ok(())
}
