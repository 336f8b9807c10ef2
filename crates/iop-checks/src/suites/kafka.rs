//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Kafka broker service, storage, configuration, and topics."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Topic expectations come from the configured topic profiles. Every topic
//! of every enabled profile must be listed by the broker; a missing topic
//! fails the check.

use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common;
use crate::{verify, verify_contains};

const CONTAINER: &str = "iop-core-kafka";
const BOOTSTRAP: &str = "iop-core-kafka:9092";

pub const SUITE: Suite = Suite {
    name: "kafka",
    description: "Kafka broker backing the IOP message bus",
    checks: &[
        Check::new("kafka_service", "broker unit is active", kafka_service),
        Check::new("kafka_volume", "data volume exists", kafka_volume),
        Check::new("kafka_topics_initialized", "init script reports ready", kafka_topics_initialized),
        Check::new("kafka_secrets", "init and server secrets exist", kafka_secrets),
        Check::new("kafka_config_content", "server properties advertise the broker", kafka_config_content),
        Check::new("kafka_container_running", "container state is running", kafka_container_running),
        Check::new("kafka_quadlet_file", "quadlet definition installed", kafka_quadlet_file),
        Check::new("kafka_topics", "every enabled topic profile exists", kafka_topics),
    ],
};

fn kafka_service(session: &Session) -> CheckResult {
    common::service_running(session, CONTAINER)
}

fn kafka_volume(session: &Session) -> CheckResult {
    common::volume_present(session, "iop-core-kafka-data")
}

fn kafka_topics_initialized(session: &Session) -> CheckResult {
    let output = session.podman().exec(CONTAINER, "/opt/kafka/init.sh --check")?;
    verify!(
        output.succeeded(),
        "init check exited with {}: {}",
        output.exit_code,
        output.stderr.trim()
    );
    Ok(())
}

fn kafka_secrets(session: &Session) -> CheckResult {
    common::secrets_present(
        session,
        &[
            "iop-core-kafka-init-start",
            "iop-core-kafka-server-properties",
            "iop-core-kafka-init",
        ],
    )
}

fn kafka_config_content(session: &Session) -> CheckResult {
    common::secret_contains(
        session,
        "iop-core-kafka-server-properties",
        &[
            "advertised.listeners=PLAINTEXT://iop-core-kafka:9092",
            "controller.quorum.voters=1@iop-core-kafka:9093",
        ],
    )
}

fn kafka_container_running(session: &Session) -> CheckResult {
    let output = session.podman().inspect_format(CONTAINER, "{{.State.Status}}")?;
    verify!(output.succeeded(), "podman inspect exited with {}", output.exit_code);
    verify_contains!(output.stdout, "running");
    Ok(())
}

fn kafka_quadlet_file(session: &Session) -> CheckResult {
    let path = session.quadlet_path("iop-core-kafka.container")?;
    common::regular_file(session, &path)
}

/// Topics of `expected` absent from the broker listing.
pub fn missing_topics<'a>(listing: &str, expected: &'a [String]) -> Vec<&'a str> {
    let present: Vec<&str> = listing.lines().map(str::trim).collect();
    expected
        .iter()
        .map(String::as_str)
        .filter(|topic| !present.contains(topic))
        .collect()
}

fn kafka_topics(session: &Session) -> CheckResult {
    let command = format!(
        "/opt/kafka/bin/kafka-topics.sh --bootstrap-server {} --list",
        BOOTSTRAP
    );
    let output = session.podman().exec(CONTAINER, &command)?;
    verify!(output.succeeded(), "kafka-topics.sh exited with {}", output.exit_code);

    let mut problems = Vec::new();
    for (profile, topics) in session.config().kafka.enabled() {
        let missing = missing_topics(&output.stdout, &topics);
        if !missing.is_empty() {
            problems.push(format!("profile {} is missing {}", profile, missing.join(", ")));
        }
    }
    verify!(problems.is_empty(), "{}", problems.join("; "));
    Ok(())
}
