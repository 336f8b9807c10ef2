//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Assertions shared by the subsystem suites."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_remote::{HttpProbe, Podman};
use tracing::debug;

use crate::error::{CheckFailure, CheckResult};
use crate::expect::ProbeExpectation;
use crate::session::Session;
use crate::{verify, verify_contains};

/// Name of the network every IOP container joins.
pub const IOP_NETWORK: &str = "iop-core-network";

pub fn service_running(session: &Session, name: &str) -> CheckResult {
    verify!(
        session.service(name).is_running()?,
        "{} is not active",
        name
    );
    Ok(())
}

pub fn service_enabled(session: &Session, name: &str) -> CheckResult {
    verify!(
        session.service(name).is_enabled()?,
        "{} is not enabled",
        name
    );
    Ok(())
}

/// `systemctl show --property=<property>` lists every unit in `units`.
pub fn property_lists(session: &Session, service: &str, property: &str, units: &[&str]) -> CheckResult {
    let output = session.service(service).show_property(property)?;
    verify!(
        output.succeeded(),
        "systemctl show {} exited with {}",
        service,
        output.exit_code
    );
    for unit in units {
        verify_contains!(output.stdout, unit);
    }
    Ok(())
}

pub fn secrets_present(session: &Session, names: &[&str]) -> CheckResult {
    let output = session.podman().secret_names()?;
    verify!(output.succeeded(), "podman secret ls exited with {}", output.exit_code);
    let present = output.lines();
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !present.contains(name))
        .collect();
    verify!(missing.is_empty(), "missing secrets: {}", missing.join(", "));
    Ok(())
}

/// The decrypted secret contains every fragment.
pub fn secret_contains(session: &Session, name: &str, fragments: &[&str]) -> CheckResult {
    let output = session.podman().secret_content(name)?;
    verify!(
        output.succeeded(),
        "podman secret inspect {} exited with {}",
        name,
        output.exit_code
    );
    for fragment in fragments {
        verify!(
            output.stdout.contains(fragment),
            "secret {} does not contain '{}'",
            name,
            fragment
        );
    }
    Ok(())
}

pub fn volume_present(session: &Session, name: &str) -> CheckResult {
    let output = session.podman().volume_names()?;
    verify!(output.succeeded(), "podman volume ls exited with {}", output.exit_code);
    verify!(output.lines().contains(&name), "volume {} not found", name);
    Ok(())
}

pub fn regular_file(session: &Session, path: &str) -> CheckResult {
    let file = session.server().file(path);
    verify!(file.exists()?, "{} does not exist", path);
    verify!(file.is_file()?, "{} is not a regular file", path);
    Ok(())
}

pub fn probe(session: &Session, probe: HttpProbe, expectation: ProbeExpectation) -> CheckResult {
    let outcome = probe.run(&session.podman())?;
    debug!(url = probe.url(), exit_code = outcome.exit_code, http_status = ?outcome.http_status, "probe finished");
    expectation
        .evaluate(&outcome)
        .map_err(|message| CheckFailure::Assertion(format!("{}: {}", probe.url(), message)))
}

/// Containers and networks removed when dropped, ignoring failures.
pub struct PodmanCleanup<'s> {
    podman: Podman<'s>,
    containers: Vec<String>,
    networks: Vec<String>,
}

impl<'s> PodmanCleanup<'s> {
    pub fn new(podman: Podman<'s>) -> Self {
        Self {
            podman,
            containers: Vec::new(),
            networks: Vec::new(),
        }
    }

    pub fn podman(&self) -> &Podman<'s> {
        &self.podman
    }

    pub fn container(mut self, name: &str) -> Self {
        self.containers.push(name.to_owned());
        self
    }

    pub fn network(mut self, name: &str) -> Self {
        self.networks.push(name.to_owned());
        self
    }
}

impl Drop for PodmanCleanup<'_> {
    fn drop(&mut self) {
        let containers: Vec<&str> = self.containers.iter().map(String::as_str).collect();
        self.podman.remove_containers_quiet(&containers);
        let networks: Vec<&str> = self.networks.iter().map(String::as_str).collect();
        self.podman.network_remove_quiet(&networks);
    }
}
