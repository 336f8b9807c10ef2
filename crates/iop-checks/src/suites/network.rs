//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Container network backend packages and rootless networking."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_remote::{ContainerRun, NetworkOptions};

use crate::error::CheckResult;
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common::PodmanCleanup;
use crate::{verify, verify_contains};

pub const SUITE: Suite = Suite {
    name: "network",
    description: "Podman networking backend",
    checks: &[
        Check::new("netavark_installed", "netavark package installed", netavark_installed),
        Check::new("aardvark_dns_installed", "aardvark-dns package installed", aardvark_dns_installed),
        Check::new("passt_installed", "passt package installed", passt_installed),
        Check::new("podman_network_backend", "podman uses netavark", podman_network_backend),
        Check::rootless("podman_network_create_user", "service account manages private networks", podman_network_create_user),
        Check::rootless("podman_network_dns_resolution", "containers resolve each other by name", podman_network_dns_resolution),
    ],
};

fn package_installed(session: &Session, name: &str) -> CheckResult {
    verify!(
        session.server().package(name).is_installed()?,
        "package {} is not installed",
        name
    );
    Ok(())
}

fn netavark_installed(session: &Session) -> CheckResult {
    package_installed(session, "netavark")
}

fn aardvark_dns_installed(session: &Session) -> CheckResult {
    package_installed(session, "aardvark-dns")
}

fn passt_installed(session: &Session) -> CheckResult {
    package_installed(session, "passt")
}

fn podman_network_backend(session: &Session) -> CheckResult {
    let output = session.podman().network_backend()?;
    verify!(output.succeeded(), "podman info exited with {}", output.exit_code);
    verify_contains!(output.stdout.to_lowercase(), "netavark");
    Ok(())
}

fn podman_network_create_user(session: &Session) -> CheckResult {
    let podman = session.podman();
    let name = "test-network-verify";

    let created = podman.network_create(name, &NetworkOptions::default())?;
    verify!(
        created.succeeded(),
        "failed to create network: {}",
        created.stderr.trim()
    );
    let listed = podman.network_names()?;
    verify!(
        listed.lines().contains(&name),
        "{} missing from podman network ls",
        name
    );
    let removed = podman.run(&format!("network rm {}", name))?;
    verify!(
        removed.succeeded(),
        "failed to remove network: {}",
        removed.stderr.trim()
    );
    Ok(())
}

fn podman_network_dns_resolution(session: &Session) -> CheckResult {
    let network = "test-dns-network";
    let target = "test-dns-container1";
    let image = &session.config().deployment.images.network_test;
    let cleanup = PodmanCleanup::new(session.podman())
        .container(target)
        .container("test-dns-container2")
        .network(network);
    let podman = cleanup.podman();

    podman.network_create(network, &NetworkOptions::default())?;
    podman.run_container(
        &ContainerRun::new(image.as_str())
            .detach()
            .name(target)
            .network(network)
            .command(["sleep", "300"]),
    )?;
    let lookup = podman.run_container(
        &ContainerRun::new(image.as_str())
            .remove()
            .network(network)
            .command(["getent", "hosts", target]),
    )?;
    verify!(
        lookup.succeeded(),
        "DNS resolution failed: {}",
        lookup.stderr.trim()
    );
    verify_contains!(lookup.stdout, target);
    Ok(())
}
