//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Networks created by the podman network role and their behaviour."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Every check here creates its own networks and containers and removes
//! them again, whatever the outcome. The role network itself is only read.

use iop_remote::{first_inspect_entry, ContainerInfo, ContainerRun, NetworkInfo, NetworkOptions, Podman};

use crate::error::{CheckFailure, CheckResult};
use crate::registry::{Check, Suite};
use crate::session::Session;
use crate::suites::common::PodmanCleanup;
use crate::{skip, verify, verify_contains};

pub const ROLE_NETWORK: &str = "test-role-network";
pub const TEST_SUBNET: &str = "10.99.0.0/24";
pub const TEST_GATEWAY: &str = "10.99.0.1";

/// `getent` exit status for a key that does not exist.
const GETENT_NOT_FOUND: i32 = 2;

pub const SUITE: Suite = Suite {
    name: "network_role",
    description: "podman_network role results",
    checks: &[
        Check::rootless("role_creates_network", "role network present", role_creates_network),
        Check::rootless("role_network_properties", "bridge driver with DNS", role_network_properties),
        Check::rootless("container_connectivity", "containers on one network resolve each other", container_connectivity),
        Check::rootless("multiple_networks", "a container joins two networks", multiple_networks),
        Check::rootless("network_isolation", "containers on different networks cannot resolve each other", network_isolation),
        Check::rootless("subnet_configuration", "custom subnet and gateway are kept", subnet_configuration),
    ],
};

fn sleeper(session: &Session, name: &str, networks: &[&str]) -> ContainerRun {
    let image = &session.config().deployment.images.network_test;
    networks
        .iter()
        .fold(ContainerRun::new(image.as_str()).detach().name(name), |run, network| {
            run.network(*network)
        })
        .command(["sleep", "300"])
}

fn resolver(session: &Session, network: &str, target: &str) -> ContainerRun {
    let image = &session.config().deployment.images.network_test;
    ContainerRun::new(image.as_str())
        .remove()
        .network(network)
        .command(["getent", "hosts", target])
}

fn create_networks(podman: &Podman<'_>, names: &[&str]) -> CheckResult {
    for name in names {
        let created = podman.network_create(name, &NetworkOptions::default())?;
        verify!(
            created.succeeded(),
            "failed to create network {}: {}",
            name,
            created.stderr.trim()
        );
    }
    Ok(())
}

fn role_creates_network(session: &Session) -> CheckResult {
    let listed = session.podman().network_names()?;
    if !listed.lines().contains(&ROLE_NETWORK) {
        skip!("network '{}' not created yet, role not applied", ROLE_NETWORK);
    }
    Ok(())
}

fn role_network_properties(session: &Session) -> CheckResult {
    let inspect = session.podman().network_inspect(ROLE_NETWORK)?;
    if inspect.failed() {
        skip!("network '{}' does not exist, role not applied", ROLE_NETWORK);
    }
    let info: NetworkInfo = first_inspect_entry(&inspect)?;
    verify!(info.driver == "bridge", "expected bridge driver, found '{}'", info.driver);
    verify!(info.dns_enabled, "DNS is disabled on {}", ROLE_NETWORK);
    Ok(())
}

fn container_connectivity(session: &Session) -> CheckResult {
    let network = "test-connectivity-network";
    let target = "test-conn-container1";
    let cleanup = PodmanCleanup::new(session.podman())
        .container(target)
        .container("test-conn-container2")
        .network(network);
    let podman = cleanup.podman();

    if !podman.network_exists(network)? {
        create_networks(podman, &[network])?;
    }
    let started = podman.run_container(&sleeper(session, target, &[network]))?;
    verify!(
        started.succeeded(),
        "failed to start {}: {}",
        target,
        started.stderr.trim()
    );
    let lookup = podman.run_container(&resolver(session, network, target))?;
    verify!(
        lookup.succeeded(),
        "connectivity test failed: {}",
        lookup.stderr.trim()
    );
    verify_contains!(lookup.stdout, target);
    Ok(())
}

fn multiple_networks(session: &Session) -> CheckResult {
    let networks = ["test-multi-net1", "test-multi-net2"];
    let container = "test-multi-container";
    let cleanup = PodmanCleanup::new(session.podman())
        .container(container)
        .network(networks[0])
        .network(networks[1]);
    let podman = cleanup.podman();

    create_networks(podman, &networks)?;
    let started = podman.run_container(&sleeper(session, container, &networks))?;
    verify!(
        started.succeeded(),
        "failed to start multi-network container: {}",
        started.stderr.trim()
    );
    let inspect = podman.inspect(container)?;
    verify!(inspect.succeeded(), "podman inspect exited with {}", inspect.exit_code);
    let info: ContainerInfo = first_inspect_entry(&inspect)?;
    let attached = info.network_names();
    for network in networks {
        verify!(
            attached.contains(&network),
            "container should be on {}, found {:?}",
            network,
            attached
        );
    }
    Ok(())
}

fn network_isolation(session: &Session) -> CheckResult {
    let networks = ["test-isolated-net1", "test-isolated-net2"];
    let target = "test-isolated-c1";
    let cleanup = PodmanCleanup::new(session.podman())
        .container(target)
        .container("test-isolated-c2")
        .network(networks[0])
        .network(networks[1]);
    let podman = cleanup.podman();

    create_networks(podman, &networks)?;
    let started = podman.run_container(&sleeper(session, target, &networks[..1]))?;
    verify!(started.succeeded(), "failed to start {}", target);
    let lookup = podman.run_container(&resolver(session, networks[1], target))?;
    match lookup.exit_code {
        GETENT_NOT_FOUND => Ok(()),
        0 => Err(CheckFailure::assertion(format!(
            "{} resolved from {}: {}",
            target,
            networks[1],
            lookup.stdout.trim()
        ))),
        code => Err(CheckFailure::execution(format!(
            "lookup container on {} exited with {}: {}",
            networks[1],
            code,
            lookup.stderr.trim()
        ))),
    }
}

fn subnet_configuration(session: &Session) -> CheckResult {
    let network = "test-subnet-network";
    let cleanup = PodmanCleanup::new(session.podman()).network(network);
    let podman = cleanup.podman();

    let created = podman.network_create(
        network,
        &NetworkOptions {
            subnet: Some(TEST_SUBNET.to_owned()),
            gateway: Some(TEST_GATEWAY.to_owned()),
        },
    )?;
    verify!(
        created.succeeded(),
        "failed to create network with custom subnet: {}",
        created.stderr.trim()
    );
    let inspect = podman.network_inspect(network)?;
    verify!(inspect.succeeded(), "podman network inspect exited with {}", inspect.exit_code);
    let info: NetworkInfo = first_inspect_entry(&inspect)?;
    let first = match info.subnets.first() {
        Some(subnet) => subnet,
        None => return Err(CheckFailure::assertion("network has no subnet")),
    };
    verify!(
        first.subnet == TEST_SUBNET,
        "expected subnet {}, found {}",
        TEST_SUBNET,
        first.subnet
    );
    verify!(
        first.gateway.as_deref() == Some(TEST_GATEWAY),
        "expected gateway {}, found {:?}",
        TEST_GATEWAY,
        first.gateway
    );
    Ok(())
}
