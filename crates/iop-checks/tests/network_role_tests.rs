//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "tests"
//! iop_type: "source"
//! iop_scope: "test"
//! iop_description: "Network role checks: isolation, DNS, subnets, and cleanup."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_checks::{find_suite, run_check, CheckOutcomeKind, CheckRecord, Session};
use iop_common::HarnessConfig;
use iop_remote::{Host, ScriptedRunner};

fn run(runner: &ScriptedRunner, suite: &str, check: &str) -> CheckRecord {
    let session = Session::with_hosts(
        HarnessConfig::default(),
        Host::with_runner("quadlet", runner.clone()),
        Host::with_runner("client", runner.clone()),
        None,
    );
    let suite = find_suite(suite).unwrap();
    let check = suite.check(check).unwrap();
    run_check(&session, suite, check)
}

fn inspect(name: &str, subnet: &str, gateway: &str) -> String {
    format!(
        r#"[{{"name": "{}", "driver": "bridge", "dns_enabled": true,
             "subnets": [{{"subnet": "{}", "gateway": "{}"}}]}}]"#,
        name, subnet, gateway
    )
}

#[test]
fn isolation_passes_when_lookup_fails_and_cleans_up() {
    let runner = ScriptedRunner::new();
    runner.respond("network create", "");
    runner.respond("run -d", "c0ffee\n");
    runner.fail("getent hosts test-isolated-c1", 2, "");

    let record = run(&runner, "network_role", "network_isolation");
    assert_eq!(record.outcome, CheckOutcomeKind::Passed, "{:?}", record.message);

    let history = runner.history();
    let lookup = history
        .iter()
        .find(|command| command.contains("getent hosts"))
        .unwrap();
    assert!(lookup.contains("--network test-isolated-net2"));
    assert!(lookup.contains("--rm"));
    assert_eq!(runner.commands_matching("rm -f test-isolated-c1 test-isolated-c2").len(), 1);
    assert_eq!(runner.commands_matching("network rm test-isolated-net1").len(), 1);
    assert_eq!(runner.commands_matching("network rm test-isolated-net2").len(), 1);
}

#[test]
fn isolation_fails_when_name_resolves_across_networks() {
    let runner = ScriptedRunner::new();
    runner.respond("network create", "");
    runner.respond("run -d", "c0ffee\n");
    runner.respond("getent hosts test-isolated-c1", "10.89.1.2 test-isolated-c1\n");

    let record = run(&runner, "network_role", "network_isolation");
    assert_eq!(record.outcome, CheckOutcomeKind::Failed);
    assert!(record.message.unwrap().contains("resolved from test-isolated-net2"));
    assert_eq!(runner.commands_matching("network rm").len(), 2);
}

#[test]
fn isolation_errors_when_lookup_container_never_runs() {
    for (exit_code, stderr) in [
        (125, "Error: quay.io/iop/network-test: image not known"),
        (127, "getent: command not found"),
        (1, ""),
    ] {
        let runner = ScriptedRunner::new();
        runner.respond("network create", "");
        runner.respond("run -d", "c0ffee\n");
        runner.fail("getent hosts test-isolated-c1", exit_code, stderr);

        let record = run(&runner, "network_role", "network_isolation");
        assert_eq!(record.outcome, CheckOutcomeKind::Errored, "exit {exit_code}");
        let message = record.message.unwrap();
        assert!(
            message.contains(&format!("exited with {exit_code}")),
            "{message}"
        );
        assert_eq!(runner.commands_matching("network rm").len(), 2);
    }
}

#[test]
fn cleanup_runs_when_setup_errors() {
    let runner = ScriptedRunner::new();
    runner.respond("network create", "");
    runner.transport_error("run -d");

    let record = run(&runner, "network_role", "container_connectivity");
    assert_eq!(record.outcome, CheckOutcomeKind::Errored);
    assert_eq!(
        runner
            .commands_matching("rm -f test-conn-container1 test-conn-container2")
            .len(),
        1
    );
    assert_eq!(runner.commands_matching("network rm test-connectivity-network").len(), 1);
}

#[test]
fn connectivity_reuses_an_existing_network() {
    let runner = ScriptedRunner::new();
    runner.respond("network exists test-connectivity-network", "");
    runner.respond("run -d", "c0ffee\n");
    runner.respond("getent hosts", "10.89.0.2 test-conn-container1\n");

    let record = run(&runner, "network_role", "container_connectivity");
    assert_eq!(record.outcome, CheckOutcomeKind::Passed, "{:?}", record.message);
    assert!(runner.commands_matching("network create").is_empty());
}

#[test]
fn dns_resolution_requires_the_target_name() {
    let runner = ScriptedRunner::new();
    runner.respond("network create", "");
    runner.respond("run -d", "c0ffee\n");
    runner.respond("getent hosts", "10.89.0.2 somebody-else\n");

    let record = run(&runner, "network", "podman_network_dns_resolution");
    assert_eq!(record.outcome, CheckOutcomeKind::Failed);
    assert!(record.message.unwrap().contains("test-dns-container1"));
}

#[test]
fn subnet_and_gateway_are_checked() {
    let runner = ScriptedRunner::new();
    runner.respond("network create", "test-subnet-network\n");
    runner.respond(
        "network inspect test-subnet-network",
        &inspect("test-subnet-network", "10.99.0.0/24", "10.99.0.1"),
    );
    let record = run(&runner, "network_role", "subnet_configuration");
    assert_eq!(record.outcome, CheckOutcomeKind::Passed, "{:?}", record.message);
    assert_eq!(
        runner.commands_matching("network create"),
        vec!["cd /tmp && sudo -u foremanctl podman network create --subnet 10.99.0.0/24 \
              --gateway 10.99.0.1 test-subnet-network"
            .to_owned()]
    );

    runner.respond(
        "network inspect test-subnet-network",
        &inspect("test-subnet-network", "10.88.0.0/16", "10.88.0.1"),
    );
    let record = run(&runner, "network_role", "subnet_configuration");
    assert_eq!(record.outcome, CheckOutcomeKind::Failed);
    assert_eq!(
        record.message.as_deref(),
        Some("expected subnet 10.99.0.0/24, found 10.88.0.0/16")
    );
}

#[test]
fn role_network_checks_skip_until_role_applied() {
    let runner = ScriptedRunner::new();
    runner.respond("network ls", "podman\niop-core-network\n");
    runner.fail("network inspect test-role-network", 125, "network not found");

    let created = run(&runner, "network_role", "role_creates_network");
    assert_eq!(created.outcome, CheckOutcomeKind::Skipped);
    let properties = run(&runner, "network_role", "role_network_properties");
    assert_eq!(properties.outcome, CheckOutcomeKind::Skipped);
}

#[test]
fn role_network_without_dns_fails() {
    let runner = ScriptedRunner::new();
    runner.respond(
        "network inspect test-role-network",
        r#"[{"name": "test-role-network", "driver": "bridge", "dns_enabled": false}]"#,
    );
    let record = run(&runner, "network_role", "role_network_properties");
    assert_eq!(record.outcome, CheckOutcomeKind::Failed);
    assert_eq!(
        record.message.as_deref(),
        Some("DNS is disabled on test-role-network")
    );
}
