//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "integration-tests"
//! iop_type: "source"
//! iop_scope: "test"
//! iop_description: "Full registry runs rendered as text and JSON reports."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use iop_checks::{registry, run_suites, CheckScope, ReportFormat, RunOptions, Session};
use iop_common::HarnessConfig;
use iop_remote::{Host, ScriptedRunner};
use serde_json::Value;

fn session(config: HarnessConfig, runner: &ScriptedRunner) -> Session {
    Session::with_hosts(
        config,
        Host::with_runner("quadlet", runner.clone()),
        Host::with_runner("client", runner.clone()),
        None,
    )
}

fn check_count(scope: Option<CheckScope>) -> usize {
    registry()
        .iter()
        .flat_map(|suite| suite.checks.iter())
        .filter(|check| scope.map_or(true, |scope| check.scope == scope))
        .count()
}

#[test]
fn unreachable_server_errors_every_check() {
    let runner = ScriptedRunner::new();
    runner.transport_error("");
    let report = run_suites(&session(HarnessConfig::default(), &runner), &RunOptions::default()).unwrap();

    assert_eq!(report.summary.total(), check_count(None));
    assert_eq!(report.summary.errored, report.summary.total(), "{}", report.to_text());
    assert!(!report.is_success());

    let json: Value = serde_json::from_str(&report.render(ReportFormat::Json).unwrap()).unwrap();
    assert_eq!(json["server"], "quadlet");
    assert_eq!(json["user"], "foremanctl");
    assert_eq!(json["summary"]["errored"], report.summary.errored);
    assert_eq!(json["records"][0]["suite"], "kafka");
    assert_eq!(json["records"][0]["outcome"], "errored");
}

#[test]
fn rootful_text_report_groups_by_suite_and_marks_skips() {
    let runner = ScriptedRunner::new();
    let mut config = HarnessConfig::default();
    config.deployment.user = None;
    let report = run_suites(
        &session(config, &runner),
        &RunOptions {
            suites: vec!["network".to_owned(), "network_role".to_owned()],
            fail_fast: false,
        },
    )
    .unwrap();

    let rootless_in_selection = 8;
    assert_eq!(report.summary.skipped, rootless_in_selection);
    assert_eq!(report.summary.failed, 4);

    let text = report.render(ReportFormat::Text).unwrap();
    assert!(text.starts_with("IOP deployment checks on quadlet (rootful)\n"));
    let network = text.find("\n[network]\n").unwrap();
    let role = text.find("\n[network_role]\n").unwrap();
    assert!(network < role);
    assert!(text.contains("SKIPPED  podman_network_create_user"));
    assert!(text.contains(": only applies to rootless deployments"));
    assert!(text.contains("FAILED   netavark_installed"));
    assert!(text.contains("12 checks: 0 passed, 4 failed, 0 errored, 8 skipped"));
}

#[test]
fn rootless_checks_are_a_minority_of_the_registry() {
    let rootless = check_count(Some(CheckScope::RootlessOnly));
    assert_eq!(rootless, 8);
    assert!(check_count(Some(CheckScope::Any)) > rootless);
}
