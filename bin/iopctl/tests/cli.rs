//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "tests"
//! iop_type: "source"
//! iop_scope: "test"
//! iop_description: "iopctl commands that run without reaching any host."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

fn vars_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../crates/iop-vars/tests/fixtures")
}

fn iopctl(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("iopctl").unwrap();
    cmd.current_dir(workdir).env_remove("IOP_CHECKS_CONFIG");
    cmd
}

fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("iop-checks.toml");
    let body = format!(
        "[targets]\nssh_config = \"{ssh}\"\ndomain = \"lab.test\"\n\n\
         [deployment]\nvars_dir = \"{vars}\"\n{extra}\n\n\
         [logging]\ndirectory = \"{logs}\"\n",
        ssh = dir.join("ssh-config").display(),
        vars = vars_dir().display(),
        logs = dir.join("logs").display(),
        extra = extra,
    );
    fs::write(&path, body).unwrap();
    path
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn version_prints_package_version() {
    let dir = tempfile::tempdir().unwrap();
    let out = stdout(iopctl(dir.path()).arg("version"));
    assert_eq!(out.trim(), format!("iopctl {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn list_shows_suites_and_rootless_markers() {
    let dir = tempfile::tempdir().unwrap();
    let out = stdout(iopctl(dir.path()).arg("list"));
    assert!(out.starts_with("kafka  "));
    assert!(out.contains("    kafka_topics  every enabled topic profile exists"));
    assert!(out.contains("network_role  podman_network role results"));
    assert!(out.contains("subnet_configuration  custom subnet and gateway are kept [rootless]"));
    assert!(!out.contains("netavark_installed  netavark package installed [rootless]"));
}

#[test]
fn certificates_render_for_the_server_fqdn() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let out = stdout(iopctl(dir.path()).arg("--config").arg(&config).arg("certificates"));
    assert!(out.contains("server_key: /etc/pki/ca/private/quadlet.lab.test.key"));
}

#[test]
fn each_run_logs_to_its_own_file_inside_the_run_span() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "user = \"\"");
    stdout(
        iopctl(dir.path())
            .env_remove("IOP_LOG")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&config)
            .arg("certificates"),
    );

    let logs: Vec<PathBuf> = fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1, "{logs:?}");
    let name = logs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("iopctl-") && name.ends_with(".log"), "{name}");

    let contents = fs::read_to_string(&logs[0]).unwrap();
    assert!(contents.contains("run started"), "{contents}");
    assert!(contents.contains("certificate configuration loaded"), "{contents}");
    assert!(contents.contains("\"scope\":\"rootful\""), "{contents}");
    assert!(contents.contains("\"server\":\"quadlet\""), "{contents}");
}

#[test]
fn certificate_source_flag_overrides_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "certificate_source = \"default\"");
    let out = stdout(
        iopctl(dir.path())
            .arg("--config")
            .arg(&config)
            .args(["--certificate-source", "installer", "--server", "satellite"])
            .arg("certificates"),
    );
    assert!(out.contains("certificates_ca_directory: /root/ssl-build"));
    assert!(out.contains("/root/ssl-build/satellite.lab.test/satellite.lab.test-apache.crt"));
}

#[test]
fn check_without_ssh_config_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let assert = iopctl(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["check", "--suite", "kafka"])
        .assert()
        .failure();
    assert!(assert.get_output().stdout.is_empty());
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("unable to open verification session"), "{}", stderr);
}

#[test]
fn invalid_override_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    iopctl(dir.path())
        .args(["--database-mode", "remote", "list"])
        .assert()
        .failure();
}
