//! ---
//! iop_section: "01-core-functionality"
//! iop_subsection: "integration-tests"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Configuration discovery and override tests."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::env;
use std::fs;

use iop_common::config::{DatabaseMode, HarnessConfig};

// Single test so the environment override does not race other tests.
#[test]
fn load_prefers_env_then_candidates_then_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let candidate = dir.path().join("iop-checks.toml");
    let override_path = dir.path().join("override.toml");
    fs::write(
        &candidate,
        "[targets]\nserver = \"from-candidate\"\n",
    )
    .unwrap();
    fs::write(
        &override_path,
        "[targets]\nserver = \"from-env\"\n[deployment]\ndatabase_mode = \"external\"\n",
    )
    .unwrap();

    env::remove_var(HarnessConfig::ENV_CONFIG_PATH);
    let missing = dir.path().join("missing.toml");
    let loaded = HarnessConfig::load_with_source(&[&missing]).expect("defaults load");
    assert!(loaded.source.is_none());
    assert_eq!(loaded.config.targets.server, "quadlet");

    let loaded = HarnessConfig::load_with_source(&[&missing, &candidate]).expect("candidate");
    assert_eq!(loaded.source.as_deref(), Some(candidate.as_path()));
    assert_eq!(loaded.config.targets.server, "from-candidate");

    env::set_var(HarnessConfig::ENV_CONFIG_PATH, &override_path);
    let loaded = HarnessConfig::load_with_source(&[&candidate]).expect("env override");
    assert_eq!(loaded.config.targets.server, "from-env");
    assert_eq!(loaded.config.deployment.database_mode, DatabaseMode::External);
    assert_eq!(loaded.config.database_host(), "database");

    env::set_var(HarnessConfig::ENV_CONFIG_PATH, dir.path().join("absent.toml"));
    let err = HarnessConfig::load(&[&candidate]).expect_err("explicit path must exist");
    assert!(format!("{err:#}").contains("unable to read config file"));
    env::remove_var(HarnessConfig::ENV_CONFIG_PATH);
}

#[test]
fn invalid_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[targets]\nserver = \"\"\n").unwrap();
    let err = HarnessConfig::from_path(&path).expect_err("empty server rejected");
    assert!(err.to_string().contains("targets.server must not be empty"));
}
