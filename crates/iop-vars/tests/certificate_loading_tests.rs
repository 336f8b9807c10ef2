//! ---
//! iop_section: "03-deployment-variables"
//! iop_subsection: "tests"
//! iop_type: "source"
//! iop_scope: "test"
//! iop_description: "Certificate variable files loaded from disk for each source."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::path::PathBuf;

use iop_common::CertificateSource;
use iop_vars::{load_certificates, TemplateError};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn default_source_resolves_against_fqdn() {
    let certs =
        load_certificates(&fixtures(), CertificateSource::Default, "quadlet.example.com").unwrap();
    assert_eq!(certs.ca_directory(), "/etc/pki/ca");
    assert_eq!(
        certs.get_str("server_key"),
        Some("/etc/pki/ca/private/quadlet.example.com.key")
    );
    assert_eq!(certs.values().len(), 8);
}

#[test]
fn installer_source_uses_its_own_layout() {
    let certs =
        load_certificates(&fixtures(), CertificateSource::Installer, "quadlet.example.com")
            .unwrap();
    assert_eq!(certs.ca_directory(), "/root/ssl-build");
    assert_eq!(
        certs.get_str("client_certificate"),
        Some("/root/ssl-build/quadlet.example.com/quadlet.example.com-foreman-client.crt")
    );
    let yaml = certs.to_yaml().unwrap();
    assert!(yaml.contains("katello-server-ca.crt"));
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_certificates(dir.path(), CertificateSource::Default, "q").unwrap_err();
    match err {
        TemplateError::Io { path, .. } => {
            assert!(path.ends_with("default_certificates.yml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_template_produces_no_result() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("default_certificates.yml"),
        "certificates_ca_directory: /x\nbroken: \"{{ certificates_ca_directory \"\n",
    )
    .unwrap();
    assert!(matches!(
        load_certificates(dir.path(), CertificateSource::Default, "q"),
        Err(TemplateError::Syntax { .. })
    ));
}
