//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Run-wide handles to hosts, the management API, and certificates."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! A [`Session`] is opened once per run and shared by every check. Host
//! handles are cheap and stateless; the API client and the rendered
//! certificate configuration are built on first use and kept until the
//! session is dropped.

use std::fmt;

use iop_common::HarnessConfig;
use iop_foreman::{ApiError, ForemanApi};
use iop_remote::{Host, Podman, RemoteError, ServiceHandle, SshConfig};
use iop_vars::{load_certificates, Certificates, TemplateError};
use once_cell::unsync::OnceCell;
use tracing::info;

use crate::error::SessionError;

pub struct Session {
    config: HarnessConfig,
    server: Host,
    client: Host,
    /// Separate database host; `None` when the database runs on the server.
    database: Option<Host>,
    api_base: String,
    api: OnceCell<ForemanApi>,
    certificates: OnceCell<Certificates>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.server.alias())
            .field("client", &self.client.alias())
            .field("database", &self.database.as_ref().map(Host::alias))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Session {
    /// Resolve every target through the SSH configuration and open handles.
    pub fn open(config: HarnessConfig) -> Result<Self, SessionError> {
        let ssh_path = config.targets.ssh_config.clone();
        let ssh = SshConfig::from_path(&ssh_path)?;
        let server = ssh.require(&config.targets.server)?;
        ssh.require(&config.targets.client)?;

        let database = if config.deployment.database_mode.is_external() {
            ssh.require(&config.targets.database)?;
            Some(Host::ssh(config.targets.database.clone(), &ssh_path))
        } else {
            None
        };

        let session = Self {
            server: Host::ssh(config.targets.server.clone(), &ssh_path),
            client: Host::ssh(config.targets.client.clone(), &ssh_path),
            database,
            api_base: format!("https://{}", server.hostname),
            api: OnceCell::new(),
            certificates: OnceCell::new(),
            config,
        };
        info!(
            server = %session.server.alias(),
            api_base = %session.api_base,
            user = session.user().unwrap_or("root"),
            database_mode = %session.config.deployment.database_mode,
            "session opened"
        );
        Ok(session)
    }

    /// Session over pre-built hosts, addressing the API by the server alias.
    pub fn with_hosts(
        config: HarnessConfig,
        server: Host,
        client: Host,
        database: Option<Host>,
    ) -> Self {
        Self {
            api_base: format!("https://{}", server.alias()),
            server,
            client,
            database,
            api: OnceCell::new(),
            certificates: OnceCell::new(),
            config,
        }
    }

    /// Use `api` instead of connecting on first use.
    pub fn with_api(self, api: ForemanApi) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(api);
        Self { api: cell, ..self }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn server(&self) -> &Host {
        &self.server
    }

    pub fn client(&self) -> &Host {
        &self.client
    }

    pub fn database(&self) -> &Host {
        self.database.as_ref().unwrap_or(&self.server)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Rootless service account; `None` in rootful deployments.
    pub fn user(&self) -> Option<&str> {
        self.config.deployment.user.as_deref()
    }

    pub fn is_rootless(&self) -> bool {
        self.user().is_some()
    }

    /// IOP unit on the server, in the service account's systemd instance
    /// when rootless.
    pub fn service(&self, name: &str) -> ServiceHandle<'_> {
        self.server.scoped_service(self.user(), name)
    }

    /// Database unit: a system unit on the database host when external,
    /// otherwise scoped like every other IOP service.
    pub fn database_service(&self, name: &str) -> ServiceHandle<'_> {
        match &self.database {
            Some(host) => ServiceHandle::System(host.service(name)),
            None => self.service(name),
        }
    }

    pub fn podman(&self) -> Podman<'_> {
        self.server.podman(self.user())
    }

    fn user_home(&self) -> Result<Option<String>, RemoteError> {
        self.user().map(|user| self.server.user_home(user)).transpose()
    }

    /// Quadlet definition for `file`, e.g. `iop-core-kafka.container`.
    pub fn quadlet_path(&self, file: &str) -> Result<String, RemoteError> {
        Ok(match self.user_home()? {
            Some(home) => format!("{}/.config/containers/systemd/{}", home, file),
            None => format!("/etc/containers/systemd/{}", file),
        })
    }

    /// Hand-written systemd unit for `file`, e.g. a `.timer`.
    pub fn unit_path(&self, file: &str) -> Result<String, RemoteError> {
        Ok(match self.user_home()? {
            Some(home) => format!("{}/.config/systemd/user/{}", home, file),
            None => format!("/etc/systemd/system/{}", file),
        })
    }

    /// Management API client, connected on first use.
    pub fn api(&self) -> Result<&ForemanApi, ApiError> {
        self.api.get_or_try_init(|| {
            ForemanApi::connect(
                &self.config.api,
                &self.api_base,
                &self.config.server_fqdn(),
            )
        })
    }

    /// Certificate configuration for the selected source, rendered on first use.
    pub fn certificates(&self) -> Result<&Certificates, TemplateError> {
        self.certificates.get_or_try_init(|| {
            load_certificates(
                &self.config.deployment.vars_dir,
                self.config.deployment.certificate_source,
                &self.config.server_fqdn(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iop_remote::ScriptedRunner;
    use std::io::Write;

    fn scripted(alias: &str, runner: &ScriptedRunner) -> Host {
        Host::with_runner(alias, runner.clone())
    }

    #[test]
    fn open_requires_every_target_in_ssh_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Host quadlet\n  HostName 192.168.121.17\n").unwrap();
        let mut config = HarnessConfig::default();
        config.targets.ssh_config = file.path().to_path_buf();

        let err = Session::open(config.clone()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Remote(RemoteError::UnknownHost(ref alias)) if alias == "client"
        ));

        writeln!(file, "Host client\n  HostName 192.168.121.18\n").unwrap();
        let session = Session::open(config).unwrap();
        assert_eq!(session.api_base(), "https://192.168.121.17");
        assert_eq!(session.database().alias(), "quadlet");
    }

    #[test]
    fn paths_follow_the_service_account() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "getent passwd foremanctl",
            "foremanctl:x:1001:1001::/var/lib/foremanctl:/bin/bash\n",
        );
        let session = Session::with_hosts(
            HarnessConfig::default(),
            scripted("quadlet", &runner),
            scripted("client", &runner),
            None,
        );
        assert_eq!(
            session.quadlet_path("iop-core-kafka.container").unwrap(),
            "/var/lib/foremanctl/.config/containers/systemd/iop-core-kafka.container"
        );

        let mut rootful = HarnessConfig::default();
        rootful.deployment.user = None;
        let session = Session::with_hosts(
            rootful,
            scripted("quadlet", &runner),
            scripted("client", &runner),
            None,
        );
        assert_eq!(
            session.unit_path("iop-core-host-inventory-cleanup.timer").unwrap(),
            "/etc/systemd/system/iop-core-host-inventory-cleanup.timer"
        );
    }

    #[test]
    fn external_database_services_are_system_scoped() {
        let server = ScriptedRunner::new();
        let database = ScriptedRunner::new();
        database.respond("systemctl is-active postgresql", "active\n");
        let session = Session::with_hosts(
            HarnessConfig::default(),
            scripted("quadlet", &server),
            scripted("client", &server),
            Some(scripted("database", &database)),
        );
        assert!(session.database_service("postgresql").is_running().unwrap());
        assert!(server.history().is_empty());
    }
}
