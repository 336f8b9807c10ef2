//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "systemd service state queries for user and system scope."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Every property runs its own `systemctl` invocation. Nothing is cached, so
//! a unit can report `exists` without being enabled, or enabled without
//! being active.

use crate::command::{shell_quote, CommandOutput};
use crate::error::Result;
use crate::host::Host;

/// `is-enabled` answers that count as enabled.
const ENABLED_STATES: &[&str] = &["enabled", "static"];

/// A unit in a non-root user's systemd instance, queried via `--machine=<user>@`.
#[derive(Debug, Clone)]
pub struct UserService<'h> {
    host: &'h Host,
    user: String,
    name: String,
}

impl<'h> UserService<'h> {
    pub fn new(host: &'h Host, user: &str, name: &str) -> Self {
        Self {
            host,
            user: user.to_owned(),
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn systemctl(&self, verb: &str) -> String {
        format!(
            "systemctl --machine={}@ --user {} {}",
            shell_quote(&self.user),
            verb,
            shell_quote(&self.name)
        )
    }

    pub fn is_running(&self) -> Result<bool> {
        let output = self.host.run(&self.systemctl("is-active"))?;
        Ok(output.stdout_trimmed() == "active")
    }

    pub fn is_enabled(&self) -> Result<bool> {
        let output = self.host.run(&self.systemctl("is-enabled"))?;
        Ok(ENABLED_STATES.contains(&output.stdout_trimmed()))
    }

    pub fn exists(&self) -> Result<bool> {
        let output = self.host.run(&self.systemctl("list-unit-files"))?;
        Ok(output.stdout.contains(&self.name))
    }

    /// Raw `systemctl show --property=<property>` output, e.g. `After=a.service b.service`.
    pub fn show_property(&self, property: &str) -> Result<CommandOutput> {
        let verb = format!("show --property={}", property);
        self.host.run(&self.systemctl(&verb))
    }
}

/// A unit managed by the system instance of systemd.
#[derive(Debug, Clone)]
pub struct SystemService<'h> {
    host: &'h Host,
    name: String,
}

impl<'h> SystemService<'h> {
    pub fn new(host: &'h Host, name: &str) -> Self {
        Self {
            host,
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn systemctl(&self, verb: &str) -> String {
        format!("systemctl {} {}", verb, shell_quote(&self.name))
    }

    pub fn is_running(&self) -> Result<bool> {
        let output = self.host.run(&self.systemctl("is-active"))?;
        Ok(output.stdout_trimmed() == "active")
    }

    pub fn is_enabled(&self) -> Result<bool> {
        let output = self.host.run(&self.systemctl("is-enabled"))?;
        Ok(ENABLED_STATES.contains(&output.stdout_trimmed()))
    }

    pub fn exists(&self) -> Result<bool> {
        let output = self.host.run(&self.systemctl("list-unit-files"))?;
        Ok(output.stdout.contains(&self.name))
    }

    pub fn show_property(&self, property: &str) -> Result<CommandOutput> {
        let verb = format!("show --property={}", property);
        self.host.run(&self.systemctl(&verb))
    }
}

/// Either scope, chosen by whether the deployment is rootless.
#[derive(Debug, Clone)]
pub enum ServiceHandle<'h> {
    User(UserService<'h>),
    System(SystemService<'h>),
}

impl ServiceHandle<'_> {
    pub fn name(&self) -> &str {
        match self {
            ServiceHandle::User(svc) => svc.name(),
            ServiceHandle::System(svc) => svc.name(),
        }
    }

    pub fn is_running(&self) -> Result<bool> {
        match self {
            ServiceHandle::User(svc) => svc.is_running(),
            ServiceHandle::System(svc) => svc.is_running(),
        }
    }

    pub fn is_enabled(&self) -> Result<bool> {
        match self {
            ServiceHandle::User(svc) => svc.is_enabled(),
            ServiceHandle::System(svc) => svc.is_enabled(),
        }
    }

    pub fn exists(&self) -> Result<bool> {
        match self {
            ServiceHandle::User(svc) => svc.exists(),
            ServiceHandle::System(svc) => svc.exists(),
        }
    }

    pub fn show_property(&self, property: &str) -> Result<CommandOutput> {
        match self {
            ServiceHandle::User(svc) => svc.show_property(property),
            ServiceHandle::System(svc) => svc.show_property(property),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedRunner;

    #[test]
    fn properties_are_independent_queries() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "list-unit-files iop-core-host-inventory-cleanup",
            "iop-core-host-inventory-cleanup.service generated -\n",
        );
        runner.respond_with_exit("is-active iop-core-host-inventory-cleanup", 3, "inactive\n");
        runner.respond("is-enabled iop-core-host-inventory-cleanup", "static\n");
        let host = Host::with_runner("quadlet", runner.clone());
        let svc = host.user_service("foremanctl", "iop-core-host-inventory-cleanup");

        assert!(svc.exists().unwrap());
        assert!(svc.is_enabled().unwrap());
        assert!(!svc.is_running().unwrap());
        assert!(svc.exists().unwrap());

        let history = runner.history();
        assert_eq!(history.len(), 4);
        assert!(history
            .iter()
            .all(|c| c.starts_with("systemctl --machine=foremanctl@ --user ")));
    }

    #[test]
    fn enabled_requires_exact_state() {
        let runner = ScriptedRunner::new();
        runner.respond("is-enabled a", "enabled\n");
        runner.respond_with_exit("is-enabled b", 1, "disabled\n");
        runner.respond("is-enabled c", "enabled-runtime\n");
        let host = Host::with_runner("quadlet", runner);
        assert!(host.user_service("u", "a").is_enabled().unwrap());
        assert!(!host.user_service("u", "b").is_enabled().unwrap());
        assert!(!host.user_service("u", "c").is_enabled().unwrap());
    }

    #[test]
    fn active_requires_exact_match() {
        let runner = ScriptedRunner::new();
        runner.respond_with_exit("is-active x", 3, "inactive\n");
        runner.respond("is-active y", "active\n");
        let host = Host::with_runner("quadlet", runner);
        assert!(!host.user_service("u", "x").is_running().unwrap());
        assert!(host.user_service("u", "y").is_running().unwrap());
    }

    #[test]
    fn scoped_service_switches_on_user() {
        let runner = ScriptedRunner::new();
        runner.respond("systemctl is-active postgresql", "active\n");
        let host = Host::with_runner("database", runner.clone());
        let svc = host.scoped_service(None, "postgresql");
        assert!(matches!(svc, ServiceHandle::System(_)));
        assert!(svc.is_running().unwrap());
        assert_eq!(runner.history(), vec!["systemctl is-active postgresql"]);

        let svc = host.scoped_service(Some("foremanctl"), "iop-core-kafka");
        assert!(matches!(svc, ServiceHandle::User(_)));
        assert_eq!(svc.name(), "iop-core-kafka");
    }

    #[test]
    fn show_property_targets_user_manager() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "show --property=After iop-core-engine",
            "After=iop-core-ingress.service iop-core-kafka.service\n",
        );
        let host = Host::with_runner("quadlet", runner.clone());
        let out = host
            .user_service("foremanctl", "iop-core-engine")
            .show_property("After")
            .unwrap();
        assert!(out.stdout.contains("iop-core-kafka.service"));
        assert_eq!(
            runner.history()[0],
            "systemctl --machine=foremanctl@ --user show --property=After iop-core-engine"
        );
    }
}
