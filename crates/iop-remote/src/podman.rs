//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Podman CLI helpers for rootless and rootful deployments."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::Deserialize;

use crate::command::{shell_quote, CommandOutput};
use crate::error::{RemoteError, Result};
use crate::host::Host;

/// Podman invoked on a host, either as a rootless user or as root.
///
/// Rootless invocations change into `/tmp` first so `sudo -u` does not
/// inherit an unreadable working directory.
#[derive(Debug, Clone)]
pub struct Podman<'h> {
    host: &'h Host,
    user: Option<String>,
}

/// Options for `podman network create`.
#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    pub subnet: Option<String>,
    pub gateway: Option<String>,
}

/// A container started with `podman run`.
#[derive(Debug, Clone)]
pub struct ContainerRun {
    name: Option<String>,
    detach: bool,
    remove: bool,
    networks: Vec<String>,
    image: String,
    command: Vec<String>,
}

impl ContainerRun {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: None,
            detach: false,
            remove: false,
            networks: Vec::new(),
            image: image.into(),
            command: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn detach(mut self) -> Self {
        self.detach = true;
        self
    }

    pub fn remove(mut self) -> Self {
        self.remove = true;
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.networks.push(network.into());
        self
    }

    /// Command run inside the container, one argument per item.
    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = args.into_iter().map(Into::into).collect();
        self
    }

    fn to_args(&self) -> String {
        let mut parts = vec!["run".to_owned()];
        if self.detach {
            parts.push("-d".to_owned());
        }
        if self.remove {
            parts.push("--rm".to_owned());
        }
        if let Some(name) = &self.name {
            parts.push(format!("--name {}", shell_quote(name)));
        }
        for network in &self.networks {
            parts.push(format!("--network {}", shell_quote(network)));
        }
        parts.push(shell_quote(&self.image));
        parts.extend(self.command.iter().map(|arg| shell_quote(arg)));
        parts.join(" ")
    }
}

/// Subset of `podman network inspect` output.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkInfo {
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default = "dns_enabled_default")]
    pub dns_enabled: bool,
    #[serde(default)]
    pub subnets: Vec<SubnetInfo>,
}

fn dns_enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubnetInfo {
    pub subnet: String,
    #[serde(default)]
    pub gateway: Option<String>,
}

/// Subset of `podman inspect <container>` output.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerInfo {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "NetworkSettings", default)]
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkSettings {
    #[serde(rename = "Networks", default)]
    pub networks: BTreeMap<String, serde_json::Value>,
}

impl ContainerInfo {
    pub fn network_names(&self) -> Vec<&str> {
        self.network_settings
            .networks
            .keys()
            .map(String::as_str)
            .collect()
    }
}

/// Decode the first element of a JSON array printed by an inspect command.
pub fn first_inspect_entry<T>(output: &CommandOutput) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let mut entries: Vec<T> =
        serde_json::from_str(output.stdout_trimmed()).map_err(|source| RemoteError::Decode {
            command: output.command.clone(),
            source,
        })?;
    if entries.is_empty() {
        return Err(RemoteError::Unexpected {
            command: output.command.clone(),
            message: "inspect returned an empty list".to_owned(),
        });
    }
    Ok(entries.swap_remove(0))
}

impl<'h> Podman<'h> {
    pub fn new(host: &'h Host, user: Option<&str>) -> Self {
        Self {
            host,
            user: user.map(str::to_owned),
        }
    }

    pub fn host(&self) -> &'h Host {
        self.host
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Full shell command for `podman <args>` under the configured identity.
    pub fn command_line(&self, args: &str) -> String {
        match &self.user {
            Some(user) => format!("cd /tmp && sudo -u {} podman {}", shell_quote(user), args),
            None => format!("podman {}", args),
        }
    }

    /// Run `podman <args>` and capture the result.
    pub fn run(&self, args: &str) -> Result<CommandOutput> {
        self.host.run(&self.command_line(args))
    }

    pub fn network_backend(&self) -> Result<CommandOutput> {
        self.run("info --format '{{.Host.NetworkBackend}}'")
    }

    pub fn secret_names(&self) -> Result<CommandOutput> {
        self.run("secret ls --format '{{.Name}}'")
    }

    /// Decrypted secret, as printed by `secret inspect --showsecret`.
    pub fn secret_content(&self, name: &str) -> Result<CommandOutput> {
        self.run(&format!("secret inspect {} --showsecret", shell_quote(name)))
    }

    pub fn volume_names(&self) -> Result<CommandOutput> {
        self.run("volume ls --format '{{.Name}}'")
    }

    pub fn network_names(&self) -> Result<CommandOutput> {
        self.run("network ls --format '{{.Name}}'")
    }

    pub fn network_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .run(&format!("network exists {}", shell_quote(name)))?
            .succeeded())
    }

    pub fn network_create(&self, name: &str, options: &NetworkOptions) -> Result<CommandOutput> {
        let mut args = String::from("network create");
        if let Some(subnet) = &options.subnet {
            args.push_str(&format!(" --subnet {}", shell_quote(subnet)));
        }
        if let Some(gateway) = &options.gateway {
            args.push_str(&format!(" --gateway {}", shell_quote(gateway)));
        }
        args.push(' ');
        args.push_str(&shell_quote(name));
        self.run(&args)
    }

    pub fn network_inspect(&self, name: &str) -> Result<CommandOutput> {
        self.run(&format!("network inspect {}", shell_quote(name)))
    }

    /// Remove networks, ignoring every failure.
    pub fn network_remove_quiet(&self, names: &[&str]) {
        for name in names {
            let args = format!("network rm {} 2>/dev/null || true", shell_quote(name));
            self.host.run_quiet(&self.command_line(&args));
        }
    }

    pub fn run_container(&self, spec: &ContainerRun) -> Result<CommandOutput> {
        self.run(&spec.to_args())
    }

    /// Force-remove containers, ignoring every failure.
    pub fn remove_containers_quiet(&self, names: &[&str]) {
        if names.is_empty() {
            return;
        }
        let quoted: Vec<String> = names.iter().map(|n| shell_quote(n)).collect();
        let args = format!("rm -f {} 2>/dev/null || true", quoted.join(" "));
        self.host.run_quiet(&self.command_line(&args));
    }

    pub fn inspect(&self, container: &str) -> Result<CommandOutput> {
        self.run(&format!("inspect {}", shell_quote(container)))
    }

    /// `podman inspect <container> --format '<template>'`.
    pub fn inspect_format(&self, container: &str, template: &str) -> Result<CommandOutput> {
        self.run(&format!(
            "inspect {} --format {}",
            shell_quote(container),
            shell_quote(template)
        ))
    }

    /// `podman exec <container> <command>`; `command` is passed through unquoted.
    pub fn exec(&self, container: &str, command: &str) -> Result<CommandOutput> {
        self.run(&format!("exec {} {}", shell_quote(container), command))
    }

    /// Container log lines matching a case-insensitive basic regex.
    pub fn logs_matching(&self, container: &str, pattern: &str) -> Result<CommandOutput> {
        let args = format!(
            "logs {} 2>&1 | grep -i {}",
            shell_quote(container),
            shell_quote(pattern)
        );
        self.run(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedRunner;

    #[test]
    fn rootless_commands_switch_user() {
        let runner = ScriptedRunner::new();
        let host = Host::with_runner("quadlet", runner.clone());
        host.podman(Some("foremanctl")).secret_names().unwrap();
        host.podman(None).volume_names().unwrap();
        assert_eq!(
            runner.history(),
            vec![
                "cd /tmp && sudo -u foremanctl podman secret ls --format '{{.Name}}'",
                "podman volume ls --format '{{.Name}}'",
            ]
        );
    }

    #[test]
    fn container_run_arguments() {
        let spec = ContainerRun::new("quay.io/centos/centos:stream9")
            .name("test-dns-container1")
            .detach()
            .network("test-dns-network")
            .command(["sleep", "300"]);
        assert_eq!(
            spec.to_args(),
            "run -d --name test-dns-container1 --network test-dns-network quay.io/centos/centos:stream9 sleep 300"
        );
        let probe = ContainerRun::new("img").remove().network("a").network("b");
        assert_eq!(probe.to_args(), "run --rm --network a --network b img");
    }

    #[test]
    fn network_create_with_subnet() {
        let runner = ScriptedRunner::new();
        let host = Host::with_runner("quadlet", runner.clone());
        let options = NetworkOptions {
            subnet: Some("10.99.0.0/24".into()),
            gateway: Some("10.99.0.1".into()),
        };
        host.podman(Some("foremanctl"))
            .network_create("test-subnet-network", &options)
            .unwrap();
        assert_eq!(
            runner.history()[0],
            "cd /tmp && sudo -u foremanctl podman network create --subnet 10.99.0.0/24 --gateway 10.99.0.1 test-subnet-network"
        );
    }

    #[test]
    fn decodes_network_inspect() {
        let output = CommandOutput::new(
            "podman network inspect n",
            0,
            r#"[{"name":"n","driver":"bridge","subnets":[{"subnet":"10.99.0.0/24","gateway":"10.99.0.1"}]}]"#,
            "",
        );
        let info: NetworkInfo = first_inspect_entry(&output).unwrap();
        assert_eq!(info.driver, "bridge");
        assert!(info.dns_enabled, "dns defaults to enabled when absent");
        assert_eq!(info.subnets[0].gateway.as_deref(), Some("10.99.0.1"));
    }

    #[test]
    fn decodes_container_networks() {
        let output = CommandOutput::new(
            "podman inspect c",
            0,
            r#"[{"Name":"c","NetworkSettings":{"Networks":{"net1":{},"net2":{}}}}]"#,
            "",
        );
        let info: ContainerInfo = first_inspect_entry(&output).unwrap();
        assert_eq!(info.network_names(), vec!["net1", "net2"]);
    }

    #[test]
    fn inspect_decode_errors() {
        let empty = CommandOutput::new("podman network inspect n", 0, "[]", "");
        assert!(matches!(
            first_inspect_entry::<NetworkInfo>(&empty),
            Err(RemoteError::Unexpected { .. })
        ));
        let garbage = CommandOutput::new("podman network inspect n", 0, "Error: no such", "");
        assert!(matches!(
            first_inspect_entry::<NetworkInfo>(&garbage),
            Err(RemoteError::Decode { .. })
        ));
    }

    #[test]
    fn quiet_cleanup_appends_true() {
        let runner = ScriptedRunner::new();
        let host = Host::with_runner("quadlet", runner.clone());
        let podman = host.podman(Some("foremanctl"));
        podman.remove_containers_quiet(&["c1", "c2"]);
        podman.network_remove_quiet(&["n1"]);
        podman.remove_containers_quiet(&[]);
        assert_eq!(
            runner.history(),
            vec![
                "cd /tmp && sudo -u foremanctl podman rm -f c1 c2 2>/dev/null || true",
                "cd /tmp && sudo -u foremanctl podman network rm n1 2>/dev/null || true",
            ]
        );
    }
}
