//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Command runners and captured command output."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::trace;

use crate::error::{RemoteError, Result};

/// Exit status ssh reserves for its own failures.
const SSH_TRANSPORT_EXIT: i32 = 255;

/// Diagnostics ssh itself prints when it cannot reach or log into a host.
const SSH_DIAGNOSTICS: &[&str] = &[
    "ssh:",
    "kex_exchange_identification:",
    "Connection refused",
    "Connection timed out",
    "Connection closed by",
    "Connection reset by",
    "Could not resolve hostname",
    "Host key verification failed",
    "Permission denied (",
    "No route to host",
];

/// True when ssh, rather than the remote command, produced a 255 exit.
/// A remote command exiting 255 on its own keeps its output.
pub fn is_transport_failure(exit_code: i32, stdout: &str, stderr: &str) -> bool {
    exit_code == SSH_TRANSPORT_EXIT
        && stdout.is_empty()
        && stderr
            .lines()
            .any(|line| SSH_DIAGNOSTICS.iter().any(|marker| line.contains(marker)))
}

/// Captured result of a single remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub command: String,
    /// Exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn failed(&self) -> bool {
        !self.succeeded()
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Non-empty trimmed stdout lines.
    pub fn lines(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Executes shell commands on one host.
pub trait CommandRunner: Send + Sync {
    /// Run `command` through a POSIX shell and capture its output.
    ///
    /// A non-zero exit is *not* an error; only failure to reach the host is.
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands through the system `ssh` client using an explicit config file.
#[derive(Debug, Clone)]
pub struct SshRunner {
    alias: String,
    ssh_config: PathBuf,
    sudo: bool,
    extra_options: Vec<String>,
}

impl SshRunner {
    /// Runner for `alias` as resolved by `ssh_config`, elevating with sudo.
    pub fn new(alias: impl Into<String>, ssh_config: impl AsRef<Path>) -> Self {
        Self {
            alias: alias.into(),
            ssh_config: ssh_config.as_ref().to_path_buf(),
            sudo: true,
            extra_options: vec!["BatchMode=yes".to_owned()],
        }
    }

    /// Run commands as the login user instead of through sudo.
    pub fn without_sudo(mut self) -> Self {
        self.sudo = false;
        self
    }

    /// Append an `-o` option passed to ssh.
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.extra_options.push(option.into());
        self
    }

    /// Command line executed on the remote side.
    pub fn remote_command(&self, command: &str) -> String {
        if self.sudo {
            format!("sudo -n /bin/sh -c {}", shell_quote(command))
        } else {
            format!("/bin/sh -c {}", shell_quote(command))
        }
    }

    /// Full local argument vector passed to `ssh`.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-F".to_owned(), self.ssh_config.display().to_string()];
        for option in &self.extra_options {
            args.push("-o".to_owned());
            args.push(option.clone());
        }
        args.push(self.alias.clone());
        args.push("--".to_owned());
        args.push(self.remote_command(command));
        args
    }
}

impl CommandRunner for SshRunner {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = Command::new("ssh")
            .args(self.ssh_args(command))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RemoteError::Spawn {
                host: self.alias.clone(),
                source,
            })?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        trace!(host = %self.alias, exit_code, "ssh command returned");
        if is_transport_failure(exit_code, &stdout, &stderr) {
            return Err(RemoteError::Transport {
                host: self.alias.clone(),
                stderr: stderr.trim().to_owned(),
            });
        }
        Ok(CommandOutput::new(command, exit_code, stdout, stderr))
    }
}

/// Quote `value` for a POSIX shell using single quotes.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        return value.to_owned();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(shell_quote("iop-core-kafka"), "iop-core-kafka");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn ssh_args_wrap_command_in_sudo_shell() {
        let runner = SshRunner::new("quadlet", "./.tmp/ssh-config");
        let args = runner.ssh_args("podman secret ls --format '{{.Name}}'");
        assert_eq!(&args[..2], ["-F", "./.tmp/ssh-config"]);
        assert_eq!(&args[2..4], ["-o", "BatchMode=yes"]);
        assert_eq!(args[4], "quadlet");
        assert_eq!(args[5], "--");
        assert_eq!(
            args[6],
            r#"sudo -n /bin/sh -c 'podman secret ls --format '\''{{.Name}}'\'''"#
        );
    }

    #[test]
    fn without_sudo_runs_plain_shell() {
        let runner = SshRunner::new("client", "cfg")
            .without_sudo()
            .with_option("ConnectTimeout=5");
        assert_eq!(runner.remote_command("id -u"), "/bin/sh -c 'id -u'");
        assert!(runner.ssh_args("true").contains(&"ConnectTimeout=5".to_owned()));
    }

    #[test]
    fn only_ssh_diagnostics_make_255_a_transport_failure() {
        assert!(is_transport_failure(
            255,
            "",
            "ssh: connect to host 192.168.121.17 port 22: Connection refused\r\n"
        ));
        assert!(is_transport_failure(
            255,
            "",
            "vagrant@192.168.121.17: Permission denied (publickey,gssapi-keyex).\n"
        ));
        assert!(is_transport_failure(255, "", "kex_exchange_identification: read: Connection reset by peer"));

        assert!(!is_transport_failure(255, "", "custom-tool: refusing to continue\n"));
        assert!(!is_transport_failure(255, "", ""));
        assert!(!is_transport_failure(255, "partial\n", "ssh: lost connection"));
        assert!(!is_transport_failure(1, "", "ssh: connect to host q port 22: Connection refused"));
    }

    #[test]
    fn output_helpers() {
        let output = CommandOutput::new("ls", 0, "  a\n\n b \n", "");
        assert!(output.succeeded());
        assert_eq!(output.lines(), vec!["a", "b"]);
        assert_eq!(output.stdout_trimmed(), "a\n\n b");
        assert!(CommandOutput::new("false", 1, "", "").failed());
    }
}
