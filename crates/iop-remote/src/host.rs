//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Remote host handles and filesystem/package inspection."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::command::{shell_quote, CommandOutput, CommandRunner, SshRunner};
use crate::error::{RemoteError, Result};
use crate::podman::Podman;
use crate::service::{ServiceHandle, SystemService, UserService};

/// An addressable remote machine. Commands run with elevated privileges.
pub struct Host {
    alias: String,
    runner: Box<dyn CommandRunner>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").field("alias", &self.alias).finish()
    }
}

impl Host {
    /// Host reached through the system ssh client and the given config file.
    pub fn ssh(alias: impl Into<String>, ssh_config: impl AsRef<Path>) -> Self {
        let alias = alias.into();
        let runner = SshRunner::new(alias.clone(), ssh_config);
        Self::with_runner(alias, runner)
    }

    pub fn with_runner(alias: impl Into<String>, runner: impl CommandRunner + 'static) -> Self {
        Self {
            alias: alias.into(),
            runner: Box::new(runner),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Run a command and capture its output regardless of exit status.
    pub fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = self.runner.run(command)?;
        debug!(host = %self.alias, command, exit_code = output.exit_code, "remote command finished");
        Ok(output)
    }

    /// Run a command that is expected to succeed.
    pub fn run_ok(&self, command: &str) -> Result<CommandOutput> {
        let output = self.run(command)?;
        if output.failed() {
            return Err(RemoteError::CommandFailed {
                host: self.alias.clone(),
                command: command.to_owned(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_owned(),
            });
        }
        Ok(output)
    }

    /// Run a cleanup command, logging instead of propagating any failure.
    pub fn run_quiet(&self, command: &str) {
        match self.run(command) {
            Ok(output) if output.failed() => {
                debug!(host = %self.alias, command, exit_code = output.exit_code, "cleanup command failed");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(host = %self.alias, command, error = %err, "cleanup command could not run");
            }
        }
    }

    pub fn file<'h>(&'h self, path: &str) -> RemoteFile<'h> {
        RemoteFile {
            host: self,
            path: path.to_owned(),
        }
    }

    pub fn package<'h>(&'h self, name: &str) -> Package<'h> {
        Package {
            host: self,
            name: name.to_owned(),
        }
    }

    /// System-scoped systemd unit.
    pub fn service<'h>(&'h self, name: &str) -> SystemService<'h> {
        SystemService::new(self, name)
    }

    /// Unit in `user`'s systemd instance.
    pub fn user_service<'h>(&'h self, user: &str, name: &str) -> UserService<'h> {
        UserService::new(self, user, name)
    }

    /// User-scoped when `user` is set, system-scoped otherwise.
    pub fn scoped_service<'h>(&'h self, user: Option<&str>, name: &str) -> ServiceHandle<'h> {
        match user {
            Some(user) => ServiceHandle::User(self.user_service(user, name)),
            None => ServiceHandle::System(self.service(name)),
        }
    }

    /// Podman CLI as `user` (rootless) or root.
    pub fn podman<'h>(&'h self, user: Option<&str>) -> Podman<'h> {
        Podman::new(self, user)
    }

    /// Home directory of `user` from the passwd database.
    pub fn user_home(&self, user: &str) -> Result<String> {
        let command = format!("getent passwd {}", shell_quote(user));
        let output = self.run_ok(&command)?;
        output
            .stdout_trimmed()
            .split(':')
            .nth(5)
            .filter(|home| !home.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| RemoteError::Unexpected {
                command,
                message: "passwd entry has no home directory field".to_owned(),
            })
    }

    /// Numeric uid of `user`.
    pub fn uid(&self, user: &str) -> Result<u32> {
        let command = format!("id -u {}", shell_quote(user));
        let output = self.run_ok(&command)?;
        output
            .stdout_trimmed()
            .parse()
            .map_err(|_| RemoteError::Unexpected {
                command,
                message: format!("not a uid: '{}'", output.stdout_trimmed()),
            })
    }

    /// Whether a TCP connection to `address:port` can be opened from this host.
    pub fn port_reachable(&self, address: &str, port: u16) -> Result<bool> {
        let probe = format!("</dev/tcp/{}/{}", address, port);
        let command = format!("timeout 1 bash -c {}", shell_quote(&probe));
        Ok(self.run(&command)?.succeeded())
    }
}

/// A path on a remote host.
#[derive(Debug)]
pub struct RemoteFile<'h> {
    host: &'h Host,
    path: String,
}

impl RemoteFile<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn exists(&self) -> Result<bool> {
        let command = format!("test -e {}", shell_quote(&self.path));
        Ok(self.host.run(&command)?.succeeded())
    }

    pub fn is_file(&self) -> Result<bool> {
        let command = format!("test -f {}", shell_quote(&self.path));
        Ok(self.host.run(&command)?.succeeded())
    }

    pub fn content_string(&self) -> Result<String> {
        let command = format!("cat {}", shell_quote(&self.path));
        Ok(self.host.run_ok(&command)?.stdout)
    }
}

/// An RPM package on a remote host.
#[derive(Debug)]
pub struct Package<'h> {
    host: &'h Host,
    name: String,
}

impl Package<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_installed(&self) -> Result<bool> {
        let command = format!("rpm -q --quiet {}", shell_quote(&self.name));
        Ok(self.host.run(&command)?.succeeded())
    }
}
