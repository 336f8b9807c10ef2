//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Error taxonomy for remote command execution."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to launch ssh for host {host}: {source}")]
    Spawn {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ssh transport to {host} failed: {stderr}")]
    Transport { host: String, stderr: String },
    #[error("unable to read ssh config {path}: {source}")]
    SshConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ssh config line {line}: {message}")]
    SshConfigParse { line: usize, message: String },
    #[error("host {0} has no entry in the ssh configuration")]
    UnknownHost(String),
    #[error("`{command}` on {host} exited with {exit_code}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("unable to decode output of `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected output from `{command}`: {message}")]
    Unexpected { command: String, message: String },
}

impl RemoteError {
    /// True when the host could not be reached at all, as opposed to a
    /// command that ran and reported failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteError::Spawn { .. } | RemoteError::Transport { .. }
        )
    }
}
