//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "SSH-backed host handles and the helpers derived from them."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Remote execution for the IOP verification harness.
//!
//! A [`Host`] wraps a [`CommandRunner`]; in production that is an
//! [`SshRunner`] driven by an OpenSSH config file, in tests a
//! [`ScriptedRunner`]. Service, podman and probe helpers borrow the host
//! and issue one command per query.

pub mod command;
pub mod error;
pub mod host;
pub mod podman;
pub mod probe;
pub mod scripted;
pub mod service;
pub mod ssh_config;

pub use command::{shell_quote, CommandOutput, CommandRunner, SshRunner};
pub use error::{RemoteError, Result};
pub use host::{Host, Package, RemoteFile};
pub use podman::{
    first_inspect_entry, ContainerInfo, ContainerRun, NetworkInfo, NetworkOptions, Podman,
    SubnetInfo,
};
pub use probe::{ClientCert, HttpProbe, ProbeOrigin, ProbeOutcome};
pub use scripted::ScriptedRunner;
pub use service::{ServiceHandle, SystemService, UserService};
pub use ssh_config::{SshConfig, SshHostEntry};
