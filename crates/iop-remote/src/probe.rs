//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "HTTP reachability probes issued with curl from hosts and containers."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Probes report how the probing process exited separately from the HTTP
//! status curl observed. curl prints `000` when no response arrived; that is
//! surfaced as `http_status: None` rather than as a fake status code.

use serde::Serialize;

use crate::command::shell_quote;
use crate::error::Result;
use crate::podman::{ContainerRun, Podman};

/// Where curl runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOrigin {
    /// Directly on the host, outside any container.
    Host,
    /// Inside an already running container via `podman exec`.
    Exec { container: String },
    /// In a throwaway container started from `image`, optionally attached to `network`.
    Sidecar {
        image: String,
        network: Option<String>,
    },
}

/// Client certificate material, as paths visible to the probing process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCert {
    pub cert: String,
    pub key: String,
    pub ca_cert: String,
}

/// One curl request against a URL.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    origin: ProbeOrigin,
    client_cert: Option<ClientCert>,
}

/// Result of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// Exit status of the process that ran curl (podman for container origins).
    pub exit_code: i32,
    /// Status reported by curl; `None` when no HTTP response was received.
    pub http_status: Option<u16>,
}

impl ProbeOutcome {
    pub fn exec_succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn status_is(&self, status: u16) -> bool {
        self.http_status == Some(status)
    }

    /// Any HTTP response at all, whatever its status.
    pub fn responded(&self) -> bool {
        self.http_status.is_some()
    }
}

/// Parse curl's `%{http_code}` output. `000` and anything unparsable mean no response.
pub fn parse_status(stdout: &str) -> Option<u16> {
    let code = stdout.trim();
    if code.len() != 3 {
        return None;
    }
    match code.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(status) => Some(status),
    }
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, origin: ProbeOrigin) -> Self {
        Self {
            url: url.into(),
            origin,
            client_cert: None,
        }
    }

    pub fn from_host(url: impl Into<String>) -> Self {
        Self::new(url, ProbeOrigin::Host)
    }

    pub fn from_container(container: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            url,
            ProbeOrigin::Exec {
                container: container.into(),
            },
        )
    }

    pub fn from_sidecar(
        image: impl Into<String>,
        network: Option<&str>,
        url: impl Into<String>,
    ) -> Self {
        Self::new(
            url,
            ProbeOrigin::Sidecar {
                image: image.into(),
                network: network.map(str::to_owned),
            },
        )
    }

    pub fn with_client_cert(mut self, cert: ClientCert) -> Self {
        self.client_cert = Some(cert);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> &ProbeOrigin {
        &self.origin
    }

    fn curl_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["curl", "-s", "-o", "/dev/null", "-w", "%{http_code}"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        if let Some(cert) = &self.client_cert {
            args.extend([
                "--cert".to_owned(),
                cert.cert.clone(),
                "--key".to_owned(),
                cert.key.clone(),
                "--cacert".to_owned(),
                cert.ca_cert.clone(),
            ]);
        }
        args.push(self.url.clone());
        args
    }

    fn curl_line(&self) -> String {
        self.curl_args()
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the probe; container origins go through `podman`.
    pub fn run(&self, podman: &Podman<'_>) -> Result<ProbeOutcome> {
        let output = match &self.origin {
            ProbeOrigin::Host => podman.host().run(&self.curl_line())?,
            ProbeOrigin::Exec { container } => podman.exec(container, &self.curl_line())?,
            ProbeOrigin::Sidecar { image, network } => {
                let mut spec = ContainerRun::new(image.clone()).remove();
                if let Some(network) = network {
                    spec = spec.network(network.clone());
                }
                podman.run_container(&spec.command(self.curl_args()))?
            }
        };
        Ok(ProbeOutcome {
            exit_code: output.exit_code,
            http_status: parse_status(&output.stdout),
        })
    }
}
