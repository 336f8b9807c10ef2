//! ---
//! iop_section: "01-core-functionality"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Shared configuration and tracing primitives for the harness."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Shared primitives for the IOP verification workspace.
//! This crate exposes configuration loading, target options, and tracing
//! setup consumed by the harness crates and the `iopctl` binary.

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, CertificateSource, DatabaseMode, DeploymentConfig, HarnessConfig, ImagesConfig,
    KafkaConfig, LoadedHarnessConfig, LoggingConfig, TargetsConfig, BUILTIN_TOPIC_PROFILES,
};
pub use logging::{init_tracing, run_id, LogFormat, RunLog};
