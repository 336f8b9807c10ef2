//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Per-subsystem check suites."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
pub mod common;
pub mod engine;
pub mod gateway;
pub mod ingress;
pub mod integration;
pub mod inventory;
pub mod kafka;
pub mod network;
pub mod network_role;
pub mod puptoo;
pub mod remediation;
pub mod vmaas;
pub mod yuptoo;
