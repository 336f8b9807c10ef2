//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Foreman/Katello client, task polling, and scoped fixtures."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Management API access for the verification harness.
//!
//! [`ForemanApi`] routes resource/action pairs through an [`ApiTransport`];
//! [`fixtures`] builds self-cleaning domain objects on top of it.

pub mod client;
pub mod error;
pub mod fixtures;
pub mod mock;
pub mod transport;

pub use client::{id_of, ForemanApi, Resource, Task, METADATA_GENERATE_LABEL};
pub use error::{ApiError, Result};
pub use fixtures::{ClientEnvironment, Scoped, TeardownReport};
pub use mock::InMemoryKatello;
pub use transport::{ApiRequest, ApiTransport, HttpSettings, HttpTransport, Method};
