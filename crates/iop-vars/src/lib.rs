//! ---
//! iop_section: "03-deployment-variables"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Deployment variable templates and certificate configuration."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Variable files shipped with the deployment are YAML documents containing
//! template expressions. [`certificates`] resolves the self-referential
//! certificate file; [`template`] is the renderer underneath it.

pub mod certificates;
pub mod error;
pub mod template;

pub use certificates::{load_certificates, render_two_pass, Certificates, CA_DIRECTORY_KEY};
pub use error::{Result, TemplateError};
pub use template::{Template, Undefined};
