//! ---
//! iop_section: "03-deployment-variables"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Errors raised while loading and rendering variable templates."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unable to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("'{name}' is undefined")]
    Undefined { name: String },
    #[error("template failed to render on line {line}: {source}")]
    Render {
        line: usize,
        #[source]
        source: minijinja::Error,
    },
    #[error("rendered template is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("rendered template is not a YAML mapping")]
    NotAMapping,
    #[error("rendered template does not define '{0}'")]
    MissingKey(String),
    #[error("'{key}' must be a string, found {found}")]
    InvalidValue { key: String, found: String },
}
