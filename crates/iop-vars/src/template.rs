//! ---
//! iop_section: "03-deployment-variables"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Jinja templates used by deployment variable files."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! Deployment variable files are Jinja templates rendered by `minijinja`.
//! Syntax is checked once at [`Template::parse`]; each render builds an
//! environment with the requested [`Undefined`] behaviour.

use std::collections::BTreeSet;

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_yaml::Value;

use crate::error::{Result, TemplateError};

/// How a reference to an undefined variable renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Undefined {
    /// Renders as an empty string.
    #[default]
    Lenient,
    /// Fails the render.
    Strict,
}

impl Undefined {
    fn behavior(self) -> UndefinedBehavior {
        match self {
            Undefined::Lenient => UndefinedBehavior::Lenient,
            Undefined::Strict => UndefinedBehavior::Strict,
        }
    }
}

fn environment(undefined: Undefined) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(undefined.behavior());
    env.set_keep_trailing_newline(true);
    env
}

fn convert(err: minijinja::Error) -> TemplateError {
    let line = err.line().unwrap_or_default();
    match err.kind() {
        ErrorKind::SyntaxError => TemplateError::Syntax {
            line,
            message: err.detail().unwrap_or("invalid syntax").to_owned(),
        },
        _ => TemplateError::Render { line, source: err },
    }
}

/// A syntax-checked template, reusable across renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    variables: BTreeSet<String>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let env = environment(Undefined::Lenient);
        let compiled = env.template_from_str(source).map_err(convert)?;
        let variables = compiled.undeclared_variables(false).into_iter().collect();
        Ok(Self {
            source: source.to_owned(),
            variables,
        })
    }

    /// Top-level variables the template reads from its context, sorted.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Render against a YAML mapping. When a strict render trips over a
    /// top-level variable missing from `context`, the error names it.
    pub fn render(&self, context: &Value, undefined: Undefined) -> Result<String> {
        let env = environment(undefined);
        let compiled = env.template_from_str(&self.source).map_err(convert)?;
        compiled.render(context).map_err(|err| {
            let missing = self.variables().find(|name| context.get(*name).is_none());
            match (err.kind(), missing) {
                (ErrorKind::UndefinedError, Some(name)) if undefined == Undefined::Strict => {
                    TemplateError::Undefined {
                        name: name.to_owned(),
                    }
                }
                _ => convert(err),
            }
        })
    }
}
