//! ---
//! iop_section: "03-deployment-variables"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Two-pass resolution of the certificate variable file."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! The certificate variable file both defines `certificates_ca_directory`
//! and interpolates it into the other paths. The first render runs with only
//! the server FQDN, leniently, to read that definition back out; the second
//! render supplies it and must resolve every reference.

use std::fs;
use std::path::Path;

use iop_common::CertificateSource;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{Result, TemplateError};
use crate::template::{Template, Undefined};

pub const CA_DIRECTORY_KEY: &str = "certificates_ca_directory";

/// Fully rendered certificate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificates {
    ca_directory: String,
    values: Mapping,
}

impl Certificates {
    pub fn ca_directory(&self) -> &str {
        &self.ca_directory
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn values(&self) -> &Mapping {
        &self.values
    }

    pub fn into_values(self) -> Mapping {
        self.values
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.values)?)
    }
}

fn fqdn_context(fqdn: &str) -> Mapping {
    let mut facts = Mapping::new();
    facts.insert(Value::from("fqdn"), Value::from(fqdn));
    let mut context = Mapping::new();
    context.insert(Value::from("ansible_facts"), Value::Mapping(facts));
    context
}

fn parse_mapping(rendered: &str) -> Result<Mapping> {
    match serde_yaml::from_str::<Value>(rendered)? {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(TemplateError::NotAMapping),
    }
}

fn ca_directory_of(mapping: &Mapping) -> Result<Value> {
    let value = mapping
        .get(CA_DIRECTORY_KEY)
        .cloned()
        .ok_or_else(|| TemplateError::MissingKey(CA_DIRECTORY_KEY.to_owned()))?;
    if value.is_string() {
        Ok(value)
    } else {
        Err(TemplateError::InvalidValue {
            key: CA_DIRECTORY_KEY.to_owned(),
            found: format!("{:?}", value),
        })
    }
}

/// Resolve a certificate template for the server `fqdn`.
pub fn render_two_pass(template: &Template, fqdn: &str) -> Result<Certificates> {
    let mut context = fqdn_context(fqdn);

    let first = template.render(&Value::Mapping(context.clone()), Undefined::Lenient)?;
    let ca_directory = ca_directory_of(&parse_mapping(&first)?)?;
    debug!(fqdn, ca_directory = ?ca_directory, "first certificate pass resolved");

    context.insert(Value::from(CA_DIRECTORY_KEY), ca_directory);
    let second = template.render(&Value::Mapping(context), Undefined::Strict)?;
    let values = parse_mapping(&second)?;
    let ca_directory = ca_directory_of(&values)?
        .as_str()
        .map(str::to_owned)
        .unwrap_or_default();

    Ok(Certificates {
        ca_directory,
        values,
    })
}

/// Load `<vars_dir>/<source>_certificates.yml` and resolve it for `fqdn`.
pub fn load_certificates(
    vars_dir: &Path,
    source: CertificateSource,
    fqdn: &str,
) -> Result<Certificates> {
    let path = vars_dir.join(source.template_name());
    let contents = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
        path: path.clone(),
        source,
    })?;
    let template = Template::parse(&contents)?;
    let certificates = render_two_pass(&template, fqdn)?;
    info!(
        path = %path.display(),
        source = source.as_str(),
        ca_directory = certificates.ca_directory(),
        "certificate configuration loaded"
    );
    Ok(certificates)
}
