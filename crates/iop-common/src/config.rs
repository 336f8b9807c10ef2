//! ---
//! iop_section: "01-core-functionality"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Harness configuration, target selection, and option parsing."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds, NoneAsEmptyString};
use tracing::debug;

use crate::logging::LogFormat;

/// Topic sets known to the harness without any configuration.
///
/// `platform` covers the insights pipeline, `vulnerability` the evaluator and
/// grouper topics. Both are checked by default.
pub const BUILTIN_TOPIC_PROFILES: &[(&str, &[&str])] = &[
    (
        "platform",
        &[
            "platform.engine.results",
            "platform.insights.rule-hits",
            "platform.insights.rule-deactivation",
            "platform.inventory.events",
            "platform.inventory.host-ingress",
            "platform.sources.event-stream",
            "platform.playbook-dispatcher.runs",
            "platform.upload.announce",
            "platform.upload.validation",
            "platform.logging.logs",
            "platform.payload-status",
            "platform.remediation-updates.vulnerability",
        ],
    ),
    (
        "vulnerability",
        &[
            "vulnerability.evaluator.results",
            "vulnerability.evaluator.recalc",
            "vulnerability.evaluator.upload",
            "vulnerability.grouper.inventory.upload",
            "vulnerability.grouper.advisor.upload",
        ],
    ),
];

fn default_ssh_config() -> PathBuf {
    PathBuf::from("./.tmp/ssh-config")
}

fn default_server() -> String {
    "quadlet".to_owned()
}

fn default_client() -> String {
    "client".to_owned()
}

fn default_database() -> String {
    "database".to_owned()
}

fn default_domain() -> String {
    "example.com".to_owned()
}

fn default_user() -> Option<String> {
    Some("foremanctl".to_owned())
}

fn default_vars_dir() -> PathBuf {
    PathBuf::from("./src/vars")
}

fn default_api_username() -> String {
    "admin".to_owned()
}

fn default_api_password() -> String {
    "changeme".to_owned()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(4)
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_enabled_profiles() -> Vec<String> {
    BUILTIN_TOPIC_PROFILES
        .iter()
        .map(|(name, _)| (*name).to_owned())
        .collect()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Primary configuration object for a verification run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`HarnessConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedHarnessConfig {
    pub config: HarnessConfig,
    /// `None` when no file was found and built-in defaults apply.
    pub source: Option<PathBuf>,
}

impl HarnessConfig {
    pub const ENV_CONFIG_PATH: &str = "IOP_CHECKS_CONFIG";

    /// Default locations inspected when no explicit path is supplied.
    pub const DEFAULT_CANDIDATES: &[&str] = &["iop-checks.toml", "configs/iop-checks.toml"];

    /// Load configuration from disk, respecting the `IOP_CHECKS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `IOP_CHECKS_CONFIG` path must exist. Candidates are optional;
    /// when none exist the defaults are returned with `source: None`.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedHarnessConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found, using built-in defaults");
        Ok(LoadedHarnessConfig {
            config: Self::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<HarnessConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fully-qualified name the server answers to.
    pub fn server_fqdn(&self) -> String {
        self.targets.fqdn(&self.targets.server)
    }

    pub fn client_fqdn(&self) -> String {
        self.targets.fqdn(&self.targets.client)
    }

    /// Host alias the database checks run against for the configured mode.
    pub fn database_host(&self) -> &str {
        match self.deployment.database_mode {
            DatabaseMode::Internal => &self.targets.server,
            DatabaseMode::External => &self.targets.database,
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("targets.server", &self.targets.server),
            ("targets.client", &self.targets.client),
            ("targets.database", &self.targets.database),
            ("targets.domain", &self.targets.domain),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{} must not be empty", field));
            }
        }
        if let Some(user) = &self.deployment.user {
            if user.trim().is_empty() {
                return Err(anyhow!(
                    "deployment.user must name an account, or be \"\" for rootful mode"
                ));
            }
        }
        if self.api.poll_interval.is_zero() {
            return Err(anyhow!("api.poll_interval must be at least one second"));
        }
        self.kafka.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for HarnessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HarnessConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Remote hosts and the SSH configuration used to reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// SSH client configuration with a resolved entry per host alias.
    #[serde(default = "default_ssh_config")]
    pub ssh_config: PathBuf,
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_client")]
    pub client: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl TargetsConfig {
    pub fn fqdn(&self, alias: &str) -> String {
        format!("{}.{}", alias, self.domain)
    }
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            ssh_config: default_ssh_config(),
            server: default_server(),
            client: default_client(),
            database: default_database(),
            domain: default_domain(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Account owning the rootless quadlets. `None` means a rootful
    /// deployment, written as `user = ""` in the file.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default = "default_user")]
    pub user: Option<String>,
    #[serde(default)]
    pub database_mode: DatabaseMode,
    #[serde(default)]
    pub certificate_source: CertificateSource,
    /// Directory holding the `<source>_certificates.yml` templates.
    #[serde(default = "default_vars_dir")]
    pub vars_dir: PathBuf,
    #[serde(default)]
    pub images: ImagesConfig,
}

impl DeploymentConfig {
    pub fn is_rootless(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            database_mode: DatabaseMode::default(),
            certificate_source: CertificateSource::default(),
            vars_dir: default_vars_dir(),
            images: ImagesConfig::default(),
        }
    }
}

/// Container images used to issue probes from inside the deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub ingress: String,
    pub host_inventory: String,
    pub host_inventory_release: String,
    pub advisor_backend: String,
    /// General purpose image for network backend checks.
    pub network_test: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            ingress: "quay.io/iop/ingress:latest".to_owned(),
            host_inventory: "quay.io/iop/host-inventory:latest".to_owned(),
            host_inventory_release: "quay.io/iop/host-inventory:foreman-3.18".to_owned(),
            advisor_backend: "quay.io/iop/advisor-backend:foreman-3.18".to_owned(),
            network_test: "quay.io/centos/centos:stream9".to_owned(),
        }
    }
}

/// Management API credentials and task polling behaviour.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_username")]
    pub username: String,
    #[serde(default = "default_api_password")]
    pub password: String,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(default = "default_task_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub task_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            username: default_api_username(),
            password: default_api_password(),
            verify_tls: false,
            poll_interval: default_poll_interval(),
            task_timeout: default_task_timeout(),
        }
    }
}

/// Named Kafka topic sets expected on the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Profiles checked during a run.
    #[serde(default = "default_enabled_profiles")]
    pub enabled_profiles: Vec<String>,
    /// Additional or overriding profiles keyed by name.
    #[serde(default)]
    pub profiles: IndexMap<String, Vec<String>>,
}

impl KafkaConfig {
    /// Resolve a profile, preferring user definitions over built-ins.
    pub fn profile(&self, name: &str) -> Option<Vec<String>> {
        if let Some(topics) = self.profiles.get(name) {
            return Some(topics.clone());
        }
        BUILTIN_TOPIC_PROFILES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, topics)| topics.iter().map(|t| (*t).to_owned()).collect())
    }

    /// Enabled profiles paired with their topic lists, in configured order.
    pub fn enabled(&self) -> Vec<(String, Vec<String>)> {
        self.enabled_profiles
            .iter()
            .filter_map(|name| self.profile(name).map(|topics| (name.clone(), topics)))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        for name in &self.enabled_profiles {
            match self.profile(name) {
                None => return Err(anyhow!("unknown kafka topic profile '{}'", name)),
                Some(topics) if topics.is_empty() => {
                    return Err(anyhow!("kafka topic profile '{}' lists no topics", name))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            enabled_profiles: default_enabled_profiles(),
            profiles: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    /// Console format; the per-run file is always JSON.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Filter used when neither `IOP_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file name prefix; defaults to the binary name.
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            level: default_log_level(),
            file_prefix: None,
        }
    }
}

/// Where the certificate templates come from.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CertificateSource {
    #[default]
    Default,
    Installer,
}

impl CertificateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateSource::Default => "default",
            CertificateSource::Installer => "installer",
        }
    }

    /// File name of the vars template for this source.
    pub fn template_name(&self) -> String {
        format!("{}_certificates.yml", self.as_str())
    }
}

impl fmt::Display for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertificateSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(CertificateSource::Default),
            "installer" => Ok(CertificateSource::Installer),
            other => Err(format!("unknown certificate source: {}", other)),
        }
    }
}

/// Whether the database runs inside the deployment or on a separate host.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseMode {
    #[default]
    Internal,
    External,
}

impl DatabaseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseMode::Internal => "internal",
            DatabaseMode::External => "external",
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, DatabaseMode::External)
    }
}

impl fmt::Display for DatabaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatabaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" => Ok(DatabaseMode::Internal),
            "external" => Ok(DatabaseMode::External),
            other => Err(format!("unknown database mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = HarnessConfig::default();
        assert_eq!(config.server_fqdn(), "quadlet.example.com");
        assert_eq!(config.client_fqdn(), "client.example.com");
        assert_eq!(config.targets.ssh_config, PathBuf::from("./.tmp/ssh-config"));
        assert_eq!(config.deployment.user.as_deref(), Some("foremanctl"));
        assert_eq!(config.deployment.certificate_source, CertificateSource::Default);
        assert_eq!(config.deployment.database_mode, DatabaseMode::Internal);
        assert!(!config.api.verify_tls);
        config.validate().expect("defaults validate");
    }

    #[test]
    fn database_host_follows_mode() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.database_host(), "quadlet");
        config.deployment.database_mode = DatabaseMode::External;
        assert_eq!(config.database_host(), "database");
    }

    #[test]
    fn parses_partial_toml() {
        let config: HarnessConfig = r#"
            [targets]
            server = "iop"
            ssh_config = "/tmp/cfg"

            [deployment]
            database_mode = "external"
            certificate_source = "installer"

            [api]
            poll_interval = 1
        "#
        .parse()
        .expect("config parses");
        assert_eq!(config.server_fqdn(), "iop.example.com");
        assert_eq!(config.deployment.database_mode, DatabaseMode::External);
        assert_eq!(config.deployment.certificate_source, CertificateSource::Installer);
        assert_eq!(config.api.poll_interval, Duration::from_secs(1));
        assert_eq!(config.api.username, "admin");
    }

    #[test]
    fn rejects_unknown_topic_profile() {
        let err = r#"
            [kafka]
            enabled_profiles = ["platform", "nope"]
        "#
        .parse::<HarnessConfig>()
        .expect_err("unknown profile rejected");
        assert!(format!("{err:#}").contains("unknown kafka topic profile 'nope'"));
    }

    #[test]
    fn user_profiles_override_builtins() {
        let mut kafka = KafkaConfig::default();
        kafka
            .profiles
            .insert("platform".into(), vec!["platform.inventory.events".into()]);
        let enabled = kafka.enabled();
        assert_eq!(enabled[0].1, vec!["platform.inventory.events".to_owned()]);
        assert_eq!(enabled[1].0, "vulnerability");
    }

    #[test]
    fn builtin_profiles_are_disjoint() {
        let platform = KafkaConfig::default().profile("platform").unwrap();
        let vulnerability = KafkaConfig::default().profile("vulnerability").unwrap();
        assert!(platform.iter().all(|topic| !vulnerability.contains(topic)));
        assert!(platform.contains(&"platform.inventory.events".to_owned()));
    }

    #[test]
    fn option_enums_parse_case_insensitively() {
        assert_eq!("Installer".parse::<CertificateSource>(), Ok(CertificateSource::Installer));
        assert_eq!("EXTERNAL".parse::<DatabaseMode>(), Ok(DatabaseMode::External));
        assert!("sideways".parse::<DatabaseMode>().is_err());
        assert_eq!(CertificateSource::Installer.template_name(), "installer_certificates.yml");
    }

    #[test]
    fn blank_user_is_rejected() {
        let mut config = HarnessConfig::default();
        config.deployment.user = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_user_in_file_selects_rootful() {
        let omitted: HarnessConfig = "[deployment]\ndatabase_mode = \"internal\"\n"
            .parse()
            .expect("omitted user parses");
        assert_eq!(omitted.deployment.user.as_deref(), Some("foremanctl"));
        assert!(omitted.deployment.is_rootless());

        let rootful: HarnessConfig = "[deployment]\nuser = \"\"\n"
            .parse()
            .expect("empty user parses");
        assert_eq!(rootful.deployment.user, None);
        assert!(!rootful.deployment.is_rootless());

        let named: HarnessConfig = "[deployment]\nuser = \"iop\"\n".parse().expect("named user");
        assert_eq!(named.deployment.user.as_deref(), Some("iop"));

        let written = toml::to_string(&rootful.deployment).expect("serialize");
        assert!(written.contains("user = \"\""), "{written}");
    }
}
