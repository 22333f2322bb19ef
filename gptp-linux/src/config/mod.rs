//! TOML configuration loading, following `statime-linux::config::Config`'s
//! shape: one top-level struct with `#[serde(deny_unknown_fields)]`, custom
//! deserializers for hex clock identities, and `From` impls that turn the
//! parsed config into the plain `gptp_core::config` structs the orchestrator
//! takes.

use std::fs::read_to_string;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gptp_core::config::{DomainConfig as CoreDomainConfig, InstanceConfig, PortConfig as CorePortConfig};
use gptp_core::datastructures::common::{ClockAccuracy, ClockClass, ClockIdentity, ClockQuality, OffsetScaledLogVariance};
use gptp_core::time::Duration;
use log::warn;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub loglevel: LogLevel,
    #[serde(default, deserialize_with = "deserialize_clock_identity")]
    pub identity: Option<ClockIdentity>,
    #[serde(default = "default_max_ports")]
    pub max_ports: u16,
    #[serde(default = "default_max_domains")]
    pub max_domains: u8,
    #[serde(default = "default_priority1")]
    pub priority1: u8,
    #[serde(default = "default_priority2")]
    pub priority2: u8,
    #[serde(default)]
    pub clock_class: u8,
    #[serde(default = "default_clock_accuracy")]
    pub clock_accuracy: u8,
    #[serde(default)]
    pub cmlds_mode: bool,
    #[serde(default)]
    pub external_port_configuration: bool,
    #[serde(default = "default_true")]
    pub active_domain_auto_switch: bool,
    #[serde(rename = "domain", default = "default_domains")]
    pub domains: Vec<DomainConfig>,
    #[serde(rename = "port")]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub shared_memory: SharedMemoryConfig,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DomainConfig {
    pub domain_number: u8,
    pub priority1: Option<u8>,
    pub priority2: Option<u8>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PortConfig {
    pub interface: String,
    #[serde(default = "default_log_announce_interval")]
    pub log_announce_interval: i8,
    #[serde(default = "default_announce_receipt_timeout")]
    pub announce_receipt_timeout: u8,
    #[serde(default = "default_log_sync_interval")]
    pub log_sync_interval: i8,
    #[serde(default = "default_log_pdelay_req_interval")]
    pub log_pdelay_req_interval: i8,
    #[serde(default)]
    pub master_only: bool,
    #[serde(default)]
    pub delay_asymmetry: i64,
    #[serde(default = "default_neighbor_prop_delay_thresh")]
    pub neighbor_prop_delay_thresh: i64,
    #[serde(default = "default_allowed_lost_responses")]
    pub allowed_lost_responses: u8,
    #[serde(default = "default_allowed_faults")]
    pub allowed_faults: u8,
    #[serde(default)]
    pub hardware_clock: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IpcConfig {
    #[serde(default = "default_ipc_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_ipc_permissions")]
    pub permissions: u32,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: default_ipc_path(),
            permissions: default_ipc_permissions(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SharedMemoryConfig {
    #[serde(default = "default_shm_name")]
    pub name: String,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self { name: default_shm_name() }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

fn deserialize_clock_identity<'de, D>(deserializer: D) -> Result<Option<ClockIdentity>, D::Error>
where
    D: Deserializer<'de>,
{
    use hex::FromHex;
    use serde::de::Error;

    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    Ok(Some(ClockIdentity(<[u8; 8]>::from_hex(raw).map_err(|e| {
        D::Error::custom(format!("invalid clock identity: {e}"))
    })?)))
}

fn default_max_ports() -> u16 {
    gptp_core::config::DEFAULT_MAX_PORTS
}

fn default_max_domains() -> u8 {
    gptp_core::config::DEFAULT_MAX_DOMAINS
}

fn default_priority1() -> u8 {
    248
}

fn default_priority2() -> u8 {
    248
}

fn default_clock_accuracy() -> u8 {
    ClockAccuracy::UNKNOWN.0
}

fn default_true() -> bool {
    true
}

fn default_domains() -> Vec<DomainConfig> {
    vec![DomainConfig { domain_number: 0, priority1: None, priority2: None }]
}

fn default_log_announce_interval() -> i8 {
    gptp_core::config::DEFAULT_LOG_ANNOUNCE_INTERVAL
}

fn default_announce_receipt_timeout() -> u8 {
    gptp_core::config::DEFAULT_ANNOUNCE_RECEIPT_TIMEOUT
}

fn default_log_sync_interval() -> i8 {
    gptp_core::config::DEFAULT_LOG_SYNC_INTERVAL
}

fn default_log_pdelay_req_interval() -> i8 {
    gptp_core::config::DEFAULT_LOG_PDELAY_REQ_INTERVAL
}

fn default_neighbor_prop_delay_thresh() -> i64 {
    gptp_core::config::DEFAULT_NEIGHBOR_PROP_DELAY_THRESH.nanos() as i64
}

fn default_allowed_lost_responses() -> u8 {
    gptp_core::config::DEFAULT_ALLOWED_LOST_RESPONSES
}

fn default_allowed_faults() -> u8 {
    gptp_core::config::DEFAULT_ALLOWED_FAULTS
}

fn default_ipc_path() -> PathBuf {
    PathBuf::from("/run/gptpd/gptpd.sock")
}

fn default_ipc_permissions() -> u32 {
    0o666
}

fn default_shm_name() -> String {
    "/gptp_mc_shm0".to_string()
}

impl Config {
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let meta = std::fs::metadata(file).map_err(ConfigError::Io)?;
        if meta.permissions().mode() as libc::mode_t & libc::S_IWOTH != 0 {
            warn!("unrestricted config file permissions: others can write");
        }

        let contents = read_to_string(file).map_err(ConfigError::Io)?;
        let config: Config = toml::de::from_str(&contents).map_err(ConfigError::Toml)?;
        config.warn_when_unreasonable();
        Ok(config)
    }

    pub fn warn_when_unreasonable(&self) {
        if self.ports.is_empty() {
            warn!("no ports configured");
        }
        if self.ports.len() > self.max_ports as usize {
            warn!("more ports configured than max-ports allows");
        }
        if self.domains.len() > self.max_domains as usize {
            warn!("more domains configured than max-domains allows");
        }
    }

    pub fn instance_config(&self, resolved_identity: ClockIdentity) -> InstanceConfig {
        InstanceConfig {
            clock_identity: self.identity.unwrap_or(resolved_identity),
            priority1: self.priority1,
            priority2: self.priority2,
            clock_quality: ClockQuality {
                clock_class: ClockClass(self.clock_class),
                clock_accuracy: ClockAccuracy(self.clock_accuracy),
                offset_scaled_log_variance: OffsetScaledLogVariance::DEFAULT,
            },
            max_ports: self.max_ports,
            max_domains: self.max_domains,
            cmlds_mode: self.cmlds_mode,
            external_port_configuration: self.external_port_configuration,
            active_domain_auto_switch: self.active_domain_auto_switch,
        }
    }
}

impl DomainConfig {
    pub fn core_config(&self, instance: &InstanceConfig) -> CoreDomainConfig {
        let mut core = CoreDomainConfig::new(self.domain_number, instance);
        if let Some(p1) = self.priority1 {
            core.priority1 = p1;
        }
        if let Some(p2) = self.priority2 {
            core.priority2 = p2;
        }
        core
    }
}

impl PortConfig {
    pub fn core_config(&self, port_index: u16) -> CorePortConfig {
        let mut core = CorePortConfig::new(port_index);
        core.log_announce_interval = self.log_announce_interval;
        core.announce_receipt_timeout = self.announce_receipt_timeout;
        core.log_sync_interval = self.log_sync_interval;
        core.log_pdelay_req_interval = self.log_pdelay_req_interval;
        core.master_only = self.master_only;
        core.delay_asymmetry = Duration::from_nanos(self.delay_asymmetry as i128);
        core.neighbor_prop_delay_thresh = Duration::from_nanos(self.neighbor_prop_delay_thresh as i128);
        core.allowed_lost_responses = self.allowed_lost_responses;
        core.allowed_faults = self.allowed_faults;
        core
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "io error while reading config: {e}"),
            ConfigError::Toml(e) => write!(f, "config toml parsing error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_documented_defaults() {
        const MINIMAL: &str = r#"
[[port]]
interface = "eth0"
"#;
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.priority1, 248);
        assert_eq!(config.max_ports, gptp_core::config::DEFAULT_MAX_PORTS);
        assert_eq!(config.domains.len(), 1);
        assert_eq!(config.domains[0].domain_number, 0);
        assert!(config.active_domain_auto_switch);
    }

    #[test]
    fn port_interval_overrides_flow_into_core_config() {
        const TOML: &str = r#"
[[port]]
interface = "eth0"
log-sync-interval = -4
master-only = true
"#;
        let config: Config = toml::from_str(TOML).unwrap();
        let core = config.ports[0].core_config(0);
        assert_eq!(core.log_sync_interval, -4);
        assert!(core.master_only);
    }
}
