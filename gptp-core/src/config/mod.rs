//! Plain configuration data consumed by the engine: no `serde`/`toml` here
//! (those live in `gptp-linux`'s config loader, which builds these types),
//! following the teacher's split between `statime::config` (plain data) and
//! `statime-linux::config` (TOML deserialization on top of it).

use crate::datastructures::common::{ClockIdentity, ClockQuality};
use crate::time::Duration;

/// Global engine limits and defaults, corresponding to spec.md §6's
/// top-level configuration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConfig {
    pub clock_identity: ClockIdentity,
    pub priority1: u8,
    pub priority2: u8,
    pub clock_quality: ClockQuality,
    pub max_ports: u16,
    pub max_domains: u8,
    pub cmlds_mode: bool,
    pub external_port_configuration: bool,
    pub active_domain_auto_switch: bool,
}

pub const DEFAULT_MAX_PORTS: u16 = 8;
pub const DEFAULT_MAX_DOMAINS: u8 = 4;

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            clock_identity: ClockIdentity([0; 8]),
            priority1: 248,
            priority2: 248,
            clock_quality: ClockQuality::DEFAULT,
            max_ports: DEFAULT_MAX_PORTS,
            max_domains: DEFAULT_MAX_DOMAINS,
            cmlds_mode: false,
            external_port_configuration: false,
            active_domain_auto_switch: true,
        }
    }
}

/// Per-port configuration (spec.md §6): gPTP always uses peer delay, so
/// unlike the teacher's `DelayMechanism` enum there is no E2E variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub port_index: u16,
    pub log_announce_interval: i8,
    pub announce_receipt_timeout: u8,
    pub log_sync_interval: i8,
    pub log_pdelay_req_interval: i8,
    pub master_only: bool,
    pub delay_asymmetry: Duration,
    pub neighbor_prop_delay_thresh: Duration,
    pub allowed_lost_responses: u8,
    pub allowed_faults: u8,
}

pub const DEFAULT_LOG_ANNOUNCE_INTERVAL: i8 = 1;
pub const DEFAULT_ANNOUNCE_RECEIPT_TIMEOUT: u8 = 3;
pub const DEFAULT_LOG_SYNC_INTERVAL: i8 = -3;
pub const DEFAULT_LOG_PDELAY_REQ_INTERVAL: i8 = 0;
pub const DEFAULT_NEIGHBOR_PROP_DELAY_THRESH: Duration = Duration::from_nanos(800);
pub const DEFAULT_ALLOWED_LOST_RESPONSES: u8 = 9;
pub const DEFAULT_ALLOWED_FAULTS: u8 = 3;

impl PortConfig {
    pub fn new(port_index: u16) -> Self {
        Self {
            port_index,
            log_announce_interval: DEFAULT_LOG_ANNOUNCE_INTERVAL,
            announce_receipt_timeout: DEFAULT_ANNOUNCE_RECEIPT_TIMEOUT,
            log_sync_interval: DEFAULT_LOG_SYNC_INTERVAL,
            log_pdelay_req_interval: DEFAULT_LOG_PDELAY_REQ_INTERVAL,
            master_only: false,
            delay_asymmetry: Duration::ZERO,
            neighbor_prop_delay_thresh: DEFAULT_NEIGHBOR_PROP_DELAY_THRESH,
            allowed_lost_responses: DEFAULT_ALLOWED_LOST_RESPONSES,
            allowed_faults: DEFAULT_ALLOWED_FAULTS,
        }
    }
}

/// Per-domain configuration: domain number plus the subset of
/// [`InstanceConfig`] BMCA fields that can be overridden per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainConfig {
    pub domain_number: u8,
    pub priority1: u8,
    pub priority2: u8,
}

impl DomainConfig {
    pub fn new(domain_number: u8, instance: &InstanceConfig) -> Self {
        Self {
            domain_number,
            priority1: instance.priority1,
            priority2: instance.priority2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_config_inherits_instance_priorities_by_default() {
        let instance = InstanceConfig::default();
        let domain = DomainConfig::new(1, &instance);
        assert_eq!(domain.priority1, instance.priority1);
        assert_eq!(domain.priority2, instance.priority2);
    }

    #[test]
    fn port_config_new_uses_documented_defaults() {
        let port = PortConfig::new(3);
        assert_eq!(port.port_index, 3);
        assert_eq!(port.allowed_lost_responses, DEFAULT_ALLOWED_LOST_RESPONSES);
    }
}
