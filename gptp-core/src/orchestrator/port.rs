//! Per-port and per-port-domain runtime state: one [`PortRuntime`] per
//! physical network port, holding the `md` machines that don't vary by
//! domain (peer delay is CMLDS/port-level), and one [`PortDomainState`]
//! inside it per domain the port carries traffic for.

use crate::bmc::{GptpCapableReceive, GptpCapableTransmit, IntervalSettingMachine, PortAnnounceInformation};
use crate::config::{DomainConfig, PortConfig};
use crate::md::announce::{AnnounceReceive, AnnounceSend};
use crate::md::pdelay_req::PdelayReqMachine;
use crate::md::pdelay_resp::PdelayRespMachine;
use crate::md::sync_receive::SyncReceiveMachine;
use crate::md::sync_send::SyncSendMachine;
use crate::time::{Duration, Time};

/// `gPTP-capable` periodic advertisement interval (IEEE 802.1AS-2020 clause
/// 10.2.4.6), fixed rather than configurable per port.
fn gptp_capable_interval() -> Duration {
    Duration::from_log_interval(0)
}

/// One domain's slice of a port's protocol state: everything `bmc` and the
/// domain-scoped halves of `md` need per `(port, domain)` pair.
pub struct PortDomainState {
    pub domain_number: u8,
    pub announce_info: PortAnnounceInformation,
    pub announce_send: AnnounceSend,
    pub announce_receive: AnnounceReceive,
    pub announce_transmit: crate::bmc::PortAnnounceTransmit,
    pub interval_sync: IntervalSettingMachine,
    pub interval_announce: IntervalSettingMachine,
    pub sync_receive: SyncReceiveMachine,
    pub sync_send: SyncSendMachine,
    pub announce_sequence: u16,
}

impl PortDomainState {
    pub fn new(domain: DomainConfig, port: PortConfig, this_clock: crate::datastructures::common::ClockIdentity) -> Self {
        let announce_interval = Duration::from_log_interval(port.log_announce_interval);
        let receipt_timeout = announce_interval * port.announce_receipt_timeout as i32;
        Self {
            domain_number: domain.domain_number,
            announce_info: PortAnnounceInformation::new(receipt_timeout),
            announce_send: AnnounceSend::new(this_clock),
            announce_receive: AnnounceReceive::new(this_clock),
            announce_transmit: crate::bmc::PortAnnounceTransmit::new(announce_interval),
            interval_sync: IntervalSettingMachine::new(port.log_sync_interval, !port.master_only),
            interval_announce: IntervalSettingMachine::new(port.log_announce_interval, !port.master_only),
            sync_receive: SyncReceiveMachine::new(),
            sync_send: SyncSendMachine::new(),
            announce_sequence: 0,
        }
    }
}

/// A physical network port. The peer-delay machines and the gPTP-capable
/// advertisement live here rather than in [`PortDomainState`], since the
/// common mean link delay service is shared by every domain multiplexed
/// onto this port.
pub struct PortRuntime {
    pub port_index: u16,
    pub config: PortConfig,
    pub enabled: bool,
    pub pdelay_req: PdelayReqMachine,
    pub pdelay_resp: PdelayRespMachine,
    pub pdelay_deadline: Option<Time>,
    pub interval_pdelay: IntervalSettingMachine,
    pub gptp_capable_tx: GptpCapableTransmit,
    pub gptp_capable_rx: GptpCapableReceive,
    pub gptp_capable_sequence: u16,
    pub domains: arrayvec::ArrayVec<PortDomainState, 4>,
}

impl PortRuntime {
    pub fn new(config: PortConfig) -> Self {
        let pdelay_interval = Duration::from_log_interval(config.log_pdelay_req_interval);
        Self {
            port_index: config.port_index,
            config,
            enabled: false,
            pdelay_req: PdelayReqMachine::new(config.port_index, pdelay_interval, config.neighbor_prop_delay_thresh),
            pdelay_resp: PdelayRespMachine::new(),
            pdelay_deadline: None,
            interval_pdelay: IntervalSettingMachine::new(config.log_pdelay_req_interval, true),
            gptp_capable_tx: GptpCapableTransmit::new(gptp_capable_interval()),
            gptp_capable_rx: GptpCapableReceive::new(Duration::from_log_interval(0) * 3),
            gptp_capable_sequence: 0,
            domains: arrayvec::ArrayVec::new(),
        }
    }

    pub fn domain_mut(&mut self, domain_number: u8) -> Option<&mut PortDomainState> {
        self.domains.iter_mut().find(|d| d.domain_number == domain_number)
    }

    pub fn domain(&self, domain_number: u8) -> Option<&PortDomainState> {
        self.domains.iter().find(|d| d.domain_number == domain_number)
    }
}

/// A clock domain: the BMCA reduction ([`crate::bmc::PortStateSelection`])
/// and the per-domain Sync relay/generation machines
/// ([`crate::domain`]), plus the filters that turn the selected slave
/// port's samples into clock corrections.
pub struct DomainRuntime {
    pub domain_number: u8,
    pub config: DomainConfig,
    pub clock_index: u8,
    pub own_priority_vector: crate::datastructures::common::PriorityVector,
    pub selection: crate::bmc::PortStateSelection,
    pub selected_states: arrayvec::ArrayVec<(u16, crate::PortState), 9>,
    pub current_gm_vector: crate::datastructures::common::PriorityVector,
    pub inherited_path_trace: crate::datastructures::messages::PathTrace,
    pub is_grandmaster: bool,
    pub selected_slave_port: Option<u16>,
    pub site_sync_sync: crate::domain::SiteSyncSync,
    pub clock_master_sync_send: crate::domain::ClockMasterSyncSend,
    pub clock_master_sync_offset: crate::domain::ClockMasterSyncOffset,
    pub clock_master_started: bool,
    pub rate_filter: crate::filters::RateRatioFilter,
    pub phase_filter: crate::filters::PhaseCorrection,
    pub gm_stable: crate::domain::GmStable,
}

impl DomainRuntime {
    pub fn new(
        config: DomainConfig,
        clock_index: u8,
        own_priority_vector: crate::datastructures::common::PriorityVector,
    ) -> Self {
        let sync_interval = Duration::from_log_interval(-3);
        Self {
            domain_number: config.domain_number,
            config,
            clock_index,
            own_priority_vector,
            selection: crate::bmc::PortStateSelection::new(),
            selected_states: arrayvec::ArrayVec::new(),
            current_gm_vector: own_priority_vector,
            inherited_path_trace: crate::datastructures::messages::PathTrace {
                identities: arrayvec::ArrayVec::new(),
            },
            is_grandmaster: false,
            selected_slave_port: None,
            site_sync_sync: crate::domain::SiteSyncSync::new(),
            clock_master_sync_send: crate::domain::ClockMasterSyncSend::new(sync_interval),
            clock_master_sync_offset: crate::domain::ClockMasterSyncOffset::new(),
            clock_master_started: false,
            rate_filter: crate::filters::RateRatioFilter::new(),
            phase_filter: crate::filters::PhaseCorrection::new(),
            gm_stable: crate::domain::GmStable::new(),
        }
    }
}
