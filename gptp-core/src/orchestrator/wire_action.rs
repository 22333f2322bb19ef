//! The outbound side of a dispatch pass, collected while every port's and
//! domain's state machines are stepped and only turned into wire traffic
//! once those `iter_mut()` passes have ended (`Orchestrator::perform_actions`).

use crate::datastructures::common::{PortIdentity, ScaledNs};
use crate::time::{Duration, Time};

/// One piece of outbound traffic a state machine asked for. Built up during
/// `handle_event`, consumed afterwards so that no send ever races a live
/// mutable borrow over `ports`/`domains`.
#[derive(Debug, Clone, Copy)]
pub enum WireAction {
    PdelayReq {
        port_index: u16,
        sequence_id: u16,
    },
    PdelayResp {
        port_index: u16,
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        request_receipt_timestamp: Time,
    },
    PdelayRespFollowUp {
        port_index: u16,
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        response_origin_timestamp: Time,
    },
    Sync {
        port_index: u16,
        domain_number: u8,
        sequence_id: u16,
    },
    OneStepSync {
        port_index: u16,
        domain_number: u8,
        sequence_id: u16,
        correction_field: Duration,
    },
    FollowUp {
        port_index: u16,
        domain_number: u8,
        sequence_id: u16,
        precise_origin_timestamp: Time,
        correction_field: Duration,
        rate_ratio: f64,
        gm_time_base_indicator: u16,
        last_gm_phase_change: ScaledNs,
        last_gm_freq_change: i32,
    },
    Announce {
        port_index: u16,
        domain_number: u8,
    },
    GptpCapable {
        port_index: u16,
    },
}
