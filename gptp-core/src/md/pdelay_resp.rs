//! `MDPdelayResp`: the per-port peer-delay responder state machine
//! (IEEE 802.1AS-2020 clause 11.2.14). Mirrors a peer's PdelayReq back with a
//! PdelayResp + PdelayRespFollowUp pair, or (in CMLDS mode) serves every
//! domain multiplexed onto the port from a single non-CMLDS request.

use crate::time::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotEnabled,
    InitialWaitingForPdelayReq,
    WaitingForPdelayReq,
    SentPdelayRespWaitingForTimestamp,
}

#[derive(Debug, Clone, Copy)]
pub enum Event {
    PortEnabled,
    PortDisabled,
    PdelayReqReceived {
        sequence_id: u16,
        requesting_port_identity: crate::datastructures::common::PortIdentity,
        rx_timestamp: Time,
        /// True when this request arrived on the CMLDS major SDO id and
        /// should be mirrored to every domain sharing this port.
        is_cmlds: bool,
    },
    /// Transmit timestamp for the PdelayResp just sent became available.
    ResponseTxTimestamp { t3: Time },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output {
    SendPdelayResp {
        sequence_id: u16,
        requesting_port_identity: crate::datastructures::common::PortIdentity,
        request_receipt_timestamp: Time,
    },
    SendPdelayRespFollowUp {
        sequence_id: u16,
        requesting_port_identity: crate::datastructures::common::PortIdentity,
        response_origin_timestamp: Time,
    },
}

pub struct PdelayRespMachine {
    state: State,
    pending_sequence_id: u16,
    pending_requester: Option<crate::datastructures::common::PortIdentity>,
    /// Latches true the first time a non-CMLDS PdelayReq arrives on a port
    /// otherwise receiving CMLDS requests, so CMLDS mirroring can stop once
    /// a domain-specific exchange has taken over the port.
    received_non_cmlds_pdelay_req: bool,
}

impl PdelayRespMachine {
    pub fn new() -> Self {
        Self {
            state: State::NotEnabled,
            pending_sequence_id: 0,
            pending_requester: None,
            received_non_cmlds_pdelay_req: false,
        }
    }

    pub fn received_non_cmlds_pdelay_req(&self) -> bool {
        self.received_non_cmlds_pdelay_req
    }

    pub fn step(&mut self, event: Event) -> arrayvec::ArrayVec<Output, 2> {
        let mut out = arrayvec::ArrayVec::new();
        match event {
            Event::PortDisabled => {
                self.state = State::NotEnabled;
                self.pending_requester = None;
            }
            Event::PortEnabled => {
                self.state = State::InitialWaitingForPdelayReq;
            }
            Event::PdelayReqReceived {
                sequence_id,
                requesting_port_identity,
                rx_timestamp,
                is_cmlds,
            } => {
                if matches!(self.state, State::NotEnabled) {
                    return out;
                }
                if !is_cmlds {
                    self.received_non_cmlds_pdelay_req = true;
                }
                self.pending_sequence_id = sequence_id;
                self.pending_requester = Some(requesting_port_identity);
                self.state = State::SentPdelayRespWaitingForTimestamp;
                let _ = out.try_push(Output::SendPdelayResp {
                    sequence_id,
                    requesting_port_identity,
                    request_receipt_timestamp: rx_timestamp,
                });
            }
            Event::ResponseTxTimestamp { t3 } => {
                if let (State::SentPdelayRespWaitingForTimestamp, Some(requester)) =
                    (self.state, self.pending_requester)
                {
                    let _ = out.try_push(Output::SendPdelayRespFollowUp {
                        sequence_id: self.pending_sequence_id,
                        requesting_port_identity: requester,
                        response_origin_timestamp: t3,
                    });
                    self.state = State::WaitingForPdelayReq;
                    self.pending_requester = None;
                }
            }
        }
        out
    }
}

impl Default for PdelayRespMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::{ClockIdentity, PortIdentity};

    fn requester() -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: 1,
        }
    }

    #[test]
    fn request_yields_resp_then_follow_up() {
        let mut m = PdelayRespMachine::new();
        m.step(Event::PortEnabled);
        let out = m.step(Event::PdelayReqReceived {
            sequence_id: 5,
            requesting_port_identity: requester(),
            rx_timestamp: Time::from_fixed_nanos(1000),
            is_cmlds: false,
        });
        assert!(matches!(out[0], Output::SendPdelayResp { sequence_id: 5, .. }));

        let out = m.step(Event::ResponseTxTimestamp {
            t3: Time::from_fixed_nanos(2000),
        });
        assert!(matches!(
            out[0],
            Output::SendPdelayRespFollowUp { sequence_id: 5, .. }
        ));
    }

    #[test]
    fn non_cmlds_request_latches_flag() {
        let mut m = PdelayRespMachine::new();
        m.step(Event::PortEnabled);
        assert!(!m.received_non_cmlds_pdelay_req());
        m.step(Event::PdelayReqReceived {
            sequence_id: 1,
            requesting_port_identity: requester(),
            rx_timestamp: Time::from_fixed_nanos(0),
            is_cmlds: false,
        });
        assert!(m.received_non_cmlds_pdelay_req());
    }

    #[test]
    fn disabled_port_ignores_requests() {
        let mut m = PdelayRespMachine::new();
        let out = m.step(Event::PdelayReqReceived {
            sequence_id: 1,
            requesting_port_identity: requester(),
            rx_timestamp: Time::from_fixed_nanos(0),
            is_cmlds: false,
        });
        assert!(out.is_empty());
    }
}
