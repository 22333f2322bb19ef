//! `MDSignalingSend` / `MDSignalingReceive`: carries interval-change requests
//! and gPTP-capable advertisements between peers (IEEE 802.1AS-2020 clause
//! 11.2.21-11.2.22). The interval-setting machines in `bmc` decide *what*
//! to request; this module only frames/unframes the Signaling message.

use crate::datastructures::common::PortIdentity;
use crate::datastructures::messages::{GptpCapableTlv, MessageIntervalRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalingPayload {
    pub target_port_identity: PortIdentity,
    pub message_interval_request: Option<MessageIntervalRequest>,
    pub gptp_capable: Option<GptpCapableTlv>,
}

/// Stateless framer: builds the payload to hand to the network layer.
pub fn build_signaling(
    target_port_identity: PortIdentity,
    message_interval_request: Option<MessageIntervalRequest>,
    gptp_capable: Option<GptpCapableTlv>,
) -> SignalingPayload {
    SignalingPayload {
        target_port_identity,
        message_interval_request,
        gptp_capable,
    }
}

/// `MDSignalingReceive`'s outcome: a received Signaling message directed at
/// this port (or the wildcard port identity) with whichever TLVs it carried,
/// or `Ignored` if addressed elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Received(SignalingPayload),
    Ignored,
}

/// All-ones clock identity / `0xFFFF` port number: "all ports" in a
/// Signaling message's `targetPortIdentity` (IEEE 802.1AS-2020 clause
/// 10.5.5.1).
pub fn is_addressed_to(own_port_identity: PortIdentity, target: PortIdentity) -> bool {
    target == own_port_identity || target.port_number == 0xFFFF
}

pub fn receive(own_port_identity: PortIdentity, payload: SignalingPayload) -> ReceiveOutcome {
    if is_addressed_to(own_port_identity, payload.target_port_identity) {
        ReceiveOutcome::Received(payload)
    } else {
        ReceiveOutcome::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn port(n: u16) -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: n,
        }
    }

    #[test]
    fn wildcard_target_matches_any_port() {
        assert!(is_addressed_to(port(1), port(0xFFFF)));
    }

    #[test]
    fn mismatched_target_is_ignored() {
        let payload = build_signaling(port(2), None, None);
        assert_eq!(receive(port(1), payload), ReceiveOutcome::Ignored);
    }

    #[test]
    fn matching_target_is_received() {
        let payload = build_signaling(port(1), None, None);
        assert_eq!(receive(port(1), payload), ReceiveOutcome::Received(payload));
    }
}
