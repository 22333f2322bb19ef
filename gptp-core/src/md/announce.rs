//! `MDAnnounceSend` / `MDAnnounceReceive`: per-port Announce transmission and
//! reception, including `pathTrace` maintenance (IEEE 802.1AS-2020 clause
//! 10.3.8, 11.2.19-11.2.20).

use crate::datastructures::common::{ClockIdentity, PriorityVector};
use crate::datastructures::messages::PathTrace;

#[derive(Debug, Clone)]
pub struct AnnouncePayload {
    pub priority_vector: PriorityVector,
    pub path_trace: PathTrace,
}

/// Sends the locally selected Announce information out a port. `stepsRemoved`
/// already lives in `priority_vector`; this machine only appends this
/// system's own clock identity to the inherited path trace before handing
/// the payload to the network layer, and truncates/pads per clause
/// 10.3.8 when a downstream AnnounceReceive detects an inconsistent hop
/// count.
pub struct AnnounceSend {
    this_clock: ClockIdentity,
}

impl AnnounceSend {
    pub fn new(this_clock: ClockIdentity) -> Self {
        Self { this_clock }
    }

    /// Build the Announce payload this port should transmit, given the
    /// path trace inherited from the port currently selected `Slave` for
    /// this domain (or empty, if this node is the grandmaster).
    pub fn build(&self, priority_vector: PriorityVector, inherited_path_trace: &PathTrace) -> AnnouncePayload {
        AnnouncePayload {
            priority_vector,
            path_trace: inherited_path_trace.with_one_more_hop(self.this_clock),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A well-formed Announce from a port other than this one's own.
    Accepted,
    /// `path_trace` already contains this system's clock identity: the
    /// Announce looped back around a cycle in the topology.
    SelfLoop,
    /// `stepsRemoved` reached 255: the Announce is inferior to everything
    /// and must not be used to select a master.
    StepsRemovedSaturated,
}

pub struct AnnounceReceive {
    this_clock: ClockIdentity,
}

impl AnnounceReceive {
    pub fn new(this_clock: ClockIdentity) -> Self {
        Self { this_clock }
    }

    pub fn receive(&self, priority_vector: &PriorityVector, path_trace: &PathTrace) -> ReceiveOutcome {
        if path_trace.identities.iter().any(|id| *id == self.this_clock) {
            return ReceiveOutcome::SelfLoop;
        }
        if priority_vector.steps_removed >= 255 {
            return ReceiveOutcome::StepsRemovedSaturated;
        }
        ReceiveOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockQuality;

    fn vector() -> PriorityVector {
        PriorityVector::for_own_clock(
            128,
            ClockQuality::DEFAULT,
            128,
            ClockIdentity([9; 8]),
            1,
        )
    }

    #[test]
    fn self_loop_is_rejected() {
        let id = ClockIdentity([1; 8]);
        let receive = AnnounceReceive::new(id);
        let mut path_trace = PathTrace {
            identities: arrayvec::ArrayVec::new(),
        };
        path_trace = path_trace.with_one_more_hop(id);
        assert_eq!(receive.receive(&vector(), &path_trace), ReceiveOutcome::SelfLoop);
    }

    #[test]
    fn fresh_announce_is_accepted() {
        let receive = AnnounceReceive::new(ClockIdentity([1; 8]));
        let path_trace = PathTrace {
            identities: arrayvec::ArrayVec::new(),
        };
        assert_eq!(receive.receive(&vector(), &path_trace), ReceiveOutcome::Accepted);
    }

    #[test]
    fn send_appends_own_identity_to_inherited_trace() {
        let send = AnnounceSend::new(ClockIdentity([2; 8]));
        let inherited = PathTrace {
            identities: arrayvec::ArrayVec::new(),
        }
        .with_one_more_hop(ClockIdentity([1; 8]));
        let payload = send.build(vector(), &inherited);
        assert_eq!(
            payload.path_trace.identities.as_slice(),
            &[ClockIdentity([1; 8]), ClockIdentity([2; 8])]
        );
    }
}
