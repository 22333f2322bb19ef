//! `PortAnnounceInformation`: per-port half of the BMCA (IEEE 802.1AS-2020
//! clause 10.3.9). Tracks whether the Announce information currently held
//! for a port (`portPriorityVector`, `annLeap61` etc.) is fresh, aged out, or
//! has just been superseded by a newly received Announce, and classifies
//! each arriving Announce against the port's own advertised vector.

use crate::datastructures::common::PriorityVector;
use crate::datastructures::messages::PathTrace;
use crate::time::{Duration, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disabled,
    Aged,
    Update,
    Current,
    Receive,
    SuperiorMasterPort,
    RepeatedMasterPort,
    InferiorMasterOrOtherPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoIs {
    Disabled,
    Aged,
    Mine,
    Received,
}

#[derive(Debug, Clone)]
pub struct ReceivedInfo {
    pub priority_vector: PriorityVector,
    pub path_trace: PathTrace,
}

/// The comparison a received Announce's vector undergoes against this
/// port's own advertised vector, per clause 10.3.10's `rcvdInfoIsFromUs`/
/// `updtInfo` dance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    SuperiorMasterInfo,
    RepeatedMasterInfo,
    InferiorMasterInfo,
    InferiorMasterOrOtherInfo,
}

pub struct PortAnnounceInformation {
    state: State,
    info_is: InfoIs,
    port_priority_vector: PriorityVector,
    received: Option<ReceivedInfo>,
    announce_receipt_timeout_deadline: Option<Time>,
    announce_receipt_timeout: Duration,
}

impl PortAnnounceInformation {
    pub fn new(announce_receipt_timeout: Duration) -> Self {
        Self {
            state: State::Disabled,
            info_is: InfoIs::Disabled,
            port_priority_vector: PriorityVector::WORST,
            received: None,
            announce_receipt_timeout_deadline: None,
            announce_receipt_timeout,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn port_priority_vector(&self) -> PriorityVector {
        self.port_priority_vector
    }

    pub fn port_disabled(&mut self) {
        self.state = State::Disabled;
        self.info_is = InfoIs::Disabled;
        self.received = None;
        self.announce_receipt_timeout_deadline = None;
    }

    pub fn port_enabled(&mut self, now: Time) {
        self.state = State::Aged;
        self.info_is = InfoIs::Aged;
        self.port_priority_vector = PriorityVector::WORST;
        self.announce_receipt_timeout_deadline = Some(now + self.announce_receipt_timeout);
    }

    /// Classify an incoming Announce's vector, comparing it against the
    /// vector this port currently holds/advertises (clause 10.3.10).
    pub fn compare(&self, candidate: &PriorityVector) -> Comparison {
        use crate::datastructures::common::VectorComparison::*;
        match candidate.compare(&self.port_priority_vector) {
            Superior => Comparison::SuperiorMasterInfo,
            Same => Comparison::RepeatedMasterInfo,
            Inferior => {
                if candidate.source_port_identity == self.port_priority_vector.source_port_identity {
                    Comparison::InferiorMasterInfo
                } else {
                    Comparison::InferiorMasterOrOtherInfo
                }
            }
        }
    }

    pub fn announce_received(&mut self, now: Time, candidate: PriorityVector, path_trace: PathTrace) {
        self.announce_receipt_timeout_deadline = Some(now + self.announce_receipt_timeout);
        match self.compare(&candidate) {
            Comparison::SuperiorMasterInfo => {
                self.port_priority_vector = candidate;
                self.received = Some(ReceivedInfo {
                    priority_vector: candidate,
                    path_trace,
                });
                self.info_is = InfoIs::Received;
                self.state = State::SuperiorMasterPort;
            }
            Comparison::RepeatedMasterInfo => {
                self.state = State::RepeatedMasterPort;
            }
            Comparison::InferiorMasterInfo | Comparison::InferiorMasterOrOtherInfo => {
                self.state = State::InferiorMasterOrOtherPort;
            }
        }
    }

    /// On each tick, check whether the held Announce info has aged out.
    pub fn timeout_tick(&mut self, now: Time) -> bool {
        if let Some(deadline) = self.announce_receipt_timeout_deadline {
            if now >= deadline && !matches!(self.state, State::Disabled) {
                self.state = State::Aged;
                self.info_is = InfoIs::Aged;
                self.port_priority_vector = PriorityVector::WORST;
                self.received = None;
                return true;
            }
        }
        false
    }

    pub fn received_info(&self) -> Option<&ReceivedInfo> {
        self.received.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::{ClockIdentity, ClockQuality, PortIdentity};

    fn vector(priority_1: u8) -> PriorityVector {
        PriorityVector::for_own_clock(priority_1, ClockQuality::DEFAULT, 128, ClockIdentity([1; 8]), 1)
    }

    fn empty_trace() -> PathTrace {
        PathTrace {
            identities: arrayvec::ArrayVec::new(),
        }
    }

    #[test]
    fn fresh_announce_on_aged_port_is_superior() {
        let mut m = PortAnnounceInformation::new(Duration::from_nanos(3_000_000_000));
        m.port_enabled(Time::from_fixed_nanos(0));
        m.announce_received(Time::from_fixed_nanos(0), vector(100), empty_trace());
        assert_eq!(m.state(), State::SuperiorMasterPort);
    }

    #[test]
    fn timeout_resets_to_worst_vector() {
        let mut m = PortAnnounceInformation::new(Duration::from_nanos(1_000_000_000));
        m.port_enabled(Time::from_fixed_nanos(0));
        m.announce_received(Time::from_fixed_nanos(0), vector(100), empty_trace());
        assert!(m.timeout_tick(Time::from_fixed_nanos(2_000_000_000)));
        assert_eq!(m.port_priority_vector(), PriorityVector::WORST);
    }

    #[test]
    fn inferior_info_from_different_source_is_other() {
        let mut m = PortAnnounceInformation::new(Duration::from_nanos(3_000_000_000));
        m.port_enabled(Time::from_fixed_nanos(0));
        m.announce_received(Time::from_fixed_nanos(0), vector(50), empty_trace());
        let mut other = vector(200);
        other.source_port_identity = PortIdentity {
            clock_identity: ClockIdentity([9; 8]),
            port_number: 1,
        };
        assert_eq!(m.compare(&other), Comparison::InferiorMasterOrOtherInfo);
    }
}
