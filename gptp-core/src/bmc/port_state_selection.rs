//! `PortStateSelection`: per domain, derives the `selectedState[MAX_PORTS]`
//! array from every port's current `portPriorityVector` (IEEE 802.1AS-2020
//! clause 10.3.5/10.3.12, the gPTP specialization of the state decision
//! algorithm that drops `PreMaster`/`Listening`/`Uncalibrated` since gPTP
//! never runs the two-step BMCA handshake ordinary PTP boundary clocks do).
//!
//! Port index 0 is the virtual "clock master port": it is `Slave` exactly
//! when this system is itself the grandmaster (no external port beats our
//! own vector), and `Master` otherwise, mirroring how `thisClock` is fed
//! either by the local oscillator or by the external port actually selected
//! `Slave`.

use crate::datastructures::common::PriorityVector;
use crate::PortState;

#[derive(Debug, Clone, Copy)]
pub struct PortCandidate {
    pub port_index: u16,
    /// `None` when the port has no valid Announce info (disabled, aged, or
    /// never received one).
    pub received_vector: Option<PriorityVector>,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub gm_priority_vector: PriorityVector,
    pub gm_changed: bool,
    /// `(port_index, state)` for port 0 (the clock master port) followed by
    /// every external port, in the order given.
    pub states: arrayvec::ArrayVec<(u16, PortState), 9>,
}

pub struct PortStateSelection {
    last_gm_identity: Option<crate::datastructures::common::ClockIdentity>,
}

impl PortStateSelection {
    pub fn new() -> Self {
        Self {
            last_gm_identity: None,
        }
    }

    pub fn select(&mut self, own_vector: PriorityVector, ports: &[PortCandidate]) -> Selection {
        let mut best = own_vector;
        let mut best_port = None;
        for candidate in ports {
            if let Some(vector) = candidate.received_vector {
                if vector < best {
                    best = vector;
                    best_port = Some(candidate.port_index);
                }
            }
        }

        let gm_changed = self.last_gm_identity != Some(best.root_system_identity.clock_identity);
        self.last_gm_identity = Some(best.root_system_identity.clock_identity);

        let mut states = arrayvec::ArrayVec::new();
        match best_port {
            None => {
                // Our own vector won: we are the grandmaster.
                let _ = states.try_push((0, PortState::Slave));
                for candidate in ports {
                    let state = if candidate.received_vector.is_some() {
                        PortState::Master
                    } else {
                        PortState::Disabled
                    };
                    let _ = states.try_push((candidate.port_index, state));
                }
            }
            Some(slave_port) => {
                let _ = states.try_push((0, PortState::Master));
                for candidate in ports {
                    let state = if candidate.port_index == slave_port {
                        PortState::Slave
                    } else if candidate.received_vector.is_some() {
                        PortState::Passive
                    } else {
                        PortState::Disabled
                    };
                    let _ = states.try_push((candidate.port_index, state));
                }
            }
        }

        Selection {
            gm_priority_vector: best,
            gm_changed,
            states,
        }
    }
}

impl Default for PortStateSelection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::{ClockIdentity, ClockQuality};

    fn vector(priority_1: u8, id: u8) -> PriorityVector {
        PriorityVector::for_own_clock(priority_1, ClockQuality::DEFAULT, 128, ClockIdentity([id; 8]), 1)
    }

    #[test]
    fn no_external_ports_makes_us_grandmaster() {
        let mut sel = PortStateSelection::new();
        let own = vector(100, 1);
        let result = sel.select(own, &[]);
        assert_eq!(result.states[0], (0, PortState::Slave));
    }

    #[test]
    fn superior_external_port_becomes_slave() {
        let mut sel = PortStateSelection::new();
        let own = vector(200, 1);
        let candidates = [PortCandidate {
            port_index: 1,
            received_vector: Some(vector(50, 2)),
        }];
        let result = sel.select(own, &candidates);
        assert_eq!(result.states[0], (0, PortState::Master));
        assert_eq!(result.states[1], (1, PortState::Slave));
    }

    #[test]
    fn non_winning_port_with_info_is_passive() {
        let mut sel = PortStateSelection::new();
        let own = vector(200, 1);
        let candidates = [
            PortCandidate {
                port_index: 1,
                received_vector: Some(vector(50, 2)),
            },
            PortCandidate {
                port_index: 2,
                received_vector: Some(vector(60, 3)),
            },
        ];
        let result = sel.select(own, &candidates);
        assert_eq!(result.states[2], (2, PortState::Passive));
    }

    #[test]
    fn gm_change_detected_across_calls() {
        let mut sel = PortStateSelection::new();
        let own = vector(200, 1);
        let a = [PortCandidate {
            port_index: 1,
            received_vector: Some(vector(50, 2)),
        }];
        let first = sel.select(own, &a);
        assert!(first.gm_changed);
        let second = sel.select(own, &a);
        assert!(!second.gm_changed);
        let b = [PortCandidate {
            port_index: 1,
            received_vector: Some(vector(40, 9)),
        }];
        let third = sel.select(own, &b);
        assert!(third.gm_changed);
    }
}
