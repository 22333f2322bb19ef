//! `MDSyncSend`: emits Sync/FollowUp (or one-step Sync) toward a port's peer
//! from a `PortSyncSync` handed down by the per-domain `SiteSyncSync`
//! (IEEE 802.1AS-2020 clause 11.2.17).

use crate::time::{Duration, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initializing,
    SendSyncTwoStep,
    SendFollowUp,
    SendSyncOneStep,
    SetCorrectionField,
}

#[derive(Debug, Clone, Copy)]
pub struct PortSyncSync {
    pub local_time: Time,
    pub last_gm_phase_change: crate::datastructures::common::ScaledNs,
    pub last_gm_freq_change: i32,
    pub gm_time_base_indicator: u16,
    pub rate_ratio: f64,
    /// Whether this system is itself the grandmaster on this domain (no
    /// upstream residence/link delay to fold into the correction field).
    pub is_grandmaster: bool,
    /// Accumulated correction so far when relaying (residence time at this
    /// node plus the upstream link's `neighborPropDelay`); zero at the GM.
    pub inbound_correction: Duration,
}

#[derive(Debug, Clone, Copy)]
pub enum Event {
    PortEnabled { one_step: bool },
    PortDisabled,
    SyncSend { sequence_id: u16, sync: PortSyncSync },
    /// Hardware transmit timestamp for the two-step Sync just sent.
    SyncTxTimestamp { t1: Time },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output {
    SendSync { sequence_id: u16 },
    SendOneStepSync { sequence_id: u16, correction_field: Duration },
    SendFollowUp {
        sequence_id: u16,
        precise_origin_timestamp: Time,
        correction_field: Duration,
        rate_ratio: f64,
        gm_time_base_indicator: u16,
        last_gm_phase_change: crate::datastructures::common::ScaledNs,
        last_gm_freq_change: i32,
    },
}

pub struct SyncSendMachine {
    state: State,
    one_step: bool,
    pending: Option<(u16, PortSyncSync)>,
}

impl SyncSendMachine {
    pub fn new() -> Self {
        Self {
            state: State::Initializing,
            one_step: false,
            pending: None,
        }
    }

    pub fn step(&mut self, event: Event) -> arrayvec::ArrayVec<Output, 2> {
        let mut out = arrayvec::ArrayVec::new();
        match event {
            Event::PortDisabled => {
                self.state = State::Initializing;
                self.pending = None;
            }
            Event::PortEnabled { one_step } => {
                self.one_step = one_step;
                self.state = if one_step {
                    State::SendSyncOneStep
                } else {
                    State::SendSyncTwoStep
                };
            }
            Event::SyncSend { sequence_id, sync } => {
                self.pending = Some((sequence_id, sync));
                if self.one_step {
                    let correction_field = sync.inbound_correction;
                    let _ = out.try_push(Output::SendOneStepSync {
                        sequence_id,
                        correction_field,
                    });
                    self.state = State::SendSyncOneStep;
                } else {
                    let _ = out.try_push(Output::SendSync { sequence_id });
                    self.state = State::SetCorrectionField;
                }
            }
            Event::SyncTxTimestamp { t1 } => {
                if let (State::SetCorrectionField, Some((sequence_id, sync))) =
                    (self.state, self.pending)
                {
                    // Grandmaster relay: correctionField folds in this
                    // hop's residence time (t1 minus the Sync's nominal
                    // send time) plus whatever was inbound already.
                    let residence = if sync.is_grandmaster {
                        Duration::ZERO
                    } else {
                        t1 - sync.local_time
                    };
                    let correction_field = sync.inbound_correction + residence;
                    let _ = out.try_push(Output::SendFollowUp {
                        sequence_id,
                        precise_origin_timestamp: t1,
                        correction_field,
                        rate_ratio: sync.rate_ratio,
                        gm_time_base_indicator: sync.gm_time_base_indicator,
                        last_gm_phase_change: sync.last_gm_phase_change,
                        last_gm_freq_change: sync.last_gm_freq_change,
                    });
                    self.state = State::SendFollowUp;
                    self.pending = None;
                }
            }
        }
        out
    }
}

impl Default for SyncSendMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync(local_time_ns: i128) -> PortSyncSync {
        PortSyncSync {
            local_time: Time::from_fixed_nanos(local_time_ns),
            last_gm_phase_change: crate::datastructures::common::ScaledNs::from_nanos(0),
            last_gm_freq_change: 0,
            gm_time_base_indicator: 1,
            rate_ratio: 1.0,
            is_grandmaster: false,
            inbound_correction: Duration::ZERO,
        }
    }

    #[test]
    fn two_step_relay_folds_residence_time() {
        let mut m = SyncSendMachine::new();
        m.step(Event::PortEnabled { one_step: false });
        let out = m.step(Event::SyncSend {
            sequence_id: 1,
            sync: sync(1_000_000_000),
        });
        assert_eq!(out[0], Output::SendSync { sequence_id: 1 });
        let out = m.step(Event::SyncTxTimestamp {
            t1: Time::from_fixed_nanos(1_000_000_200),
        });
        match out[0] {
            Output::SendFollowUp { correction_field, .. } => {
                assert_eq!(correction_field.nanos(), 200);
            }
            _ => panic!("expected FollowUp"),
        }
    }

    #[test]
    fn grandmaster_has_zero_residence_correction() {
        let mut m = SyncSendMachine::new();
        m.step(Event::PortEnabled { one_step: false });
        let mut gm_sync = sync(1_000_000_000);
        gm_sync.is_grandmaster = true;
        m.step(Event::SyncSend {
            sequence_id: 1,
            sync: gm_sync,
        });
        let out = m.step(Event::SyncTxTimestamp {
            t1: Time::from_fixed_nanos(2_000_000_000),
        });
        match out[0] {
            Output::SendFollowUp { correction_field, .. } => {
                assert_eq!(correction_field.nanos(), 0);
            }
            _ => panic!("expected FollowUp"),
        }
    }

    #[test]
    fn one_step_sends_immediately_with_no_follow_up() {
        let mut m = SyncSendMachine::new();
        m.step(Event::PortEnabled { one_step: true });
        let out = m.step(Event::SyncSend {
            sequence_id: 1,
            sync: sync(0),
        });
        assert!(matches!(out[0], Output::SendOneStepSync { .. }));
        assert_eq!(out.len(), 1);
    }
}
