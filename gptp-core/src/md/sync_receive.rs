//! `MDSyncReceive`: reassembles a two-step Sync/FollowUp pair into the
//! `MDSyncReceive` record the per-domain machines consume (IEEE 802.1AS-2020
//! clause 11.2.16).

use crate::time::{Duration, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Discard,
    WaitingForFollowUp,
    WaitingForSync,
}

#[derive(Debug, Clone, Copy)]
pub enum Event {
    SyncReceived {
        sequence_id: u16,
        /// Local receive time of the Sync (`upstreamTxTime`'s input).
        rx_timestamp: Time,
    },
    FollowUpReceived {
        sequence_id: u16,
        precise_origin_timestamp: Time,
        correction_field: Duration,
        cumulative_scaled_rate_offset: i32,
        gm_time_base_indicator: u16,
        last_gm_phase_change: crate::datastructures::common::ScaledNs,
        scaled_last_gm_freq_change: i32,
    },
}

/// The record handed to `SiteSyncSync` once a Sync/FollowUp pair has been
/// reassembled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdSyncReceive {
    pub sequence_id: u16,
    /// `preciseOriginTimestamp + correctionField`, corrected for the
    /// neighbor rate ratio between this node and the sender.
    pub upstream_tx_time: Time,
    pub rate_ratio: f64,
    pub gm_time_base_indicator: u16,
    pub last_gm_phase_change: crate::datastructures::common::ScaledNs,
    pub scaled_last_gm_freq_change: i32,
}

pub struct SyncReceiveMachine {
    state: State,
    pending_sequence_id: Option<u16>,
    pending_rx_timestamp: Option<Time>,
    neighbor_rate_ratio: f64,
}

impl SyncReceiveMachine {
    pub fn new() -> Self {
        Self {
            state: State::WaitingForSync,
            pending_sequence_id: None,
            pending_rx_timestamp: None,
            neighbor_rate_ratio: 1.0,
        }
    }

    pub fn set_neighbor_rate_ratio(&mut self, ratio: f64) {
        self.neighbor_rate_ratio = ratio;
    }

    pub fn step(&mut self, event: Event) -> Option<MdSyncReceive> {
        match event {
            Event::SyncReceived {
                sequence_id,
                rx_timestamp,
            } => {
                self.pending_sequence_id = Some(sequence_id);
                self.pending_rx_timestamp = Some(rx_timestamp);
                self.state = State::WaitingForFollowUp;
                None
            }
            Event::FollowUpReceived {
                sequence_id,
                precise_origin_timestamp,
                correction_field,
                cumulative_scaled_rate_offset,
                gm_time_base_indicator,
                last_gm_phase_change,
                scaled_last_gm_freq_change,
            } => {
                let matches = matches!(self.state, State::WaitingForFollowUp)
                    && self.pending_sequence_id == Some(sequence_id);
                self.state = State::WaitingForSync;
                self.pending_sequence_id = None;
                self.pending_rx_timestamp = None;
                if !matches {
                    // FollowUp sequence id doesn't match the pending Sync:
                    // discard, no MDSyncReceive emitted.
                    return None;
                }
                // cumulativeScaledRateOffset is (rateRatio - 1) * 2^41.
                let rate_ratio = 1.0 + (cumulative_scaled_rate_offset as f64 / (1i64 << 41) as f64);
                let upstream_tx_time =
                    precise_origin_timestamp + correction_field.scale(self.neighbor_rate_ratio);
                Some(MdSyncReceive {
                    sequence_id,
                    upstream_tx_time,
                    rate_ratio,
                    gm_time_base_indicator,
                    last_gm_phase_change,
                    scaled_last_gm_freq_change,
                })
            }
        }
    }
}

impl Default for SyncReceiveMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_sequence_id_is_discarded() {
        let mut m = SyncReceiveMachine::new();
        m.step(Event::SyncReceived {
            sequence_id: 1,
            rx_timestamp: Time::from_fixed_nanos(0),
        });
        let out = m.step(Event::FollowUpReceived {
            sequence_id: 2,
            precise_origin_timestamp: Time::from_fixed_nanos(0),
            correction_field: Duration::ZERO,
            cumulative_scaled_rate_offset: 0,
            gm_time_base_indicator: 0,
            last_gm_phase_change: crate::datastructures::common::ScaledNs::from_nanos(0),
            scaled_last_gm_freq_change: 0,
        });
        assert!(out.is_none());
    }

    #[test]
    fn matching_follow_up_emits_record() {
        let mut m = SyncReceiveMachine::new();
        m.step(Event::SyncReceived {
            sequence_id: 7,
            rx_timestamp: Time::from_fixed_nanos(0),
        });
        let out = m
            .step(Event::FollowUpReceived {
                sequence_id: 7,
                precise_origin_timestamp: Time::from_fixed_nanos(1_000_000_000),
                correction_field: Duration::from_nanos(500),
                cumulative_scaled_rate_offset: 0,
                gm_time_base_indicator: 3,
                last_gm_phase_change: crate::datastructures::common::ScaledNs::from_nanos(0),
                scaled_last_gm_freq_change: 0,
            })
            .unwrap();
        assert_eq!(out.sequence_id, 7);
        assert_eq!(out.upstream_tx_time.nanos(), 1_000_000_500);
    }
}
