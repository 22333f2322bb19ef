//! `ClockMasterSyncSend` / `ClockMasterSyncReceive` / `ClockMasterSyncOffset`:
//! when this system is itself the grandmaster for a domain, these generate
//! the domain's `PortSyncSync` directly from the local clock instead of from
//! a received Sync (IEEE 802.1AS-2020 clause 10.2.7-10.2.9).

use crate::datastructures::common::ScaledNs;
use crate::md::PortSyncSync;
use crate::time::{Duration, Time};

/// `ClockMasterSyncSend`: paces how often the grandmaster manufactures a
/// fresh `PortSyncSync` for `SiteSyncSync` to fan out, at the domain's
/// `syncInterval`.
pub struct ClockMasterSyncSend {
    interval: Duration,
    next_deadline: Option<Time>,
    sequence_id: u16,
}

impl ClockMasterSyncSend {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: None,
            sequence_id: 0,
        }
    }

    pub fn start(&mut self, now: Time) {
        self.next_deadline = Some(now + self.interval);
    }

    pub fn tick(&mut self, now: Time) -> Option<u16> {
        let deadline = self.next_deadline?;
        if now < deadline {
            return None;
        }
        self.next_deadline = Some(now + self.interval);
        self.sequence_id = self.sequence_id.wrapping_add(1);
        Some(self.sequence_id)
    }
}

/// `ClockMasterSyncReceive`: reads the local hardware clock at the moment
/// `ClockMasterSyncSend` fires, producing the `local_time` a grandmaster's
/// `PortSyncSync` carries.
pub struct ClockMasterSyncReceive;

impl ClockMasterSyncReceive {
    pub fn sample(now: Time) -> Time {
        now
    }
}

/// `ClockMasterSyncOffset`: when this system is the grandmaster, there is no
/// upstream offset to absorb — `PortSyncSync.rateRatio` is exactly 1 and
/// `lastGmPhaseChange`/`lastGmFreqChange` describe only administrative
/// clock-source changes (e.g. switching to a new local reference), latched
/// externally. The Open Question about the Passive-port branch of this
/// machine (commented-out external-source derivation) is resolved as a
/// no-op; see the crate's grounding ledger.
pub struct ClockMasterSyncOffset {
    last_gm_phase_change: ScaledNs,
    last_gm_freq_change: i32,
    gm_time_base_indicator: u16,
}

impl ClockMasterSyncOffset {
    pub fn new() -> Self {
        Self {
            last_gm_phase_change: ScaledNs::from_nanos(0),
            last_gm_freq_change: 0,
            gm_time_base_indicator: 1,
        }
    }

    pub fn note_clock_source_change(&mut self, phase_change: ScaledNs, freq_change: i32) {
        self.last_gm_phase_change = phase_change;
        self.last_gm_freq_change = freq_change;
        self.gm_time_base_indicator = self.gm_time_base_indicator.wrapping_add(1);
    }

    pub fn build_port_sync_sync(&self, local_time: Time) -> PortSyncSync {
        PortSyncSync {
            local_time,
            last_gm_phase_change: self.last_gm_phase_change,
            last_gm_freq_change: self.last_gm_freq_change,
            gm_time_base_indicator: self.gm_time_base_indicator,
            rate_ratio: 1.0,
            is_grandmaster: true,
            inbound_correction: Duration::ZERO,
        }
    }
}

impl Default for ClockMasterSyncOffset {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_paces_at_interval() {
        let mut m = ClockMasterSyncSend::new(Duration::from_log_interval(0));
        m.start(Time::from_fixed_nanos(0));
        assert!(m.tick(Time::from_fixed_nanos(500_000_000)).is_none());
        assert_eq!(m.tick(Time::from_fixed_nanos(1_000_000_000)), Some(1));
        assert_eq!(m.tick(Time::from_fixed_nanos(2_000_000_000)), Some(2));
    }

    #[test]
    fn grandmaster_port_sync_sync_has_unit_rate_ratio() {
        let offset = ClockMasterSyncOffset::new();
        let sync = offset.build_port_sync_sync(Time::from_fixed_nanos(0));
        assert_eq!(sync.rate_ratio, 1.0);
        assert!(sync.is_grandmaster);
    }

    #[test]
    fn clock_source_change_increments_time_base_indicator() {
        let mut offset = ClockMasterSyncOffset::new();
        let first = offset.build_port_sync_sync(Time::from_fixed_nanos(0)).gm_time_base_indicator;
        offset.note_clock_source_change(ScaledNs::from_nanos(0), 0);
        let second = offset.build_port_sync_sync(Time::from_fixed_nanos(0)).gm_time_base_indicator;
        assert_eq!(second, first + 1);
    }
}
