//! `PortSyncSyncReceive` → `SiteSyncSync` → `PortSyncSyncSend`: relays the
//! `MDSyncReceive` record produced by the domain's selected `Slave` port to
//! every other port's `MDSyncSend` (IEEE 802.1AS-2020 clause 10.2.5,
//! 11.2.17-11.2.18). Runs once per domain per Sync cycle.

use crate::md::{MdSyncReceive, PortSyncSync};
use crate::time::Duration;

/// `PortSyncSyncReceive`: the thin per-port adapter that just forwards a
/// slave port's `MDSyncReceive` into the domain's `SiteSyncSync`, tagging it
/// with the link's measured rate ratio so `SiteSyncSync` doesn't need the
/// port's `md` state.
pub fn port_sync_sync_receive(record: MdSyncReceive, neighbor_rate_ratio: f64) -> PortSyncSync {
    PortSyncSync {
        local_time: record.upstream_tx_time,
        last_gm_phase_change: record.last_gm_phase_change,
        last_gm_freq_change: record.scaled_last_gm_freq_change,
        gm_time_base_indicator: record.gm_time_base_indicator,
        rate_ratio: record.rate_ratio * neighbor_rate_ratio,
        is_grandmaster: false,
        inbound_correction: Duration::ZERO,
    }
}

/// `SiteSyncSync`: holds the most recently received `PortSyncSync` for the
/// domain and hands it to every port's `MDSyncSend`
/// (`PortSyncSyncSend`, clause 10.2.5.4).
pub struct SiteSyncSync {
    latest: Option<(u16, PortSyncSync)>,
}

impl SiteSyncSync {
    pub fn new() -> Self {
        Self { latest: None }
    }

    pub fn receive(&mut self, sequence_id: u16, sync: PortSyncSync) {
        self.latest = Some((sequence_id, sync));
    }

    /// Fan the held `PortSyncSync` out to every port other than the one it
    /// arrived on (or, if this node is the grandmaster, to every port).
    pub fn fan_out(&self, exclude_port: Option<u16>, ports: &[u16]) -> arrayvec::ArrayVec<(u16, u16, PortSyncSync), 8> {
        let mut out = arrayvec::ArrayVec::new();
        let Some((sequence_id, sync)) = self.latest else {
            return out;
        };
        for &port in ports {
            if Some(port) == exclude_port {
                continue;
            }
            let _ = out.try_push((port, sequence_id, sync));
        }
        out
    }
}

impl Default for SiteSyncSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ScaledNs;
    use crate::time::Time;

    fn md_record() -> MdSyncReceive {
        MdSyncReceive {
            sequence_id: 1,
            upstream_tx_time: Time::from_fixed_nanos(1_000_000_000),
            rate_ratio: 1.0,
            gm_time_base_indicator: 1,
            last_gm_phase_change: ScaledNs::from_nanos(0),
            scaled_last_gm_freq_change: 0,
        }
    }

    #[test]
    fn fan_out_excludes_the_receiving_port() {
        let mut sss = SiteSyncSync::new();
        let sync = port_sync_sync_receive(md_record(), 1.0);
        sss.receive(1, sync);
        let out = sss.fan_out(Some(1), &[1, 2, 3]);
        let ports: arrayvec::ArrayVec<u16, 8> = out.iter().map(|(p, _, _)| *p).collect();
        assert_eq!(ports.as_slice(), &[2, 3]);
    }

    #[test]
    fn no_fan_out_before_anything_received() {
        let sss = SiteSyncSync::new();
        assert!(sss.fan_out(None, &[1, 2]).is_empty());
    }
}
