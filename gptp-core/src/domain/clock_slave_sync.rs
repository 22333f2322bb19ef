//! `ClockSlaveSync`: turns the domain's `SiteSyncSync`-held `PortSyncSync`
//! into the offset/rate-ratio sample C7's filters discipline the local
//! clock from (IEEE 802.1AS-2020 clause 10.2.6). Only runs for the domain's
//! selected `Slave` port.

use crate::md::PortSyncSync;
use crate::time::{Duration, Time};

/// One sample handed to the path-delay/rate estimator (C7) each time the
/// selected Slave port's Sync/FollowUp pair completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSourceSample {
    /// `syncReceiptTime`: the GM's notion of when this Sync was sent,
    /// projected through the relay chain (`PortSyncSync.local_time`).
    pub sync_receipt_time_ns: i128,
    /// `syncReceiptLocalTime`: this node's local clock reading at the
    /// moment the Sync was received, i.e. `local_time` corrected by the
    /// measured neighbor + residence delays already folded into
    /// `PortSyncSync` upstream.
    pub sync_receipt_local_time_ns: i128,
    pub rate_ratio: f64,
    pub gm_time_base_indicator: u16,
}

pub struct ClockSlaveSync;

impl ClockSlaveSync {
    /// `local_rx_time` is this port's own receive timestamp for the Sync
    /// that produced `sync`, i.e. the local clock reading at the same wall
    /// instant `sync.local_time` describes in the GM's time base.
    pub fn sample(sync: PortSyncSync, local_rx_time: Time, neighbor_prop_delay: Duration) -> ClockSourceSample {
        let local_with_delay = local_rx_time - neighbor_prop_delay;
        ClockSourceSample {
            sync_receipt_time_ns: sync.local_time.nanos(),
            sync_receipt_local_time_ns: local_with_delay.nanos(),
            rate_ratio: sync.rate_ratio,
            gm_time_base_indicator: sync.gm_time_base_indicator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ScaledNs;

    fn sync(local_time_ns: i128) -> PortSyncSync {
        PortSyncSync {
            local_time: Time::from_fixed_nanos(local_time_ns),
            last_gm_phase_change: ScaledNs::from_nanos(0),
            last_gm_freq_change: 0,
            gm_time_base_indicator: 1,
            rate_ratio: 1.0,
            is_grandmaster: false,
            inbound_correction: Duration::ZERO,
        }
    }

    #[test]
    fn prop_delay_is_subtracted_from_local_receipt_time() {
        let s = ClockSlaveSync::sample(
            sync(1_000_000_000),
            Time::from_fixed_nanos(1_000_000_500),
            Duration::from_nanos(100),
        );
        assert_eq!(s.sync_receipt_local_time_ns, 1_000_000_400);
        assert_eq!(s.sync_receipt_time_ns, 1_000_000_000);
    }
}
