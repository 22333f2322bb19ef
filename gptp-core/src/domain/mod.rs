//! Per-domain machines (IEEE 802.1AS-2020 clause 10.2): everything above the
//! per-port `md` layer and below the per-port `bmc` layer that operates once
//! per clock domain rather than once per port — relaying Sync across ports
//! ([`site_sync_sync`]), generating Sync locally when this system is the
//! grandmaster ([`clock_master_sync`]), turning a received Sync into a clock
//! discipline sample ([`clock_slave_sync`]), and tracking grandmaster
//! stability for C1's active-domain selection ([`gm_stable`]).

pub mod clock_master_sync;
pub mod clock_slave_sync;
pub mod gm_stable;
pub mod site_sync_sync;

pub use clock_master_sync::{ClockMasterSyncOffset, ClockMasterSyncReceive, ClockMasterSyncSend};
pub use clock_slave_sync::{ClockSlaveSync, ClockSourceSample};
pub use gm_stable::GmStable;
pub use site_sync_sync::{port_sync_sync_receive, SiteSyncSync};
