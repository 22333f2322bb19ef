//! Per-port media-dependent (MD) state machines (IEEE 802.1AS-2020 clause
//! 11.2): the innermost layer, one instance per physical port, that speaks
//! the actual Sync/FollowUp/Pdelay/Announce/Signaling wire protocol and
//! measures link-level quantities (`neighborPropDelay`, `neighborRateRatio`,
//! `asCapable`). These feed the per-domain machines in [`crate::domain`] and
//! the BMCA machines in [`crate::bmc`], and are driven by the orchestrator's
//! event loop rather than by each other directly.

pub mod announce;
pub mod pdelay_req;
pub mod pdelay_resp;
pub mod signaling;
pub mod sync_receive;
pub mod sync_send;

pub use announce::{AnnounceReceive, AnnounceSend};
pub use pdelay_req::PdelayReqMachine;
pub use pdelay_resp::PdelayRespMachine;
pub use sync_receive::{MdSyncReceive, SyncReceiveMachine};
pub use sync_send::{PortSyncSync, SyncSendMachine};
