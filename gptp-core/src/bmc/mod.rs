//! The Best Master Clock Algorithm, split per IEEE 802.1AS-2020 clause 10.3
//! into a per-port half ([`port_announce_information`]) that tracks each
//! port's currently-held Announce information, and a per-domain half
//! ([`port_state_selection`]) that reduces every port's vector into the
//! domain's `selectedState[MAX_PORTS]`. [`announce_transmit`],
//! [`interval_setting`], and [`gptp_capable`] round out the per-port
//! bookkeeping these two halves depend on.

pub mod announce_transmit;
pub mod gptp_capable;
pub mod interval_setting;
pub mod port_announce_information;
pub mod port_state_selection;

pub use announce_transmit::PortAnnounceTransmit;
pub use gptp_capable::{GptpCapableReceive, GptpCapableTransmit};
pub use interval_setting::IntervalSettingMachine;
pub use port_announce_information::PortAnnounceInformation;
pub use port_state_selection::{PortCandidate, PortStateSelection, Selection};
