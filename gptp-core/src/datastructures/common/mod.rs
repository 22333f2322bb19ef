//! Common data structures that are used throughout the protocol

mod clock_identity;
mod clock_quality;
mod leap_indicator;
mod port_identity;
mod priority_vector;
mod time_source;
mod timestamp;

pub use clock_identity::*;
pub use clock_quality::*;
pub use leap_indicator::*;
pub use port_identity::*;
pub use priority_vector::*;
pub use time_source::*;
pub use timestamp::*;
