//! C7: the path-delay/rate-ratio and phase-correction filters that turn raw
//! [`crate::domain::clock_slave_sync::ClockSourceSample`]s into the
//! frequency and phase corrections applied to `thisClock` through
//! [`crate::clock::ClockRegistry`].

pub mod phase_correction;
pub mod rate_ratio;

pub use phase_correction::{PhaseCorrection, State as PhaseCorrectionState};
pub use rate_ratio::{RateRatioCandidate, RateRatioFilter};
