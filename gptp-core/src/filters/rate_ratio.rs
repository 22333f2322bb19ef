//! Neighbor/grandmaster rate-ratio IIR filter and the frequency-adjustment
//! decision built on top of it (spec's C7, grounded directly in the data
//! model since the teacher's `filters/kalman.rs` implements an unrelated
//! Kalman-filter offset estimator, not this rate-ratio IIR).

use crate::clock::Clock;

pub const FREQ_OFFSET_IIR_ALPHA_START_VALUE: f64 = 2.0;
pub const FREQ_OFFSET_IIR_ALPHA_STABLE_VALUE: f64 = 10.0;
pub const FREQ_OFFSET_STABLE_TRNS: u32 = 3;
pub const FREQ_OFFSET_STABLE_PPB: f64 = 100.0;
pub const FREQ_OFFSET_UNSTABLE_PPB: f64 = 1000.0;
pub const FREQ_OFFSET_UPDATE_MRATE_PPB: f64 = 10.0;
pub const MAX_ADJUST_RATE_ON_CLOCK_PPB: f64 = 1_000_000.0;

/// One raw rate-ratio candidate from a Pdelay (or Sync) exchange pair, plus
/// the two-way timing guards the data model requires before it's trusted.
#[derive(Debug, Clone, Copy)]
pub struct RateRatioCandidate {
    pub raw_ratio: f64,
    /// `t1 - t1'` for the pair this candidate came from.
    pub span_ns: i128,
    /// `|(t2-t2') - (t1-t1')|`.
    pub skew_ns: i128,
}

impl RateRatioCandidate {
    pub fn is_trustworthy(&self) -> bool {
        self.span_ns >= 1_000_000_000 && self.skew_ns.abs() < 100_000_000
    }
}

/// IIR-smoothed rate ratio with the start/stable alpha switching the data
/// model specifies.
pub struct RateRatioFilter {
    mrate: f64,
    consecutive_stable_samples: u32,
    using_stable_alpha: bool,
    gmadjppb: f64,
}

impl RateRatioFilter {
    pub fn new() -> Self {
        Self {
            mrate: 1.0,
            consecutive_stable_samples: 0,
            using_stable_alpha: false,
            gmadjppb: 0.0,
        }
    }

    pub fn mrate(&self) -> f64 {
        self.mrate
    }

    fn ppb(&self) -> f64 {
        (self.mrate - 1.0) * 1.0e9
    }

    fn alpha(&self) -> f64 {
        if self.using_stable_alpha {
            1.0 / FREQ_OFFSET_IIR_ALPHA_STABLE_VALUE
        } else {
            1.0 / FREQ_OFFSET_IIR_ALPHA_START_VALUE
        }
    }

    /// Feed one candidate through the filter. Returns the updated `mrate`.
    pub fn update(&mut self, candidate: RateRatioCandidate) -> f64 {
        if !candidate.is_trustworthy() {
            return self.mrate;
        }
        let alpha = self.alpha();
        self.mrate = alpha * candidate.raw_ratio + (1.0 - alpha) * self.mrate;

        let ppb = self.ppb();
        if ppb.abs() > FREQ_OFFSET_UNSTABLE_PPB {
            self.using_stable_alpha = false;
            self.consecutive_stable_samples = 0;
        } else if ppb.abs() < FREQ_OFFSET_STABLE_PPB {
            self.consecutive_stable_samples += 1;
            if self.consecutive_stable_samples >= FREQ_OFFSET_STABLE_TRNS {
                self.using_stable_alpha = true;
            }
        } else {
            self.consecutive_stable_samples = 0;
        }
        self.mrate
    }

    /// The adjustment decision, usable whether the caller holds a raw
    /// [`Clock`] or only a [`crate::clock::ClockRegistry`] handle: `Some`
    /// when the accumulated drift crosses the update threshold, already
    /// clamped to the maximum adjust rate, with `mrate` reset to absorb it.
    pub fn take_adjustment(&mut self) -> Option<f64> {
        let ppb = self.ppb();
        if ppb.abs() <= FREQ_OFFSET_UPDATE_MRATE_PPB {
            return None;
        }
        self.gmadjppb = (self.gmadjppb + ppb).clamp(-MAX_ADJUST_RATE_ON_CLOCK_PPB, MAX_ADJUST_RATE_ON_CLOCK_PPB);
        self.mrate = 1.0;
        Some(self.gmadjppb)
    }

    /// Apply the frequency adjustment directly to a clock when the caller
    /// holds one (tests, or a single-clock harness).
    pub fn maybe_adjust_clock<C: Clock>(&mut self, clock: &mut C) -> Result<bool, C::Error> {
        match self.take_adjustment() {
            Some(ppb) => {
                clock.set_adj(ppb)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for RateRatioFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(ratio: f64) -> RateRatioCandidate {
        RateRatioCandidate {
            raw_ratio: ratio,
            span_ns: 2_000_000_000,
            skew_ns: 0,
        }
    }

    #[test]
    fn untrustworthy_candidate_is_ignored() {
        let mut f = RateRatioFilter::new();
        let c = RateRatioCandidate {
            raw_ratio: 2.0,
            span_ns: 100_000_000,
            skew_ns: 0,
        };
        assert_eq!(f.update(c), 1.0);
    }

    #[test]
    fn alpha_switches_to_stable_after_consecutive_in_band_samples() {
        let mut f = RateRatioFilter::new();
        for _ in 0..5 {
            f.update(candidate(1.00000002));
        }
        assert!(f.using_stable_alpha);
    }

    #[test]
    fn large_excursion_reverts_to_start_alpha() {
        let mut f = RateRatioFilter::new();
        for _ in 0..5 {
            f.update(candidate(1.00000002));
        }
        assert!(f.using_stable_alpha);
        f.update(candidate(1.000002));
        assert!(!f.using_stable_alpha);
    }
}
