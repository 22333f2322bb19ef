//! The four-state phase-correction state machine: NOT_ADJ, START_ADJ,
//! UNSTABLE_ADJ, STABLE_ADJ, turning `dts = mts - lts` samples into
//! `offsetGM` corrections applied via `setOffset64` (spec's C7, grounded
//! directly in the data model).

use crate::clock::Clock;
use crate::time::Duration;

pub const PHASE_NEWGM_CRITERION_NS: i128 = 1_000_000;
pub const PHASE_STABLE_CRITERION_NS: i128 = 10_000;
pub const PHASE_UNSTABLE_CRITERION_NS: i128 = 30_000;
pub const PHASE_OFFSET_ADJUST_BY_FREQ_NS: i128 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotAdj,
    StartAdj,
    UnstableAdj,
    StableAdj,
}

pub struct PhaseCorrection {
    state: State,
    offset_gm: Duration,
    last_gmchange_ind: Option<u32>,
    spike_seen: bool,
}

impl PhaseCorrection {
    pub fn new() -> Self {
        Self {
            state: State::NotAdj,
            offset_gm: Duration::ZERO,
            last_gmchange_ind: None,
            spike_seen: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn alpha(&self) -> f64 {
        match self.state {
            State::StableAdj => 1.0 / 16.0,
            _ => 1.0 / 4.0,
        }
    }

    /// Feed one `dts = mts - lts` sample. `gmchange_ind` lets the machine
    /// distinguish a real discontinuity (new GM) from a spurious spike.
    /// Returns `Some(new_offset)` whenever a correction should be applied
    /// via `setOffset64`; a tiny residual is folded into the frequency
    /// adjustment instead and reported as `None`.
    pub fn sample(&mut self, dts: Duration, gmchange_ind: u32) -> Option<Duration> {
        let gm_changed = self.last_gmchange_ind != Some(gmchange_ind);
        self.last_gmchange_ind = Some(gmchange_ind);

        let delta = (dts - self.offset_gm).abs().nanos();

        if delta >= PHASE_NEWGM_CRITERION_NS && !gm_changed {
            if !self.spike_seen {
                // First occurrence: assume a spike, drop it.
                self.spike_seen = true;
                return None;
            }
            // Repeated: accept it as a real step.
            self.spike_seen = false;
            self.state = State::StartAdj;
        } else {
            self.spike_seen = false;
        }

        let new_offset = match self.state {
            State::NotAdj | State::StartAdj => dts,
            State::UnstableAdj | State::StableAdj => {
                let alpha = self.alpha();
                Duration::from_nanos(
                    (alpha * dts.as_f64_nanos() + (1.0 - alpha) * self.offset_gm.as_f64_nanos()) as i128,
                )
            }
        };

        match self.state {
            State::NotAdj | State::StartAdj => self.state = State::UnstableAdj,
            State::UnstableAdj => {
                if (dts - new_offset).abs().nanos() < PHASE_STABLE_CRITERION_NS {
                    self.state = State::StableAdj;
                }
            }
            State::StableAdj => {
                if (dts - new_offset).abs().nanos() > PHASE_UNSTABLE_CRITERION_NS {
                    self.state = State::UnstableAdj;
                }
            }
        }

        let jump = (new_offset - self.offset_gm).abs().nanos();
        self.offset_gm = new_offset;
        if jump >= PHASE_OFFSET_ADJUST_BY_FREQ_NS {
            Some(new_offset)
        } else {
            None
        }
    }

    pub fn apply_to_clock<C: Clock>(&self, clock: &mut C, new_offset: Duration) -> Result<(), C::Error> {
        let now = clock.get_ts64()?;
        clock.set_ts64(now + new_offset)
    }
}

impl Default for PhaseCorrection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_big_sample_is_treated_as_start_step() {
        let mut m = PhaseCorrection::new();
        let out = m.sample(Duration::from_nanos(2_000_000), 1);
        assert!(out.is_some());
        assert_eq!(m.state(), State::UnstableAdj);
    }

    #[test]
    fn tiny_sample_stays_not_adj_with_no_output() {
        let mut m = PhaseCorrection::new();
        let out = m.sample(Duration::from_nanos(50), 1);
        assert!(out.is_none());
    }

    #[test]
    fn converges_to_stable_with_small_consistent_samples() {
        let mut m = PhaseCorrection::new();
        m.sample(Duration::from_nanos(2_000_000), 1);
        for _ in 0..10 {
            m.sample(Duration::from_nanos(2_000_000), 1);
        }
        assert_eq!(m.state(), State::StableAdj);
    }
}
