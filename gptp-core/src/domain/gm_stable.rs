//! `GmStable`: per domain, tracks whether the grandmaster has held its
//! identity long enough to be trusted for active-domain selection (IEEE
//! 802.1AS-2020 clause 10.2.10, this engine's C1 consumer).

use crate::time::{Duration, Time};

pub const INITIAL_GM_STABLE_TIME: Duration = Duration::from_nanos(1_000_000_000);
pub const NORMAL_GM_STABLE_TIME: Duration = Duration::from_nanos(10_000_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    GmLost,
    GmUnstable,
    GmStable,
}

pub struct GmStable {
    state: State,
    stable_deadline: Option<Time>,
    ever_stabilized: bool,
}

impl GmStable {
    pub fn new() -> Self {
        Self {
            state: State::GmLost,
            stable_deadline: None,
            ever_stabilized: false,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self.state, State::GmStable)
    }

    /// Call whenever `PortStateSelection` reports `gm_changed` for this
    /// domain: GM_STABLE -> GM_LOST -> GM_UNSTABLE -> (wait) -> GM_STABLE.
    pub fn gm_changed(&mut self, now: Time) {
        self.state = State::GmUnstable;
        let wait = if self.ever_stabilized {
            NORMAL_GM_STABLE_TIME
        } else {
            INITIAL_GM_STABLE_TIME
        };
        self.stable_deadline = Some(now + wait);
    }

    pub fn tick(&mut self, now: Time) {
        if let (State::GmUnstable, Some(deadline)) = (self.state, self.stable_deadline) {
            if now >= deadline {
                self.state = State::GmStable;
                self.ever_stabilized = true;
                self.stable_deadline = None;
            }
        }
    }
}

impl Default for GmStable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_stabilization_uses_initial_time() {
        let mut m = GmStable::new();
        m.gm_changed(Time::from_fixed_nanos(0));
        m.tick(Time::from_fixed_nanos(999_999_999));
        assert!(!m.is_stable());
        m.tick(Time::from_fixed_nanos(1_000_000_000));
        assert!(m.is_stable());
    }

    #[test]
    fn subsequent_stabilization_uses_normal_time() {
        let mut m = GmStable::new();
        m.gm_changed(Time::from_fixed_nanos(0));
        m.tick(Time::from_fixed_nanos(1_000_000_000));
        assert!(m.is_stable());
        m.gm_changed(Time::from_fixed_nanos(1_000_000_000));
        m.tick(Time::from_fixed_nanos(1_000_000_000 + 9_999_999_999));
        assert!(!m.is_stable());
        m.tick(Time::from_fixed_nanos(1_000_000_000 + 10_000_000_000));
        assert!(m.is_stable());
    }
}
