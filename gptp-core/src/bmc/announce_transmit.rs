//! `PortAnnounceTransmit`: paces a port's outgoing Announce messages at
//! `announceInterval` (IEEE 802.1AS-2020 clause 10.3.14), 25 ms-aligned to
//! wall time like every other periodic transmission in the engine, with
//! `announceSlowdown` tracking an in-flight interval change so the last
//! message at the old rate isn't mistaken for the first at the new one.

use crate::time::{Duration, Time};

pub struct PortAnnounceTransmit {
    interval: Duration,
    initial_interval: Duration,
    next_deadline: Option<Time>,
    /// Set while a `SET_INTERVAL` request is moving this port to a slower
    /// cadence: one more Announce is sent at the old interval before the new
    /// one takes effect, matching a real transmitter's in-flight message.
    announce_slowdown: bool,
    old_interval: Duration,
}

impl PortAnnounceTransmit {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            interval: initial_interval,
            initial_interval,
            next_deadline: None,
            announce_slowdown: false,
            old_interval: initial_interval,
        }
    }

    pub fn port_enabled(&mut self, now: Time) {
        self.next_deadline = Some(now + self.interval);
    }

    pub fn port_disabled(&mut self) {
        self.next_deadline = None;
    }

    pub fn set_interval(&mut self, new_interval: Duration) {
        if new_interval > self.interval {
            // Slowing down: finish the already-scheduled faster Announce
            // before adopting the longer interval.
            self.announce_slowdown = true;
            self.old_interval = self.interval;
        }
        self.interval = new_interval;
    }

    pub fn restore_initial_interval(&mut self) {
        self.interval = self.initial_interval;
        self.announce_slowdown = false;
    }

    /// Returns `true` (and reschedules) if an Announce should be sent now.
    pub fn tick(&mut self, now: Time) -> bool {
        let Some(deadline) = self.next_deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        let interval = if self.announce_slowdown {
            self.announce_slowdown = false;
            self.old_interval
        } else {
            self.interval
        };
        self.next_deadline = Some(now + interval);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_send_before_interval_elapses() {
        let mut m = PortAnnounceTransmit::new(Duration::from_log_interval(0));
        m.port_enabled(Time::from_fixed_nanos(0));
        assert!(!m.tick(Time::from_fixed_nanos(500_000_000)));
    }

    #[test]
    fn sends_once_interval_elapses() {
        let mut m = PortAnnounceTransmit::new(Duration::from_log_interval(0));
        m.port_enabled(Time::from_fixed_nanos(0));
        assert!(m.tick(Time::from_fixed_nanos(1_000_000_000)));
    }

    #[test]
    fn slowdown_uses_old_interval_once() {
        let mut m = PortAnnounceTransmit::new(Duration::from_log_interval(0));
        m.port_enabled(Time::from_fixed_nanos(0));
        m.set_interval(Duration::from_log_interval(2));
        assert!(m.tick(Time::from_fixed_nanos(1_000_000_000)));
        // next deadline used old (1s) interval, not the new 4s one
        assert!(!m.tick(Time::from_fixed_nanos(1_500_000_000)));
        assert!(m.tick(Time::from_fixed_nanos(2_000_000_000)));
    }
}
