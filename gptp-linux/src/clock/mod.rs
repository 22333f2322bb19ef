//! [`gptp_core::clock::Clock`] glue over real Linux clock sources, using the
//! `clock-steering` crate (the same PHC/adjtimex steering layer
//! `statime-linux` builds on) instead of hand-rolled `ioctl`s.

use clock_steering::unix::UnixClock;
use clock_steering::{Clock as SteeringClock, TimeOffset, Timestamp};
use gptp_core::clock::Clock;
use gptp_core::time::{Duration, Time};

/// A PHC (`/dev/ptp*`) or the system clock, steered through
/// `clock-steering`'s `step_clock`/`set_frequency` primitives.
pub struct LinuxClock {
    inner: UnixClock,
}

impl LinuxClock {
    pub fn open(path: &str) -> std::io::Result<Self> {
        Ok(Self { inner: UnixClock::open(path)? })
    }

    pub fn system() -> std::io::Result<Self> {
        Ok(Self { inner: UnixClock::CLOCK_REALTIME })
    }
}

fn timestamp_to_time(ts: Timestamp) -> Time {
    Time::from_fixed_nanos(ts.seconds as i128 * 1_000_000_000 + ts.nanos as i128)
}

fn time_to_offset(delta: Duration) -> TimeOffset {
    let nanos = delta.nanos();
    TimeOffset {
        seconds: (nanos / 1_000_000_000) as i64,
        nanos: (nanos % 1_000_000_000) as u32,
    }
}

impl Clock for LinuxClock {
    type Error = clock_steering::unix::Error;

    fn get_ts64(&self) -> Result<Time, Self::Error> {
        Ok(timestamp_to_time(self.inner.now()?))
    }

    fn set_ts64(&mut self, time: Time) -> Result<(), Self::Error> {
        let current = timestamp_to_time(self.inner.now()?);
        self.inner.step_clock(time_to_offset(time - current)).map(|_| ())
    }

    fn set_adj(&mut self, adj_ppb: f64) -> Result<(), Self::Error> {
        self.inner.set_frequency(adj_ppb / 1000.0).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_to_offset_splits_seconds_and_nanos() {
        let delta = Duration::from_nanos(1_500_000_000);
        let offset = time_to_offset(delta);
        assert_eq!(offset.seconds, 1);
        assert_eq!(offset.nanos, 500_000_000);
    }
}
