//! A read-only underlying clock plus a software phase/frequency correction
//! layered on top, used for `SlaveSub` entities that share hardware with
//! another clock and so cannot be stepped or re-rated directly.

use super::Clock;
use crate::time::{Duration, Time};

#[derive(Debug, Clone, Copy)]
struct Overlay {
    last_sync: Time,
    shift: Duration,
    freq_scale: f64,
}

/// An overlay over a read-only clock, frequency-locked to it: a virtual
/// clock that can be tuned in software without touching the underlying
/// hardware clock.
#[derive(Debug)]
pub struct OverlayClock<C> {
    underlying: C,
    overlay: Overlay,
}

impl<C: Clock> OverlayClock<C> {
    pub fn new(underlying: C) -> Self
    where
        C::Error: core::fmt::Debug,
    {
        let now = underlying.get_ts64().expect("initial clock read");
        Self {
            underlying,
            overlay: Overlay {
                last_sync: now,
                shift: Duration::ZERO,
                freq_scale: 0.0,
            },
        }
    }

    fn time_from_underlying(&self, underlying_time: Time) -> Time {
        let elapsed = underlying_time - self.overlay.last_sync;
        underlying_time + self.overlay.shift + elapsed.scale(self.overlay.freq_scale)
    }

    pub fn underlying(&self) -> &C {
        &self.underlying
    }
}

impl<C: Clock> Clock for OverlayClock<C> {
    type Error = C::Error;

    fn get_ts64(&self) -> Result<Time, Self::Error> {
        self.underlying
            .get_ts64()
            .map(|t| self.time_from_underlying(t))
    }

    fn set_ts64(&mut self, time: Time) -> Result<(), Self::Error> {
        let now_underlying = self.underlying.get_ts64()?;
        self.overlay.last_sync = now_underlying;
        self.overlay.shift = time - now_underlying;
        Ok(())
    }

    fn set_adj(&mut self, adj_ppb: f64) -> Result<(), Self::Error> {
        let now_underlying = self.underlying.get_ts64()?;
        let now_overlay = self.time_from_underlying(now_underlying);
        self.overlay = Overlay {
            last_sync: now_underlying,
            shift: now_overlay - now_underlying,
            freq_scale: adj_ppb / 1_000_000_000.0,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(Time);

    impl Clock for FixedClock {
        type Error = core::convert::Infallible;

        fn get_ts64(&self) -> Result<Time, Self::Error> {
            Ok(self.0)
        }

        fn set_ts64(&mut self, time: Time) -> Result<(), Self::Error> {
            self.0 = time;
            Ok(())
        }

        fn set_adj(&mut self, _adj_ppb: f64) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn step_without_touching_underlying() {
        let underlying = FixedClock(Time::from_fixed_nanos(1_000_000_000));
        let mut overlay = OverlayClock::new(underlying);
        overlay.set_ts64(Time::from_fixed_nanos(5_000_000_000)).unwrap();
        assert_eq!(
            overlay.get_ts64().unwrap(),
            Time::from_fixed_nanos(5_000_000_000)
        );
        assert_eq!(
            overlay.underlying().get_ts64().unwrap(),
            Time::from_fixed_nanos(1_000_000_000)
        );
    }
}
