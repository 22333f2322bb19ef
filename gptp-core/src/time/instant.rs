use super::Duration;

/// A point in time.
///
/// Two time bases are used throughout the crate (see the data model): a
/// monotonic local clock in nanoseconds, used for timers and event stamping,
/// and the PTP master clock, in nanoseconds since the PTP epoch. Both are
/// represented by this same type; callers are responsible for not mixing
/// instants drawn from different bases, the same discipline the on-wire
/// timestamp has no way to enforce either.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Time(i128);

impl Time {
    pub const fn from_fixed_nanos(nanos: i128) -> Self {
        Self(nanos)
    }

    pub const fn nanos(self) -> i128 {
        self.0
    }

    /// Decompose into on-wire 48-bit seconds + 32-bit nanoseconds, per §4.3.
    pub fn to_wire_parts(self) -> (u64, u32) {
        let secs = self.0.div_euclid(1_000_000_000);
        let nanos = self.0.rem_euclid(1_000_000_000);
        (secs as u64, nanos as u32)
    }

    pub fn from_wire_parts(seconds: u64, nanos: u32) -> Self {
        Self(seconds as i128 * 1_000_000_000 + nanos as i128)
    }
}

impl core::fmt::Debug for Time {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl core::ops::Add<Duration> for Time {
    type Output = Time;
    fn add(self, rhs: Duration) -> Time {
        Time(self.0 + rhs.nanos())
    }
}

impl core::ops::Sub<Duration> for Time {
    type Output = Time;
    fn sub(self, rhs: Duration) -> Time {
        Time(self.0 - rhs.nanos())
    }
}

impl core::ops::Sub<Time> for Time {
    type Output = Duration;
    fn sub(self, rhs: Time) -> Duration {
        Duration::from_nanos(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip() {
        let t = Time::from_fixed_nanos(1_700_000_123_456_789);
        let (secs, nanos) = t.to_wire_parts();
        assert_eq!(Time::from_wire_parts(secs, nanos), t);
    }
}
