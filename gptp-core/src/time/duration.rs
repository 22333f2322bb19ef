use core::ops::{Add, Div, Mul, Neg, Sub};
use core::time::Duration as CoreDuration;

use super::Interval;

/// A signed span of time, represented as nanoseconds in a 128-bit integer.
///
/// 128 bits gives enough headroom to accumulate a `correctionField` (which is
/// itself ns shifted left by 16 bits on the wire, see the FollowUp TLV) across
/// many hops without overflow, while still being cheap to pass by value.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Duration(i128);

impl Duration {
    pub const ZERO: Self = Self(0);

    pub const fn from_nanos(nanos: i128) -> Self {
        Self(nanos)
    }

    pub const fn nanos(self) -> i128 {
        self.0
    }

    /// Build a [`Duration`] from a log2-seconds interval, per `LOG_TO_NSEC`.
    pub fn from_log_interval(log_interval: i8) -> Self {
        Interval::from_log_2(log_interval).as_duration()
    }

    pub fn from_interval(interval: Interval) -> Self {
        Self((interval.seconds() * 1_000_000_000.0) as i128)
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }

    /// Scale this duration by a rate ratio, as used when converting a
    /// measured interval across a clock whose rate differs from ours.
    pub fn scale(self, ratio: f64) -> Self {
        Self((self.0 as f64 * ratio) as i128)
    }

    pub fn as_f64_nanos(self) -> f64 {
        self.0 as f64
    }
}

impl core::fmt::Debug for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl core::fmt::Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl Add for Duration {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Duration {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<i32> for Duration {
    type Output = Self;
    fn mul(self, rhs: i32) -> Self {
        Self(self.0 * rhs as i128)
    }
}

impl Mul<f64> for Duration {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

impl Div<i32> for Duration {
    type Output = Self;
    fn div(self, rhs: i32) -> Self {
        Self(self.0 / rhs as i128)
    }
}

impl From<CoreDuration> for Duration {
    fn from(value: CoreDuration) -> Self {
        Self(value.as_nanos() as i128)
    }
}

impl From<Duration> for CoreDuration {
    fn from(value: Duration) -> Self {
        CoreDuration::from_nanos(value.0.unsigned_abs() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_to_nsec_boundaries() {
        assert_eq!(Duration::from_log_interval(0).nanos(), 1_000_000_000);
        assert_eq!(Duration::from_log_interval(-3).nanos(), 125_000_000);
        assert_eq!(Duration::from_log_interval(1).nanos(), 2_000_000_000);
    }

    #[test]
    fn clamp_bounds_prop_delay() {
        let d = Duration::from_nanos(-5).clamp(Duration::ZERO, Duration::from_nanos(10_000_000));
        assert_eq!(d, Duration::ZERO);
    }
}
