//! Types that describe points in time ([`Time`]), and durations between two
//! instants ([`Duration`], [`Interval`]).
//!
//! These are used throughout `gptp-core` instead of [`std::time`] types, as
//! they carry the signed, nanosecond-resolution semantics the protocol's
//! formulas are written in (clock offsets and correction fields can be
//! negative; `std::time::Duration` cannot).

mod duration;
mod instant;
mod interval;

pub use duration::Duration;
pub use instant::Time;
pub use interval::Interval;

/// `LOG_TO_NSEC(x)`: the interval in nanoseconds corresponding to a log2
/// seconds value, as used for `logSyncInterval`, `logAnnounceInterval`, and
/// `logPdelayReqInterval`.
pub fn log_to_nsec(log_interval: i8) -> i64 {
    Interval::from_log_2(log_interval).as_core_duration().as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_to_nsec_matches_spec_boundaries() {
        assert_eq!(log_to_nsec(0), 1_000_000_000);
        assert_eq!(log_to_nsec(-3), 125_000_000);
        assert_eq!(log_to_nsec(1), 2_000_000_000);
    }
}
