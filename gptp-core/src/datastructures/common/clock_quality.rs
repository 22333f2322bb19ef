/// `clockClass`, per IEEE1588-2019 Table 5 / 802.1AS clause 8.6.2.2.
///
/// Lower is better: 6 is a grandmaster directly synchronized to a primary
/// reference, 248 is the default for a free-running clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockClass(pub u8);

impl ClockClass {
    pub const PRIMARY_REFERENCE: Self = Self(6);
    pub const DEFAULT: Self = Self(248);
}

/// `clockAccuracy`, per IEEE1588-2019 Table 6. Lower is better: the byte
/// value already encodes the standard's accuracy ordering, so comparing the
/// raw bytes gives the correct result without a separate translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockAccuracy(pub u8);

impl ClockAccuracy {
    pub const NS1: Self = Self(0x20);
    pub const US1: Self = Self(0x25);
    pub const UNKNOWN: Self = Self(0xFE);
}

/// `offsetScaledLogVariance`, the Allan deviation based clock stability
/// metric from IEEE1588-2019 clause 7.6.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetScaledLogVariance(pub u16);

impl OffsetScaledLogVariance {
    pub const DEFAULT: Self = Self(0xFFFF);
}

/// The `clockQuality` dataset member: class, accuracy, and log variance
/// together describe how trustworthy a clock's time is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockQuality {
    pub clock_class: ClockClass,
    pub clock_accuracy: ClockAccuracy,
    pub offset_scaled_log_variance: OffsetScaledLogVariance,
}

impl ClockQuality {
    pub const DEFAULT: Self = Self {
        clock_class: ClockClass::DEFAULT,
        clock_accuracy: ClockAccuracy::UNKNOWN,
        offset_scaled_log_variance: OffsetScaledLogVariance::DEFAULT,
    };
}
