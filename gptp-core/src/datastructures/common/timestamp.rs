use crate::datastructures::{WireFormat, WireFormatError};
use crate::time::Time;

/// The on-wire PTP timestamp: 48-bit seconds since the epoch, 32-bit
/// nanoseconds-within-the-second. 10 bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanos: u32,
}

impl From<Time> for Timestamp {
    fn from(value: Time) -> Self {
        let (seconds, nanos) = value.to_wire_parts();
        Self { seconds, nanos }
    }
}

impl From<Timestamp> for Time {
    fn from(value: Timestamp) -> Self {
        Time::from_wire_parts(value.seconds, value.nanos)
    }
}

impl WireFormat for Timestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..6].copy_from_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        let mut secs_bytes = [0u8; 8];
        secs_bytes[2..8].copy_from_slice(&buffer[0..6]);
        Ok(Self {
            seconds: u64::from_be_bytes(secs_bytes),
            nanos: u32::from_be_bytes(buffer[6..10].try_into().unwrap()),
        })
    }
}

/// A signed value in units of 2^-16 ns, used by `lastGmPhaseChange`. Carried
/// on the wire as a 96-bit (12-byte) two's-complement integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaledNs(pub i128);

impl ScaledNs {
    pub fn from_nanos(nanos: i64) -> Self {
        Self((nanos as i128) << 16)
    }

    pub fn to_nanos_f64(self) -> f64 {
        (self.0 as f64) / 65536.0
    }
}

impl WireFormat for ScaledNs {
    fn wire_size(&self) -> usize {
        12
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 12 {
            return Err(WireFormatError::BufferTooShort);
        }
        // 96-bit two's complement, most significant byte first.
        let sign_extended = self.0.to_be_bytes();
        buffer[0..12].copy_from_slice(&sign_extended[4..16]);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 12 {
            return Err(WireFormatError::BufferTooShort);
        }
        let fill = if buffer[0] & 0x80 != 0 { 0xFF } else { 0x00 };
        let mut full = [fill; 16];
        full[4..16].copy_from_slice(&buffer[0..12]);
        Ok(Self(i128::from_be_bytes(full)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_roundtrip() {
        let ts = Timestamp {
            seconds: 0x0000_1234_5678,
            nanos: 123_456_789,
        };
        let mut buf = [0u8; 10];
        ts.serialize(&mut buf).unwrap();
        assert_eq!(Timestamp::deserialize(&buf).unwrap(), ts);
    }

    #[test]
    fn scaled_ns_roundtrip_positive_and_negative() {
        for nanos in [0i64, 1, -1, 1_000_000, -1_000_000] {
            let scaled = ScaledNs::from_nanos(nanos);
            let mut buf = [0u8; 12];
            scaled.serialize(&mut buf).unwrap();
            let back = ScaledNs::deserialize(&buf).unwrap();
            assert_eq!(back, scaled);
            assert_eq!(back.to_nanos_f64(), nanos as f64);
        }
    }

    #[test]
    fn time_timestamp_roundtrip() {
        let t = Time::from_fixed_nanos(1_700_000_123_456_789);
        let ts = Timestamp::from(t);
        assert_eq!(Time::from(ts), t);
    }
}
