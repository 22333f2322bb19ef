use crate::datastructures::{WireFormat, WireFormatError};

use super::ClockIdentity;

/// `(clock identity, 16-bit port number)`.
///
/// Port number 0 denotes the internal "clock master port" (the logical
/// interface between the per-domain clock and the BMCA, not a physical
/// network interface); port numbers 1..N denote physical network ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortIdentity {
    pub clock_identity: ClockIdentity,
    pub port_number: u16,
}

impl PortIdentity {
    /// Port number 0: the internal clock-master port, shared across domains.
    pub const CLOCK_MASTER_PORT: u16 = 0;

    pub fn is_clock_master_port(self) -> bool {
        self.port_number == Self::CLOCK_MASTER_PORT
    }
}

impl WireFormat for PortIdentity {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.clock_identity.serialize(&mut buffer[0..8])?;
        buffer[8..10].copy_from_slice(&self.port_number.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            clock_identity: ClockIdentity::deserialize(&buffer[0..8])?,
            port_number: u16::from_be_bytes(buffer[8..10].try_into().unwrap()),
        })
    }
}

impl core::fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.clock_identity, self.port_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip() {
        let id = PortIdentity {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            port_number: 3,
        };
        let mut buf = [0u8; 10];
        id.serialize(&mut buf).unwrap();
        assert_eq!(PortIdentity::deserialize(&buf).unwrap(), id);
    }

    #[test]
    fn port_zero_is_clock_master() {
        let id = PortIdentity {
            clock_identity: ClockIdentity::default(),
            port_number: 0,
        };
        assert!(id.is_clock_master_port());
    }
}
