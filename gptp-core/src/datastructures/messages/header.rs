use crate::datastructures::common::PortIdentity;
use crate::datastructures::{WireFormat, WireFormatError};

use super::MessageType;

/// `majorSdoId` value used by ordinary per-instance traffic. Announce, Sync,
/// FollowUp and Signaling always carry this value in the top nibble of the
/// first header byte.
pub const MAJOR_SDO_ID_INSTANCE: u8 = 0x1;

/// `majorSdoId` value a Pdelay exchange carries when the sending port is
/// configured for the common mean link delay service (CMLDS) rather than a
/// per-instance path-delay measurement.
pub const MAJOR_SDO_ID_CMLDS: u8 = 0x2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags {
    pub alternate_master: bool,
    pub two_step: bool,
    pub leap61: bool,
    pub leap59: bool,
    pub current_utc_offset_valid: bool,
    pub ptp_timescale: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
}

impl HeaderFlags {
    fn to_bytes(self) -> [u8; 2] {
        let mut byte0 = 0u8;
        byte0 |= (self.alternate_master as u8) << 0;
        byte0 |= (self.two_step as u8) << 1;
        let mut byte1 = 0u8;
        byte1 |= (self.leap61 as u8) << 0;
        byte1 |= (self.leap59 as u8) << 1;
        byte1 |= (self.current_utc_offset_valid as u8) << 2;
        byte1 |= (self.ptp_timescale as u8) << 3;
        byte1 |= (self.time_traceable as u8) << 4;
        byte1 |= (self.frequency_traceable as u8) << 5;
        [byte0, byte1]
    }

    fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            alternate_master: bytes[0] & (1 << 0) != 0,
            two_step: bytes[0] & (1 << 1) != 0,
            leap61: bytes[1] & (1 << 0) != 0,
            leap59: bytes[1] & (1 << 1) != 0,
            current_utc_offset_valid: bytes[1] & (1 << 2) != 0,
            ptp_timescale: bytes[1] & (1 << 3) != 0,
            time_traceable: bytes[1] & (1 << 4) != 0,
            frequency_traceable: bytes[1] & (1 << 5) != 0,
        }
    }
}

/// The common 34-byte gPTP message header shared by every message type.
///
/// `correctionField` is carried as raw sub-nanosecond fixed point (ns<<16,
/// the wire representation), not converted to a [`crate::time::Duration`]
/// here; callers decide how to interpret it per message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major_sdo_id: u8,
    pub message_type: MessageType,
    pub minor_version_ptp: u8,
    pub version_ptp: u8,
    pub message_length: u16,
    pub domain_number: u8,
    pub minor_sdo_id: u8,
    pub flags: HeaderFlags,
    pub correction_field: i64,
    pub message_type_specific: [u8; 4],
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub control: u8,
    pub log_message_interval: i8,
}

impl Header {
    pub const WIRE_SIZE: usize = 34;

    pub fn is_cmlds(&self) -> bool {
        self.major_sdo_id == MAJOR_SDO_ID_CMLDS
    }
}

impl WireFormat for Header {
    fn wire_size(&self) -> usize {
        Self::WIRE_SIZE
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = (self.major_sdo_id << 4) | (self.message_type as u8 & 0x0F);
        buffer[1] = (self.minor_version_ptp << 4) | (self.version_ptp & 0x0F);
        buffer[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = self.minor_sdo_id;
        buffer[6..8].copy_from_slice(&self.flags.to_bytes());
        buffer[8..16].copy_from_slice(&self.correction_field.to_be_bytes());
        buffer[16..20].copy_from_slice(&self.message_type_specific);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = self.control;
        buffer[33] = self.log_message_interval as u8;
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        let message_type = MessageType::try_from(buffer[0] & 0x0F)
            .map_err(|_| WireFormatError::EnumConversionError)?;
        Ok(Self {
            major_sdo_id: buffer[0] >> 4,
            message_type,
            minor_version_ptp: buffer[1] >> 4,
            version_ptp: buffer[1] & 0x0F,
            message_length: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
            domain_number: buffer[4],
            minor_sdo_id: buffer[5],
            flags: HeaderFlags::from_bytes([buffer[6], buffer[7]]),
            correction_field: i64::from_be_bytes(buffer[8..16].try_into().unwrap()),
            message_type_specific: buffer[16..20].try_into().unwrap(),
            source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
            sequence_id: u16::from_be_bytes(buffer[30..32].try_into().unwrap()),
            control: buffer[32],
            log_message_interval: buffer[33] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn sample() -> Header {
        Header {
            major_sdo_id: MAJOR_SDO_ID_INSTANCE,
            message_type: MessageType::Sync,
            minor_version_ptp: 1,
            version_ptp: 2,
            message_length: 44,
            domain_number: 0,
            minor_sdo_id: 0,
            flags: HeaderFlags {
                two_step: true,
                ..Default::default()
            },
            correction_field: 0,
            message_type_specific: [0; 4],
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: 1,
            },
            sequence_id: 42,
            control: 0,
            log_message_interval: 0,
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample();
        let mut buf = [0u8; Header::WIRE_SIZE];
        header.serialize(&mut buf).unwrap();
        assert_eq!(Header::deserialize(&buf).unwrap(), header);
    }

    #[test]
    fn cmlds_sdo_id_is_distinguishable_from_instance() {
        let mut header = sample();
        header.message_type = MessageType::PDelayReq;
        header.major_sdo_id = MAJOR_SDO_ID_CMLDS;
        let mut buf = [0u8; Header::WIRE_SIZE];
        header.serialize(&mut buf).unwrap();
        assert_eq!(buf[0] >> 4, MAJOR_SDO_ID_CMLDS);
        assert!(Header::deserialize(&buf).unwrap().is_cmlds());
    }
}
