use crate::datastructures::common::{ClockIdentity, ScaledNs};
use crate::datastructures::{WireFormat, WireFormatError};

/// IEEE 802.1 organization id carried by every gPTP organization-extension
/// TLV (`ORGANIZATION_EXTENSION`, tlvType 0x0003).
const IEEE_802_1_OUI: [u8; 3] = [0x00, 0x80, 0xC2];

const TLV_TYPE_ORGANIZATION_EXTENSION: u16 = 0x0003;
const TLV_TYPE_PATH_TRACE: u16 = 0x0008;

const SUBTYPE_FOLLOW_UP_INFORMATION: [u8; 3] = [0x00, 0x00, 0x01];
const SUBTYPE_MESSAGE_INTERVAL_REQUEST: [u8; 3] = [0x00, 0x00, 0x02];
const SUBTYPE_GPTP_CAPABLE: [u8; 3] = [0x00, 0x00, 0x04];

/// Carried in FollowUp messages, conveying the rate ratio and grandmaster
/// time-base bookkeeping a SyncReceive entity needs to reconstruct
/// `MDSyncReceive` (IEEE 802.1AS-2020 clause 11.4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpInformation {
    /// Neighbor rate ratio minus one, scaled by 2^41, as transmitted on the wire.
    pub cumulative_scaled_rate_offset: i32,
    pub gm_time_base_indicator: u16,
    pub last_gm_phase_change: ScaledNs,
    /// Fractional frequency offset of the grandmaster at its last change, scaled by 2^41.
    pub scaled_last_gm_freq_change: i32,
}

impl FollowUpInformation {
    pub const CONTENT_SIZE: usize = 32;

    pub fn wire_size(&self) -> usize {
        4 + Self::CONTENT_SIZE
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&TLV_TYPE_ORGANIZATION_EXTENSION.to_be_bytes());
        buffer[2..4].copy_from_slice(&(Self::CONTENT_SIZE as u16).to_be_bytes());
        buffer[4..7].copy_from_slice(&IEEE_802_1_OUI);
        buffer[7..10].copy_from_slice(&SUBTYPE_FOLLOW_UP_INFORMATION);
        buffer[10..14].copy_from_slice(&self.cumulative_scaled_rate_offset.to_be_bytes());
        buffer[14..16].copy_from_slice(&self.gm_time_base_indicator.to_be_bytes());
        self.last_gm_phase_change.serialize(&mut buffer[16..28])?;
        buffer[28..32].copy_from_slice(&self.scaled_last_gm_freq_change.to_be_bytes());
        buffer[32..36].fill(0);
        Ok(())
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 + Self::CONTENT_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            cumulative_scaled_rate_offset: i32::from_be_bytes(
                buffer[10..14].try_into().unwrap(),
            ),
            gm_time_base_indicator: u16::from_be_bytes(buffer[14..16].try_into().unwrap()),
            last_gm_phase_change: ScaledNs::deserialize(&buffer[16..28])?,
            scaled_last_gm_freq_change: i32::from_be_bytes(buffer[28..32].try_into().unwrap()),
        })
    }
}

/// Carried in Announce messages: the clock identities of every time-aware
/// system the announce has propagated through, most recent last
/// (IEEE 802.1AS-2020 clause 10.5.4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTrace {
    pub identities: arrayvec::ArrayVec<ClockIdentity, 16>,
}

impl PathTrace {
    pub fn wire_size(&self) -> usize {
        4 + self.identities.len() * 8
    }

    pub fn with_one_more_hop(&self, this_clock: ClockIdentity) -> Self {
        let mut identities = self.identities.clone();
        if identities.try_push(this_clock).is_err() {
            // Path trace is full; drop the oldest hop to keep the newest
            // visible, matching how a real chain would saturate in practice.
            identities.remove(0);
            identities.push(this_clock);
        }
        Self { identities }
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        let content_len = self.identities.len() * 8;
        buffer[0..2].copy_from_slice(&TLV_TYPE_PATH_TRACE.to_be_bytes());
        buffer[2..4].copy_from_slice(&(content_len as u16).to_be_bytes());
        for (i, id) in self.identities.iter().enumerate() {
            id.serialize(&mut buffer[4 + i * 8..4 + i * 8 + 8])?;
        }
        Ok(())
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        let content_len = u16::from_be_bytes(buffer[2..4].try_into().unwrap()) as usize;
        let content = buffer
            .get(4..4 + content_len)
            .ok_or(WireFormatError::BufferTooShort)?;
        let mut identities = arrayvec::ArrayVec::new();
        for chunk in content.chunks_exact(8) {
            if identities.try_push(ClockIdentity::deserialize(chunk)?).is_err() {
                break;
            }
        }
        Ok(Self { identities })
    }
}

/// Carried in Signaling messages to request a change to a port's sync,
/// announce, or link-delay intervals, and whether the peer should compute
/// the neighbor rate ratio / neighbor propagation delay itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIntervalRequest {
    pub link_delay_interval: i8,
    pub time_sync_interval: i8,
    pub announce_interval: i8,
    pub compute_neighbor_rate_ratio: bool,
    pub compute_neighbor_prop_delay: bool,
    /// Whether the sender can receive one-step Sync messages (bit 0 of the
    /// flags octet). Interval-setting machines consult this before enabling
    /// one-step transmission toward a neighbor.
    pub one_step_receive_capable: bool,
}

/// Sentinel values an interval field in this TLV may carry instead of a
/// literal log2-seconds interval (IEEE 802.1AS-2020 clause 10.6.4.3).
pub enum IntervalRequest {
    /// Leave the current interval unchanged.
    NoChange,
    /// Restore the port's initial (configured) interval.
    RestoreInitial,
    /// Stop sending the corresponding message entirely.
    Stop,
    /// Set `logSyncInterval`/`logAnnounceInterval`/`logPdelayReqInterval` to
    /// this log2-seconds value.
    Set(i8),
}

impl IntervalRequest {
    pub const NO_CHANGE: i8 = -128;
    pub const RESTORE_INITIAL: i8 = 126;
    pub const STOP: i8 = 127;

    pub fn from_wire(value: i8) -> Self {
        match value {
            Self::NO_CHANGE => IntervalRequest::NoChange,
            Self::RESTORE_INITIAL => IntervalRequest::RestoreInitial,
            Self::STOP => IntervalRequest::Stop,
            other => IntervalRequest::Set(other),
        }
    }

    pub fn to_wire(&self) -> i8 {
        match self {
            IntervalRequest::NoChange => Self::NO_CHANGE,
            IntervalRequest::RestoreInitial => Self::RESTORE_INITIAL,
            IntervalRequest::Stop => Self::STOP,
            IntervalRequest::Set(v) => *v,
        }
    }
}

impl MessageIntervalRequest {
    pub const CONTENT_SIZE: usize = 12;

    pub fn wire_size(&self) -> usize {
        4 + Self::CONTENT_SIZE
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&TLV_TYPE_ORGANIZATION_EXTENSION.to_be_bytes());
        buffer[2..4].copy_from_slice(&(Self::CONTENT_SIZE as u16).to_be_bytes());
        buffer[4..7].copy_from_slice(&IEEE_802_1_OUI);
        buffer[7..10].copy_from_slice(&SUBTYPE_MESSAGE_INTERVAL_REQUEST);
        buffer[10] = self.link_delay_interval as u8;
        buffer[11] = self.time_sync_interval as u8;
        buffer[12] = self.announce_interval as u8;
        let mut flags = 0u8;
        flags |= self.one_step_receive_capable as u8;
        flags |= (self.compute_neighbor_rate_ratio as u8) << 1;
        flags |= (self.compute_neighbor_prop_delay as u8) << 2;
        buffer[13] = flags;
        buffer[14..16].fill(0);
        Ok(())
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 + Self::CONTENT_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            link_delay_interval: buffer[10] as i8,
            time_sync_interval: buffer[11] as i8,
            announce_interval: buffer[12] as i8,
            compute_neighbor_rate_ratio: buffer[13] & (1 << 1) != 0,
            compute_neighbor_prop_delay: buffer[13] & (1 << 2) != 0,
            one_step_receive_capable: buffer[13] & 1 != 0,
        })
    }
}

/// Carried in Signaling messages to advertise or withdraw gPTP capability on
/// a port that otherwise speaks plain PTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GptpCapableTlv {
    pub log_gptp_capable_message_interval: i8,
    pub supports_gptp: bool,
}

impl GptpCapableTlv {
    pub const CONTENT_SIZE: usize = 2;

    pub fn wire_size(&self) -> usize {
        4 + Self::CONTENT_SIZE
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&TLV_TYPE_ORGANIZATION_EXTENSION.to_be_bytes());
        buffer[2..4].copy_from_slice(&(Self::CONTENT_SIZE as u16).to_be_bytes());
        buffer[4..7].copy_from_slice(&IEEE_802_1_OUI);
        buffer[7..10].copy_from_slice(&SUBTYPE_GPTP_CAPABLE);
        buffer[10] = self.log_gptp_capable_message_interval as u8;
        buffer[11] = self.supports_gptp as u8;
        Ok(())
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 + Self::CONTENT_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            log_gptp_capable_message_interval: buffer[10] as i8,
            supports_gptp: buffer[11] != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_up_information_roundtrip() {
        let tlv = FollowUpInformation {
            cumulative_scaled_rate_offset: 12345,
            gm_time_base_indicator: 7,
            last_gm_phase_change: ScaledNs::from_nanos(42),
            scaled_last_gm_freq_change: -99,
        };
        let mut buf = [0u8; 36];
        tlv.serialize(&mut buf).unwrap();
        assert_eq!(FollowUpInformation::deserialize(&buf).unwrap(), tlv);
    }

    #[test]
    fn path_trace_roundtrip_and_growth() {
        let empty = PathTrace {
            identities: arrayvec::ArrayVec::new(),
        };
        let one_hop = empty.with_one_more_hop(ClockIdentity([1; 8]));
        let two_hop = one_hop.with_one_more_hop(ClockIdentity([2; 8]));
        assert_eq!(two_hop.identities.len(), 2);

        let mut buf = [0u8; 20];
        two_hop.serialize(&mut buf).unwrap();
        assert_eq!(PathTrace::deserialize(&buf).unwrap(), two_hop);
    }

    #[test]
    fn message_interval_request_roundtrip() {
        let tlv = MessageIntervalRequest {
            link_delay_interval: -3,
            time_sync_interval: -3,
            announce_interval: 1,
            compute_neighbor_rate_ratio: true,
            compute_neighbor_prop_delay: false,
            one_step_receive_capable: true,
        };
        let mut buf = [0u8; 16];
        tlv.serialize(&mut buf).unwrap();
        assert_eq!(MessageIntervalRequest::deserialize(&buf).unwrap(), tlv);
    }

    #[test]
    fn gptp_capable_roundtrip() {
        let tlv = GptpCapableTlv {
            log_gptp_capable_message_interval: 0,
            supports_gptp: true,
        };
        let mut buf = [0u8; 6];
        tlv.serialize(&mut buf).unwrap();
        assert_eq!(GptpCapableTlv::deserialize(&buf).unwrap(), tlv);
    }
}
