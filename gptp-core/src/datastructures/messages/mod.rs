//! gPTP network messages: the 34-byte common header (IEEE 802.1AS-2020
//! clause 10.5) plus the per-type bodies and organization-extension TLVs
//! carried by Sync, FollowUp, Pdelay and Signaling exchanges.

mod header;
pub mod tlv;

pub use header::{Header, HeaderFlags, MAJOR_SDO_ID_CMLDS, MAJOR_SDO_ID_INSTANCE};
pub use tlv::{FollowUpInformation, GptpCapableTlv, MessageIntervalRequest, PathTrace};

use super::common::{ClockIdentity, ClockQuality, PortIdentity, TimeSource, Timestamp};
use super::{WireFormat, WireFormatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    PDelayRespFollowUp = 0xa,
    Announce = 0xb,
    Signaling = 0xc,
}

impl TryFrom<u8> for MessageType {
    type Error = WireFormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        match value {
            0x0 => Ok(Sync),
            0x2 => Ok(PDelayReq),
            0x3 => Ok(PDelayResp),
            0x8 => Ok(FollowUp),
            0xa => Ok(PDelayRespFollowUp),
            0xb => Ok(Announce),
            0xc => Ok(Signaling),
            _ => Err(WireFormatError::EnumConversionError),
        }
    }
}

/// The maximum encoded size of any single message this crate produces or
/// accepts, including organization-extension TLVs.
pub const MAX_MESSAGE_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessage {
    /// Zeroed for the two-step case gPTP always uses; the real origin time
    /// travels in the paired FollowUp instead.
    pub origin_timestamp: Timestamp,
}

impl SyncMessage {
    pub const CONTENT_SIZE: usize = 10;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.origin_timestamp.serialize(buffer)
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(Self {
            origin_timestamp: Timestamp::deserialize(buffer)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpMessage {
    pub precise_origin_timestamp: Timestamp,
    pub follow_up_information: FollowUpInformation,
}

impl FollowUpMessage {
    pub fn content_size(&self) -> usize {
        10 + self.follow_up_information.wire_size()
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.precise_origin_timestamp.serialize(&mut buffer[0..10])?;
        self.follow_up_information.serialize(&mut buffer[10..])
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let precise_origin_timestamp = Timestamp::deserialize(&buffer[0..10])?;
        let content = buffer.get(10..).ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self {
            precise_origin_timestamp,
            follow_up_information: FollowUpInformation::deserialize(content)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayReqMessage {
    pub origin_timestamp: Timestamp,
}

impl PDelayReqMessage {
    pub const CONTENT_SIZE: usize = 20;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..20].fill(0);
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::CONTENT_SIZE)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self {
            origin_timestamp: Timestamp::deserialize(slice)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayRespMessage {
    pub request_receipt_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PDelayRespMessage {
    pub const CONTENT_SIZE: usize = 20;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        self.request_receipt_timestamp.serialize(&mut buffer[0..10])?;
        self.requesting_port_identity.serialize(&mut buffer[10..20])?;
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::CONTENT_SIZE)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self {
            request_receipt_timestamp: Timestamp::deserialize(&slice[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&slice[10..20])?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayRespFollowUpMessage {
    pub response_origin_timestamp: Timestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PDelayRespFollowUpMessage {
    pub const CONTENT_SIZE: usize = 20;

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        self.response_origin_timestamp.serialize(&mut buffer[0..10])?;
        self.requesting_port_identity.serialize(&mut buffer[10..20])?;
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::CONTENT_SIZE)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self {
            response_origin_timestamp: Timestamp::deserialize(&slice[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&slice[10..20])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub origin_timestamp: Timestamp,
    pub current_utc_offset: i16,
    pub grandmaster_priority_1: u8,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority_2: u8,
    pub grandmaster_identity: ClockIdentity,
    pub steps_removed: u16,
    pub time_source: TimeSource,
    pub path_trace: PathTrace,
}

impl AnnounceMessage {
    pub const FIXED_CONTENT_SIZE: usize = 30;

    pub fn content_size(&self) -> usize {
        Self::FIXED_CONTENT_SIZE + self.path_trace.wire_size()
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.content_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority_1;
        buffer[14] = self.grandmaster_clock_quality.clock_class.0;
        buffer[15] = self.grandmaster_clock_quality.clock_accuracy.0;
        buffer[16..18]
            .copy_from_slice(&self.grandmaster_clock_quality.offset_scaled_log_variance.0.to_be_bytes());
        buffer[18] = self.grandmaster_priority_2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source.to_primitive();
        self.path_trace.serialize(&mut buffer[30..])
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let fixed = buffer
            .get(0..Self::FIXED_CONTENT_SIZE)
            .ok_or(WireFormatError::BufferTooShort)?;
        let path_trace = buffer
            .get(Self::FIXED_CONTENT_SIZE..)
            .map(PathTrace::deserialize)
            .transpose()?
            .unwrap_or(PathTrace {
                identities: arrayvec::ArrayVec::new(),
            });
        Ok(Self {
            origin_timestamp: Timestamp::deserialize(&fixed[0..10])?,
            current_utc_offset: i16::from_be_bytes(fixed[10..12].try_into().unwrap()),
            grandmaster_priority_1: fixed[13],
            grandmaster_clock_quality: ClockQuality {
                clock_class: super::common::ClockClass(fixed[14]),
                clock_accuracy: super::common::ClockAccuracy(fixed[15]),
                offset_scaled_log_variance: super::common::OffsetScaledLogVariance(
                    u16::from_be_bytes(fixed[16..18].try_into().unwrap()),
                ),
            },
            grandmaster_priority_2: fixed[18],
            grandmaster_identity: ClockIdentity::deserialize(&fixed[19..27])?,
            steps_removed: u16::from_be_bytes(fixed[27..29].try_into().unwrap()),
            time_source: TimeSource::from_primitive(fixed[29]),
            path_trace,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalingMessage {
    pub target_port_identity: PortIdentity,
    pub message_interval_request: Option<MessageIntervalRequest>,
    pub gptp_capable: Option<GptpCapableTlv>,
}

impl SignalingMessage {
    pub fn content_size(&self) -> usize {
        10 + self
            .message_interval_request
            .map_or(0, |t| t.wire_size())
            + self.gptp_capable.map_or(0, |t| t.wire_size())
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.content_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        self.target_port_identity.serialize(&mut buffer[0..10])?;
        let mut offset = 10;
        if let Some(tlv) = self.message_interval_request {
            tlv.serialize(&mut buffer[offset..])?;
            offset += tlv.wire_size();
        }
        if let Some(tlv) = self.gptp_capable {
            tlv.serialize(&mut buffer[offset..])?;
        }
        Ok(())
    }

    pub fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        let target_port_identity = PortIdentity::deserialize(&buffer[0..10])?;
        let mut message_interval_request = None;
        let mut gptp_capable = None;
        let mut offset = 10;
        while offset + 4 <= buffer.len() {
            let tlv_type = u16::from_be_bytes(buffer[offset..offset + 2].try_into().unwrap());
            let length =
                u16::from_be_bytes(buffer[offset + 2..offset + 4].try_into().unwrap()) as usize;
            let tlv_end = offset + 4 + length;
            if tlv_type != 0x0003 || tlv_end > buffer.len() {
                break;
            }
            let subtype = &buffer[offset + 4..offset + 7];
            match (subtype, length) {
                ([0x00, 0x00, 0x02], MessageIntervalRequest::CONTENT_SIZE) => {
                    message_interval_request = Some(MessageIntervalRequest::deserialize(
                        &buffer[offset..tlv_end],
                    )?);
                }
                ([0x00, 0x00, 0x04], GptpCapableTlv::CONTENT_SIZE) => {
                    gptp_capable = Some(GptpCapableTlv::deserialize(&buffer[offset..tlv_end])?);
                }
                _ => {}
            }
            offset = tlv_end;
        }
        Ok(Self {
            target_port_identity,
            message_interval_request,
            gptp_capable,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Sync(SyncMessage),
    FollowUp(FollowUpMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling(SignalingMessage),
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Sync(_) => MessageType::Sync,
            MessageBody::FollowUp(_) => MessageType::FollowUp,
            MessageBody::PDelayReq(_) => MessageType::PDelayReq,
            MessageBody::PDelayResp(_) => MessageType::PDelayResp,
            MessageBody::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            MessageBody::Announce(_) => MessageType::Announce,
            MessageBody::Signaling(_) => MessageType::Signaling,
        }
    }

    pub fn content_size(&self) -> usize {
        match self {
            MessageBody::Sync(_) => SyncMessage::CONTENT_SIZE,
            MessageBody::FollowUp(m) => m.content_size(),
            MessageBody::PDelayReq(_) => PDelayReqMessage::CONTENT_SIZE,
            MessageBody::PDelayResp(_) => PDelayRespMessage::CONTENT_SIZE,
            MessageBody::PDelayRespFollowUp(_) => PDelayRespFollowUpMessage::CONTENT_SIZE,
            MessageBody::Announce(m) => m.content_size(),
            MessageBody::Signaling(m) => m.content_size(),
        }
    }

    pub fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        match self {
            MessageBody::Sync(m) => m.serialize_content(buffer),
            MessageBody::FollowUp(m) => m.serialize_content(buffer),
            MessageBody::PDelayReq(m) => m.serialize_content(buffer),
            MessageBody::PDelayResp(m) => m.serialize_content(buffer),
            MessageBody::PDelayRespFollowUp(m) => m.serialize_content(buffer),
            MessageBody::Announce(m) => m.serialize_content(buffer),
            MessageBody::Signaling(m) => m.serialize_content(buffer),
        }
    }

    pub fn deserialize(message_type: MessageType, buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(match message_type {
            MessageType::Sync => MessageBody::Sync(SyncMessage::deserialize_content(buffer)?),
            MessageType::FollowUp => {
                MessageBody::FollowUp(FollowUpMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayReq => {
                MessageBody::PDelayReq(PDelayReqMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayResp => {
                MessageBody::PDelayResp(PDelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayRespFollowUp => MessageBody::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(buffer)?,
            ),
            MessageType::Announce => {
                MessageBody::Announce(AnnounceMessage::deserialize_content(buffer)?)
            }
            MessageType::Signaling => {
                MessageBody::Signaling(SignalingMessage::deserialize_content(buffer)?)
            }
        })
    }
}

/// A complete gPTP message: header plus body. Event messages (Sync,
/// PDelayReq, PDelayResp) are the ones a network port must hardware
/// timestamp on transmit; the rest are general messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: MessageBody,
}

impl Message {
    pub fn is_event(&self) -> bool {
        matches!(
            self.body,
            MessageBody::Sync(_) | MessageBody::PDelayReq(_) | MessageBody::PDelayResp(_)
        )
    }

    pub fn wire_size(&self) -> usize {
        Header::WIRE_SIZE + self.body.content_size()
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        let size = self.wire_size();
        if buffer.len() < size {
            return Err(WireFormatError::BufferTooShort);
        }
        let mut header = self.header;
        header.message_length = size as u16;
        header.message_type = self.body.message_type();
        header.serialize(&mut buffer[0..Header::WIRE_SIZE])?;
        self.body
            .serialize_content(&mut buffer[Header::WIRE_SIZE..size])?;
        Ok(size)
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let header = Header::deserialize(buffer)?;
        let message_length = header.message_length as usize;
        if message_length < Header::WIRE_SIZE {
            return Err(WireFormatError::BufferTooShort);
        }
        let content = buffer
            .get(Header::WIRE_SIZE..message_length)
            .ok_or(WireFormatError::BufferTooShort)?;
        let body = MessageBody::deserialize(header.message_type, content)?;
        Ok(Self { header, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn header(message_type: MessageType) -> Header {
        Header {
            major_sdo_id: MAJOR_SDO_ID_INSTANCE,
            message_type,
            minor_version_ptp: 0,
            version_ptp: 2,
            message_length: 0,
            domain_number: 0,
            minor_sdo_id: 0,
            flags: HeaderFlags::default(),
            correction_field: 0,
            message_type_specific: [0; 4],
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([9; 8]),
                port_number: 1,
            },
            sequence_id: 7,
            control: 0,
            log_message_interval: -3,
        }
    }

    #[test]
    fn sync_message_roundtrip() {
        let message = Message {
            header: header(MessageType::Sync),
            body: MessageBody::Sync(SyncMessage {
                origin_timestamp: Timestamp::default(),
            }),
        };
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        assert_eq!(Message::deserialize(&buf[..len]).unwrap().body, message.body);
    }

    #[test]
    fn follow_up_carries_rate_ratio_tlv() {
        let message = Message {
            header: header(MessageType::FollowUp),
            body: MessageBody::FollowUp(FollowUpMessage {
                precise_origin_timestamp: Timestamp::default(),
                follow_up_information: FollowUpInformation {
                    cumulative_scaled_rate_offset: 100,
                    gm_time_base_indicator: 3,
                    last_gm_phase_change: crate::datastructures::common::ScaledNs(0),
                    scaled_last_gm_freq_change: 0,
                },
            }),
        };
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        let decoded = Message::deserialize(&buf[..len]).unwrap();
        assert_eq!(decoded.body, message.body);
    }

    #[test]
    fn announce_path_trace_grows_with_each_hop() {
        let mut announce = AnnounceMessage {
            origin_timestamp: Timestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority_1: 128,
            grandmaster_clock_quality: ClockQuality::DEFAULT,
            grandmaster_priority_2: 128,
            grandmaster_identity: ClockIdentity([1; 8]),
            steps_removed: 0,
            time_source: TimeSource::InternalOscillator,
            path_trace: PathTrace {
                identities: arrayvec::ArrayVec::new(),
            },
        };
        announce.path_trace = announce.path_trace.with_one_more_hop(ClockIdentity([1; 8]));
        let message = Message {
            header: header(MessageType::Announce),
            body: MessageBody::Announce(announce.clone()),
        };
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        let decoded = Message::deserialize(&buf[..len]).unwrap();
        assert_eq!(decoded.body, MessageBody::Announce(announce));
    }

    #[test]
    fn pdelay_req_and_cmlds_header_distinguish_by_major_sdo_id() {
        let mut h = header(MessageType::PDelayReq);
        h.major_sdo_id = MAJOR_SDO_ID_CMLDS;
        let message = Message {
            header: h,
            body: MessageBody::PDelayReq(PDelayReqMessage {
                origin_timestamp: Timestamp::default(),
            }),
        };
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        assert!(Header::deserialize(&buf[..len]).unwrap().is_cmlds());
    }

    #[test]
    fn signaling_round_trips_both_tlvs() {
        let message = Message {
            header: header(MessageType::Signaling),
            body: MessageBody::Signaling(SignalingMessage {
                target_port_identity: PortIdentity {
                    clock_identity: ClockIdentity([2; 8]),
                    port_number: 1,
                },
                message_interval_request: Some(MessageIntervalRequest {
                    link_delay_interval: -3,
                    time_sync_interval: -3,
                    announce_interval: 1,
                    compute_neighbor_rate_ratio: true,
                    compute_neighbor_prop_delay: true,
                    one_step_receive_capable: false,
                }),
                gptp_capable: Some(GptpCapableTlv {
                    log_gptp_capable_message_interval: 0,
                    supports_gptp: true,
                }),
            }),
        };
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        let decoded = Message::deserialize(&buf[..len]).unwrap();
        assert_eq!(decoded.body, message.body);
    }
}
