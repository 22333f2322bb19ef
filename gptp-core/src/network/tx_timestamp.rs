//! Software fallback for a transmit timestamp that never arrives within
//! `TXTS_LOST_TIME`: the data model requires synthesizing one from a
//! local-clock read taken at send time rather than blocking the MD machine
//! waiting for hardware confirmation forever.

use crate::datastructures::messages::MessageType;
use crate::time::Time;

use super::TXTS_LOST_TIME;

#[derive(Debug, Clone, Copy)]
struct Pending {
    port_index: u16,
    message_type: MessageType,
    sequence_id: u16,
    domain_number: u8,
    sent_at: Time,
    software_timestamp: Time,
}

/// Tracks outstanding sends awaiting a hardware `TXTS` event, synthesizing a
/// software timestamp for any that outlive `TXTS_LOST_TIME`.
pub struct TxTimestampTracker {
    pending: arrayvec::ArrayVec<Pending, 64>,
}

impl TxTimestampTracker {
    pub fn new() -> Self {
        Self {
            pending: arrayvec::ArrayVec::new(),
        }
    }

    /// Record a send at `now`, with `software_timestamp` the local-clock
    /// reading taken immediately after the `send()` call returned (the best
    /// available estimate if hardware timestamping never reports back).
    pub fn record_send(
        &mut self,
        port_index: u16,
        message_type: MessageType,
        sequence_id: u16,
        domain_number: u8,
        now: Time,
        software_timestamp: Time,
    ) {
        let _ = self.pending.try_push(Pending {
            port_index,
            message_type,
            sequence_id,
            domain_number,
            sent_at: now,
            software_timestamp,
        });
    }

    /// Call when a real hardware `TXTS` event arrives, to cancel the
    /// fallback for that send.
    pub fn confirm(&mut self, port_index: u16, message_type: MessageType, sequence_id: u16) {
        self.pending.retain(|p| {
            !(p.port_index == port_index && p.message_type == message_type && p.sequence_id == sequence_id)
        });
    }

    /// Call on every TIMEOUT tick. Returns the synthesized timestamps for
    /// every send that has exceeded `TXTS_LOST_TIME` without confirmation,
    /// removing them from the pending set.
    pub fn drain_expired(&mut self, now: Time) -> arrayvec::ArrayVec<(u16, MessageType, u16, u8, Time), 64> {
        let mut expired = arrayvec::ArrayVec::new();
        self.pending.retain(|p| {
            if now - p.sent_at >= TXTS_LOST_TIME {
                let _ = expired.try_push((
                    p.port_index,
                    p.message_type,
                    p.sequence_id,
                    p.domain_number,
                    p.software_timestamp,
                ));
                false
            } else {
                true
            }
        });
        expired
    }
}

impl Default for TxTimestampTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_send_is_not_synthesized() {
        let mut t = TxTimestampTracker::new();
        t.record_send(1, MessageType::Sync, 5, 0, Time::from_fixed_nanos(0), Time::from_fixed_nanos(1));
        t.confirm(1, MessageType::Sync, 5);
        let expired = t.drain_expired(Time::from_fixed_nanos(100_000_000));
        assert!(expired.is_empty());
    }

    #[test]
    fn unconfirmed_send_is_synthesized_after_lost_time() {
        let mut t = TxTimestampTracker::new();
        t.record_send(1, MessageType::Sync, 5, 0, Time::from_fixed_nanos(0), Time::from_fixed_nanos(123));
        let still_pending = t.drain_expired(Time::from_fixed_nanos(19_000_000));
        assert!(still_pending.is_empty());
        let expired = t.drain_expired(Time::from_fixed_nanos(20_000_000));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].4.nanos(), 123);
    }
}
