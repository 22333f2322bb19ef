//! C2: the network port abstraction. Delivers the orchestrator a single
//! stream of RECV/TXTS/DEVUP/DEVDOWN/TIMEOUT events with a unified
//! timestamp, synchronously (no `async fn` anywhere in this trait, unlike
//! the teacher's `NetworkRuntime`/`NetworkPort`, since the data model runs a
//! single-threaded cooperative loop rather than an async executor).

mod tx_timestamp;

pub use tx_timestamp::TxTimestampTracker;

use crate::datastructures::messages::{MessageType, MAX_MESSAGE_LEN};
use crate::time::{Duration, Time};

/// The gPTP general multicast destination, `01:80:C2:00:00:0E`.
pub const GPTP_MULTICAST_ADDRESS: [u8; 6] = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E];

/// Default budget before a missing hardware transmit timestamp is
/// synthesized in software.
pub const TXTS_LOST_TIME: Duration = Duration::from_nanos(20_000_000);

/// Default TIMEOUT cadence.
pub const DEFAULT_TIMEOUT_INTERVAL: Duration = Duration::from_nanos(25_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    pub link_speed_mbps: u32,
    pub full_duplex: bool,
    pub port_identity: [u8; 8],
}

/// One event out of the unified C2 stream.
#[derive(Debug, Clone)]
pub enum Event {
    Recv {
        port_index: u16,
        buffer: arrayvec::ArrayVec<u8, MAX_MESSAGE_LEN>,
        rx_time: Time,
        message_type: MessageType,
        domain_number: u8,
    },
    TxTimestamp {
        port_index: u16,
        message_type: MessageType,
        sequence_id: u16,
        domain_number: u8,
        tx_time: Time,
    },
    DevUp {
        port_index: u16,
        link: LinkInfo,
        ptpdev: arrayvec::ArrayString<64>,
    },
    DevDown {
        port_index: u16,
    },
    Timeout,
}

/// One network port: raw Ethernet (or a CMLDS-shared pair of sockets) the
/// orchestrator reads decoded events from and writes encoded frames to.
pub trait NetworkPort {
    type Error: core::fmt::Debug;

    /// A buffer sized for one outgoing frame; fill it, then call
    /// [`NetworkPort::send`] with the number of bytes written.
    fn send_buf(&mut self) -> &mut [u8; MAX_MESSAGE_LEN];

    /// Transmit `len` bytes from the last [`NetworkPort::send_buf`]. On
    /// failure the caller retries with the same sequence id.
    fn send(&mut self, len: usize) -> Result<(), Self::Error>;

    fn port_id(&self) -> [u8; 8];

    fn ptpdev(&self) -> &str;
}

/// The runtime owning every open port, producing the unified event stream.
pub trait NetworkRuntime {
    type Port: NetworkPort;
    type Error: core::fmt::Debug;

    /// Pop the next pending event, if any. Never blocks: the orchestrator
    /// calls this in a loop until it returns `None`, then sleeps until the
    /// next TIMEOUT or I/O readiness.
    fn poll(&mut self) -> Option<Event>;

    /// Request an out-of-cadence TIMEOUT after `delta`, without disturbing
    /// the regular cadence.
    fn extra_timeout(&mut self, delta: Duration);

    fn port(&mut self, port_index: u16) -> Option<&mut Self::Port>;
}
