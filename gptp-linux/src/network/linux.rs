//! [`gptp_core::network::{NetworkRuntime,NetworkPort}`] over real Ethernet
//! sockets. Unlike the teacher's async `tokio`-driven runtime, the protocol
//! engine's event loop is synchronous and cooperative, so ports are polled
//! with a zero-timeout `poll(2)` rather than awaited.

use std::os::fd::AsRawFd;

use arrayvec::{ArrayString, ArrayVec};
use gptp_core::datastructures::messages::{MessageType, MAX_MESSAGE_LEN};
use gptp_core::network::{Event, LinkInfo, NetworkPort, NetworkRuntime};
use gptp_core::time::{Duration, Time};
use timestamped_socket::interface::InterfaceName;
use timestamped_socket::networkaddress::EthernetAddress;
use timestamped_socket::socket::{InterfaceTimestampMode, Open, Socket};

use crate::socket::{open_gptp_socket, GPTP_ADDRESS};

/// Peeks the header fields needed to route a received frame without
/// running it through full message deserialization: byte 0's low nibble is
/// `messageType`, byte 4 is `domainNumber` (IEEE 802.1AS-2020 clause
/// 10.5.2/10.5.4).
fn peek_header(buffer: &[u8]) -> Option<(MessageType, u8)> {
    if buffer.len() < 5 {
        return None;
    }
    let message_type = MessageType::try_from(buffer[0] & 0x0f).ok()?;
    Some((message_type, buffer[4]))
}

pub struct PortSetup {
    pub port_index: u16,
    pub interface: InterfaceName,
    pub timestamping: InterfaceTimestampMode,
    pub bind_phc: Option<u32>,
}

pub struct LinuxNetworkPort {
    port_index: u16,
    socket: Socket<EthernetAddress, Open>,
    send_buf: [u8; MAX_MESSAGE_LEN],
    port_id: [u8; 8],
    ptpdev: ArrayString<64>,
}

impl NetworkPort for LinuxNetworkPort {
    type Error = std::io::Error;

    fn send_buf(&mut self) -> &mut [u8; MAX_MESSAGE_LEN] {
        &mut self.send_buf
    }

    fn send(&mut self, len: usize) -> Result<(), Self::Error> {
        self.socket.send_to(&self.send_buf[..len], GPTP_ADDRESS)?;
        Ok(())
    }

    fn port_id(&self) -> [u8; 8] {
        self.port_id
    }

    fn ptpdev(&self) -> &str {
        &self.ptpdev
    }
}

/// Owns every open port and turns `poll(2)` readiness into the unified
/// [`Event`] stream the orchestrator drives.
pub struct LinuxNetworkRuntime {
    ports: ArrayVec<LinuxNetworkPort, 8>,
    recv_buf: [u8; 2048],
}

impl LinuxNetworkRuntime {
    pub fn new() -> Self {
        Self { ports: ArrayVec::new(), recv_buf: [0; 2048] }
    }

    pub fn open_port(&mut self, setup: PortSetup) -> std::io::Result<()> {
        let socket = open_gptp_socket(setup.interface, setup.timestamping, setup.bind_phc)?;
        let port_id = mac_for_interface(setup.interface).unwrap_or([0; 8]);
        let mut ptpdev = ArrayString::new();
        let _ = ptpdev.try_push_str(setup.interface.as_str());

        self.ports
            .try_push(LinuxNetworkPort { port_index: setup.port_index, socket, send_buf: [0; MAX_MESSAGE_LEN], port_id, ptpdev })
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "too many ports"))
    }

    fn poll_one(port: &mut LinuxNetworkPort, buffer: &mut [u8; 2048]) -> Option<Event> {
        let mut pollfd = libc::pollfd { fd: port.socket.as_raw_fd(), events: libc::POLLIN, revents: 0 };
        let ready = unsafe { libc::poll(&mut pollfd, 1, 0) };
        if ready <= 0 || pollfd.revents & libc::POLLIN == 0 {
            return None;
        }

        let recv = port.socket.recv(buffer).ok()?;
        let received = &buffer[..recv.bytes_read];
        let (message_type, domain_number) = peek_header(received)?;

        let mut frame = ArrayVec::new();
        let _ = frame.try_extend_from_slice(received);

        let rx_time = recv
            .timestamp
            .map(|ts| Time::from_fixed_nanos(ts.seconds as i128 * 1_000_000_000 + ts.nanos as i128))
            .unwrap_or(Time::from_fixed_nanos(0));

        Some(Event::Recv { port_index: port.port_index, buffer: frame, rx_time, message_type, domain_number })
    }
}

impl Default for LinuxNetworkRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkRuntime for LinuxNetworkRuntime {
    type Port = LinuxNetworkPort;
    type Error = std::io::Error;

    fn poll(&mut self) -> Option<Event> {
        for port in self.ports.iter_mut() {
            if let Some(event) = Self::poll_one(port, &mut self.recv_buf) {
                return Some(event);
            }
        }
        None
    }

    fn extra_timeout(&mut self, _delta: Duration) {
        // The main loop owns the wakeup deadline; nothing to arm here since
        // `poll` is a non-blocking drain called every tick regardless.
    }

    fn port(&mut self, port_index: u16) -> Option<&mut Self::Port> {
        self.ports.iter_mut().find(|p| p.port_index == port_index)
    }
}

fn read_mac(interface_name: &str) -> Option<[u8; 6]> {
    let raw = std::fs::read_to_string(format!("/sys/class/net/{interface_name}/address")).ok()?;
    let mut mac = [0u8; 6];
    for (byte, chunk) in mac.iter_mut().zip(raw.trim().split(':')) {
        *byte = u8::from_str_radix(chunk, 16).ok()?;
    }
    Some(mac)
}

/// Derives a clock identity candidate from the first non-multicast,
/// non-zero MAC address on the system (IEEE 802.1AS-2020 clause 8.5.2.2).
pub fn get_clock_id() -> Option<[u8; 8]> {
    for entry in std::fs::read_dir("/sys/class/net").ok()? {
        let entry = entry.ok()?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
        let Some(mac) = read_mac(&name) else { continue };
        if mac[0] & 0x3 == 0 && mac.iter().any(|x| *x != 0) {
            return Some(gptp_core::datastructures::common::ClockIdentity::from_mac_address(mac).0);
        }
    }
    None
}

fn mac_for_interface(interface: InterfaceName) -> Option<[u8; 8]> {
    let mac = read_mac(interface.as_str())?;
    Some(gptp_core::datastructures::common::ClockIdentity::from_mac_address(mac).0)
}

pub fn link_info_for(port: &LinuxNetworkPort) -> LinkInfo {
    LinkInfo { link_speed_mbps: 1000, full_duplex: true, port_identity: port.port_id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_header_reads_message_type_and_domain() {
        let mut buf = [0u8; 34];
        buf[0] = 0x10 | 0x0b; // Announce
        buf[4] = 3;
        let (message_type, domain) = peek_header(&buf).unwrap();
        assert_eq!(message_type, MessageType::Announce);
        assert_eq!(domain, 3);
    }

    #[test]
    fn peek_header_rejects_short_buffers() {
        assert!(peek_header(&[0u8; 2]).is_none());
    }
}
