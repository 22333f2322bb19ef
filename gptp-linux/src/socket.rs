#![forbid(unsafe_code)]

//! The single Ethernet multicast socket gPTP runs over. Unlike generic
//! PTP, which splits event/general traffic across separate UDP ports and
//! multicast groups, 802.1AS uses one Ethertype and one destination MAC for
//! every message on a port; CMLDS domain multiplexing is carried in the
//! header's `majorSdoId`/`domainNumber` fields, not in the address.

use timestamped_socket::interface::InterfaceName;
use timestamped_socket::networkaddress::{EthernetAddress, MacAddress};
use timestamped_socket::socket::{open_interface_ethernet, InterfaceTimestampMode, Open, Socket};

const PTP_ETHERTYPE: u16 = 0x88f7;
const GPTP_MULTICAST: MacAddress = MacAddress::new([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

pub const GPTP_ADDRESS: EthernetAddress = EthernetAddress::new(PTP_ETHERTYPE, GPTP_MULTICAST, 0);

pub fn open_gptp_socket(
    interface: InterfaceName,
    timestamping: InterfaceTimestampMode,
    bind_phc: Option<u32>,
) -> std::io::Result<Socket<EthernetAddress, Open>> {
    let socket = open_interface_ethernet(interface, PTP_ETHERTYPE, timestamping, bind_phc)?;
    socket.join_multicast(GPTP_ADDRESS, interface)?;
    Ok(socket)
}
