//! The IPC notice/request service: a Unix datagram socket external
//! monitors query state on demand and receive change notifications
//! through, patterned after `gptpipc.c`'s five response shapes.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::net::UnixDatagram;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcCommand {
    GetNotice,
    GetNdPortD,
    GetGPortD,
    GetClockD,
    GetStatsD,
    GetStatTd,
    InjectAbnormalEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub cmd: IpcCommand,
    pub domain_number: u8,
    pub domain_index: u8,
    pub port_index: u16,
    #[serde(default)]
    pub abnormal_event: Option<AbnormalEventPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbnormalEventPayload {
    pub message_type: u8,
    pub action: AbnormalAction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbnormalAction {
    Drop,
    Duplicate,
    Corrupt,
}

/// Notification flags, one bit per kind per spec.md §6: netdev up/down,
/// phase/freq update, GM sync/unsync/change, asCapable up/down,
/// active-domain change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoticeFlags(pub u32);

impl NoticeFlags {
    pub const NETDEV_UP: u32 = 1 << 0;
    pub const NETDEV_DOWN: u32 = 1 << 1;
    pub const PHASE_UPDATE: u32 = 1 << 2;
    pub const FREQ_UPDATE: u32 = 1 << 3;
    pub const GM_SYNC: u32 = 1 << 4;
    pub const GM_UNSYNC: u32 = 1 << 5;
    pub const GM_CHANGE: u32 = 1 << 6;
    pub const AS_CAPABLE_UP: u32 = 1 << 7;
    pub const AS_CAPABLE_DOWN: u32 = 1 << 8;
    pub const ACTIVE_DOMAIN_CHANGE: u32 = 1 << 9;

    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeInfo {
    pub flags: NoticeFlags,
    pub domain_number: u8,
    pub grandmaster_identity: [u8; 8],
    pub grandmaster_priority1: u8,
    pub grandmaster_priority2: u8,
    pub steps_removed: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdPortDInfo {
    pub port_index: u16,
    pub link_speed_mbps: u32,
    pub full_duplex: bool,
    pub port_identity: [u8; 8],
    pub ptpdev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GPortDInfo {
    pub port_index: u16,
    pub domain_number: u8,
    pub as_capable: bool,
    pub selected_state: String,
    pub path_trace: Vec<[u8; 8]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockDInfo {
    pub domain_number: u8,
    pub clock_index: u8,
    pub gmsync: bool,
    pub gmchange_ind: i32,
    pub offset64: i64,
    pub adjrate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsDInfo {
    pub port_index: u16,
    pub sync_rx: u64,
    pub sync_tx: u64,
    pub announce_rx: u64,
    pub announce_tx: u64,
    pub pdelay_rx: u64,
    pub pdelay_tx: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatTdInfo {
    pub port_index: u16,
    pub malformed_rx: u64,
    pub out_of_sequence_rx: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcResponse {
    Notice(NoticeInfo),
    NdPortD(NdPortDInfo),
    GPortD(GPortDInfo),
    ClockD(ClockDInfo),
    StatsD(StatsDInfo),
    StatTd(StatTdInfo),
}

/// The daemon's side of the socket: binds and loosens permissions the same
/// way the old state observer did (root-owned process, non-root readers),
/// then offers non-blocking send/receive so the cooperative main loop can
/// poll it alongside the network runtime.
pub struct IpcService {
    socket: UnixDatagram,
}

impl IpcService {
    pub fn bind(path: &Path, permissions: u32) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let socket = UnixDatagram::bind(path)?;
        std::fs::set_permissions(path, Permissions::from_mode(permissions))?;
        Ok(Self { socket })
    }

    /// Drains one pending request, if any, without blocking the caller.
    pub fn try_recv(&self) -> Option<(IpcRequest, tokio::net::unix::SocketAddr)> {
        let mut buf = [0u8; 512];
        match self.socket.try_recv_from(&mut buf) {
            Ok((len, addr)) => serde_json::from_slice(&buf[..len]).ok().map(|req| (req, addr)),
            Err(_) => None,
        }
    }

    pub fn try_reply(&self, addr: &tokio::net::unix::SocketAddr, response: &IpcResponse) {
        if let Ok(bytes) = serde_json::to_vec(response) {
            if let Some(path) = addr.as_pathname() {
                let _ = self.socket.try_send_to(&bytes, path);
            }
        }
    }

    /// Fans a notice out to every address that has queried us at least
    /// once; unlike a request/response pair this has no single recipient,
    /// so callers hand in whichever peer addresses they have retained.
    pub fn broadcast_notice(&self, peers: &[tokio::net::unix::SocketAddr], notice: &NoticeInfo) {
        let Ok(bytes) = serde_json::to_vec(&IpcResponse::Notice(notice.clone())) else { return };
        for peer in peers {
            if let Some(path) = peer.as_pathname() {
                let _ = self.socket.try_send_to(&bytes, path);
            }
        }
    }
}
