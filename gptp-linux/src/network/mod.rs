mod linux;

pub use linux::{get_clock_id, LinuxNetworkPort, LinuxNetworkRuntime, PortSetup};
