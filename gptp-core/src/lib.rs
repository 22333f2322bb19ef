#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

use core::fmt::Display;

pub mod bmc;
pub mod clock;
pub mod config;
pub mod datastructures;
pub mod domain;
pub mod error;
mod float_polyfill;
pub mod filters;
pub mod md;
pub mod network;
pub mod orchestrator;
pub mod time;

/// The selected state of a port within one domain, per the `selectedState`
/// global `PortStateSelection` (C5) maintains. Port index 0 is the "system
/// port" representing `thisClock` itself, and is `Slave` exactly when no
/// external port is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Disabled,
    Master,
    Passive,
    Slave,
}

impl Display for PortState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PortState::Disabled => write!(f, "Disabled"),
            PortState::Master => write!(f, "Master"),
            PortState::Passive => write!(f, "Passive"),
            PortState::Slave => write!(f, "Slave"),
        }
    }
}

/// Notice-worthy changes raised by the engine, surfaced to IPC per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SelectedStateChanged {
        domain_number: u8,
        port_index: u16,
        state: PortState,
    },
    GmChanged {
        domain_number: u8,
    },
    GmSyncChanged {
        domain_number: u8,
        synced: bool,
    },
    AsCapableChanged {
        port_index: u16,
        as_capable: bool,
    },
    NetDevUp {
        port_index: u16,
    },
    NetDevDown {
        port_index: u16,
    },
    ActiveDomainChanged {
        domain_number: u8,
    },
}

impl Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Event::SelectedStateChanged {
                domain_number,
                port_index,
                state,
            } => write!(
                f,
                "domain {domain_number} port {port_index} selectedState -> {state}"
            ),
            Event::GmChanged { domain_number } => write!(f, "domain {domain_number} GM changed"),
            Event::GmSyncChanged {
                domain_number,
                synced,
            } => write!(f, "domain {domain_number} GM sync -> {synced}"),
            Event::AsCapableChanged {
                port_index,
                as_capable,
            } => write!(f, "port {port_index} asCapable -> {as_capable}"),
            Event::NetDevUp { port_index } => write!(f, "port {port_index} netdev up"),
            Event::NetDevDown { port_index } => write!(f, "port {port_index} netdev down"),
            Event::ActiveDomainChanged { domain_number } => {
                write!(f, "active domain -> {domain_number}")
            }
        }
    }
}
