//! `GptpCapableTransmit` / `GptpCapableReceive`: advertise and track
//! whether a port's peer speaks gPTP, for ports shared with plain PTPv2
//! devices (IEEE 802.1AS-2020 clause 11.5.3/11.5.4).

use crate::time::{Duration, Time};

pub struct GptpCapableTransmit {
    interval: Duration,
    next_deadline: Option<Time>,
}

impl GptpCapableTransmit {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: None,
        }
    }

    pub fn port_enabled(&mut self, now: Time) {
        self.next_deadline = Some(now + self.interval);
    }

    pub fn port_disabled(&mut self) {
        self.next_deadline = None;
    }

    pub fn tick(&mut self, now: Time) -> bool {
        let Some(deadline) = self.next_deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.next_deadline = Some(now + self.interval);
        true
    }
}

/// Tracks `neighborGptpCapable`: cleared if no GptpCapable advertisement (or
/// any gPTP message) arrives within the receipt timeout.
pub struct GptpCapableReceive {
    receipt_timeout: Duration,
    deadline: Option<Time>,
    neighbor_gptp_capable: bool,
}

impl GptpCapableReceive {
    pub fn new(receipt_timeout: Duration) -> Self {
        Self {
            receipt_timeout,
            deadline: None,
            neighbor_gptp_capable: false,
        }
    }

    pub fn neighbor_gptp_capable(&self) -> bool {
        self.neighbor_gptp_capable
    }

    pub fn message_received(&mut self, now: Time) {
        self.deadline = Some(now + self.receipt_timeout);
        self.neighbor_gptp_capable = true;
    }

    pub fn tick(&mut self, now: Time) {
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.neighbor_gptp_capable = false;
                self.deadline = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_times_out_without_refresh() {
        let mut m = GptpCapableReceive::new(Duration::from_nanos(1_000_000_000));
        m.message_received(Time::from_fixed_nanos(0));
        assert!(m.neighbor_gptp_capable());
        m.tick(Time::from_fixed_nanos(2_000_000_000));
        assert!(!m.neighbor_gptp_capable());
    }

    #[test]
    fn transmit_paces_at_interval() {
        let mut m = GptpCapableTransmit::new(Duration::from_log_interval(0));
        m.port_enabled(Time::from_fixed_nanos(0));
        assert!(!m.tick(Time::from_fixed_nanos(500_000_000)));
        assert!(m.tick(Time::from_fixed_nanos(1_000_000_000)));
    }
}
