//! Interval-setting machines: apply a `MessageIntervalRequest` TLV's sentinel
//! values to a port's `currentLogSyncInterval` / `currentLogAnnounceInterval`
//! / `currentLogPdelayReqInterval` (IEEE 802.1AS-2020 clause 10.3.15.2,
//! 11.5.2.3). One instance per interval kind per port; all three share the
//! same sentinel semantics, so a single generic machine covers them.

use crate::datastructures::messages::tlv::IntervalRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Stopped,
    Running,
}

pub struct IntervalSettingMachine {
    initial_log_interval: i8,
    current_log_interval: i8,
    kind: MessageKind,
    /// `useMgtSettableLogSyncInterval` and siblings: whether a management /
    /// Signaling request is even allowed to change this interval. Defaults
    /// off; see the crate's grounding ledger for the deliberate deviation
    /// from the standard's default.
    settable: bool,
}

impl IntervalSettingMachine {
    pub fn new(initial_log_interval: i8, settable: bool) -> Self {
        Self {
            initial_log_interval,
            current_log_interval: initial_log_interval,
            kind: MessageKind::Running,
            settable,
        }
    }

    pub fn current_log_interval(&self) -> i8 {
        self.current_log_interval
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.kind, MessageKind::Stopped)
    }

    /// Apply a requested interval, consuming the TLV's sentinel values.
    /// Returns `true` if this changed anything observable (interval value
    /// or running/stopped kind).
    pub fn apply(&mut self, requested: i8) -> bool {
        if !self.settable {
            return false;
        }
        match IntervalRequest::from_wire(requested) {
            IntervalRequest::NoChange => false,
            IntervalRequest::RestoreInitial => {
                let changed =
                    self.current_log_interval != self.initial_log_interval || self.is_stopped();
                self.current_log_interval = self.initial_log_interval;
                self.kind = MessageKind::Running;
                changed
            }
            IntervalRequest::Stop => {
                let changed = !self.is_stopped();
                self.kind = MessageKind::Stopped;
                changed
            }
            IntervalRequest::Set(value) => {
                let changed = self.current_log_interval != value || self.is_stopped();
                self.current_log_interval = value;
                self.kind = MessageKind::Running;
                changed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_change_sentinel_leaves_interval_untouched() {
        let mut m = IntervalSettingMachine::new(-3, true);
        assert!(!m.apply(IntervalRequest::NO_CHANGE));
        assert_eq!(m.current_log_interval(), -3);
    }

    #[test]
    fn stop_sentinel_stops_the_message() {
        let mut m = IntervalSettingMachine::new(-3, true);
        assert!(m.apply(IntervalRequest::STOP));
        assert!(m.is_stopped());
    }

    #[test]
    fn restore_initial_reverts_after_a_set() {
        let mut m = IntervalSettingMachine::new(-3, true);
        m.apply(-4);
        assert_eq!(m.current_log_interval(), -4);
        m.apply(IntervalRequest::RESTORE_INITIAL);
        assert_eq!(m.current_log_interval(), -3);
        assert!(!m.is_stopped());
    }

    #[test]
    fn unsettable_interval_ignores_requests() {
        let mut m = IntervalSettingMachine::new(-3, false);
        assert!(!m.apply(-4));
        assert_eq!(m.current_log_interval(), -3);
    }
}
