//! `MDPdelayReq`: the per-port peer-delay initiator state machine
//! (IEEE 802.1AS-2020 clause 11.2.13). Measures `neighborPropDelay` and
//! `neighborRateRatio` against the directly connected peer, independent of
//! any domain's BMCA state.

use crate::time::{Duration, Time};

/// `allowedLostResponses`: a port drops `asCapable` after this many
/// consecutive PdelayReq exchanges without a matching response.
pub const ALLOWED_LOST_RESPONSES: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotEnabled,
    InitialSendPdelayReq,
    Reset,
    SendPdelayReq,
    WaitingForPdelayResp,
    WaitingForPdelayRespFollowUp,
    WaitingForPdelayIntervalTimer,
}

#[derive(Debug, Clone, Copy)]
pub enum Event {
    PortEnabled,
    PortDisabled,
    /// The interval timer expired; time to send (or re-send) a request.
    IntervalElapsed,
    /// Transmit timestamp for the most recently sent request became
    /// available (`t1`).
    RequestTxTimestamp { t1: Time },
    PdelayRespReceived {
        sequence_id: u16,
        /// `t2`: the peer's receipt time of our request, from the message body.
        request_receipt_timestamp: Time,
        /// `t4`: our local hardware receive timestamp of this response.
        rx_timestamp: Time,
        requesting_port_number: u16,
        from_self: bool,
    },
    PdelayRespFollowUpReceived {
        sequence_id: u16,
        response_origin_timestamp: Time,
        requesting_port_number: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output {
    SendPdelayReq { sequence_id: u16 },
    PropTimeUpdated { prop_delay: Duration, rate_ratio: f64 },
    AsCapableChanged(bool),
}

/// Cached two-way exchange timestamps used for the rate-ratio candidate
/// computed between this exchange and the previous one.
#[derive(Debug, Clone, Copy, Default)]
struct Exchange {
    t1: Option<Time>,
    t2: Option<Time>,
    t3: Option<Time>,
    t4: Option<Time>,
}

pub struct PdelayReqMachine {
    state: State,
    own_port_number: u16,
    sequence_id: u16,
    lost_responses: u8,
    as_capable: bool,
    current: Exchange,
    previous: Exchange,
    neighbor_rate_ratio: f64,
    neighbor_prop_delay: Duration,
    neighbor_prop_delay_thresh: Duration,
    interval: Duration,
}

impl PdelayReqMachine {
    pub fn new(own_port_number: u16, interval: Duration, neighbor_prop_delay_thresh: Duration) -> Self {
        Self {
            state: State::NotEnabled,
            own_port_number,
            sequence_id: 0,
            lost_responses: 0,
            as_capable: false,
            current: Exchange::default(),
            previous: Exchange::default(),
            neighbor_rate_ratio: 1.0,
            neighbor_prop_delay: Duration::ZERO,
            neighbor_prop_delay_thresh,
            interval,
        }
    }

    pub fn as_capable(&self) -> bool {
        self.as_capable
    }

    pub fn neighbor_prop_delay(&self) -> Duration {
        self.neighbor_prop_delay
    }

    pub fn neighbor_rate_ratio(&self) -> f64 {
        self.neighbor_rate_ratio
    }

    fn set_as_capable(&mut self, value: bool, out: &mut arrayvec::ArrayVec<Output, 4>) {
        if self.as_capable != value {
            self.as_capable = value;
            let _ = out.try_push(Output::AsCapableChanged(value));
        }
    }

    pub fn step(&mut self, event: Event) -> arrayvec::ArrayVec<Output, 4> {
        let mut out = arrayvec::ArrayVec::new();
        match event {
            Event::PortDisabled => {
                self.state = State::NotEnabled;
                self.lost_responses = 0;
                self.set_as_capable(false, &mut out);
            }
            Event::PortEnabled => {
                self.state = State::InitialSendPdelayReq;
                self.lost_responses = 0;
            }
            Event::IntervalElapsed => match self.state {
                State::NotEnabled => {}
                State::InitialSendPdelayReq | State::SendPdelayReq | State::WaitingForPdelayIntervalTimer => {
                    self.sequence_id = self.sequence_id.wrapping_add(1);
                    self.current = Exchange::default();
                    self.state = State::WaitingForPdelayResp;
                    let _ = out.try_push(Output::SendPdelayReq {
                        sequence_id: self.sequence_id,
                    });
                }
                State::WaitingForPdelayResp | State::WaitingForPdelayRespFollowUp => {
                    // No response arrived before the next interval: count a
                    // lost response and retry with a fresh sequence id.
                    self.lost_responses = self.lost_responses.saturating_add(1);
                    if self.lost_responses > ALLOWED_LOST_RESPONSES {
                        self.set_as_capable(false, &mut out);
                    }
                    self.state = State::Reset;
                    self.sequence_id = self.sequence_id.wrapping_add(1);
                    self.current = Exchange::default();
                    self.state = State::WaitingForPdelayResp;
                    let _ = out.try_push(Output::SendPdelayReq {
                        sequence_id: self.sequence_id,
                    });
                }
                State::Reset => {}
            },
            Event::RequestTxTimestamp { t1 } => {
                self.current.t1 = Some(t1);
            }
            Event::PdelayRespReceived {
                sequence_id,
                request_receipt_timestamp,
                rx_timestamp,
                requesting_port_number,
                from_self,
            } => {
                if from_self || requesting_port_number != self.own_port_number {
                    // A PdelayReq answering our own request reflected back,
                    // or addressed to a different port: ignore.
                    return out;
                }
                if sequence_id != self.sequence_id || !matches!(self.state, State::WaitingForPdelayResp) {
                    return out;
                }
                self.current.t2 = Some(request_receipt_timestamp);
                self.current.t4 = Some(rx_timestamp);
                self.state = State::WaitingForPdelayRespFollowUp;
            }
            Event::PdelayRespFollowUpReceived {
                sequence_id,
                response_origin_timestamp,
                requesting_port_number,
            } => {
                if requesting_port_number != self.own_port_number
                    || sequence_id != self.sequence_id
                    || !matches!(self.state, State::WaitingForPdelayRespFollowUp)
                {
                    return out;
                }
                self.current.t3 = Some(response_origin_timestamp);
                self.lost_responses = 0;
                self.finish_exchange(&mut out);
                self.state = State::WaitingForPdelayIntervalTimer;
            }
        }
        out
    }

    fn finish_exchange(&mut self, out: &mut arrayvec::ArrayVec<Output, 4>) {
        let (Some(t1), Some(t2), Some(t3), Some(t4)) =
            (self.current.t1, self.current.t2, self.current.t3, self.current.t4)
        else {
            return;
        };

        if let (Some(pt1), Some(pt4)) = (self.previous.t1, self.previous.t4) {
            let span = t1 - pt1;
            if span.nanos() >= 1_000_000_000 {
                if let (Some(pt2), Some(_pt3)) = (self.previous.t2, self.previous.t3) {
                    let t2_span = t2 - pt2;
                    let skew = (t2_span - span).abs();
                    if skew.nanos() < 100_000_000 {
                        let raw_ratio = (t4 - pt4).as_f64_nanos() / span.as_f64_nanos();
                        self.neighbor_rate_ratio = raw_ratio;
                    }
                }
            }
        }

        let prop_time = ((t4 - t1) - (t3 - t2)).scale(self.neighbor_rate_ratio) / 2;
        self.neighbor_prop_delay = prop_time.clamp(Duration::ZERO, Duration::from_nanos(i128::MAX));
        self.previous = self.current;

        let _ = out.try_push(Output::PropTimeUpdated {
            prop_delay: self.neighbor_prop_delay,
            rate_ratio: self.neighbor_rate_ratio,
        });

        self.set_as_capable(self.neighbor_prop_delay < self.neighbor_prop_delay_thresh, out);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> PdelayReqMachine {
        PdelayReqMachine::new(1, Duration::from_log_interval(0), Duration::from_nanos(40_000))
    }

    #[test]
    fn symmetric_link_yields_zero_prop_time() {
        let mut m = machine();
        m.step(Event::PortEnabled);
        m.step(Event::IntervalElapsed);
        m.step(Event::RequestTxTimestamp {
            t1: Time::from_fixed_nanos(1_000_000_000),
        });
        m.step(Event::PdelayRespReceived {
            sequence_id: 1,
            request_receipt_timestamp: Time::from_fixed_nanos(1_000_100_000),
            rx_timestamp: Time::from_fixed_nanos(1_000_200_000),
            requesting_port_number: 1,
            from_self: false,
        });
        let out = m.step(Event::PdelayRespFollowUpReceived {
            sequence_id: 1,
            response_origin_timestamp: Time::from_fixed_nanos(1_000_100_000),
            requesting_port_number: 1,
        });
        assert!(out
            .iter()
            .any(|o| matches!(o, Output::PropTimeUpdated { prop_delay, .. } if prop_delay.nanos() == 0)));
    }

    #[test]
    fn large_prop_delay_clears_as_capable() {
        let mut m = PdelayReqMachine::new(1, Duration::from_log_interval(0), Duration::from_nanos(1));
        m.step(Event::PortEnabled);
        m.step(Event::IntervalElapsed);
        m.step(Event::RequestTxTimestamp {
            t1: Time::from_fixed_nanos(1_000_000_000),
        });
        m.step(Event::PdelayRespReceived {
            sequence_id: 1,
            request_receipt_timestamp: Time::from_fixed_nanos(1_000_100_000),
            rx_timestamp: Time::from_fixed_nanos(1_000_200_000),
            requesting_port_number: 1,
            from_self: false,
        });
        m.step(Event::PdelayRespFollowUpReceived {
            sequence_id: 1,
            response_origin_timestamp: Time::from_fixed_nanos(1_000_100_000),
            requesting_port_number: 1,
        });
        assert!(!m.as_capable());
    }

    #[test]
    fn lost_responses_past_threshold_clear_as_capable() {
        let mut m = machine();
        m.step(Event::PortEnabled);
        for _ in 0..(ALLOWED_LOST_RESPONSES as u32 + 2) {
            m.step(Event::IntervalElapsed);
        }
        assert!(!m.as_capable());
    }

    #[test]
    fn response_to_different_port_is_ignored() {
        let mut m = machine();
        m.step(Event::PortEnabled);
        m.step(Event::IntervalElapsed);
        let out = m.step(Event::PdelayRespReceived {
            sequence_id: 1,
            request_receipt_timestamp: Time::from_fixed_nanos(0),
            rx_timestamp: Time::from_fixed_nanos(0),
            requesting_port_number: 2,
            from_self: false,
        });
        assert!(out.is_empty());
    }
}
