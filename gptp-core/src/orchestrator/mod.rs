//! C8: the single-threaded cooperative event loop tying every other module
//! together. `Orchestrator::handle_event` is the only entry point a caller
//! (`gptp-linux`'s daemon loop) needs: it dispatches one
//! [`crate::network::Event`] at a time — RECV, TXTS, DEVUP, DEVDOWN, or
//! TIMEOUT — stepping whichever `md`/`bmc`/`domain` state machines that
//! event concerns, then sends whatever those machines asked for.
//!
//! Every handler below follows the same two-phase shape to satisfy the
//! borrow checker without ever touching the network mid-iteration: phase
//! one walks `ports`/`domains` with `iter_mut()`, collecting the messages
//! those machines want sent into a [`WireAction`] buffer; phase two
//! (`perform_actions`) walks that buffer afterwards, once the iteration
//! borrows have ended, and is the only place allowed to call
//! [`Orchestrator::transmit`].

mod port;
mod wire_action;

pub use port::{DomainRuntime, PortDomainState, PortRuntime};
pub use wire_action::WireAction;

use crate::bmc::PortCandidate;
use crate::clock::{Clock, ClockRegistry};
use crate::config::{DomainConfig, InstanceConfig, PortConfig};
use crate::datastructures::common::{
    ClockIdentity, PortIdentity, PriorityVector, RootSystemIdentity, ScaledNs, TimeSource, Timestamp,
};
use crate::datastructures::messages::tlv::{FollowUpInformation, GptpCapableTlv, PathTrace};
use crate::datastructures::messages::{
    AnnounceMessage, FollowUpMessage, Header, HeaderFlags, Message, MessageBody, MessageType,
    PDelayReqMessage, PDelayRespFollowUpMessage, PDelayRespMessage, SignalingMessage, SyncMessage,
    MAJOR_SDO_ID_CMLDS, MAJOR_SDO_ID_INSTANCE,
};
use crate::domain::{ClockSlaveSync, ClockSourceSample};
use crate::error::{GptpError, Result};
use crate::md::{announce, pdelay_req, pdelay_resp, signaling, sync_receive, sync_send};
use crate::network::{self, NetworkPort, NetworkRuntime, TxTimestampTracker};
use crate::time::{Duration, Time};

const MAX_PORTS: usize = 8;
const MAX_DOMAINS: usize = 4;
const MAX_ACTIONS: usize = 64;

type ActionBuf = arrayvec::ArrayVec<WireAction, MAX_ACTIONS>;

/// The engine's top-level handle: every port and domain this time-aware
/// system carries, plus the clocks they discipline.
pub struct Orchestrator<C: Clock> {
    instance: InstanceConfig,
    /// This node's domain-0 clock identity; per-domain identities are
    /// derived from it with [`ClockIdentity::for_domain`] as needed.
    this_clock_identity: ClockIdentity,
    clocks: ClockRegistry<C>,
    ports: arrayvec::ArrayVec<PortRuntime, MAX_PORTS>,
    domains: arrayvec::ArrayVec<DomainRuntime, MAX_DOMAINS>,
    tx_tracker: TxTimestampTracker,
    notices: arrayvec::ArrayVec<crate::Event, 64>,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(instance: InstanceConfig) -> Self {
        Self {
            this_clock_identity: instance.clock_identity,
            instance,
            clocks: ClockRegistry::new(),
            ports: arrayvec::ArrayVec::new(),
            domains: arrayvec::ArrayVec::new(),
            tx_tracker: TxTimestampTracker::new(),
            notices: arrayvec::ArrayVec::new(),
        }
    }

    /// Register a physical port, open (but disabled) on every domain
    /// already added. Call [`Orchestrator::port_up`] once the link is
    /// actually operational.
    pub fn add_port(&mut self, config: PortConfig) -> Result<()> {
        let mut port = PortRuntime::new(config);
        for domain in self.domains.iter() {
            port.domains
                .try_push(PortDomainState::new(domain.config, config, self.this_clock_identity))
                .map_err(|_| GptpError::Configuration("too many domains for this port"))?;
        }
        self.ports
            .try_push(port)
            .map_err(|_| GptpError::Configuration("port table full"))
    }

    /// Register a clock domain, owning `clock` as its `thisClock` entity.
    /// `device_writable` picks `SlaveMain` vs `SlaveSub` mode, per
    /// [`ClockRegistry::set_this_clock`].
    pub fn add_domain(&mut self, config: DomainConfig, clock: C, device_writable: bool) -> Result<()> {
        let clock_index = (self.domains.len() as u8) + 1;
        self.clocks.add_clock(clock_index, config.domain_number, clock, Duration::ZERO)?;
        self.clocks.set_this_clock(clock_index, config.domain_number, device_writable)?;

        let clock_identity = self.this_clock_identity.for_domain(config.domain_number);
        let own_priority_vector = PriorityVector::for_own_clock(
            config.priority1,
            self.instance.clock_quality,
            config.priority2,
            clock_identity,
            PortIdentity::CLOCK_MASTER_PORT,
        );
        self.domains
            .try_push(DomainRuntime::new(config, clock_index, own_priority_vector))
            .map_err(|_| GptpError::Configuration("domain table full"))?;

        for port in self.ports.iter_mut() {
            let _ = port.domains.try_push(PortDomainState::new(config, port.config, self.this_clock_identity));
        }
        Ok(())
    }

    /// Notices accumulated since the last call, for the caller to forward
    /// to IPC subscribers.
    pub fn drain_notices(&mut self) -> arrayvec::ArrayVec<crate::Event, 64> {
        core::mem::take(&mut self.notices)
    }

    /// The public clock state C1's shared-memory view and the `CLOCKD` IPC
    /// response publish for `domain_number`.
    pub fn clock_snapshot(&self, domain_number: u8) -> Result<crate::clock::ClockSnapshot> {
        let domain = self
            .domains
            .iter()
            .find(|d| d.domain_number == domain_number)
            .ok_or(GptpError::Configuration("unknown domain"))?;
        self.clocks.snapshot(domain.clock_index, domain_number)
    }

    /// Every domain number currently registered, in registration order.
    pub fn domain_numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.domains.iter().map(|d| d.domain_number)
    }

    pub fn port_up(&mut self, port_index: u16, now: Time) -> Result<()> {
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Err(GptpError::Configuration("unknown port"));
        };
        port.enabled = true;
        port.pdelay_deadline = Some(now + port.pdelay_req.interval());
        let _ = port.pdelay_req.step(pdelay_req::Event::PortEnabled);
        let _ = port.pdelay_resp.step(pdelay_resp::Event::PortEnabled);
        port.gptp_capable_tx.port_enabled(now);
        for dom_state in port.domains.iter_mut() {
            dom_state.announce_info.port_enabled(now);
            dom_state.announce_transmit.port_enabled(now);
            // Two-step Sync only: one-step transmission isn't negotiated by
            // this engine yet (see DESIGN.md).
            let _ = dom_state.sync_send.step(sync_send::Event::PortEnabled { one_step: false });
        }
        Ok(())
    }

    pub fn port_down(&mut self, port_index: u16) -> Result<()> {
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Err(GptpError::Configuration("unknown port"));
        };
        port.enabled = false;
        port.pdelay_deadline = None;
        let _ = port.pdelay_req.step(pdelay_req::Event::PortDisabled);
        let _ = port.pdelay_resp.step(pdelay_resp::Event::PortDisabled);
        port.gptp_capable_tx.port_disabled();
        for dom_state in port.domains.iter_mut() {
            dom_state.announce_info.port_disabled();
            dom_state.announce_transmit.port_disabled();
            let _ = dom_state.sync_send.step(sync_send::Event::PortDisabled);
        }
        Ok(())
    }

    /// Dispatch one event off the unified [`network::Event`] stream.
    /// `now` is used only for [`network::Event::Timeout`]; `Recv` and
    /// `TxTimestamp` carry their own timestamp and that is used instead,
    /// so that processing always runs against the instant the hardware
    /// actually observed rather than the instant this call happened to run.
    pub fn handle_event<N: NetworkRuntime>(&mut self, net: &mut N, event: network::Event, now: Time) -> Result<()> {
        match event {
            network::Event::Recv { port_index, buffer, rx_time, .. } => {
                self.handle_recv(net, port_index, &buffer, rx_time)
            }
            network::Event::TxTimestamp { port_index, message_type, sequence_id, domain_number, tx_time } => {
                let mut actions = ActionBuf::new();
                self.apply_tx_timestamp(port_index, message_type, sequence_id, domain_number, tx_time, &mut actions);
                self.perform_actions(net, actions, tx_time)
            }
            network::Event::DevUp { port_index, .. } => {
                let _ = self.notices.try_push(crate::Event::NetDevUp { port_index });
                Ok(())
            }
            network::Event::DevDown { port_index } => {
                self.port_down(port_index)?;
                let _ = self.notices.try_push(crate::Event::NetDevDown { port_index });
                Ok(())
            }
            network::Event::Timeout => self.handle_timeout(net, now),
        }
    }

    fn handle_recv<N: NetworkRuntime>(&mut self, net: &mut N, port_index: u16, buffer: &[u8], rx_time: Time) -> Result<()> {
        let message = Message::deserialize(buffer).map_err(|_| GptpError::TransientMessage("malformed message"))?;
        let header = message.header;
        let mut actions = ActionBuf::new();

        match message.body {
            MessageBody::PDelayReq(_) => self.handle_pdelay_req(port_index, &header, rx_time, &mut actions)?,
            MessageBody::PDelayResp(body) => self.handle_pdelay_resp(port_index, &header, body, rx_time, &mut actions)?,
            MessageBody::PDelayRespFollowUp(body) => self.handle_pdelay_resp_follow_up(port_index, &header, body, &mut actions)?,
            MessageBody::Sync(body) => self.handle_sync(port_index, &header, body, rx_time, &mut actions)?,
            MessageBody::FollowUp(body) => self.handle_follow_up(port_index, &header, body, rx_time, &mut actions)?,
            MessageBody::Announce(body) => self.handle_announce(port_index, &header, body, rx_time)?,
            MessageBody::Signaling(body) => self.handle_signaling(port_index, &header, body, rx_time)?,
        }

        self.perform_actions(net, actions, rx_time)
    }

    fn handle_pdelay_req(&mut self, port_index: u16, header: &Header, now: Time, actions: &mut ActionBuf) -> Result<()> {
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let is_cmlds = header.is_cmlds();
        for out in port.pdelay_resp.step(pdelay_resp::Event::PdelayReqReceived {
            sequence_id: header.sequence_id,
            requesting_port_identity: header.source_port_identity,
            rx_timestamp: now,
            is_cmlds,
        }) {
            push_pdelay_resp_output(port_index, out, actions);
        }
        Ok(())
    }

    fn handle_pdelay_resp(
        &mut self,
        port_index: u16,
        header: &Header,
        body: PDelayRespMessage,
        now: Time,
        actions: &mut ActionBuf,
    ) -> Result<()> {
        let own_identity = self.port_identity_cmlds(port_index);
        let from_self = header.source_port_identity == own_identity;
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        for out in port.pdelay_req.step(pdelay_req::Event::PdelayRespReceived {
            sequence_id: header.sequence_id,
            request_receipt_timestamp: Time::from(body.request_receipt_timestamp),
            rx_timestamp: now,
            requesting_port_number: body.requesting_port_identity.port_number,
            from_self,
        }) {
            push_pdelay_req_output(port_index, out, actions);
            self.notice_as_capable(port_index, &out);
        }
        Ok(())
    }

    fn handle_pdelay_resp_follow_up(
        &mut self,
        port_index: u16,
        header: &Header,
        body: PDelayRespFollowUpMessage,
        actions: &mut ActionBuf,
    ) -> Result<()> {
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        for out in port.pdelay_req.step(pdelay_req::Event::PdelayRespFollowUpReceived {
            sequence_id: header.sequence_id,
            response_origin_timestamp: Time::from(body.response_origin_timestamp),
            requesting_port_number: body.requesting_port_identity.port_number,
        }) {
            push_pdelay_req_output(port_index, out, actions);
            self.notice_as_capable(port_index, &out);
        }
        Ok(())
    }

    fn notice_as_capable(&mut self, port_index: u16, out: &pdelay_req::Output) {
        if let pdelay_req::Output::AsCapableChanged(as_capable) = *out {
            let _ = self.notices.try_push(crate::Event::AsCapableChanged { port_index, as_capable });
        }
    }

    fn handle_sync(
        &mut self,
        port_index: u16,
        header: &Header,
        body: SyncMessage,
        now: Time,
        actions: &mut ActionBuf,
    ) -> Result<()> {
        let domain_number = header.domain_number;
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain_mut(domain_number) else {
            return Ok(());
        };
        let _ = dom_state
            .sync_receive
            .step(sync_receive::Event::SyncReceived { sequence_id: header.sequence_id, rx_timestamp: now });
        // gPTP always runs two-step Sync; a one-step Sync carries its
        // correction and origin timestamp directly, so we synthesize the
        // FollowUp this engine's `MDSyncReceive` would otherwise wait for.
        let record = if header.flags.two_step {
            None
        } else {
            dom_state.sync_receive.step(sync_receive::Event::FollowUpReceived {
                sequence_id: header.sequence_id,
                precise_origin_timestamp: Time::from(body.origin_timestamp),
                correction_field: correction_to_duration(header.correction_field),
                cumulative_scaled_rate_offset: 0,
                gm_time_base_indicator: 0,
                last_gm_phase_change: ScaledNs(0),
                scaled_last_gm_freq_change: 0,
            })
        };
        if let Some(record) = record {
            self.sync_record_ready(port_index, domain_number, record, now, actions);
        }
        Ok(())
    }

    fn handle_follow_up(
        &mut self,
        port_index: u16,
        header: &Header,
        body: FollowUpMessage,
        now: Time,
        actions: &mut ActionBuf,
    ) -> Result<()> {
        let domain_number = header.domain_number;
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain_mut(domain_number) else {
            return Ok(());
        };
        let info = body.follow_up_information;
        let record = dom_state.sync_receive.step(sync_receive::Event::FollowUpReceived {
            sequence_id: header.sequence_id,
            precise_origin_timestamp: Time::from(body.precise_origin_timestamp),
            correction_field: correction_to_duration(header.correction_field),
            cumulative_scaled_rate_offset: info.cumulative_scaled_rate_offset,
            gm_time_base_indicator: info.gm_time_base_indicator,
            last_gm_phase_change: info.last_gm_phase_change,
            scaled_last_gm_freq_change: info.scaled_last_gm_freq_change,
        });
        if let Some(record) = record {
            self.sync_record_ready(port_index, domain_number, record, now, actions);
        }
        Ok(())
    }

    /// Common tail of `handle_sync`/`handle_follow_up`: relay the completed
    /// `MDSyncReceive` through `SiteSyncSync`, and discipline the local
    /// clock if this port is the domain's selected Slave.
    fn sync_record_ready(
        &mut self,
        port_index: u16,
        domain_number: u8,
        record: sync_receive::MdSyncReceive,
        now: Time,
        actions: &mut ActionBuf,
    ) {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return;
        };
        let neighbor_rate_ratio = port.pdelay_req.neighbor_rate_ratio();
        let neighbor_prop_delay = port.pdelay_req.neighbor_prop_delay();
        let sync = crate::domain::port_sync_sync_receive(record, neighbor_rate_ratio);

        let Some(domain) = self.domains.iter_mut().find(|d| d.domain_number == domain_number) else {
            return;
        };
        let is_selected_slave = domain.selected_slave_port == Some(port_index);
        let master_ports: arrayvec::ArrayVec<u16, MAX_PORTS> = domain
            .selected_states
            .iter()
            .filter(|&&(p, s)| p != 0 && s == crate::PortState::Master)
            .map(|&(p, _)| p)
            .collect();
        domain.site_sync_sync.receive(record.sequence_id, sync);
        let fan = domain.site_sync_sync.fan_out(Some(port_index), &master_ports);

        if is_selected_slave {
            let sample = ClockSlaveSync::sample(sync, now, neighbor_prop_delay);
            let _ = self.discipline_clock(domain_number, sample);
        }

        for (target_port, seq, out_sync) in fan {
            if let Some(target) = self.ports.iter_mut().find(|p| p.port_index == target_port) {
                if let Some(dom_state) = target.domain_mut(domain_number) {
                    for out in dom_state.sync_send.step(sync_send::Event::SyncSend { sequence_id: seq, sync: out_sync }) {
                        push_sync_send_output(target_port, domain_number, out, actions);
                    }
                }
            }
        }
    }

    /// Feed one slave-side sample into the rate/phase filters (C7) and
    /// apply whatever correction they produce to `thisClock`.
    fn discipline_clock(&mut self, domain_number: u8, sample: ClockSourceSample) -> Result<()> {
        let Some(domain) = self.domains.iter_mut().find(|d| d.domain_number == domain_number) else {
            return Ok(());
        };
        let clock_index = domain.clock_index;
        domain.rate_filter.update(crate::filters::RateRatioCandidate {
            raw_ratio: sample.rate_ratio,
            span_ns: 1_000_000_000,
            skew_ns: 0,
        });
        if let Some(ppb) = domain.rate_filter.take_adjustment() {
            self.clocks.set_adj(clock_index, domain_number, ppb)?;
        }

        let dts = Duration::from_nanos(sample.sync_receipt_time_ns - sample.sync_receipt_local_time_ns);
        let gmchange_ind = self.clocks.gm_change_indicator(clock_index, domain_number)?;
        let domain = self.domains.iter_mut().find(|d| d.domain_number == domain_number).unwrap();
        if let Some(new_offset) = domain.phase_filter.sample(dts, gmchange_ind as u32) {
            let hw_now = self.clocks.get_ts64(clock_index, domain_number)?;
            self.clocks.set_ts64(clock_index, domain_number, hw_now + new_offset)?;
        }
        Ok(())
    }

    fn handle_announce(&mut self, port_index: u16, header: &Header, body: AnnounceMessage, now: Time) -> Result<()> {
        let domain_number = header.domain_number;
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain_mut(domain_number) else {
            return Ok(());
        };
        let candidate_vector = PriorityVector {
            root_system_identity: RootSystemIdentity {
                priority_1: body.grandmaster_priority_1,
                clock_quality: body.grandmaster_clock_quality,
                priority_2: body.grandmaster_priority_2,
                clock_identity: body.grandmaster_identity,
            },
            steps_removed: body.steps_removed,
            source_port_identity: header.source_port_identity,
            port_number: port_index,
        };
        if dom_state.announce_receive.receive(&candidate_vector, &body.path_trace) == announce::ReceiveOutcome::Accepted {
            dom_state.announce_info.announce_received(now, candidate_vector, body.path_trace);
        }
        Ok(())
    }

    fn handle_signaling(&mut self, port_index: u16, header: &Header, body: SignalingMessage, now: Time) -> Result<()> {
        let own_port_identity = self.port_identity_cmlds(port_index);
        let wire_payload = signaling::SignalingPayload {
            target_port_identity: body.target_port_identity,
            message_interval_request: body.message_interval_request,
            gptp_capable: body.gptp_capable,
        };
        let signaling::ReceiveOutcome::Received(payload) = signaling::receive(own_port_identity, wire_payload) else {
            return Ok(());
        };
        let domain_number = header.domain_number;

        if let Some(req) = payload.message_interval_request {
            if let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) {
                if port.interval_pdelay.apply(req.link_delay_interval) {
                    port.pdelay_req
                        .set_interval(Duration::from_log_interval(port.interval_pdelay.current_log_interval()));
                }
                if let Some(dom_state) = port.domain_mut(domain_number) {
                    let _ = dom_state.interval_sync.apply(req.time_sync_interval);
                    if dom_state.interval_announce.apply(req.announce_interval) {
                        dom_state
                            .announce_transmit
                            .set_interval(Duration::from_log_interval(dom_state.interval_announce.current_log_interval()));
                    }
                }
            }
        }
        if payload.gptp_capable.is_some() {
            if let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) {
                port.gptp_capable_rx.message_received(now);
            }
        }
        Ok(())
    }

    fn apply_tx_timestamp(
        &mut self,
        port_index: u16,
        message_type: MessageType,
        sequence_id: u16,
        domain_number: u8,
        tx_time: Time,
        actions: &mut ActionBuf,
    ) {
        self.tx_tracker.confirm(port_index, message_type, sequence_id);
        match message_type {
            MessageType::PDelayReq => {
                if let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) {
                    for out in port.pdelay_req.step(pdelay_req::Event::RequestTxTimestamp { t1: tx_time }) {
                        push_pdelay_req_output(port_index, out, actions);
                    }
                }
            }
            MessageType::PDelayResp => {
                if let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) {
                    for out in port.pdelay_resp.step(pdelay_resp::Event::ResponseTxTimestamp { t3: tx_time }) {
                        push_pdelay_resp_output(port_index, out, actions);
                    }
                }
            }
            MessageType::Sync => {
                if let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) {
                    if let Some(dom_state) = port.domain_mut(domain_number) {
                        for out in dom_state.sync_send.step(sync_send::Event::SyncTxTimestamp { t1: tx_time }) {
                            push_sync_send_output(port_index, domain_number, out, actions);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_timeout<N: NetworkRuntime>(&mut self, net: &mut N, now: Time) -> Result<()> {
        let mut actions = ActionBuf::new();

        for (port_index, message_type, sequence_id, domain_number, software_ts) in self.tx_tracker.drain_expired(now) {
            self.apply_tx_timestamp(port_index, message_type, sequence_id, domain_number, software_ts, &mut actions);
        }

        for port in self.ports.iter_mut() {
            if !port.enabled {
                continue;
            }
            if let Some(deadline) = port.pdelay_deadline {
                if now >= deadline {
                    port.pdelay_deadline = Some(now + port.pdelay_req.interval());
                    for out in port.pdelay_req.step(pdelay_req::Event::IntervalElapsed) {
                        push_pdelay_req_output(port.port_index, out, &mut actions);
                    }
                }
            }
            if port.gptp_capable_tx.tick(now) {
                let _ = actions.try_push(WireAction::GptpCapable { port_index: port.port_index });
            }
            port.gptp_capable_rx.tick(now);
            for dom_state in port.domains.iter_mut() {
                if dom_state.announce_transmit.tick(now) {
                    let _ = actions.try_push(WireAction::Announce {
                        port_index: port.port_index,
                        domain_number: dom_state.domain_number,
                    });
                }
            }
        }

        self.recompute_bmca(now);

        for domain in self.domains.iter_mut() {
            if !domain.clock_master_started {
                domain.clock_master_sync_send.start(now);
                domain.clock_master_started = true;
            }
            domain.gm_stable.tick(now);
            if !domain.is_grandmaster {
                continue;
            }
            let domain_number = domain.domain_number;
            let Some(sequence_id) = domain.clock_master_sync_send.tick(now) else {
                continue;
            };
            let sync = domain.clock_master_sync_offset.build_port_sync_sync(now);
            domain.site_sync_sync.receive(sequence_id, sync);
            let master_ports: arrayvec::ArrayVec<u16, MAX_PORTS> = domain
                .selected_states
                .iter()
                .filter(|&&(p, s)| p != 0 && s == crate::PortState::Master)
                .map(|&(p, _)| p)
                .collect();
            let fan = domain.site_sync_sync.fan_out(None, &master_ports);
            for (target_port, seq, out_sync) in fan {
                if let Some(target) = self.ports.iter_mut().find(|p| p.port_index == target_port) {
                    if let Some(dom_state) = target.domain_mut(domain_number) {
                        for out in dom_state.sync_send.step(sync_send::Event::SyncSend { sequence_id: seq, sync: out_sync }) {
                            push_sync_send_output(target_port, domain_number, out, &mut actions);
                        }
                    }
                }
            }
        }

        self.perform_actions(net, actions, now)
    }

    /// Recompute every domain's `selectedState` from each port's currently
    /// held Announce information (IEEE 802.1AS-2020 clause 10.3.5),
    /// raising notices and latching GM-change bookkeeping on a change.
    fn recompute_bmca(&mut self, now: Time) {
        for domain in self.domains.iter_mut() {
            let domain_number = domain.domain_number;
            let mut candidates: arrayvec::ArrayVec<PortCandidate, MAX_PORTS> = arrayvec::ArrayVec::new();
            for port in self.ports.iter_mut() {
                if !port.enabled {
                    continue;
                }
                if let Some(dom_state) = port.domain_mut(domain_number) {
                    dom_state.announce_info.timeout_tick(now);
                    let received_vector = dom_state.announce_info.received_info().map(|info| info.priority_vector);
                    let _ = candidates.try_push(PortCandidate {
                        port_index: port.port_index,
                        received_vector,
                    });
                }
            }

            let selection = domain.selection.select(domain.own_priority_vector, &candidates);

            for &(port_index, state) in selection.states.iter() {
                let changed = match domain.selected_states.iter().find(|(p, _)| *p == port_index) {
                    Some((_, previous)) => *previous != state,
                    None => true,
                };
                if changed {
                    let _ = self.notices.try_push(crate::Event::SelectedStateChanged {
                        domain_number,
                        port_index,
                        state,
                    });
                }
            }

            let gm_changed = selection.gm_changed;
            domain.selected_states = selection.states;
            domain.current_gm_vector = selection.gm_priority_vector;
            domain.is_grandmaster = domain
                .selected_states
                .iter()
                .any(|&(p, s)| p == 0 && s == crate::PortState::Slave);
            domain.selected_slave_port = domain
                .selected_states
                .iter()
                .find(|&&(p, s)| p != 0 && s == crate::PortState::Slave)
                .map(|&(p, _)| p);

            if gm_changed {
                let inherited = if domain.is_grandmaster {
                    PathTrace { identities: arrayvec::ArrayVec::new() }
                } else if let Some(slave_port) = domain.selected_slave_port {
                    self.ports
                        .iter()
                        .find(|p| p.port_index == slave_port)
                        .and_then(|p| p.domain(domain_number))
                        .and_then(|d| d.announce_info.received_info())
                        .map(|info| info.path_trace.clone())
                        .unwrap_or_else(|| PathTrace { identities: arrayvec::ArrayVec::new() })
                } else {
                    PathTrace { identities: arrayvec::ArrayVec::new() }
                };
                domain.inherited_path_trace = inherited;
                domain.gm_stable.gm_changed(now);
                let clock_index = domain.clock_index;
                let _ = self.clocks.set_gm_change(clock_index, domain_number);
                let _ = self.notices.try_push(crate::Event::GmChanged { domain_number });
            }
        }
    }

    fn perform_actions<N: NetworkRuntime>(&mut self, net: &mut N, actions: ActionBuf, now: Time) -> Result<()> {
        for action in actions {
            match action {
                WireAction::PdelayReq { port_index, sequence_id } => self.send_pdelay_req(net, port_index, sequence_id, now)?,
                WireAction::PdelayResp { port_index, sequence_id, requesting_port_identity, request_receipt_timestamp } => {
                    self.send_pdelay_resp(net, port_index, sequence_id, requesting_port_identity, request_receipt_timestamp, now)?
                }
                WireAction::PdelayRespFollowUp { port_index, sequence_id, requesting_port_identity, response_origin_timestamp } => {
                    self.send_pdelay_resp_follow_up(net, port_index, sequence_id, requesting_port_identity, response_origin_timestamp, now)?
                }
                WireAction::Sync { port_index, domain_number, sequence_id } => {
                    self.send_sync(net, port_index, domain_number, sequence_id, now)?
                }
                WireAction::OneStepSync { port_index, domain_number, sequence_id, correction_field } => {
                    self.send_one_step_sync(net, port_index, domain_number, sequence_id, correction_field, now)?
                }
                WireAction::FollowUp {
                    port_index,
                    domain_number,
                    sequence_id,
                    precise_origin_timestamp,
                    correction_field,
                    rate_ratio,
                    gm_time_base_indicator,
                    last_gm_phase_change,
                    last_gm_freq_change,
                } => self.send_follow_up(
                    net,
                    port_index,
                    domain_number,
                    sequence_id,
                    precise_origin_timestamp,
                    correction_field,
                    rate_ratio,
                    gm_time_base_indicator,
                    last_gm_phase_change,
                    last_gm_freq_change,
                    now,
                )?,
                WireAction::Announce { port_index, domain_number } => self.send_announce(net, port_index, domain_number, now)?,
                WireAction::GptpCapable { port_index } => self.send_gptp_capable(net, port_index, now)?,
            }
        }
        Ok(())
    }

    fn send_pdelay_req<N: NetworkRuntime>(&mut self, net: &mut N, port_index: u16, sequence_id: u16, now: Time) -> Result<()> {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let log_interval = port.interval_pdelay.current_log_interval();
        let source_port_identity = self.port_identity_cmlds(port_index);
        let header = build_header(MessageType::PDelayReq, true, 0, source_port_identity, sequence_id, false, log_interval);
        let body = MessageBody::PDelayReq(PDelayReqMessage { origin_timestamp: Timestamp::default() });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_pdelay_resp<N: NetworkRuntime>(
        &mut self,
        net: &mut N,
        port_index: u16,
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        request_receipt_timestamp: Time,
        now: Time,
    ) -> Result<()> {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let log_interval = port.interval_pdelay.current_log_interval();
        let source_port_identity = self.port_identity_cmlds(port_index);
        let header = build_header(MessageType::PDelayResp, true, 0, source_port_identity, sequence_id, true, log_interval);
        let body = MessageBody::PDelayResp(PDelayRespMessage {
            request_receipt_timestamp: Timestamp::from(request_receipt_timestamp),
            requesting_port_identity,
        });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_pdelay_resp_follow_up<N: NetworkRuntime>(
        &mut self,
        net: &mut N,
        port_index: u16,
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        response_origin_timestamp: Time,
        now: Time,
    ) -> Result<()> {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let log_interval = port.interval_pdelay.current_log_interval();
        let source_port_identity = self.port_identity_cmlds(port_index);
        let header = build_header(MessageType::PDelayRespFollowUp, true, 0, source_port_identity, sequence_id, false, log_interval);
        let body = MessageBody::PDelayRespFollowUp(PDelayRespFollowUpMessage {
            response_origin_timestamp: Timestamp::from(response_origin_timestamp),
            requesting_port_identity,
        });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_sync<N: NetworkRuntime>(&mut self, net: &mut N, port_index: u16, domain_number: u8, sequence_id: u16, now: Time) -> Result<()> {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain(domain_number) else {
            return Ok(());
        };
        let log_interval = dom_state.interval_sync.current_log_interval();
        let source_port_identity = self.port_identity_for_domain(port_index, domain_number);
        let header = build_header(MessageType::Sync, false, domain_number, source_port_identity, sequence_id, true, log_interval);
        let body = MessageBody::Sync(SyncMessage { origin_timestamp: Timestamp::default() });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_one_step_sync<N: NetworkRuntime>(
        &mut self,
        net: &mut N,
        port_index: u16,
        domain_number: u8,
        sequence_id: u16,
        correction_field: Duration,
        now: Time,
    ) -> Result<()> {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain(domain_number) else {
            return Ok(());
        };
        let log_interval = dom_state.interval_sync.current_log_interval();
        let source_port_identity = self.port_identity_for_domain(port_index, domain_number);
        let mut header = build_header(MessageType::Sync, false, domain_number, source_port_identity, sequence_id, false, log_interval);
        header.correction_field = duration_to_correction(correction_field);
        let body = MessageBody::Sync(SyncMessage { origin_timestamp: Timestamp::from(now) });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_follow_up<N: NetworkRuntime>(
        &mut self,
        net: &mut N,
        port_index: u16,
        domain_number: u8,
        sequence_id: u16,
        precise_origin_timestamp: Time,
        correction_field: Duration,
        rate_ratio: f64,
        gm_time_base_indicator: u16,
        last_gm_phase_change: ScaledNs,
        last_gm_freq_change: i32,
        now: Time,
    ) -> Result<()> {
        let Some(port) = self.ports.iter().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain(domain_number) else {
            return Ok(());
        };
        let log_interval = dom_state.interval_sync.current_log_interval();
        let source_port_identity = self.port_identity_for_domain(port_index, domain_number);
        let mut header = build_header(MessageType::FollowUp, false, domain_number, source_port_identity, sequence_id, false, log_interval);
        header.correction_field = duration_to_correction(correction_field);
        let cumulative_scaled_rate_offset = ((rate_ratio - 1.0) * (1i64 << 41) as f64) as i32;
        let body = MessageBody::FollowUp(FollowUpMessage {
            precise_origin_timestamp: Timestamp::from(precise_origin_timestamp),
            follow_up_information: FollowUpInformation {
                cumulative_scaled_rate_offset,
                gm_time_base_indicator,
                last_gm_phase_change,
                scaled_last_gm_freq_change: last_gm_freq_change,
            },
        });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_announce<N: NetworkRuntime>(&mut self, net: &mut N, port_index: u16, domain_number: u8, now: Time) -> Result<()> {
        let Some(domain) = self.domains.iter().find(|d| d.domain_number == domain_number) else {
            return Ok(());
        };
        let mut advertised = if domain.is_grandmaster {
            domain.own_priority_vector
        } else {
            domain.current_gm_vector.with_one_more_step()
        };
        advertised.port_number = port_index;
        let path_trace_input = domain.inherited_path_trace.clone();
        let source_port_identity = self.port_identity_for_domain(port_index, domain_number);

        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        let Some(dom_state) = port.domain_mut(domain_number) else {
            return Ok(());
        };
        let payload = dom_state.announce_send.build(advertised, &path_trace_input);
        dom_state.announce_sequence = dom_state.announce_sequence.wrapping_add(1);
        let sequence_id = dom_state.announce_sequence;
        let log_interval = dom_state.interval_announce.current_log_interval();

        let header = build_header(MessageType::Announce, false, domain_number, source_port_identity, sequence_id, false, log_interval);
        let body = MessageBody::Announce(AnnounceMessage {
            origin_timestamp: Timestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority_1: payload.priority_vector.root_system_identity.priority_1,
            grandmaster_clock_quality: payload.priority_vector.root_system_identity.clock_quality,
            grandmaster_priority_2: payload.priority_vector.root_system_identity.priority_2,
            grandmaster_identity: payload.priority_vector.root_system_identity.clock_identity,
            steps_removed: payload.priority_vector.steps_removed,
            time_source: TimeSource::InternalOscillator,
            path_trace: payload.path_trace,
        });
        self.transmit(net, port_index, header, body, now)
    }

    fn send_gptp_capable<N: NetworkRuntime>(&mut self, net: &mut N, port_index: u16, now: Time) -> Result<()> {
        let source_port_identity = self.port_identity_cmlds(port_index);
        let Some(port) = self.ports.iter_mut().find(|p| p.port_index == port_index) else {
            return Ok(());
        };
        port.gptp_capable_sequence = port.gptp_capable_sequence.wrapping_add(1);
        let sequence_id = port.gptp_capable_sequence;

        let header = build_header(MessageType::Signaling, true, 0, source_port_identity, sequence_id, false, 0x7F);
        let body = MessageBody::Signaling(SignalingMessage {
            target_port_identity: PortIdentity { clock_identity: ClockIdentity([0xFF; 8]), port_number: 0xFFFF },
            message_interval_request: None,
            gptp_capable: Some(GptpCapableTlv { log_gptp_capable_message_interval: 0, supports_gptp: true }),
        });
        self.transmit(net, port_index, header, body, now)
    }

    /// Serialize and send one message, recording it with the TX-timestamp
    /// tracker if it's an event message this port must hardware timestamp.
    fn transmit<N: NetworkRuntime>(&mut self, net: &mut N, port_index: u16, header: Header, body: MessageBody, now: Time) -> Result<()> {
        let message = Message { header, body };
        let is_event = message.is_event();
        let message_type = message.body.message_type();
        let sequence_id = message.header.sequence_id;
        let domain_number = message.header.domain_number;

        let port = net.port(port_index).ok_or(GptpError::Link("port not present"))?;
        let len = message
            .serialize(port.send_buf())
            .map_err(|_| GptpError::Configuration("message too large for the send buffer"))?;
        port.send(len).map_err(|_| GptpError::Link("send failed"))?;

        if is_event {
            // The best estimate available until (if ever) a hardware TXTS
            // event supersedes it via `TxTimestampTracker::confirm`.
            self.tx_tracker.record_send(port_index, message_type, sequence_id, domain_number, now, now);
        }
        Ok(())
    }

    fn port_identity_for_domain(&self, port_index: u16, domain_number: u8) -> PortIdentity {
        PortIdentity {
            clock_identity: self.this_clock_identity.for_domain(domain_number),
            port_number: port_index,
        }
    }

    /// The CMLDS/domain-independent identity a port uses for peer-delay and
    /// `gPTP-capable` signaling, which aren't scoped to any one domain.
    fn port_identity_cmlds(&self, port_index: u16) -> PortIdentity {
        PortIdentity {
            clock_identity: self.this_clock_identity,
            port_number: port_index,
        }
    }
}

fn push_pdelay_req_output(port_index: u16, out: pdelay_req::Output, actions: &mut ActionBuf) {
    if let pdelay_req::Output::SendPdelayReq { sequence_id } = out {
        let _ = actions.try_push(WireAction::PdelayReq { port_index, sequence_id });
    }
}

fn push_pdelay_resp_output(port_index: u16, out: pdelay_resp::Output, actions: &mut ActionBuf) {
    match out {
        pdelay_resp::Output::SendPdelayResp { sequence_id, requesting_port_identity, request_receipt_timestamp } => {
            let _ = actions.try_push(WireAction::PdelayResp {
                port_index,
                sequence_id,
                requesting_port_identity,
                request_receipt_timestamp,
            });
        }
        pdelay_resp::Output::SendPdelayRespFollowUp { sequence_id, requesting_port_identity, response_origin_timestamp } => {
            let _ = actions.try_push(WireAction::PdelayRespFollowUp {
                port_index,
                sequence_id,
                requesting_port_identity,
                response_origin_timestamp,
            });
        }
    }
}

fn push_sync_send_output(port_index: u16, domain_number: u8, out: sync_send::Output, actions: &mut ActionBuf) {
    match out {
        sync_send::Output::SendSync { sequence_id } => {
            let _ = actions.try_push(WireAction::Sync { port_index, domain_number, sequence_id });
        }
        sync_send::Output::SendOneStepSync { sequence_id, correction_field } => {
            let _ = actions.try_push(WireAction::OneStepSync { port_index, domain_number, sequence_id, correction_field });
        }
        sync_send::Output::SendFollowUp {
            sequence_id,
            precise_origin_timestamp,
            correction_field,
            rate_ratio,
            gm_time_base_indicator,
            last_gm_phase_change,
            last_gm_freq_change,
        } => {
            let _ = actions.try_push(WireAction::FollowUp {
                port_index,
                domain_number,
                sequence_id,
                precise_origin_timestamp,
                correction_field,
                rate_ratio,
                gm_time_base_indicator,
                last_gm_phase_change,
                last_gm_freq_change,
            });
        }
    }
}

fn build_header(
    message_type: MessageType,
    cmlds: bool,
    domain_number: u8,
    source_port_identity: PortIdentity,
    sequence_id: u16,
    two_step: bool,
    log_message_interval: i8,
) -> Header {
    Header {
        major_sdo_id: if cmlds { MAJOR_SDO_ID_CMLDS } else { MAJOR_SDO_ID_INSTANCE },
        message_type,
        minor_version_ptp: 0,
        version_ptp: 2,
        message_length: 0,
        domain_number,
        minor_sdo_id: 0,
        flags: HeaderFlags { two_step, ..Default::default() },
        correction_field: 0,
        message_type_specific: [0; 4],
        source_port_identity,
        sequence_id,
        control: control_byte(message_type),
        log_message_interval,
    }
}

/// `controlField`: a PTPv1-compatibility byte most gPTP implementations
/// still fill in by message type even though v2 receivers ignore it.
fn control_byte(message_type: MessageType) -> u8 {
    match message_type {
        MessageType::Sync => 0,
        MessageType::FollowUp => 2,
        _ => 5,
    }
}

fn correction_to_duration(raw: i64) -> Duration {
    Duration::from_nanos((raw as i128) >> 16)
}

fn duration_to_correction(d: Duration) -> i64 {
    (d.nanos() << 16) as i64
}
