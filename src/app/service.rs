//! Relay module service: the hexagonal core.
//!
//! [`RelayModule`] owns the mode FSM, relay engine, input sampler, gesture
//! detector, broker manager, and indicator.  It exposes one `cycle()` call
//! per control-loop iteration; all I/O flows through port traits injected
//! at the call site, so the whole service runs against mock adapters.
//!
//! ```text
//!  InputPort ──▶ ┌──────────────────────────┐ ──▶ RelayPort / IndicatorPort
//!  inbound   ──▶ │       RelayModule        │ ──▶ BusPort
//!  ConfigPort ◀─▶│ FSM · engine · gesture   │ ──▶ Portal/Update/SystemPort
//!                └──────────────────────────┘ ──▶ EventSink
//! ```
//!
//! Per cycle:
//!
//! 1. FSM timeouts
//! 2. collaborator events (portal save, update result)
//! 3. NORMAL only: sample → mode button → per edge (gesture, relay,
//!    publish) → broker upkeep → bus commands.  A mode transition skips
//!    whatever normal-mode work is left in the cycle.
//! 4. other modes: bus mode requests only (`rst` is the one honored);
//!    PENDING_RESTART reboots once settled
//!    and collaborators are idle
//! 5. indicator

use heapless::Vec;
use log::{debug, info, warn};

use crate::channel::Channel;
use crate::config::{DeviceConfig, Timing};
use crate::drivers::indicator::IndicatorEngine;
use crate::events::InboundEvent;
use crate::fsm::context::{ModeContext, ModeOutputs, ModeRequest, RequestVerdict, RestartReason};
use crate::fsm::states::build_mode_table;
use crate::fsm::{Fsm, Mode};
use crate::input::InputSampler;
use crate::input::gesture::SetupGestureDetector;
use crate::mqtt::broker::{BrokerConnectionManager, BrokerTick};
use crate::mqtt::dispatch;
use crate::relay::decision::{associated_switch, effective_pressed};
use crate::relay::status::status_payload;
use crate::relay::{RelayAction, RelayEngine};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{
    BusPort, ConfigPort, EventSink, IndicatorPort, InputPort, PortalPort, RelayPort, SystemPort,
    UpdatePort,
};

/// Bus messages carried from the top of the cycle to the dispatch step.
type PendingMessages = Vec<(heapless::String<64>, Vec<u8, 32>), 16>;

/// Milliseconds between two cycles, saturating at `u32::MAX` after a long stall.
fn elapsed_ms(last_ms: u64, now_ms: u64) -> u32 {
    u32::try_from(now_ms.saturating_sub(last_ms)).unwrap_or(u32::MAX)
}

// ───────────────────────────────────────────────────────────────
// RelayModule
// ───────────────────────────────────────────────────────────────

pub struct RelayModule {
    fsm: Fsm,
    ctx: ModeContext,
    config: DeviceConfig,
    /// Connectivity is configured (WiFi credentials and broker host).
    online: bool,
    engine: RelayEngine,
    sampler: InputSampler,
    gesture: SetupGestureDetector,
    broker: BrokerConnectionManager,
    indicator: IndicatorEngine,
    /// FSM outputs already applied to the collaborators.
    applied: ModeOutputs,
    last_cycle_ms: u64,
    indicator_lit: Option<bool>,
    restart_issued: bool,
    cycles: u64,
}

impl RelayModule {
    /// Construct the service.  Does **not** start the FSM; call
    /// [`start`](Self::start) next.
    pub fn new(config: DeviceConfig, timing: Timing) -> Self {
        let online = config.has_connectivity();
        Self {
            fsm: Fsm::new(build_mode_table(), Mode::Normal),
            ctx: ModeContext::new(timing),
            online,
            engine: RelayEngine::new(),
            sampler: InputSampler::new(timing.debounce_ms),
            gesture: SetupGestureDetector::new(timing.gesture_window_ms, timing.gesture_count),
            broker: BrokerConnectionManager::new(timing.backoff_step_ms, timing.backoff_max_ms),
            indicator: IndicatorEngine::new(),
            applied: ModeOutputs::default(),
            last_cycle_ms: 0,
            indicator_lit: None,
            restart_issued: false,
            cycles: 0,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter NORMAL and perform the boot relay reset.
    ///
    /// Takes the first input sample, which seeds the debouncers, then
    /// de-energizes both relays or mirrors the switches when
    /// `respect_switch_state` is set.
    pub fn start(
        &mut self,
        now_ms: u64,
        hw: &mut (impl InputPort + RelayPort),
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        self.last_cycle_ms = now_ms;
        self.fsm.start(&mut self.ctx);
        self.applied = self.ctx.outputs;

        let _ = self.sampler.sample(hw.read_inputs(), now_ms);
        let actions = self.engine.reset(&self.config.policy, self.sampler.switch_states());
        for action in actions {
            hw.set_relay(action.relay, action.energized);
        }

        if !self.online {
            warn!("RelayModule: no WiFi/broker configured, running offline");
        }
        sink.emit(&AppEvent::Started { online: self.online });
        info!(
            "RelayModule started, relays {:?}, policy {:?}",
            self.engine.snapshot(),
            self.config.policy
        );
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one control cycle.  Returns the mode at the end of the cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn cycle(
        &mut self,
        now_ms: u64,
        inbound: impl IntoIterator<Item = InboundEvent>,
        hw: &mut (impl InputPort + RelayPort + IndicatorPort),
        bus: &mut impl BusPort,
        services: &mut (impl PortalPort + UpdatePort + SystemPort),
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> Mode {
        self.cycles += 1;
        self.ctx.now_ms = now_ms;
        let delta_ms = elapsed_ms(self.last_cycle_ms, now_ms);
        self.last_cycle_ms = now_ms;

        // 1. Timeouts
        let before = self.fsm.current_mode();
        self.fsm.tick(&mut self.ctx);
        self.after_transition(before, services, sink);

        // 2. Collaborator events; bus messages wait for the dispatch step.
        let mut messages = PendingMessages::new();
        for ev in inbound {
            match ev {
                InboundEvent::BusMessage { topic, payload } => {
                    if messages.push((topic, payload)).is_err() {
                        debug!("RelayModule: bus backlog full, message dropped");
                    }
                }
                InboundEvent::PortalSaved(update) => {
                    self.on_portal_saved(&update, store, services, sink);
                }
                InboundEvent::UpdateFinished { ok } => {
                    if ok {
                        self.request(ModeRequest::UpdateComplete, services, sink);
                    } else {
                        warn!("RelayModule: update failed, waiting for timeout");
                    }
                }
            }
        }

        // 3./4. Mode-specific work
        if self.fsm.current_mode() == Mode::Normal {
            self.run_normal(now_ms, &messages, hw, bus, services, sink);
        } else {
            self.run_suspended(&messages, services, sink);
        }

        // 5. Indicator
        self.indicator.set_mode_pattern(self.ctx.outputs.indicator);
        self.indicator.set_connected(self.online && bus.is_connected());
        let lit = self.indicator.tick(delta_ms);
        if self.indicator_lit != Some(lit) {
            hw.set_indicator(lit);
            self.indicator_lit = Some(lit);
        }

        self.fsm.current_mode()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.fsm.current_mode()
    }

    pub fn relay_states(&self) -> [bool; 2] {
        self.engine.snapshot()
    }

    pub fn switch_states(&self) -> [bool; 2] {
        self.sampler.switch_states()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn broker_delay_ms(&self) -> u32 {
        self.broker.current_delay_ms()
    }

    pub fn restart_reason(&self) -> Option<RestartReason> {
        self.ctx.restart_reason
    }

    /// Total cycles executed since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    // ── Internal: NORMAL ──────────────────────────────────────

    fn run_normal(
        &mut self,
        now_ms: u64,
        messages: &PendingMessages,
        hw: &mut (impl InputPort + RelayPort),
        bus: &mut impl BusPort,
        services: &mut (impl PortalPort + UpdatePort + SystemPort),
        sink: &mut impl EventSink,
    ) {
        let sample = self.sampler.sample(hw.read_inputs(), now_ms);

        if sample.mode_pressed {
            info!("RelayModule: mode button pressed");
            if self.request(ModeRequest::EnterSetup, services, sink) {
                return;
            }
        }

        for edge in &sample.edges {
            if self.gesture.on_switch_edge(edge.at_ms) {
                info!("RelayModule: setup gesture detected");
                if self.request(ModeRequest::EnterSetup, services, sink) {
                    return;
                }
            }
            let action = self
                .engine
                .on_switch_edge(&self.config.policy, edge.switch, edge.pressed);
            self.apply(action, hw, bus, sink);
        }

        if self.online {
            match self.broker.tick(now_ms, bus, &self.config) {
                BrokerTick::Established => {
                    sink.emit(&AppEvent::BusConnected);
                    for relay in Channel::ALL {
                        self.publish_status(relay, bus, sink);
                    }
                }
                BrokerTick::Failed(error) => sink.emit(&AppEvent::BusConnectFailed {
                    error,
                    retry_in_ms: self.broker.current_delay_ms(),
                }),
                BrokerTick::Connected | BrokerTick::Waiting => {}
            }
        }

        for (topic, payload) in messages {
            for cmd in dispatch::decode(topic, payload, &self.config.channels) {
                let transitioned = match cmd {
                    AppCommand::SetRelay { channel, on } => {
                        let action = self.engine.on_command(channel, on);
                        self.apply(action, hw, bus, sink);
                        false
                    }
                    AppCommand::EnterSetup => self.request(ModeRequest::EnterSetup, services, sink),
                    AppCommand::EnterUpdate => self.request(ModeRequest::EnterUpdate, services, sink),
                    AppCommand::Reset => self.request(ModeRequest::Reset, services, sink),
                };
                if transitioned {
                    return;
                }
            }
        }
    }

    /// Drive the relay output and publish the channel's status.
    fn apply(
        &mut self,
        action: RelayAction,
        hw: &mut impl RelayPort,
        bus: &mut impl BusPort,
        sink: &mut impl EventSink,
    ) {
        hw.set_relay(action.relay, action.energized);
        if action.changed {
            sink.emit(&AppEvent::RelayChanged {
                relay: action.relay,
                energized: action.energized,
            });
        }
        self.publish_status(action.relay, bus, sink);
    }

    fn publish_status(&self, relay: Channel, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        let policy = &self.config.policy;
        let switch = associated_switch(policy, relay);
        let pressed = effective_pressed(policy, self.sampler.pressed(switch));
        let payload = status_payload(self.engine.energized(relay), pressed);

        if !self.online || !bus.is_connected() {
            sink.emit(&AppEvent::StatusDropped { relay });
            return;
        }
        let topic = &self.config.channel(relay).output_topic;
        match bus.publish(topic, payload.as_bytes(), true) {
            Ok(()) => sink.emit(&AppEvent::StatusPublished { relay, payload }),
            Err(e) => {
                warn!("RelayModule: publish on '{}' failed: {}", topic, e);
                sink.emit(&AppEvent::StatusDropped { relay });
            }
        }
    }

    // ── Internal: other modes ─────────────────────────────────

    fn run_suspended(
        &mut self,
        messages: &PendingMessages,
        services: &mut (impl PortalPort + UpdatePort + SystemPort),
        sink: &mut impl EventSink,
    ) {
        // Relay commands wait for NORMAL; mode requests go to the FSM,
        // which only honors `rst` here.
        'messages: for (topic, payload) in messages {
            for cmd in dispatch::decode(topic, payload, &self.config.channels) {
                let req = match cmd {
                    AppCommand::SetRelay { .. } => continue,
                    AppCommand::EnterSetup => ModeRequest::EnterSetup,
                    AppCommand::EnterUpdate => ModeRequest::EnterUpdate,
                    AppCommand::Reset => ModeRequest::Reset,
                };
                if self.request(req, services, sink) {
                    break 'messages;
                }
            }
        }

        if self.fsm.current_mode() != Mode::PendingRestart || self.restart_issued {
            return;
        }
        if !self.ctx.outputs.restart_ready {
            return;
        }
        if services.portal_busy() || services.update_busy() {
            debug!("RelayModule: restart deferred, collaborator busy");
            return;
        }
        info!("RelayModule: restarting ({:?})", self.ctx.restart_reason);
        self.restart_issued = true;
        services.restart();
    }

    // ── Internal: mode transitions ────────────────────────────

    fn on_portal_saved(
        &mut self,
        update: &crate::config::ConfigUpdate,
        store: &impl ConfigPort,
        services: &mut (impl PortalPort + UpdatePort + SystemPort),
        sink: &mut impl EventSink,
    ) {
        if self.fsm.current_mode() != Mode::ConfigPortal {
            warn!("RelayModule: portal save outside CONFIG_PORTAL ignored");
            return;
        }
        let next = match self.config.merged(update) {
            Ok(next) => next,
            Err(e) => {
                warn!("RelayModule: portal config rejected: {}", e);
                sink.emit(&AppEvent::ConfigRejected);
                return;
            }
        };
        if let Err(e) = store.save(&next) {
            warn!("RelayModule: saving config failed: {}", e);
            sink.emit(&AppEvent::ConfigRejected);
            return;
        }
        info!("RelayModule: configuration saved");
        self.config = next;
        self.request(ModeRequest::PortalSaved, services, sink);
    }

    /// Offer a request to the FSM.  Returns `true` if the mode changed.
    fn request(
        &mut self,
        req: ModeRequest,
        services: &mut (impl PortalPort + UpdatePort + SystemPort),
        sink: &mut impl EventSink,
    ) -> bool {
        let before = self.fsm.current_mode();
        let verdict = self.fsm.request(req, &mut self.ctx);
        if verdict == RequestVerdict::Rejected {
            sink.emit(&AppEvent::RequestRejected {
                request: req,
                mode: before,
            });
        }
        self.after_transition(before, services, sink)
    }

    /// Emit transition events and start/stop collaborators to match the
    /// FSM outputs.  Returns `true` if the mode changed since `before`.
    fn after_transition(
        &mut self,
        before: Mode,
        services: &mut (impl PortalPort + UpdatePort),
        sink: &mut impl EventSink,
    ) -> bool {
        let after = self.fsm.current_mode();
        if after == before {
            return false;
        }
        sink.emit(&AppEvent::ModeChanged {
            from: before,
            to: after,
        });
        if after == Mode::PendingRestart {
            if let Some(reason) = self.ctx.restart_reason {
                sink.emit(&AppEvent::RestartRequested(reason));
            }
        }

        let (prev, next) = (self.applied, self.ctx.outputs);
        if prev.portal_active && !next.portal_active {
            services.stop_portal();
        }
        if prev.update_active && !next.update_active
            && self.ctx.restart_reason != Some(RestartReason::UpdateApplied)
        {
            services.abort_update();
        }
        if next.portal_active && !prev.portal_active {
            if let Err(e) = services.start_portal() {
                warn!("RelayModule: portal failed to start: {}", e);
            }
        }
        if next.update_active && !prev.update_active {
            if let Err(e) = services.begin_update() {
                warn!("RelayModule: update session failed to open: {}", e);
            }
        }
        self.applied = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_gap_saturates_instead_of_wrapping() {
        assert_eq!(elapsed_ms(1_000, 1_020), 20);
        assert_eq!(elapsed_ms(1_020, 1_000), 0);
        assert_eq!(elapsed_ms(0, u64::from(u32::MAX) + 5), u32::MAX);
    }

    #[test]
    fn new_service_reflects_connectivity() {
        let svc = RelayModule::new(DeviceConfig::default(), Timing::default());
        assert!(!svc.is_online());
        assert_eq!(svc.mode(), Mode::Normal);
        assert_eq!(svc.relay_states(), [false, false]);

        let mut cfg = DeviceConfig::default();
        cfg.wifi.ssid.push_str("net").unwrap();
        cfg.broker.host.push_str("broker").unwrap();
        assert!(RelayModule::new(cfg, Timing::default()).is_online());
    }
}
