//! Integration tests for the RelayModule → FSM → relays/bus pipeline.
//!
//! Each test drives the module cycle by cycle (20 ms apart) against the
//! recording mocks in `mock_hw`.

use duorelay::app::events::AppEvent;
use duorelay::app::ports::ConfigError;
use duorelay::app::service::RelayModule;
use duorelay::channel::Channel;
use duorelay::config::{ConfigUpdate, DeviceConfig, PolicyConfig, Timing};
use duorelay::events::InboundEvent;
use duorelay::fsm::Mode;
use duorelay::fsm::context::{ModeRequest, RestartReason};

use super::mock_hw::{MockBus, MockHardware, MockServices, MockStore, RecordingSink, ServiceCall};

const CYCLE_MS: u64 = 20;

struct Rig {
    module: RelayModule,
    hw: MockHardware,
    bus: MockBus,
    svc: MockServices,
    store: MockStore,
    sink: RecordingSink,
    now: u64,
}

impl Rig {
    fn with(config: DeviceConfig, hw: MockHardware, bus: MockBus) -> Self {
        let mut rig = Self {
            module: RelayModule::new(config, Timing::default()),
            hw,
            bus,
            svc: MockServices::new(),
            store: MockStore::new(),
            sink: RecordingSink::new(),
            now: 0,
        };
        rig.module.start(0, &mut rig.hw, &mut rig.sink);
        rig
    }

    fn online() -> Self {
        Self::with(online_config(PolicyConfig::default()), MockHardware::new(), MockBus::new())
    }

    fn offline() -> Self {
        Self::with(DeviceConfig::default(), MockHardware::new(), MockBus::new())
    }

    fn step_with(&mut self, inbound: Vec<InboundEvent>) -> Mode {
        self.now += CYCLE_MS;
        self.module.cycle(
            self.now,
            inbound,
            &mut self.hw,
            &mut self.bus,
            &mut self.svc,
            &self.store,
            &mut self.sink,
        )
    }

    fn step(&mut self) -> Mode {
        self.step_with(Vec::new())
    }

    fn run_for(&mut self, ms: u64) {
        for _ in 0..ms / CYCLE_MS {
            self.step();
        }
    }

    /// Change a switch and run long enough for the debouncer to accept it.
    fn flip(&mut self, ch: Channel, closed: bool) {
        self.hw.set_switch(ch, closed);
        self.run_for(100);
    }

    fn command(&mut self, topic: &str, payload: &str) -> Mode {
        let ev = InboundEvent::bus_message(topic, payload.as_bytes()).unwrap();
        self.step_with(vec![ev])
    }

    fn mode_changes_to(&self, mode: Mode) -> usize {
        self.sink
            .count(|e| matches!(e, AppEvent::ModeChanged { to, .. } if *to == mode))
    }
}

fn online_config(policy: PolicyConfig) -> DeviceConfig {
    let mut cfg = DeviceConfig::default();
    cfg.wifi.ssid.push_str("HomeNet").unwrap();
    cfg.broker.host.push_str("10.0.0.2").unwrap();
    cfg.broker.client_id.push_str("duorelay-test").unwrap();
    cfg.policy = policy;
    cfg
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_de_energizes_relays() {
    let rig = Rig::offline();
    assert_eq!(rig.module.mode(), Mode::Normal);
    assert_eq!(rig.hw.relays, [false, false]);
    assert_eq!(rig.hw.relay_calls.len(), 2);
    assert_eq!(rig.sink.events[0], AppEvent::Started { online: false });
}

#[test]
fn boot_mirrors_switches_when_respecting_state() {
    let mut hw = MockHardware::new();
    hw.set_switch(Channel::One, true);
    let policy = PolicyConfig {
        respect_switch_state: true,
        ..PolicyConfig::default()
    };
    let rig = Rig::with(online_config(policy), hw, MockBus::new());
    assert_eq!(rig.hw.relays, [true, false]);
    assert_eq!(rig.module.switch_states(), [true, false]);
}

#[test]
fn switches_closed_at_boot_are_not_edges() {
    let mut hw = MockHardware::new();
    hw.set_switch(Channel::Two, true);
    let mut rig = Rig::with(DeviceConfig::default(), hw, MockBus::new());
    rig.run_for(200);
    assert_eq!(rig.hw.relays, [false, false]);
}

// ── Switch edges ──────────────────────────────────────────────

#[test]
fn every_edge_toggles_and_publishes_without_respect() {
    let mut rig = Rig::online();
    rig.step();
    assert!(rig.bus.connected);

    rig.flip(Channel::One, true);
    assert_eq!(rig.hw.relays, [true, false]);
    assert_eq!(rig.bus.last_on("duorelay/1/state"), Some("1."));

    // Release toggles again.
    rig.flip(Channel::One, false);
    assert_eq!(rig.hw.relays, [false, false]);
    assert_eq!(rig.bus.last_on("duorelay/1/state"), Some("0"));
    assert!(rig.bus.published.iter().all(|p| p.retain));
}

#[test]
fn swapped_switch_drives_other_relay() {
    let policy = PolicyConfig {
        swap_relays: true,
        ..PolicyConfig::default()
    };
    let mut rig = Rig::with(online_config(policy), MockHardware::new(), MockBus::new());
    rig.step();

    rig.flip(Channel::One, true);
    assert_eq!(rig.hw.relays, [false, true]);
    // Relay 2's associated switch is switch 1, which is closed.
    assert_eq!(rig.bus.last_on("duorelay/2/state"), Some("1."));
}

#[test]
fn inverted_respecting_policy_follows_switch_inverted() {
    let policy = PolicyConfig {
        respect_switch_state: true,
        invert_switch: true,
        ..PolicyConfig::default()
    };
    let mut rig = Rig::with(online_config(policy), MockHardware::new(), MockBus::new());
    // Open switches read as "pressed" once inverted.
    assert_eq!(rig.hw.relays, [true, true]);
    rig.step();

    rig.flip(Channel::Two, true);
    assert_eq!(rig.hw.relays, [true, false]);
    assert_eq!(rig.bus.last_on("duorelay/2/state"), Some("0"));

    rig.flip(Channel::Two, false);
    assert_eq!(rig.hw.relays, [true, true]);
    assert_eq!(rig.bus.last_on("duorelay/2/state"), Some("1."));
}

#[test]
fn offline_switches_still_drive_relays() {
    let mut rig = Rig::offline();
    rig.flip(Channel::Two, true);
    assert_eq!(rig.hw.relays, [false, true]);
    assert_eq!(rig.bus.connects, 0);
    assert!(rig.bus.published.is_empty());
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::StatusDropped { relay: Channel::Two })),
        1
    );
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn repeated_command_is_idempotent_but_publishes_each_time() {
    let mut rig = Rig::online();
    rig.step();
    let before = rig.bus.published.len();

    rig.command("duorelay/1/set", "1");
    rig.command("duorelay/1/set", "1");

    assert_eq!(rig.module.relay_states(), [true, false]);
    assert_eq!(rig.bus.published.len() - before, 2);
    assert_eq!(rig.bus.published_on("duorelay/1/state"), vec!["0", "1", "1"]);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::RelayChanged { .. })),
        1
    );
}

#[test]
fn command_on_other_topic_is_ignored() {
    let mut rig = Rig::online();
    rig.step();
    rig.command("duorelay/1/state", "1");
    rig.command("elsewhere", "1");
    rig.command("duorelay/2/set", "toggle");
    assert_eq!(rig.module.relay_states(), [false, false]);
}

#[test]
fn later_command_in_cycle_wins() {
    let mut rig = Rig::online();
    rig.step();
    let on = InboundEvent::bus_message("duorelay/2/set", b"1").unwrap();
    let off = InboundEvent::bus_message("duorelay/2/set", b"0").unwrap();
    rig.step_with(vec![on, off]);
    assert_eq!(rig.module.relay_states(), [false, false]);
}

#[test]
fn transition_skips_rest_of_cycle() {
    let mut rig = Rig::online();
    rig.step();
    let set = InboundEvent::bus_message("duorelay/1/set", b"set").unwrap();
    let on = InboundEvent::bus_message("duorelay/1/set", b"1").unwrap();
    assert_eq!(rig.step_with(vec![set, on]), Mode::ConfigPortal);
    assert_eq!(rig.module.relay_states(), [false, false]);
}

// ── Setup gesture ─────────────────────────────────────────────

#[test]
fn five_quick_edges_open_portal_once() {
    let mut rig = Rig::offline();
    for i in 0..5 {
        rig.flip(Channel::One, i % 2 == 0);
    }
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);
    assert_eq!(rig.mode_changes_to(Mode::ConfigPortal), 1);
    assert_eq!(rig.svc.count(ServiceCall::StartPortal), 1);
    // The fifth edge opened the portal instead of toggling.
    assert_eq!(rig.hw.relays, [false, false]);
}

#[test]
fn gesture_interrupted_by_long_gap_does_not_trigger() {
    let mut rig = Rig::offline();
    rig.flip(Channel::One, true);
    rig.flip(Channel::One, false);
    rig.flip(Channel::One, true);
    rig.run_for(600);
    rig.flip(Channel::One, false);
    rig.flip(Channel::One, true);
    assert_eq!(rig.module.mode(), Mode::Normal);
    assert_eq!(rig.mode_changes_to(Mode::ConfigPortal), 0);
}

#[test]
fn edges_on_both_switches_count_toward_gesture() {
    let mut rig = Rig::offline();
    rig.flip(Channel::One, true);
    rig.flip(Channel::Two, true);
    rig.flip(Channel::One, false);
    rig.flip(Channel::Two, false);
    rig.flip(Channel::One, true);
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);
}

// ── Mode button and portal ────────────────────────────────────

#[test]
fn mode_button_opens_portal_on_press_only() {
    let mut rig = Rig::offline();
    rig.hw.set_mode_button(true);
    rig.run_for(100);
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);

    rig.hw.set_mode_button(false);
    rig.run_for(100);
    assert_eq!(rig.mode_changes_to(Mode::ConfigPortal), 1);
}

#[test]
fn portal_blinks_indicator() {
    let mut rig = Rig::offline();
    rig.step();
    assert!(!rig.hw.indicator);
    rig.command("duorelay/1/set", "set");
    let writes = rig.hw.indicator_writes;
    rig.run_for(2_000);
    assert!(rig.hw.indicator_writes >= writes + 3);
}

#[test]
fn portal_save_persists_and_restarts() {
    let mut rig = Rig::offline();
    rig.hw.set_mode_button(true);
    rig.run_for(100);
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);

    let update = ConfigUpdate {
        wifi_ssid: Some("HomeNet".into()),
        mqtt_server: Some("10.0.0.9".into()),
        mqtt_port: Some("18x3".into()),
        swap_relays: Some(true),
        ..ConfigUpdate::default()
    };
    rig.step_with(vec![InboundEvent::PortalSaved(update)]);

    assert_eq!(rig.module.mode(), Mode::PendingRestart);
    assert_eq!(rig.module.restart_reason(), Some(RestartReason::ConfigSaved));
    let saved = rig.store.saved.borrow().last().cloned().unwrap();
    assert_eq!(saved.broker.host.as_str(), "10.0.0.9");
    assert_eq!(saved.broker.port, 1883, "malformed port keeps previous value");
    assert!(saved.policy.swap_relays);
    assert_eq!(rig.module.config(), &saved);
    assert_eq!(rig.svc.count(ServiceCall::StopPortal), 1);

    rig.run_for(600);
    assert_eq!(rig.svc.count(ServiceCall::Restart), 1);
    rig.run_for(200);
    assert_eq!(rig.svc.count(ServiceCall::Restart), 1);
}

#[test]
fn rejected_portal_save_keeps_portal_open() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "set");
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);

    rig.store.fail_with = Some(ConfigError::StorageFull);
    let update = ConfigUpdate {
        mqtt_server: Some("10.0.0.9".into()),
        ..ConfigUpdate::default()
    };
    rig.step_with(vec![InboundEvent::PortalSaved(update)]);
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::ConfigRejected), 1);
    assert!(rig.module.config().broker.host.is_empty());
}

#[test]
fn portal_times_out_into_restart() {
    let mut rig = Rig::offline();
    rig.command("duorelay/2/set", "set");
    rig.run_for(Timing::default().portal_timeout_ms - 100);
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);
    rig.run_for(200);
    assert_eq!(rig.module.mode(), Mode::PendingRestart);
    assert_eq!(rig.module.restart_reason(), Some(RestartReason::PortalTimeout));
    rig.run_for(600);
    assert_eq!(rig.svc.count(ServiceCall::Restart), 1);
}

#[test]
fn setup_while_in_portal_is_noop() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "set");
    rig.run_for(1_000);
    rig.command("duorelay/1/set", "set");
    assert_eq!(rig.module.mode(), Mode::ConfigPortal);
    assert_eq!(rig.svc.count(ServiceCall::StartPortal), 1);
    assert_eq!(rig.mode_changes_to(Mode::ConfigPortal), 1);
}

#[test]
fn restart_waits_for_busy_portal() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "set");
    rig.svc.portal_busy = true;
    rig.step_with(vec![InboundEvent::PortalSaved(ConfigUpdate::default())]);
    rig.run_for(2_000);
    assert_eq!(rig.svc.count(ServiceCall::Restart), 0);

    rig.svc.portal_busy = false;
    rig.step();
    assert_eq!(rig.svc.count(ServiceCall::Restart), 1);
}

// ── Update mode ───────────────────────────────────────────────

#[test]
fn portal_and_update_are_exclusive() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "ota");
    assert_eq!(rig.module.mode(), Mode::Update);
    assert_eq!(rig.svc.count(ServiceCall::BeginUpdate), 1);

    rig.command("duorelay/1/set", "set");
    assert_eq!(rig.module.mode(), Mode::Update);
    assert_eq!(rig.svc.count(ServiceCall::StartPortal), 0);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::RequestRejected { request: ModeRequest::EnterSetup, mode: Mode::Update }
        )),
        1
    );
}

#[test]
fn update_mode_ignores_relay_commands_and_switches() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "ota");
    rig.command("duorelay/1/set", "1");
    rig.flip(Channel::Two, true);
    assert_eq!(rig.module.relay_states(), [false, false]);
    assert_eq!(rig.hw.relays, [false, false]);
}

#[test]
fn completed_update_restarts_without_abort() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "ota");
    rig.step_with(vec![InboundEvent::UpdateFinished { ok: true }]);
    assert_eq!(rig.module.mode(), Mode::PendingRestart);
    assert_eq!(rig.module.restart_reason(), Some(RestartReason::UpdateApplied));
    assert_eq!(rig.svc.count(ServiceCall::AbortUpdate), 0);
    rig.run_for(600);
    assert_eq!(rig.svc.count(ServiceCall::Restart), 1);
}

#[test]
fn failed_update_waits_for_timeout() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "ota");
    rig.step_with(vec![InboundEvent::UpdateFinished { ok: false }]);
    assert_eq!(rig.module.mode(), Mode::Update);

    rig.run_for(Timing::default().update_timeout_ms);
    assert_eq!(rig.module.mode(), Mode::PendingRestart);
    assert_eq!(rig.module.restart_reason(), Some(RestartReason::UpdateTimeout));
    assert_eq!(rig.svc.count(ServiceCall::AbortUpdate), 1);
}

#[test]
fn reset_command_honored_in_update_mode() {
    let mut rig = Rig::offline();
    rig.command("duorelay/1/set", "ota");
    rig.command("duorelay/2/set", "rst");
    assert_eq!(rig.module.mode(), Mode::PendingRestart);
    assert_eq!(rig.module.restart_reason(), Some(RestartReason::Command));
    assert_eq!(rig.svc.count(ServiceCall::AbortUpdate), 1);
    assert_eq!(
        rig.sink.count(|e| *e == AppEvent::RestartRequested(RestartReason::Command)),
        1
    );
}

// ── Broker connection ─────────────────────────────────────────

#[test]
fn established_session_subscribes_and_publishes_both_channels() {
    let mut rig = Rig::online();
    rig.step();
    assert_eq!(rig.bus.subscriptions, vec!["duorelay/1/set", "duorelay/2/set"]);
    assert_eq!(rig.bus.last_on("duorelay/1/state"), Some("0"));
    assert_eq!(rig.bus.last_on("duorelay/2/state"), Some("0"));
    assert_eq!(rig.sink.count(|e| *e == AppEvent::BusConnected), 1);
    assert!(rig.hw.indicator, "solid while connected");
}

#[test]
fn failed_connects_back_off_linearly() {
    let mut rig = Rig::with(
        online_config(PolicyConfig::default()),
        MockHardware::new(),
        MockBus::unreachable(),
    );
    rig.step();
    assert_eq!(rig.module.broker_delay_ms(), 1_000);
    rig.run_for(1_000);
    assert_eq!(rig.module.broker_delay_ms(), 2_000);
    assert_eq!(rig.bus.connects, 2);

    // Nothing is attempted before the delay expires.
    rig.run_for(1_500);
    assert_eq!(rig.bus.connects, 2);
    rig.run_for(500);
    assert_eq!(rig.bus.connects, 3);
    assert_eq!(rig.module.broker_delay_ms(), 3_000);

    rig.bus.reachable = true;
    rig.run_for(3_000);
    assert!(rig.bus.connected);
    assert_eq!(rig.module.broker_delay_ms(), 0);

    let retries: Vec<u32> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::BusConnectFailed { retry_in_ms, .. } => Some(*retry_in_ms),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1_000, 2_000, 3_000]);
}

#[test]
fn dropped_session_reconnects_and_resubscribes() {
    let mut rig = Rig::online();
    rig.step();
    rig.bus.drop_session();
    assert!(rig.bus.subscriptions.len() == 2);

    rig.flip(Channel::One, true);
    assert_eq!(rig.bus.connects, 2);
    assert_eq!(rig.bus.subscriptions.len(), 2);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::BusConnected), 2);
}

#[test]
fn status_dropped_while_bus_down() {
    let mut rig = Rig::with(
        online_config(PolicyConfig::default()),
        MockHardware::new(),
        MockBus::unreachable(),
    );
    rig.step();
    rig.flip(Channel::One, true);
    assert!(rig.bus.published.is_empty());
    assert!(rig.sink.count(|e| matches!(e, AppEvent::StatusDropped { .. })) >= 1);
    assert!(!rig.hw.indicator);
}
