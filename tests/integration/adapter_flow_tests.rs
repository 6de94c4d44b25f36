//! End-to-end flows through the host simulation adapters: NVS store,
//! WiFi radio, MQTT client, portal server, and the inbound queue.

use duorelay::adapters::device_id;
use duorelay::adapters::mqtt::MqttAdapter;
use duorelay::adapters::nvs::NvsAdapter;
use duorelay::adapters::system::DeviceServices;
use duorelay::adapters::wifi::{WifiAdapter, WifiState};
use duorelay::app::events::AppEvent;
use duorelay::app::ports::{BusError, ConfigError, ConfigPort};
use duorelay::app::service::RelayModule;
use duorelay::channel::Channel;
use duorelay::config::{DeviceConfig, Timing};
use duorelay::events::{drain_inbound, push_bus_message};
use duorelay::fsm::Mode;

use super::mock_hw::{MockHardware, RecordingSink};

fn boot_wifi(config: &DeviceConfig) -> WifiAdapter {
    let mut wifi = WifiAdapter::new();
    if config.has_connectivity() {
        wifi.set_credentials(&config.wifi).unwrap();
        wifi.start_station(0).unwrap();
    }
    wifi
}

fn step(
    now: &mut u64,
    module: &mut RelayModule,
    hw: &mut MockHardware,
    bus: &mut MqttAdapter,
    services: &mut DeviceServices,
    nvs: &NvsAdapter,
    sink: &mut RecordingSink,
) {
    *now += 20;
    services.wifi_mut().poll(*now);
    module.cycle(*now, drain_inbound(), hw, bus, services, nvs, sink);
}

/// First boot → portal → saved settings → restart → online.
///
/// The only test in this binary that uses the process-wide inbound queue.
#[test]
fn provisioning_then_online_boot() {
    let nvs = NvsAdapter::new().unwrap();
    assert_eq!(nvs.load(), Err(ConfigError::NotFound));

    let mac = device_id::read_mac();
    let mut config = DeviceConfig::default();
    device_id::apply_default_client_id(&mut config, &mac);

    let wifi = boot_wifi(&config);
    let mut bus = MqttAdapter::new(wifi.link_status());
    let mut services = DeviceServices::new(wifi, device_id::portal_ssid(&mac));
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let mut module = RelayModule::new(config, Timing::default());
    module.start(0, &mut hw, &mut sink);
    drain_inbound();

    let mut now = 0;

    // Mode button opens the portal on an access point.
    hw.set_mode_button(true);
    for _ in 0..5 {
        step(&mut now, &mut module, &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    }
    assert_eq!(module.mode(), Mode::ConfigPortal);
    assert_eq!(services.wifi().state(), WifiState::AccessPoint);
    assert!(services.portal().is_running());

    services
        .portal()
        .sim_submit(
            br#"{"wifi_ssid":"HomeNet","wifi_pass":"password1","mqtt_server":"10.0.0.2",
                "out_topic_1":"hall/light/state","in_topic_1":"hall/light/set"}"#,
        )
        .unwrap();
    step(&mut now, &mut module, &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    assert_eq!(module.mode(), Mode::PendingRestart);
    assert!(!services.portal().is_running());

    for _ in 0..30 {
        step(&mut now, &mut module, &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    }
    assert_eq!(services.restarts(), 1);

    // ── Reboot with the stored settings ──
    let config = nvs.load().unwrap();
    assert!(config.has_connectivity());
    assert_eq!(config.broker.client_id.as_str(), "duorelay-efcafe");
    assert_eq!(config.channels[0].command_topic.as_str(), "hall/light/set");

    let wifi = boot_wifi(&config);
    let mut bus = MqttAdapter::new(wifi.link_status());
    let mut services = DeviceServices::new(wifi, device_id::portal_ssid(&mac));
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let mut module = RelayModule::new(config, Timing::default());
    module.start(now, &mut hw, &mut sink);
    assert!(module.is_online());
    assert_eq!(module.mode(), Mode::Normal);
    assert!(!services.portal().is_running());

    step(&mut now, &mut module, &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    assert_eq!(
        bus.sim().subscriptions,
        vec!["hall/light/set".to_string(), "duorelay/2/set".to_string()]
    );

    assert!(push_bus_message("hall/light/set", b"1"));
    step(&mut now, &mut module, &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    assert_eq!(hw.relays, [true, false]);
    let last = bus.sim().published.last().cloned().unwrap();
    assert_eq!(last, ("hall/light/state".to_string(), b"1".to_vec(), true));
}

#[test]
fn broker_waits_for_wifi_link() {
    let mut config = DeviceConfig::default();
    config.wifi.ssid.push_str("HomeNet").unwrap();
    config.broker.host.push_str("10.0.0.2").unwrap();

    let mut wifi = boot_wifi(&config);
    wifi.sim_set_reachable(false);
    let mut bus = MqttAdapter::new(wifi.link_status());
    let mut services = DeviceServices::new(wifi, "DuoRelay-TEST".try_into().unwrap());
    let nvs = NvsAdapter::new().unwrap();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let mut module = RelayModule::new(config, Timing::default());
    module.start(0, &mut hw, &mut sink);

    let mut now = 0;
    for _ in 0..10 {
        now += 20;
        services.wifi_mut().poll(now);
        module.cycle(now, Vec::new(), &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    }
    assert_eq!(
        sink.events
            .iter()
            .find(|e| matches!(e, AppEvent::BusConnectFailed { .. })),
        Some(&AppEvent::BusConnectFailed {
            error: BusError::LinkDown,
            retry_in_ms: 1_000
        })
    );
    assert_eq!(bus.sim().connects, 0);

    // The radio comes back; the broker follows on its next attempt.
    services.wifi_mut().sim_set_reachable(true);
    for _ in 0..300 {
        now += 20;
        services.wifi_mut().poll(now);
        module.cycle(now, Vec::new(), &mut hw, &mut bus, &mut services, &nvs, &mut sink);
    }
    assert!(services.wifi().is_connected());
    assert_eq!(bus.sim().connects, 1);
    assert_eq!(module.broker_delay_ms(), 0);
    assert!(sink.events.contains(&AppEvent::BusConnected));
    assert!(sink
        .events
        .iter()
        .all(|e| !matches!(e, AppEvent::RelayChanged { relay: Channel::Two, .. })));
}
