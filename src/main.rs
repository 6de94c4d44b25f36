//! DuoRelay firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     LogEventSink   NvsAdapter   MonotonicClock│
//! │  (Input+Relay+LED)   (EventSink)    (Config)                   │
//! │  MqttAdapter         DeviceServices                            │
//! │  (BusPort)           (WiFi + portal + OTA + restart)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              RelayModule (pure logic)                  │    │
//! │  │  Mode FSM · Input sampler · Relay engine · Dispatcher  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Inbound queue (MQTT rx thread, portal + OTA HTTP handlers)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, IOPin, Input, OutputPin as _, PinDriver, Pull};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::wifi::EspWifi;

use duorelay::adapters::device_id;
use duorelay::adapters::hardware::HardwareAdapter;
use duorelay::adapters::log_sink::LogEventSink;
use duorelay::adapters::mqtt::MqttAdapter;
use duorelay::adapters::nvs::NvsAdapter;
use duorelay::adapters::ota;
use duorelay::adapters::system::DeviceServices;
use duorelay::adapters::time::MonotonicClock;
use duorelay::adapters::wifi::WifiAdapter;
use duorelay::app::ports::{ConfigError, ConfigPort};
use duorelay::app::service::RelayModule;
use duorelay::config::{DeviceConfig, Timing};
use duorelay::drivers::relay_output::RelayOutputs;
use duorelay::drivers::status_led::StatusLed;
use duorelay::drivers::switch_input::SwitchInputs;
use duorelay::drivers::watchdog::Watchdog;
use duorelay::error::Error;
use duorelay::events::drain_inbound;
use duorelay::pins;

fn pulled_up_input(pin: AnyIOPin) -> Result<PinDriver<'static, AnyIOPin, Input>> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Up)?;
    Ok(driver)
}

fn load_config(nvs: &NvsAdapter) -> DeviceConfig {
    match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(ConfigError::NotFound) => {
            info!("No stored config (first boot), using defaults");
            DeviceConfig::default()
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("DuoRelay v{}", env!("CARGO_PKG_VERSION"));

    ota::check_rollback();
    let timing = Timing::default();
    let mut watchdog = Watchdog::default();

    // ── 2. Config ─────────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(Error::from)?;
    let mut config = load_config(&nvs);
    let mac = device_id::read_mac();
    device_id::apply_default_client_id(&mut config, &mac);

    // ── 3. GPIO ───────────────────────────────────────────────
    info!(
        "GPIO: switches {:?}, mode button {}, relays {:?}, LED {}",
        pins::SWITCH_GPIOS,
        pins::MODE_BUTTON_GPIO,
        pins::RELAY_GPIOS,
        pins::STATUS_LED_GPIO
    );
    let peripherals = Peripherals::take()?;
    let p = peripherals.pins;
    let inputs = SwitchInputs::new(
        [
            pulled_up_input(p.gpio4.downgrade())?,
            pulled_up_input(p.gpio5.downgrade())?,
        ],
        pulled_up_input(p.gpio0.downgrade())?,
    );
    let relays = RelayOutputs::new([
        PinDriver::output(p.gpio12.downgrade_output())?,
        PinDriver::output(p.gpio13.downgrade_output())?,
    ]);
    let led = StatusLed::new(PinDriver::output(p.gpio2.downgrade_output())?);
    let mut hw = HardwareAdapter::new(inputs, relays, led);

    // ── 4. Network ────────────────────────────────────────────
    let clock = MonotonicClock::new();
    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = WifiAdapter::new(EspWifi::new(peripherals.modem, sysloop, None)?);
    if config.has_connectivity() {
        let started = wifi
            .set_credentials(&config.wifi)
            .and_then(|()| wifi.start_station(clock.now_ms()));
        if let Err(e) = started {
            warn!("WiFi station start failed: {}", e);
        }
    } else {
        info!("No WiFi/broker settings, running offline");
    }
    let mut bus = MqttAdapter::new(wifi.link_status());
    let mut services = DeviceServices::new(wifi, device_id::portal_ssid(&mac));

    // ── 5. Control loop ───────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut module = RelayModule::new(config, timing);
    module.start(clock.now_ms(), &mut hw, &mut sink);

    loop {
        let now = clock.now_ms();
        services.wifi_mut().poll(now);
        module.cycle(now, drain_inbound(), &mut hw, &mut bus, &mut services, &nvs, &mut sink);
        watchdog.feed();
        FreeRtos::delay_ms(timing.cycle_ms);
    }
}
