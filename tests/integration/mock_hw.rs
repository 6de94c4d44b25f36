//! Mock adapters for integration tests.
//!
//! Every port call is recorded so tests can assert on the full history
//! without touching real GPIO, sockets, or flash.

use std::cell::RefCell;

use duorelay::app::events::AppEvent;
use duorelay::app::ports::{
    BusError, BusPort, ConfigError, ConfigPort, ConnectivityError, EventSink, IndicatorPort,
    InputPort, PortalPort, RawInputs, RelayPort, SystemPort, UpdateError, UpdatePort,
};
use duorelay::channel::Channel;
use duorelay::config::{BrokerConfig, DeviceConfig};

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub raw: RawInputs,
    pub relays: [bool; 2],
    pub relay_calls: Vec<(Channel, bool)>,
    pub indicator: bool,
    pub indicator_writes: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            raw: RawInputs::default(),
            relays: [false; 2],
            relay_calls: Vec::new(),
            indicator: false,
            indicator_writes: 0,
        }
    }

    /// Close (`true`) or open a wall switch.  Active-low line.
    pub fn set_switch(&mut self, ch: Channel, closed: bool) {
        self.raw.switches[ch.index()] = !closed;
    }

    pub fn set_mode_button(&mut self, pressed: bool) {
        self.raw.mode_button = !pressed;
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl InputPort for MockHardware {
    fn read_inputs(&mut self) -> RawInputs {
        self.raw
    }
}

impl RelayPort for MockHardware {
    fn set_relay(&mut self, channel: Channel, energized: bool) {
        self.relays[channel.index()] = energized;
        self.relay_calls.push((channel, energized));
    }
}

impl IndicatorPort for MockHardware {
    fn set_indicator(&mut self, lit: bool) {
        self.indicator = lit;
        self.indicator_writes += 1;
    }
}

// ── MockBus ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

pub struct MockBus {
    pub reachable: bool,
    pub connected: bool,
    pub connects: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<Publication>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self {
            reachable: true,
            connected: false,
            connects: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Broker drops the session.
    pub fn drop_session(&mut self) {
        self.connected = false;
    }

    pub fn published_on(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.as_str())
            .collect()
    }

    pub fn last_on(&self, topic: &str) -> Option<&str> {
        self.published_on(topic).last().copied()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusPort for MockBus {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self, _broker: &BrokerConfig) -> Result<(), BusError> {
        self.connects += 1;
        self.subscriptions.clear();
        if !self.reachable {
            return Err(BusError::ConnectFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::NotConnected);
        }
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::NotConnected);
        }
        self.published.push(Publication {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        Ok(())
    }
}

// ── MockServices (portal + update + system) ───────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCall {
    StartPortal,
    StopPortal,
    BeginUpdate,
    AbortUpdate,
    Restart,
}

pub struct MockServices {
    pub calls: Vec<ServiceCall>,
    pub portal_busy: bool,
    pub update_busy: bool,
    pub fail_portal: bool,
}

#[allow(dead_code)]
impl MockServices {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            portal_busy: false,
            update_busy: false,
            fail_portal: false,
        }
    }

    pub fn count(&self, call: ServiceCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalPort for MockServices {
    fn start_portal(&mut self) -> Result<(), ConnectivityError> {
        self.calls.push(ServiceCall::StartPortal);
        if self.fail_portal {
            return Err(ConnectivityError::AccessPointFailed);
        }
        Ok(())
    }

    fn stop_portal(&mut self) {
        self.calls.push(ServiceCall::StopPortal);
    }

    fn portal_busy(&self) -> bool {
        self.portal_busy
    }
}

impl UpdatePort for MockServices {
    fn begin_update(&mut self) -> Result<(), UpdateError> {
        self.calls.push(ServiceCall::BeginUpdate);
        Ok(())
    }

    fn abort_update(&mut self) {
        self.calls.push(ServiceCall::AbortUpdate);
    }

    fn update_busy(&self) -> bool {
        self.update_busy
    }
}

impl SystemPort for MockServices {
    fn restart(&mut self) {
        self.calls.push(ServiceCall::Restart);
    }
}

// ── MockStore ─────────────────────────────────────────────────

pub struct MockStore {
    pub saved: RefCell<Vec<DeviceConfig>>,
    pub fail_with: Option<ConfigError>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            saved: RefCell::new(Vec::new()),
            fail_with: None,
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for MockStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        self.saved.borrow().last().cloned().ok_or(ConfigError::NotFound)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        config.validate()?;
        self.saved.borrow_mut().push(config.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
