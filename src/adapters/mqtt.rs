//! MQTT client adapter implementing [`BusPort`].
//!
//! Each successful [`connect`](BusPort::connect) opens a fresh session:
//! the previous client (if any) is dropped and a receiver thread is spawned
//! for the new one.  The receiver pushes complete inbound messages onto
//! the inbound queue with [`push_bus_message`](crate::events::push_bus_message)
//! and tracks the session's connected flag.
//!
//! On host targets the adapter is an in-memory broker stand-in that records
//! subscriptions and publications.

use log::{info, warn};

use crate::adapters::wifi::LinkStatus;
use crate::app::ports::{BusError, BusPort};
use crate::config::BrokerConfig;

#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(target_os = "espidf")]
use std::sync::Arc;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

/// How long `connect` waits for the broker CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 5_000;

#[cfg(target_os = "espidf")]
struct Session {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
}

pub struct MqttAdapter {
    link: LinkStatus,

    #[cfg(target_os = "espidf")]
    session: Option<Session>,

    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// Host-side record of broker traffic.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub reachable: bool,
    pub connected: bool,
    pub connects: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>, bool)>,
}

impl MqttAdapter {
    pub fn new(link: LinkStatus) -> Self {
        Self {
            link,
            #[cfg(target_os = "espidf")]
            session: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker {
                reachable: true,
                ..SimBroker::default()
            },
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimBroker {
        &mut self.sim
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn spawn_receiver(mut conn: EspMqttConnection, connected: Arc<AtomicBool>) -> Result<(), BusError> {
    std::thread::Builder::new()
        .name("mqtt-rx".into())
        .stack_size(6 * 1024)
        .spawn(move || {
            while let Ok(event) = conn.next() {
                match event.payload() {
                    EventPayload::Connected(_) => connected.store(true, Ordering::Release),
                    EventPayload::Disconnected => connected.store(false, Ordering::Release),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => {
                        crate::events::push_bus_message(topic, data);
                    }
                    _ => {}
                }
            }
            connected.store(false, Ordering::Release);
            info!("MQTT: receiver exited");
        })
        .map(|_| ())
        .map_err(|_| BusError::ConnectFailed)
}

#[cfg(target_os = "espidf")]
impl BusPort for MqttAdapter {
    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.connected.load(Ordering::Acquire))
    }

    fn connect(&mut self, broker: &BrokerConfig) -> Result<(), BusError> {
        if !self.link.is_up() {
            return Err(BusError::LinkDown);
        }
        // Drop the old client first so its receiver thread winds down.
        self.session = None;

        let url = format!("mqtt://{}:{}", broker.host, broker.port);
        let conf = MqttClientConfiguration {
            client_id: Some(broker.client_id.as_str()),
            username: (!broker.username.is_empty()).then_some(broker.username.as_str()),
            password: (!broker.password.is_empty()).then_some(broker.password.as_str()),
            ..Default::default()
        };
        let (client, conn) = EspMqttClient::new(&url, &conf).map_err(|e| {
            warn!("MQTT: client init for {} failed: {:?}", url, e);
            BusError::ConnectFailed
        })?;
        let connected = Arc::new(AtomicBool::new(false));
        spawn_receiver(conn, connected.clone())?;

        let mut waited = 0;
        while !connected.load(Ordering::Acquire) && waited < CONNECT_TIMEOUT_MS {
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(50);
            waited += 50;
        }
        if !connected.load(Ordering::Acquire) {
            return Err(BusError::ConnectFailed);
        }

        info!("MQTT: session open with {} as '{}'", url, broker.client_id);
        self.session = Some(Session { client, connected });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        let session = self.session.as_mut().ok_or(BusError::NotConnected)?;
        session
            .client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| BusError::SubscribeFailed)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BusError> {
        let session = self.session.as_mut().ok_or(BusError::NotConnected)?;
        session
            .client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| BusError::PublishFailed)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl BusPort for MqttAdapter {
    fn is_connected(&self) -> bool {
        self.sim.connected && self.link.is_up()
    }

    fn connect(&mut self, broker: &BrokerConfig) -> Result<(), BusError> {
        if !self.link.is_up() {
            return Err(BusError::LinkDown);
        }
        self.sim.connects += 1;
        self.sim.subscriptions.clear();
        if !self.sim.reachable {
            warn!("MQTT(sim): broker {}:{} unreachable", broker.host, broker.port);
            self.sim.connected = false;
            return Err(BusError::ConnectFailed);
        }
        info!("MQTT(sim): session open as '{}'", broker.client_id);
        self.sim.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        self.sim.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        self.sim.published.push((topic.to_owned(), payload.to_vec(), retain));
        Ok(())
    }
}
