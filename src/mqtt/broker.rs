//! Broker connection manager: capped linear backoff + resubscribe.
//!
//! ```text
//!  attempt ──fail──▶ delay += step (≤ max) ──wait delay──▶ attempt
//!     │
//!   success ──▶ subscribe both command topics, delay = 0
//! ```
//!
//! The first attempt after boot is immediate.

use log::{info, warn};

use crate::app::ports::{BusError, BusPort};
use crate::config::DeviceConfig;

/// What one `tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerTick {
    /// Session up and subscribed; nothing to do.
    Connected,
    /// Backoff has not elapsed.
    Waiting,
    /// A connect attempt succeeded and subscriptions were issued.
    Established,
    /// A connect or subscribe attempt failed.
    Failed(BusError),
}

#[derive(Debug, Clone)]
pub struct BrokerConnectionManager {
    last_attempt_ms: Option<u64>,
    current_delay_ms: u32,
    subscribed: bool,
    step_ms: u32,
    max_ms: u32,
}

impl BrokerConnectionManager {
    pub fn new(step_ms: u32, max_ms: u32) -> Self {
        Self {
            last_attempt_ms: None,
            current_delay_ms: 0,
            subscribed: false,
            step_ms,
            max_ms,
        }
    }

    pub fn current_delay_ms(&self) -> u32 {
        self.current_delay_ms
    }

    pub fn tick(&mut self, now_ms: u64, bus: &mut impl BusPort, config: &DeviceConfig) -> BrokerTick {
        let connected = bus.is_connected();
        if connected && self.subscribed {
            return BrokerTick::Connected;
        }
        self.subscribed = false;

        // Failed subscribes back off exactly like failed connects.
        if let Some(last) = self.last_attempt_ms {
            if now_ms.saturating_sub(last) < u64::from(self.current_delay_ms) {
                return BrokerTick::Waiting;
            }
        }

        let result = if connected {
            // Session came up (or stayed up) without our subscriptions.
            subscribe_all(bus, config)
        } else {
            info!(
                "broker: connecting to {}:{} as '{}'",
                config.broker.host, config.broker.port, config.broker.client_id
            );
            bus.connect(&config.broker)
                .and_then(|()| subscribe_all(bus, config))
        };
        match result {
            Ok(()) => self.on_success(),
            Err(e) => self.on_failure(now_ms, e),
        }
    }

    fn on_success(&mut self) -> BrokerTick {
        info!("broker: connected and subscribed");
        self.subscribed = true;
        self.current_delay_ms = 0;
        BrokerTick::Established
    }

    fn on_failure(&mut self, now_ms: u64, e: BusError) -> BrokerTick {
        self.last_attempt_ms = Some(now_ms);
        self.current_delay_ms = self.current_delay_ms.saturating_add(self.step_ms).min(self.max_ms);
        warn!("broker: {}, next attempt in {} ms", e, self.current_delay_ms);
        BrokerTick::Failed(e)
    }
}

fn subscribe_all(bus: &mut impl BusPort, config: &DeviceConfig) -> Result<(), BusError> {
    for ch in &config.channels {
        bus.subscribe(&ch.command_topic)?;
    }
    Ok(())
}
