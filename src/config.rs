//! Device configuration
//!
//! Connection settings, per-channel topics, and relay policy for the
//! DuoRelay module.  Values are persisted in NVS as a flat key/value
//! record and replaced through the configuration portal.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::app::ports::ConfigError;
use crate::channel::Channel;

pub type HostString = heapless::String<64>;
pub type TopicString = heapless::String<64>;
pub type ShortString = heapless::String<32>;
pub type SecretString = heapless::String<64>;

// ---------------------------------------------------------------------------
// Record keys (flat key/value layout shared by NVS and the portal form)
// ---------------------------------------------------------------------------

pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASS: &str = "wifi_pass";
pub const KEY_BROKER_HOST: &str = "mqtt_server";
pub const KEY_BROKER_PORT: &str = "mqtt_port";
pub const KEY_CLIENT_ID: &str = "client_id";
pub const KEY_BROKER_USER: &str = "mqtt_user";
pub const KEY_BROKER_PASS: &str = "mqtt_pass";
pub const KEY_OUT_TOPIC: [&str; 2] = ["out_topic_1", "out_topic_2"];
pub const KEY_CMD_TOPIC: [&str; 2] = ["in_topic_1", "in_topic_2"];
pub const KEY_SWAP_RELAYS: &str = "swap_relays";
pub const KEY_RESPECT_SWITCH: &str = "respect_switch";
pub const KEY_INVERT_SWITCH: &str = "invert_switch";

pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Station credentials for the upstream WiFi network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: ShortString,
    pub password: SecretString,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Host name or dotted IPv4 address.  Empty = no broker configured.
    pub host: HostString,
    pub port: u16,
    /// Empty means "derive from the factory MAC at boot".
    pub client_id: ShortString,
    pub username: ShortString,
    pub password: SecretString,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: HostString::new(),
            port: DEFAULT_BROKER_PORT,
            client_id: ShortString::new(),
            username: ShortString::new(),
            password: SecretString::new(),
        }
    }
}

/// Topics for one relay channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Retained status topic (`"1"`, `"0"`, `"1."`, `"0."`).
    pub output_topic: TopicString,
    /// Inbound command topic.
    pub command_topic: TopicString,
}

impl ChannelConfig {
    fn default_for(ch: Channel) -> Self {
        let n = ch.index() + 1;
        Self {
            output_topic: topic(&format_topic(n, "state")),
            command_topic: topic(&format_topic(n, "set")),
        }
    }
}

/// Switch → relay policy flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Switch 1 drives relay 2 and vice versa.
    pub swap_relays: bool,
    /// Logical "pressed" maps to de-energize when mirroring.
    pub invert_switch: bool,
    /// Relay mirrors the switch position instead of toggling on each edge.
    pub respect_switch_state: bool,
}

/// Complete persisted device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub wifi: WifiCredentials,
    pub broker: BrokerConfig,
    pub channels: [ChannelConfig; 2],
    pub policy: PolicyConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            wifi: WifiCredentials::default(),
            broker: BrokerConfig::default(),
            channels: [
                ChannelConfig::default_for(Channel::One),
                ChannelConfig::default_for(Channel::Two),
            ],
            policy: PolicyConfig::default(),
        }
    }
}

/// Fixed timing parameters of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause between control cycles.
    pub cycle_ms: u32,
    /// A raw input level must be stable this long to count as an edge.
    pub debounce_ms: u32,
    /// Maximum gap between switch edges that still extends a gesture.
    pub gesture_window_ms: u32,
    /// Edges needed to complete the setup gesture.
    pub gesture_count: u8,
    pub portal_timeout_ms: u64,
    pub update_timeout_ms: u64,
    /// Backoff growth per failed broker connect.
    pub backoff_step_ms: u32,
    /// Backoff ceiling.
    pub backoff_max_ms: u32,
    /// Minimum time spent in PENDING_RESTART before rebooting.
    pub restart_settle_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            cycle_ms: 20,
            debounce_ms: 50,
            gesture_window_ms: 500,
            gesture_count: 5,
            portal_timeout_ms: 5 * 60 * 1000,
            update_timeout_ms: 5 * 60 * 1000,
            backoff_step_ms: 1_000,
            backoff_max_ms: 60_000,
            restart_settle_ms: 500,
        }
    }
}

/// Configuration submitted through the portal.
///
/// Every string field that is absent or empty keeps the previous value.
/// Flags that are absent keep the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigUpdate {
    pub wifi_ssid: Option<String>,
    pub wifi_pass: Option<String>,
    pub mqtt_server: Option<String>,
    pub mqtt_port: Option<String>,
    pub client_id: Option<String>,
    pub mqtt_user: Option<String>,
    pub mqtt_pass: Option<String>,
    pub out_topic_1: Option<String>,
    pub in_topic_1: Option<String>,
    pub out_topic_2: Option<String>,
    pub in_topic_2: Option<String>,
    pub swap_relays: Option<bool>,
    pub respect_switch: Option<bool>,
    pub invert_switch: Option<bool>,
}

impl DeviceConfig {
    pub fn channel(&self, ch: Channel) -> &ChannelConfig {
        &self.channels[ch.index()]
    }

    /// True when both WiFi credentials and a broker host are present.
    /// Without them the module runs in offline normal mode.
    pub fn has_connectivity(&self) -> bool {
        !self.wifi.ssid.is_empty() && !self.broker.host.is_empty()
    }

    /// Apply a portal submission on top of this config.
    ///
    /// The merged result is validated as a whole; on error `self` is the
    /// config that stays in effect.
    pub fn merged(&self, update: &ConfigUpdate) -> Result<DeviceConfig, ConfigError> {
        let mut next = self.clone();

        keep_or_set(&mut next.wifi.ssid, update.wifi_ssid.as_deref(), KEY_WIFI_SSID)?;
        keep_or_set(&mut next.wifi.password, update.wifi_pass.as_deref(), KEY_WIFI_PASS)?;
        keep_or_set(&mut next.broker.host, update.mqtt_server.as_deref(), KEY_BROKER_HOST)?;
        keep_or_set(&mut next.broker.client_id, update.client_id.as_deref(), KEY_CLIENT_ID)?;
        keep_or_set(&mut next.broker.username, update.mqtt_user.as_deref(), KEY_BROKER_USER)?;
        keep_or_set(&mut next.broker.password, update.mqtt_pass.as_deref(), KEY_BROKER_PASS)?;

        if let Some(raw) = update.mqtt_port.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match parse_port(raw) {
                Some(port) => next.broker.port = port,
                None => warn!("config: ignoring malformed broker port '{}'", raw),
            }
        }

        let topics = [
            (&update.out_topic_1, &update.in_topic_1),
            (&update.out_topic_2, &update.in_topic_2),
        ];
        for (idx, (out, cmd)) in topics.into_iter().enumerate() {
            let ch = &mut next.channels[idx];
            keep_or_set(&mut ch.output_topic, out.as_deref(), KEY_OUT_TOPIC[idx])?;
            keep_or_set(&mut ch.command_topic, cmd.as_deref(), KEY_CMD_TOPIC[idx])?;
        }

        if let Some(v) = update.swap_relays {
            next.policy.swap_relays = v;
        }
        if let Some(v) = update.respect_switch {
            next.policy.respect_switch_state = v;
        }
        if let Some(v) = update.invert_switch {
            next.policy.invert_switch = v;
        }

        next.validate()?;
        Ok(next)
    }

    /// Range and format checks applied before anything is persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be 1-65535"));
        }
        for ch in &self.channels {
            for t in [&ch.output_topic, &ch.command_topic] {
                if t.is_empty() {
                    return Err(ConfigError::ValidationFailed("topics must not be empty"));
                }
                if t.contains(['+', '#']) {
                    return Err(ConfigError::ValidationFailed(
                        "topics must not contain MQTT wildcards",
                    ));
                }
            }
        }
        Ok(())
    }

    // ── Flat record codec ─────────────────────────────────────

    /// Encode as a flat JSON object (one key per field).
    pub fn to_record(&self) -> Map<String, Value> {
        let mut m = Map::new();
        let mut put = |k: &str, v: &str| {
            m.insert(k.into(), Value::String(v.into()));
        };
        put(KEY_WIFI_SSID, &self.wifi.ssid);
        put(KEY_WIFI_PASS, &self.wifi.password);
        put(KEY_BROKER_HOST, &self.broker.host);
        put(KEY_CLIENT_ID, &self.broker.client_id);
        put(KEY_BROKER_USER, &self.broker.username);
        put(KEY_BROKER_PASS, &self.broker.password);
        for (idx, ch) in self.channels.iter().enumerate() {
            put(KEY_OUT_TOPIC[idx], &ch.output_topic);
            put(KEY_CMD_TOPIC[idx], &ch.command_topic);
        }
        m.insert(KEY_BROKER_PORT.into(), Value::from(self.broker.port));
        m.insert(KEY_SWAP_RELAYS.into(), Value::Bool(self.policy.swap_relays));
        m.insert(KEY_RESPECT_SWITCH.into(), Value::Bool(self.policy.respect_switch_state));
        m.insert(KEY_INVERT_SWITCH.into(), Value::Bool(self.policy.invert_switch));
        m
    }

    /// Decode a flat record, falling back to the built-in default for every
    /// field that is missing or unreadable.
    ///
    /// Returns the config and the number of fields that fell back.
    pub fn from_record(record: &Map<String, Value>) -> (DeviceConfig, usize) {
        let mut cfg = DeviceConfig::default();
        let mut fallbacks = 0usize;

        let mut read_str = |key: &str, dst: &mut dyn StrField| match record.get(key) {
            Some(Value::String(s)) => {
                if dst.set(s).is_err() {
                    warn!("config: field '{}' too long, using default", key);
                    fallbacks += 1;
                }
            }
            Some(_) => {
                warn!("config: field '{}' has wrong type, using default", key);
                fallbacks += 1;
            }
            None => fallbacks += 1,
        };

        read_str(KEY_WIFI_SSID, &mut cfg.wifi.ssid);
        read_str(KEY_WIFI_PASS, &mut cfg.wifi.password);
        read_str(KEY_BROKER_HOST, &mut cfg.broker.host);
        read_str(KEY_CLIENT_ID, &mut cfg.broker.client_id);
        read_str(KEY_BROKER_USER, &mut cfg.broker.username);
        read_str(KEY_BROKER_PASS, &mut cfg.broker.password);
        for idx in 0..2 {
            read_str(KEY_OUT_TOPIC[idx], &mut cfg.channels[idx].output_topic);
            read_str(KEY_CMD_TOPIC[idx], &mut cfg.channels[idx].command_topic);
        }

        let port = match record.get(KEY_BROKER_PORT) {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => parse_port(s.trim()),
            _ => None,
        };
        match port.filter(|p| *p != 0) {
            Some(p) => cfg.broker.port = p,
            None => {
                warn!("config: broker port unreadable, using {}", DEFAULT_BROKER_PORT);
                fallbacks += 1;
            }
        }

        let flags = [
            (KEY_SWAP_RELAYS, &mut cfg.policy.swap_relays),
            (KEY_RESPECT_SWITCH, &mut cfg.policy.respect_switch_state),
            (KEY_INVERT_SWITCH, &mut cfg.policy.invert_switch),
        ];
        for (key, dst) in flags {
            match record.get(key).and_then(read_flag) {
                Some(v) => *dst = v,
                None => fallbacks += 1,
            }
        }

        // An empty or wildcard topic from storage is as unusable as a missing one.
        let defaults = DeviceConfig::default();
        for idx in 0..2 {
            let ch = &mut cfg.channels[idx];
            if !topic_usable(&ch.output_topic) {
                ch.output_topic = defaults.channels[idx].output_topic.clone();
                fallbacks += 1;
            }
            if !topic_usable(&ch.command_topic) {
                ch.command_topic = defaults.channels[idx].command_topic.clone();
                fallbacks += 1;
            }
        }

        (cfg, fallbacks)
    }

    /// Serialize the flat record to JSON bytes for storage.
    pub fn to_record_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec(&Value::Object(self.to_record())).map_err(|_| ConfigError::IoError)
    }

    /// Parse stored JSON bytes.  A blob that is not a JSON object at all is
    /// reported as [`ConfigError::Corrupted`].
    pub fn from_record_bytes(bytes: &[u8]) -> Result<(DeviceConfig, usize), ConfigError> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Self::from_record(&map)),
            _ => Err(ConfigError::Corrupted),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Object-safe setter over the differently sized heapless strings.
trait StrField {
    fn set(&mut self, s: &str) -> Result<(), ()>;
}

impl<const N: usize> StrField for heapless::String<N> {
    fn set(&mut self, s: &str) -> Result<(), ()> {
        let mut next = heapless::String::<N>::new();
        next.push_str(s)?;
        *self = next;
        Ok(())
    }
}

fn keep_or_set<const N: usize>(
    dst: &mut heapless::String<N>,
    value: Option<&str>,
    field: &'static str,
) -> Result<(), ConfigError> {
    let Some(v) = value.filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    dst.set(v).map_err(|()| ConfigError::TooLong(field))
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|p| *p != 0)
}

fn read_flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "1" | "true" | "on" => Some(true),
            "0" | "false" | "off" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

fn topic_usable(t: &str) -> bool {
    !t.is_empty() && !t.contains(['+', '#'])
}

fn format_topic(n: usize, leaf: &str) -> heapless::String<32> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = write!(s, "duorelay/{}/{}", n, leaf);
    s
}

fn topic(s: &str) -> TopicString {
    let mut t = TopicString::new();
    let _ = t.push_str(s);
    t
}
