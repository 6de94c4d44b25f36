//! Outbound application events.
//!
//! The [`RelayModule`](super::service::RelayModule) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide where they go.

use crate::app::ports::BusError;
use crate::channel::Channel;
use crate::fsm::Mode;
use crate::fsm::context::{ModeRequest, RestartReason};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service started.  `online` = connectivity is configured.
    Started { online: bool },

    ModeChanged { from: Mode, to: Mode },

    /// A mode request was refused by the current mode.
    RequestRejected { request: ModeRequest, mode: Mode },

    RelayChanged { relay: Channel, energized: bool },

    /// Status sent on the channel's output topic.
    StatusPublished { relay: Channel, payload: heapless::String<2> },

    /// Status could not be sent (bus down or publish failed).
    StatusDropped { relay: Channel },

    BusConnected,

    BusConnectFailed { error: BusError, retry_in_ms: u32 },

    /// The portal submitted a configuration that failed validation or
    /// could not be stored.
    ConfigRejected,

    RestartRequested(RestartReason),
}
