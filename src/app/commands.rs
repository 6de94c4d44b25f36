//! Inbound commands to the relay module service.
//!
//! Decoded from bus messages by the [`dispatch`](crate::mqtt::dispatch)
//! layer and interpreted by the [`RelayModule`](super::service::RelayModule).

use crate::channel::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Drive one relay, bypassing switch policy.
    SetRelay { channel: Channel, on: bool },
    /// Open the configuration portal (`set`).
    EnterSetup,
    /// Start a firmware update session (`ota`).
    EnterUpdate,
    /// Restart the device (`rst`).
    Reset,
}
