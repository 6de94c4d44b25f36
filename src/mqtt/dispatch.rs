//! Command dispatcher: `(topic, payload)` → [`AppCommand`]s.
//!
//! The topic must equal a channel's command topic exactly.  The payload is
//! matched by prefix, each rule on its own:
//!
//! | prefix | command                          | scope                |
//! |--------|----------------------------------|----------------------|
//! | `1`    | `SetRelay { on: true }`          | matching channel(s)  |
//! | `0`    | `SetRelay { on: false }`         | matching channel(s)  |
//! | `set`  | `EnterSetup`                     | either command topic |
//! | `ota`  | `EnterUpdate`                    | either command topic |
//! | `rst`  | `Reset`                          | either command topic |
//!
//! Anything else decodes to nothing.

use heapless::Vec;

use crate::app::commands::AppCommand;
use crate::channel::Channel;
use crate::config::ChannelConfig;

/// Upper bound on commands from one message.
pub const MAX_COMMANDS: usize = 4;

pub fn decode(
    topic: &str,
    payload: &[u8],
    channels: &[ChannelConfig; 2],
) -> Vec<AppCommand, MAX_COMMANDS> {
    let mut out = Vec::new();

    let matched: Vec<Channel, 2> = Channel::ALL
        .into_iter()
        .filter(|ch| channels[ch.index()].command_topic.as_str() == topic)
        .collect();
    if matched.is_empty() {
        return out;
    }

    for &ch in &matched {
        if payload.starts_with(b"1") {
            let _ = out.push(AppCommand::SetRelay { channel: ch, on: true });
        }
        if payload.starts_with(b"0") {
            let _ = out.push(AppCommand::SetRelay { channel: ch, on: false });
        }
    }
    if payload.starts_with(b"set") {
        let _ = out.push(AppCommand::EnterSetup);
    }
    if payload.starts_with(b"ota") {
        let _ = out.push(AppCommand::EnterUpdate);
    }
    if payload.starts_with(b"rst") {
        let _ = out.push(AppCommand::Reset);
    }
    out
}
