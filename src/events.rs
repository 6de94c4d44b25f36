//! Inbound event queue.
//!
//! Bus, portal, and update callbacks run on their own threads.  They never
//! touch domain state; instead they push an [`InboundEvent`] into a bounded
//! `embassy-sync` channel that the control loop drains once per cycle.
//!
//! ```text
//! ┌──────────────┐
//! │ MQTT thread  │──┐
//! │ HTTP handler │──┼──▶ INBOUND (bounded) ──▶ control loop (drain/cycle)
//! │ OTA session  │──┘
//! └──────────────┘
//! ```
//!
//! A full queue drops the new event; nothing is retried.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::config::ConfigUpdate;

/// Longest topic accepted from the bus.
pub const MAX_TOPIC_LEN: usize = 64;
/// Longest payload accepted from the bus.
pub const MAX_PAYLOAD_LEN: usize = 32;

/// Channel depth.
const INBOUND_DEPTH: usize = 16;

/// Outside-world events delivered to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message arrived on a subscribed topic.
    BusMessage {
        topic: heapless::String<MAX_TOPIC_LEN>,
        payload: Vec<u8, MAX_PAYLOAD_LEN>,
    },
    /// The portal form was submitted.
    PortalSaved(ConfigUpdate),
    /// The update collaborator finished writing an image.  `ok` = the new
    /// image was verified and marked bootable.
    UpdateFinished { ok: bool },
}

impl InboundEvent {
    /// Build a bus message, rejecting topics or payloads over the bounds.
    pub fn bus_message(topic: &str, payload: &[u8]) -> Option<Self> {
        let mut t = heapless::String::new();
        t.push_str(topic).ok()?;
        let p = Vec::from_slice(payload).ok()?;
        Some(Self::BusMessage { topic: t, payload: p })
    }
}

/// Inbound channel: collaborator threads → control loop.
pub static INBOUND: Channel<CriticalSectionRawMutex, InboundEvent, INBOUND_DEPTH> = Channel::new();

/// Push an event.  Returns `false` if the queue is full (event dropped).
pub fn push_inbound(event: InboundEvent) -> bool {
    INBOUND.try_send(event).is_ok()
}

/// Push a raw bus message.  Returns `false` if it is oversized or the queue
/// is full.
pub fn push_bus_message(topic: &str, payload: &[u8]) -> bool {
    match InboundEvent::bus_message(topic, payload) {
        Some(ev) => push_inbound(ev),
        None => {
            log::debug!("inbound: dropped oversized message on '{}'", topic);
            false
        }
    }
}

/// Take every pending event, FIFO order.
pub fn drain_inbound() -> Vec<InboundEvent, INBOUND_DEPTH> {
    let mut out = Vec::new();
    while let Ok(ev) = INBOUND.try_receive() {
        // Capacity equals channel depth, so this cannot overflow.
        let _ = out.push(ev);
    }
    out
}

/// Serialises unit tests that touch the static queue.
#[cfg(test)]
pub(crate) static TEST_QUEUE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
