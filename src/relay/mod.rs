//! Relay decision engine.
//!
//! Owns the per-channel [`RelayState`](RelayEngine::energized) and is the
//! only code that mutates it.  Every mutation returns a [`RelayAction`]
//! naming the channel whose status must be re-published.

pub mod decision;
pub mod status;

use log::debug;

use crate::channel::Channel;
use crate::config::PolicyConfig;
use decision::{decide, effective_pressed, target_relay};

/// Outcome of one engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayAction {
    pub relay: Channel,
    pub energized: bool,
    /// Whether the relay state actually flipped.
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RelayEngine {
    energized: [bool; 2],
}

impl RelayEngine {
    /// All relays de-energized.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn energized(&self, relay: Channel) -> bool {
        self.energized[relay.index()]
    }

    pub fn snapshot(&self) -> [bool; 2] {
        self.energized
    }

    /// Apply a debounced switch edge under `policy`.
    pub fn on_switch_edge(
        &mut self,
        policy: &PolicyConfig,
        switch: Channel,
        new_pressed: bool,
    ) -> RelayAction {
        let relay = target_relay(policy, switch);
        let prior = self.energized(relay);
        let next = decide(policy, new_pressed, prior);
        debug!(
            "relay: {} edge pressed={} -> relay {} {} -> {}",
            switch, new_pressed, relay, prior, next
        );
        self.set(relay, next, prior)
    }

    /// Set a relay directly, bypassing switch policy.
    pub fn on_command(&mut self, relay: Channel, on: bool) -> RelayAction {
        let prior = self.energized(relay);
        self.set(relay, on, prior)
    }

    /// Mode-entry reset.  De-energizes both relays, or mirrors the current
    /// switch positions when `respect_switch_state` is set.
    pub fn reset(&mut self, policy: &PolicyConfig, switches_pressed: [bool; 2]) -> [RelayAction; 2] {
        Channel::ALL.map(|relay| {
            let prior = self.energized(relay);
            let next = if policy.respect_switch_state {
                let switch = decision::associated_switch(policy, relay);
                effective_pressed(policy, switches_pressed[switch.index()])
            } else {
                false
            };
            self.set(relay, next, prior)
        })
    }

    fn set(&mut self, relay: Channel, next: bool, prior: bool) -> RelayAction {
        self.energized[relay.index()] = next;
        RelayAction {
            relay,
            energized: next,
            changed: next != prior,
        }
    }
}
