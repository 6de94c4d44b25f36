//! Switch → relay decision table.
//!
//! | respect | invert | edge to pressed | edge to released |
//! |---------|--------|-----------------|------------------|
//! | off     | any    | toggle          | toggle           |
//! | on      | off    | energize        | de-energize      |
//! | on      | on     | de-energize     | energize         |
//!
//! `swap_relays` only changes which relay the edge addresses.

use crate::channel::Channel;
use crate::config::PolicyConfig;

/// Relay addressed by an edge on `switch`.
pub const fn target_relay(policy: &PolicyConfig, switch: Channel) -> Channel {
    if policy.swap_relays { switch.other() } else { switch }
}

/// Switch physically associated with `relay` (inverse of [`target_relay`]).
pub const fn associated_switch(policy: &PolicyConfig, relay: Channel) -> Channel {
    // Swapping is an involution, so the mapping is its own inverse.
    target_relay(policy, relay)
}

/// Logical "pressed" as seen by the relay after `invert_switch`.
pub const fn effective_pressed(policy: &PolicyConfig, pressed: bool) -> bool {
    pressed ^ policy.invert_switch
}

/// New relay state after a switch edge to `new_pressed`, given the
/// relay's `prior` state.
pub const fn decide(policy: &PolicyConfig, new_pressed: bool, prior: bool) -> bool {
    if policy.respect_switch_state {
        effective_pressed(policy, new_pressed)
    } else {
        !prior
    }
}
