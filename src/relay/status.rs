//! Status payload published on a channel's output topic.
//!
//! `'1'` / `'0'` for the relay, followed by `'.'` when the associated
//! switch is logically pressed (after `invert_switch`).

use heapless::String;

pub type StatusPayload = String<2>;

pub fn status_payload(energized: bool, switch_pressed: bool) -> StatusPayload {
    let mut s = StatusPayload::new();
    // Capacity 2 always fits one digit plus the marker.
    let _ = s.push(if energized { '1' } else { '0' });
    if switch_pressed {
        let _ = s.push('.');
    }
    s
}
