//! GPIO assignments for the DuoRelay board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Wall switches (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Channel-1 wall switch.  LOW = contact closed.
pub const SWITCH_1_GPIO: i32 = 4;
/// Channel-2 wall switch.  LOW = contact closed.
pub const SWITCH_2_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Mode button (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// On-board push-button that opens the configuration portal.
pub const MODE_BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Relay coils (active-high through driver transistor)
// ---------------------------------------------------------------------------

pub const RELAY_1_GPIO: i32 = 12;
pub const RELAY_2_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Status indicator
// ---------------------------------------------------------------------------

/// Single status LED.  LOW = lit (active-low).
pub const STATUS_LED_GPIO: i32 = 2;

/// Switch GPIOs indexed by [`Channel::index`](crate::channel::Channel::index).
pub const SWITCH_GPIOS: [i32; 2] = [SWITCH_1_GPIO, SWITCH_2_GPIO];

/// Relay GPIOs indexed by [`Channel::index`](crate::channel::Channel::index).
pub const RELAY_GPIOS: [i32; 2] = [RELAY_1_GPIO, RELAY_2_GPIO];
