//! Peripheral drivers: relay coils, switch lines, status LED, indicator
//! pattern engine, and the task watchdog.

pub mod indicator;
pub mod relay_output;
pub mod status_led;
pub mod switch_input;
pub mod watchdog;
