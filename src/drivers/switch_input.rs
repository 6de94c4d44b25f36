//! Switch and mode-button input lines.
//!
//! Raw, undebounced line levels.  All three contacts pull to ground when
//! closed and rely on the internal pull-ups, so `true` (high) means open.
//! Debouncing happens in [`crate::input`].

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::RawInputs;

pub struct SwitchInputs<I: InputPin> {
    switches: [I; 2],
    mode_button: I,
    last: RawInputs,
}

impl<I: InputPin> SwitchInputs<I> {
    pub fn new(switches: [I; 2], mode_button: I) -> Self {
        Self {
            switches,
            mode_button,
            last: RawInputs::default(),
        }
    }

    /// Sample all lines.  A failed read repeats the previous level for that
    /// line so a glitch never looks like an edge.
    pub fn read(&mut self) -> RawInputs {
        let mut raw = self.last;
        for (i, pin) in self.switches.iter_mut().enumerate() {
            match pin.is_high() {
                Ok(level) => raw.switches[i] = level,
                Err(_) => warn!("switch {}: GPIO read failed", i + 1),
            }
        }
        match self.mode_button.is_high() {
            Ok(level) => raw.mode_button = level,
            Err(_) => warn!("mode button: GPIO read failed"),
        }
        self.last = raw;
        raw
    }
}
