//! Relay coil outputs.
//!
//! Two GPIO lines, one per relay, generic over [`embedded_hal::digital::OutputPin`]
//! so the same driver runs on `esp_idf_hal::gpio::PinDriver` and on host
//! test doubles.  The board drives the coils through NPN transistors, so a
//! high line energizes the coil.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::channel::Channel;

pub struct RelayOutputs<P: OutputPin> {
    pins: [P; 2],
    energized: [bool; 2],
}

impl<P: OutputPin> RelayOutputs<P> {
    /// Take ownership of the two relay lines and drive both low.
    pub fn new(pins: [P; 2]) -> Self {
        let mut outputs = Self {
            pins,
            energized: [true; 2],
        };
        for ch in Channel::ALL {
            outputs.set(ch, false);
        }
        outputs
    }

    pub fn set(&mut self, channel: Channel, energized: bool) {
        let pin = &mut self.pins[channel.index()];
        let result = if energized { pin.set_high() } else { pin.set_low() };
        match result {
            Ok(()) => self.energized[channel.index()] = energized,
            Err(_) => warn!("relay {}: GPIO write failed", channel),
        }
    }

    pub fn is_energized(&self, channel: Channel) -> bool {
        self.energized[channel.index()]
    }
}
