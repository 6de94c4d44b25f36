//! Single status LED.
//!
//! The on-board LED is wired active-low (GPIO sinks the cathode), so
//! lighting it pulls the line low.

use embedded_hal::digital::OutputPin;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, lit: true };
        led.set(false);
        led
    }

    pub fn set(&mut self, lit: bool) {
        let result = if lit { self.pin.set_low() } else { self.pin.set_high() };
        if result.is_ok() {
            self.lit = lit;
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
