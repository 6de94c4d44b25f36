//! Hardware adapter: bridges the GPIO drivers to the domain port traits.
//!
//! Owns the switch/button inputs, both relay outputs, and the status LED.
//! Generic over the `embedded-hal` pin traits so host tests can plug in
//! fake lines; on the device the pins are `esp_idf_hal` `PinDriver`s.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{IndicatorPort, InputPort, RawInputs, RelayPort};
use crate::channel::Channel;
use crate::drivers::relay_output::RelayOutputs;
use crate::drivers::status_led::StatusLed;
use crate::drivers::switch_input::SwitchInputs;

pub struct HardwareAdapter<I: InputPin, O: OutputPin> {
    inputs: SwitchInputs<I>,
    relays: RelayOutputs<O>,
    led: StatusLed<O>,
}

impl<I: InputPin, O: OutputPin> HardwareAdapter<I, O> {
    pub fn new(inputs: SwitchInputs<I>, relays: RelayOutputs<O>, led: StatusLed<O>) -> Self {
        Self { inputs, relays, led }
    }

    pub fn relay_energized(&self, channel: Channel) -> bool {
        self.relays.is_energized(channel)
    }

    pub fn indicator_lit(&self) -> bool {
        self.led.is_lit()
    }
}

impl<I: InputPin, O: OutputPin> InputPort for HardwareAdapter<I, O> {
    fn read_inputs(&mut self) -> RawInputs {
        self.inputs.read()
    }
}

impl<I: InputPin, O: OutputPin> RelayPort for HardwareAdapter<I, O> {
    fn set_relay(&mut self, channel: Channel, energized: bool) {
        self.relays.set(channel, energized);
    }
}

impl<I: InputPin, O: OutputPin> IndicatorPort for HardwareAdapter<I, O> {
    fn set_indicator(&mut self, lit: bool) {
        self.led.set(lit);
    }
}
