//! Input sampler: raw line levels → debounced switch and button edges.
//!
//! Polled once per control cycle.  All lines are active-low, so a pressed
//! switch or button reads low.  The first sample seeds the debouncers
//! without producing edges, which keeps a switch that was already closed at
//! boot from toggling its relay.

pub mod debounce;
pub mod gesture;

use heapless::Vec;

use crate::app::ports::RawInputs;
use crate::channel::Channel;
use debounce::Debouncer;

/// A debounced change of one wall switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEdge {
    pub switch: Channel,
    pub pressed: bool,
    pub at_ms: u64,
}

/// Result of one sampling pass.
#[derive(Debug, Default)]
pub struct Sample {
    /// Edges in channel order.
    pub edges: Vec<SwitchEdge, 2>,
    /// The mode button went from released to pressed.
    pub mode_pressed: bool,
}

pub struct InputSampler {
    switches: [Debouncer; 2],
    button: Debouncer,
    primed: bool,
}

impl InputSampler {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            switches: [Debouncer::new(false, debounce_ms); 2],
            button: Debouncer::new(false, debounce_ms),
            primed: false,
        }
    }

    /// Debounced logical state of a switch (`true` = closed).
    pub fn pressed(&self, switch: Channel) -> bool {
        self.switches[switch.index()].level()
    }

    pub fn switch_states(&self) -> [bool; 2] {
        [self.pressed(Channel::One), self.pressed(Channel::Two)]
    }

    /// Whether the first sample has been taken.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Process one set of raw levels.
    pub fn sample(&mut self, raw: RawInputs, now_ms: u64) -> Sample {
        let pressed = raw.switches.map(|level| !level);
        let button = !raw.mode_button;

        if !self.primed {
            for (d, p) in self.switches.iter_mut().zip(pressed) {
                d.seed(p, now_ms);
            }
            self.button.seed(button, now_ms);
            self.primed = true;
            return Sample::default();
        }

        let mut out = Sample::default();
        for ch in Channel::ALL {
            if let Some(level) = self.switches[ch.index()].update(pressed[ch.index()], now_ms) {
                let _ = out.edges.push(SwitchEdge {
                    switch: ch,
                    pressed: level,
                    at_ms: now_ms,
                });
            }
        }
        out.mode_pressed = self.button.update(button, now_ms) == Some(true);
        out
    }
}
