//! Status indicator pattern engine.
//!
//! Generates the on/off level of the single status LED.  The control loop
//! calls `tick()` each cycle and feeds the result to
//! [`IndicatorPort::set_indicator`](crate::app::ports::IndicatorPort).
//!
//! ## Layers (highest first)
//!
//! 1. **Mode**: set while the configuration portal, an update, or a
//!    pending restart owns the device
//! 2. **Connectivity**: solid while the bus session is up, off otherwise
//!
//! ## Patterns
//!
//! | Pattern    | Meaning             | Rate |
//! |------------|---------------------|------|
//! | Off        | offline             | -    |
//! | Solid      | operating           | -    |
//! | SlowBlink  | configuration mode  | 1 Hz |
//! | FastBlink  | firmware update     | 5 Hz |

/// Pattern identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Off,
    Solid,
    SlowBlink,
    FastBlink,
}

const SLOW_PERIOD_MS: u32 = 1000;
const FAST_PERIOD_MS: u32 = 200;

pub struct IndicatorEngine {
    phase_ms: u32,
    active: Pattern,
    mode_request: Option<Pattern>,
    connected: bool,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self {
            phase_ms: 0,
            active: Pattern::Off,
            mode_request: None,
            connected: false,
        }
    }

    /// Set or clear the mode-layer pattern.
    pub fn set_mode_pattern(&mut self, pattern: Option<Pattern>) {
        self.mode_request = pattern;
    }

    /// Update the connectivity layer.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Pattern currently being rendered.
    pub fn active(&self) -> Pattern {
        self.active
    }

    /// Advance the phase by `delta_ms` and return whether the LED is lit.
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        let selected = self.mode_request.unwrap_or(if self.connected {
            Pattern::Solid
        } else {
            Pattern::Off
        });

        if selected != self.active {
            self.phase_ms = 0;
            self.active = selected;
        } else {
            self.phase_ms = self.phase_ms.wrapping_add(delta_ms);
        }

        match self.active {
            Pattern::Off => false,
            Pattern::Solid => true,
            Pattern::SlowBlink => self.phase_ms % SLOW_PERIOD_MS < SLOW_PERIOD_MS / 2,
            Pattern::FastBlink => self.phase_ms % FAST_PERIOD_MS < FAST_PERIOD_MS / 2,
        }
    }
}
