//! Setup gesture: rapid toggling of either wall switch.
//!
//! Every debounced switch edge (either channel, either direction) counts.
//! An edge arriving less than `window_ms` after the previous one extends
//! the run; a longer gap starts a new run at 1.  When the run reaches
//! `count` the detector fires and starts over from zero.

#[derive(Debug, Clone)]
pub struct SetupGestureDetector {
    count: u8,
    last_edge_ms: Option<u64>,
    window_ms: u32,
    target: u8,
}

impl SetupGestureDetector {
    pub fn new(window_ms: u32, target: u8) -> Self {
        Self {
            count: 0,
            last_edge_ms: None,
            window_ms,
            target,
        }
    }

    /// Current run length.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Record an edge at `at_ms`.  Returns `true` when the gesture completes.
    pub fn on_switch_edge(&mut self, at_ms: u64) -> bool {
        let in_window = self
            .last_edge_ms
            .is_some_and(|last| at_ms.saturating_sub(last) < u64::from(self.window_ms));
        self.count = if in_window { self.count.saturating_add(1) } else { 1 };
        self.last_edge_ms = Some(at_ms);

        if self.count >= self.target {
            self.count = 0;
            return true;
        }
        false
    }
}
