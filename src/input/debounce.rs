//! Time-based level debouncer.
//!
//! A new level is accepted once the raw input has held it for
//! `debounce_ms` consecutive milliseconds.  Bounces shorter than that
//! restart the wait.

#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    stable: bool,
    candidate: bool,
    since_ms: u64,
    debounce_ms: u32,
}

impl Debouncer {
    pub fn new(initial: bool, debounce_ms: u32) -> Self {
        Self {
            stable: initial,
            candidate: initial,
            since_ms: 0,
            debounce_ms,
        }
    }

    /// Current debounced level.
    pub fn level(&self) -> bool {
        self.stable
    }

    /// Reset to `level` without reporting an edge.
    pub fn seed(&mut self, level: bool, now_ms: u64) {
        self.stable = level;
        self.candidate = level;
        self.since_ms = now_ms;
    }

    /// Feed one raw sample.  Returns the new level on a debounced edge.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> Option<bool> {
        if raw != self.candidate {
            self.candidate = raw;
            self.since_ms = now_ms;
        }
        if self.candidate != self.stable
            && now_ms.saturating_sub(self.since_ms) >= u64::from(self.debounce_ms)
        {
            self.stable = self.candidate;
            return Some(self.stable);
        }
        None
    }
}
