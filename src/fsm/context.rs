//! Shared mutable context threaded through every mode handler.
//!
//! `ModeContext` is the blackboard that handlers read from and write to:
//! the clock, fixed timing, the outputs the service applies after each
//! call, and why a restart was requested.

use crate::config::Timing;
use crate::drivers::indicator::Pattern;

// ---------------------------------------------------------------------------
// Requests (written by the service; handled by the current mode)
// ---------------------------------------------------------------------------

/// Mode-transition requests raised by inputs, bus commands, and collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    /// Mode button, setup gesture, or `set` command.
    EnterSetup,
    /// `ota` command.
    EnterUpdate,
    /// `rst` command.
    Reset,
    /// The portal persisted a new configuration.
    PortalSaved,
    /// The update collaborator verified a new image.
    UpdateComplete,
}

/// How the current mode answered a [`ModeRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVerdict {
    Transition(super::Mode),
    /// Accepted but nothing changes (e.g. setup while already in setup).
    NoOp,
    /// Not allowed in the current mode.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    PortalTimeout,
    ConfigSaved,
    UpdateTimeout,
    UpdateApplied,
    Command,
}

// ---------------------------------------------------------------------------
// Outputs (written by handlers; consumed by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeOutputs {
    /// Mode-layer indicator pattern.  `None` lets connectivity decide.
    pub indicator: Option<Pattern>,
    /// Normal-mode components (sampler, engine, bus) should run.
    pub normal_active: bool,
    /// The configuration portal should be up.
    pub portal_active: bool,
    /// An update session should be open.
    pub update_active: bool,
    /// The settle delay has elapsed; restart once collaborators are idle.
    pub restart_ready: bool,
}

// ---------------------------------------------------------------------------
// ModeContext
// ---------------------------------------------------------------------------

pub struct ModeContext {
    /// Monotonic time of the current cycle.
    pub now_ms: u64,
    /// Time the current mode was entered.
    pub entered_at_ms: u64,
    pub timing: Timing,
    pub outputs: ModeOutputs,
    pub restart_reason: Option<RestartReason>,
}

impl ModeContext {
    pub fn new(timing: Timing) -> Self {
        Self {
            now_ms: 0,
            entered_at_ms: 0,
            timing,
            outputs: ModeOutputs::default(),
            restart_reason: None,
        }
    }

    /// Milliseconds spent in the current mode.
    pub fn ms_in_mode(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_at_ms)
    }
}
