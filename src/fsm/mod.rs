//! Function-pointer mode state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  ModeTable                                                       │
//! │  ┌────────────────┬──────────┬─────────┬───────────┬───────────┐ │
//! │  │ Mode           │ on_enter │ on_exit │ on_update │ on_request│ │
//! │  ├────────────────┼──────────┼─────────┼───────────┼───────────┤ │
//! │  │ Normal         │ fn(ctx)  │ fn(ctx) │ fn(ctx)   │ fn(ctx,r) │ │
//! │  │ ConfigPortal   │ fn(ctx)  │ fn(ctx) │ fn(ctx)   │ fn(ctx,r) │ │
//! │  │ Update         │ fn(ctx)  │ fn(ctx) │ fn(ctx)   │ fn(ctx,r) │ │
//! │  │ PendingRestart │ fn(ctx)  │ -       │ fn(ctx)   │ fn(ctx,r) │ │
//! │  └────────────────┴──────────┴─────────┴───────────┴───────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each cycle the engine calls `on_update` for the **current** mode
//! (timeouts).  Requests from inputs, the bus, and collaborators go through
//! `on_request`, which either names the next mode, accepts as a no-op, or
//! rejects.  A transition runs `on_exit` for the current mode, then
//! `on_enter` for the next.

pub mod context;
pub mod states;

use context::{ModeContext, ModeRequest, RequestVerdict};
use log::{info, warn};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Process-wide operating mode.
/// Must stay in sync with the table built in [`states::build_mode_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    Normal = 0,
    ConfigPortal = 1,
    Update = 2,
    PendingRestart = 3,
}

impl Mode {
    /// Total number of modes; used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert an index back to `Mode`.  Out-of-range indices map to
    /// `PendingRestart` (asserts in debug builds).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Normal,
            1 => Self::ConfigPortal,
            2 => Self::Update,
            3 => Self::PendingRestart,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::PendingRestart
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` actions.  Run exactly once per transition.
pub type ModeActionFn = fn(&mut ModeContext);

/// Per-cycle handler.  Returns `Some(next)` to transition.
pub type ModeUpdateFn = fn(&mut ModeContext) -> Option<Mode>;

/// Request handler.
pub type ModeRequestFn = fn(&mut ModeContext, ModeRequest) -> RequestVerdict;

// ---------------------------------------------------------------------------
// Mode descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct ModeDescriptor {
    pub id: Mode,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    pub on_exit: Option<ModeActionFn>,
    pub on_update: ModeUpdateFn,
    pub on_request: ModeRequestFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `Mode as usize`.
    table: [ModeDescriptor; Mode::COUNT],
    current: usize,
    transitions: u32,
}

impl Fsm {
    pub fn new(table: [ModeDescriptor; Mode::COUNT], initial: Mode) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting mode.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut ModeContext) {
        info!("FSM starting in mode: {}", self.table[self.current].name);
        ctx.entered_at_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Run `on_update` for the current mode and apply any transition it
    /// returns.  `ctx.now_ms` must already hold the cycle time.
    pub fn tick(&mut self, ctx: &mut ModeContext) {
        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }
    }

    /// Offer a request to the current mode.
    pub fn request(&mut self, req: ModeRequest, ctx: &mut ModeContext) -> RequestVerdict {
        let verdict = (self.table[self.current].on_request)(ctx, req);
        match verdict {
            RequestVerdict::Transition(next) => self.transition(next, ctx),
            RequestVerdict::Rejected => warn!(
                "FSM: {:?} rejected in mode {}",
                req, self.table[self.current].name
            ),
            RequestVerdict::NoOp => {}
        }
        verdict
    }

    pub fn current_mode(&self) -> Mode {
        Mode::from_index(self.current)
    }

    /// Number of transitions executed since construction.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: Mode, ctx: &mut ModeContext) {
        let next_idx = next as usize;
        if next_idx == self.current {
            return;
        }

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;
        ctx.entered_at_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
