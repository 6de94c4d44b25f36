//! Concrete mode handler functions and table builder.
//!
//! ```text
//!              [button | gesture | set]
//!   NORMAL ─────────────────────────────▶ CONFIG_PORTAL
//!     │                                       │
//!     │ [ota]                   [timeout | saved]
//!     ▼                                       ▼
//!   UPDATE ──[timeout | image applied]──▶ PENDING_RESTART
//!
//!   any mode ──[rst]──▶ PENDING_RESTART   (terminal: device reboots)
//! ```

use super::context::{ModeContext, ModeRequest, RequestVerdict, RestartReason};
use super::{Mode, ModeDescriptor};
use crate::drivers::indicator::Pattern;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_mode_table() -> [ModeDescriptor; Mode::COUNT] {
    [
        ModeDescriptor {
            id: Mode::Normal,
            name: "Normal",
            on_enter: Some(normal_enter),
            on_exit: Some(normal_exit),
            on_update: normal_update,
            on_request: normal_request,
        },
        ModeDescriptor {
            id: Mode::ConfigPortal,
            name: "ConfigPortal",
            on_enter: Some(portal_enter),
            on_exit: Some(portal_exit),
            on_update: portal_update,
            on_request: portal_request,
        },
        ModeDescriptor {
            id: Mode::Update,
            name: "Update",
            on_enter: Some(update_enter),
            on_exit: Some(update_exit),
            on_update: update_update,
            on_request: update_request,
        },
        ModeDescriptor {
            id: Mode::PendingRestart,
            name: "PendingRestart",
            on_enter: Some(restart_enter),
            on_exit: None,
            on_update: restart_update,
            on_request: restart_request,
        },
    ]
}

fn restart_for(ctx: &mut ModeContext, reason: RestartReason) -> RequestVerdict {
    ctx.restart_reason = Some(reason);
    RequestVerdict::Transition(Mode::PendingRestart)
}

// ═══════════════════════════════════════════════════════════════════════════
//  NORMAL: switches and bus drive the relays
// ═══════════════════════════════════════════════════════════════════════════

fn normal_enter(ctx: &mut ModeContext) {
    ctx.outputs.normal_active = true;
    ctx.outputs.indicator = None;
}

fn normal_exit(ctx: &mut ModeContext) {
    ctx.outputs.normal_active = false;
}

fn normal_update(_ctx: &mut ModeContext) -> Option<Mode> {
    None
}

fn normal_request(ctx: &mut ModeContext, req: ModeRequest) -> RequestVerdict {
    match req {
        ModeRequest::EnterSetup => RequestVerdict::Transition(Mode::ConfigPortal),
        ModeRequest::EnterUpdate => RequestVerdict::Transition(Mode::Update),
        ModeRequest::Reset => restart_for(ctx, RestartReason::Command),
        ModeRequest::PortalSaved | ModeRequest::UpdateComplete => RequestVerdict::Rejected,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONFIG_PORTAL: soft-AP portal owns the device
// ═══════════════════════════════════════════════════════════════════════════

fn portal_enter(ctx: &mut ModeContext) {
    ctx.outputs.portal_active = true;
    ctx.outputs.indicator = Some(Pattern::SlowBlink);
    info!(
        "CONFIG_PORTAL: portal open for {}s",
        ctx.timing.portal_timeout_ms / 1000
    );
}

fn portal_exit(ctx: &mut ModeContext) {
    ctx.outputs.portal_active = false;
}

fn portal_update(ctx: &mut ModeContext) -> Option<Mode> {
    if ctx.ms_in_mode() >= ctx.timing.portal_timeout_ms {
        warn!("CONFIG_PORTAL: timed out without a save");
        ctx.restart_reason = Some(RestartReason::PortalTimeout);
        return Some(Mode::PendingRestart);
    }
    None
}

fn portal_request(ctx: &mut ModeContext, req: ModeRequest) -> RequestVerdict {
    match req {
        ModeRequest::EnterSetup => RequestVerdict::NoOp,
        ModeRequest::PortalSaved => restart_for(ctx, RestartReason::ConfigSaved),
        ModeRequest::Reset => restart_for(ctx, RestartReason::Command),
        ModeRequest::EnterUpdate | ModeRequest::UpdateComplete => RequestVerdict::Rejected,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  UPDATE: OTA session owns the device
// ═══════════════════════════════════════════════════════════════════════════

fn update_enter(ctx: &mut ModeContext) {
    ctx.outputs.update_active = true;
    ctx.outputs.indicator = Some(Pattern::FastBlink);
    info!(
        "UPDATE: accepting firmware for {}s",
        ctx.timing.update_timeout_ms / 1000
    );
}

fn update_exit(ctx: &mut ModeContext) {
    ctx.outputs.update_active = false;
}

fn update_update(ctx: &mut ModeContext) -> Option<Mode> {
    if ctx.ms_in_mode() >= ctx.timing.update_timeout_ms {
        warn!("UPDATE: timed out before an image was applied");
        ctx.restart_reason = Some(RestartReason::UpdateTimeout);
        return Some(Mode::PendingRestart);
    }
    None
}

fn update_request(ctx: &mut ModeContext, req: ModeRequest) -> RequestVerdict {
    match req {
        ModeRequest::EnterUpdate => RequestVerdict::NoOp,
        ModeRequest::UpdateComplete => restart_for(ctx, RestartReason::UpdateApplied),
        ModeRequest::Reset => restart_for(ctx, RestartReason::Command),
        ModeRequest::EnterSetup | ModeRequest::PortalSaved => RequestVerdict::Rejected,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PENDING_RESTART: terminal; wait for settle, then reboot
// ═══════════════════════════════════════════════════════════════════════════

fn restart_enter(ctx: &mut ModeContext) {
    ctx.outputs.indicator = Some(Pattern::Off);
    ctx.outputs.restart_ready = false;
    info!("PENDING_RESTART: reason {:?}", ctx.restart_reason);
}

fn restart_update(ctx: &mut ModeContext) -> Option<Mode> {
    ctx.outputs.restart_ready = ctx.ms_in_mode() >= u64::from(ctx.timing.restart_settle_ms);
    None
}

fn restart_request(_ctx: &mut ModeContext, _req: ModeRequest) -> RequestVerdict {
    RequestVerdict::NoOp
}
