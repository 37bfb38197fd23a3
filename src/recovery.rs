// CLASSIFICATION: COMMUNITY
// Filename: recovery.rs v0.2
// Date Modified: 2026-07-18
// Author: Lukas Bower

//! Coprocessor recovery after a lost reply.
//!
//! A reply timeout means the firmware stalled or the doorbell handshake
//! was lost; either way the only safe move is a firmware restart with
//! gating pulled while it runs. The sequence is fixed: clock gating
//! off, power gating off, reinitialise, clock gating on, power gating
//! on. The abandoned request is never resubmitted.

use log::{error, warn};

use crate::PlatformHooks;

/// Externally observable phase of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    /// No caller blocked, firmware assumed healthy.
    Idle,
    /// At least one caller blocked on a reply.
    Waiting,
    /// A timeout fired and the restart sequence is running.
    Recovering,
}

/// Waiter accounting plus the single-runner latch for the restart
/// sequence. Lives under the channel's scheduler lock.
#[derive(Default)]
pub(crate) struct RecoveryCtl {
    waiters: u32,
    recovering: bool,
}

impl RecoveryCtl {
    pub fn begin_wait(&mut self) {
        self.waiters += 1;
    }

    pub fn end_wait(&mut self) {
        self.waiters = self.waiters.saturating_sub(1);
    }

    /// Claim the restart sequence. False when another timed-out caller
    /// already holds it; that caller's run covers this timeout too.
    pub fn claim(&mut self) -> bool {
        if self.recovering {
            return false;
        }
        self.recovering = true;
        true
    }

    pub fn release(&mut self) {
        self.recovering = false;
    }

    pub fn phase(&self) -> RecoveryPhase {
        if self.recovering {
            RecoveryPhase::Recovering
        } else if self.waiters > 0 {
            RecoveryPhase::Waiting
        } else {
            RecoveryPhase::Idle
        }
    }
}

/// Run the restart sequence. Called without the scheduler lock held; a
/// reinit failure is logged and does not change what the timed-out
/// caller sees.
pub(crate) fn run(hooks: &dyn PlatformHooks) {
    warn!("reply timed out, restarting coprocessor firmware");
    hooks.enable_clock_gating(false);
    hooks.enable_power_gating(false);
    if let Err(err) = hooks.reinit_firmware() {
        error!("firmware reinit failed during recovery: {err}");
    }
    hooks.enable_clock_gating(true);
    hooks.enable_power_gating(true);
}
