// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.4
// Date Modified: 2026-08-02
// Author: Lukas Bower

//! Host-side mailbox IPC transport for the Cohesix audio DSP
//! coprocessor.
//!
//! The DSP firmware speaks a single-outstanding-request protocol over
//! two doorbell register pairs and a pair of fixed-size shared-memory
//! windows. This crate owns that transport: envelope encoding
//! ([`header`]), transmit scheduling and reply demultiplexing
//! ([`channel`]), firmware notifications ([`notify`]), large-parameter
//! fragmentation and timeout-triggered firmware recovery. Hardware
//! access goes through the [`MailboxBus`] trait; platform side effects
//! (gating, firmware reload, crash dumps, module events) go through
//! [`PlatformHooks`].
//!
//! Typical bring-up: implement both traits, build an [`IpcChannel`],
//! call [`IpcChannel::enable_interrupts`], route the doorbell
//! interrupt to [`IpcChannel::handle_irq`], then wait for
//! [`IpcChannel::wait_firmware_ready`] before issuing requests from
//! [`ops`].
//
// ─────────────────────────────────────────────────────────────────────────────

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod error;
pub mod header;
pub mod mailbox;
pub mod notify;
pub mod ops;

mod fragment;
mod queue;
mod recovery;
mod trace;

pub use channel::IpcChannel;
pub use config::IpcConfig;
pub use error::{IpcError, IpcResult, ReplyStatus};
pub use mailbox::{IpcCtl, MailboxBus, MailboxReg, CMD_BUSY, CMD_DONE, INT_IPC};
pub use notify::{ModuleNotification, NotifyClass, ResourceEvent};
pub use ops::{
    BindUnbind, D0ix, DxState, InitInstance, LargeConfig, PipelineState, ProcDomain,
    FW_CONFIG_PARAM_ID,
};
pub use recovery::RecoveryPhase;

/// Platform services the channel calls out to.
///
/// Implementations must tolerate calls from the channel's interrupt
/// and caller threads; none are invoked with internal locks held.
pub trait PlatformHooks: Send + Sync {
    /// Toggle dynamic clock gating of the DSP domain.
    fn enable_clock_gating(&self, enable: bool);

    /// Toggle power gating of the DSP domain.
    fn enable_power_gating(&self, enable: bool);

    /// Reload and restart the firmware after the transport stalled.
    /// Failures are logged by the channel; the stalled request still
    /// reports a timeout.
    fn reinit_firmware(&self) -> IpcResult<()>;

    /// Capture a crash record after a core exception. `stack_bytes` is
    /// the stack size the firmware reported for the faulting core.
    fn read_crash_dump(&self, core: u8, stack_bytes: u32) -> IpcResult<()>;

    /// Deliver a module-defined event to whoever consumes it.
    fn module_notification(&self, event: ModuleNotification);
}
