// CLASSIFICATION: COMMUNITY
// Filename: mailbox.rs v0.4
// Date Modified: 2026-07-02
// Author: Lukas Bower

//! Hardware seam between the IPC channel and the DSP doorbell block.
//!
//! The channel owns a [`MailboxBus`] and performs every register and
//! window access through it. Platforms implement the trait over their
//! MMIO shim; tests implement it over plain memory. The bus carries no
//! protocol knowledge: raw register words and raw byte copies only.

use bitflags::bitflags;

/// Registers of the doorbell block, as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxReg {
    /// Outbound primary doorbell. Bit 31 is the busy handshake.
    OutboxCmd,
    /// Outbound extension doorbell. Bit 30 is the done handshake.
    OutboxExt,
    /// Inbound primary doorbell. Bit 31 flags a pending message.
    InboxCmd,
    /// Inbound extension doorbell.
    InboxExt,
    /// Master interrupt enable block.
    IntControl,
    /// Master interrupt status block.
    IntStatus,
    /// Busy/done interrupt enables for the doorbell pair.
    IpcControl,
}

/// Busy handshake bit on [`MailboxReg::OutboxCmd`] and
/// [`MailboxReg::InboxCmd`].
pub const CMD_BUSY: u32 = 1 << 31;

/// Done handshake bit on [`MailboxReg::OutboxExt`].
pub const CMD_DONE: u32 = 1 << 30;

/// IPC bit in [`MailboxReg::IntControl`] and [`MailboxReg::IntStatus`].
pub const INT_IPC: u32 = 1 << 0;

bitflags! {
    /// Enable bits in [`MailboxReg::IpcControl`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpcCtl: u32 {
        /// Raise an interrupt when the inbound busy bit sets.
        const BUSY = 1 << 0;
        /// Raise an interrupt when the outbound done bit sets.
        const DONE = 1 << 1;
    }
}

/// Register and window access to the doorbell block.
///
/// All methods are called with the channel's scheduler lock held, so
/// implementations do not need their own locking against this crate.
pub trait MailboxBus: Send {
    /// Read a doorbell-block register.
    fn read_reg(&self, reg: MailboxReg) -> u32;

    /// Write a doorbell-block register.
    fn write_reg(&mut self, reg: MailboxReg, value: u32);

    /// Read-modify-write the masked bits of a register.
    fn update_reg(&mut self, reg: MailboxReg, mask: u32, value: u32) {
        let current = self.read_reg(reg);
        self.write_reg(reg, (current & !mask) | (value & mask));
    }

    /// Copy `data` into the outbound window, starting at offset zero.
    fn outbox_write(&mut self, data: &[u8]);

    /// Fill `buf` from the inbound window, starting at offset zero.
    fn inbox_read(&mut self, buf: &mut [u8]);

    /// Capacity of the outbound window in bytes.
    fn outbox_size(&self) -> usize;

    /// Capacity of the inbound window in bytes.
    fn inbox_size(&self) -> usize;

    /// Run `f` over the shared trace ring of `core`, cursors included.
    /// Returns false when the core has no trace window.
    fn with_trace_window(&mut self, core: u8, f: &mut dyn FnMut(&mut [u8])) -> bool;

    /// True while the previous outbound message is still owned by the
    /// coprocessor.
    fn is_busy(&self) -> bool {
        self.read_reg(MailboxReg::OutboxCmd) & CMD_BUSY != 0
    }
}
