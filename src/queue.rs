// CLASSIFICATION: COMMUNITY
// Filename: queue.rs v0.3
// Date Modified: 2026-07-02
// Author: Lukas Bower

//! Transmit-side bookkeeping: the FIFO of requests waiting for the
//! doorbell and the single slot for the message the coprocessor is
//! currently holding.

use std::collections::VecDeque;

use crossbeam_channel::Sender;

use crate::error::IpcResult;
use crate::header::IpcHeader;

/// Completion side of a submitted request.
pub(crate) type ReplySender = Sender<IpcResult<Vec<u8>>>;

/// A request owned by the transmit machinery.
///
/// A request lives in exactly one place at a time: the FIFO, the
/// in-flight slot, or nowhere once completed or abandoned. The caller
/// keeps only the receiving end of `done`.
pub(crate) struct PendingRequest {
    /// Identity used to remove an abandoned request on timeout.
    pub id: u64,
    pub header: IpcHeader,
    pub tx: Vec<u8>,
    /// Upper bound on reply payload bytes the caller can take.
    pub rx_limit: usize,
    /// None for fire-and-forget sends.
    pub done: Option<ReplySender>,
}

/// FIFO plus in-flight slot, owned by the channel's scheduler lock.
#[derive(Default)]
pub(crate) struct TxState {
    pub queue: VecDeque<PendingRequest>,
    pub in_flight: Option<PendingRequest>,
    next_id: u64,
}

impl TxState {
    /// Reserve an id for the next request.
    pub fn next_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    /// Append to the tail of the FIFO.
    pub fn push(&mut self, req: PendingRequest) {
        self.queue.push_back(req);
    }

    /// True when the doorbell may take the next message.
    pub fn can_dispatch(&self) -> bool {
        self.in_flight.is_none() && !self.queue.is_empty()
    }

    /// Remove an abandoned request wherever it currently lives.
    /// Returns false when the request already completed.
    pub fn remove(&mut self, id: u64) -> bool {
        if let Some(pos) = self.queue.iter().position(|req| req.id == id) {
            self.queue.remove(pos);
            return true;
        }
        if self.in_flight.as_ref().map(|req| req.id) == Some(id) {
            self.in_flight = None;
            return true;
        }
        false
    }
}
