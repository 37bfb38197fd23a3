// CLASSIFICATION: COMMUNITY
// Filename: fragment.rs v0.2
// Date Modified: 2026-07-10
// Author: Lukas Bower

//! Chunking of large-config payloads into mailbox-window-sized blocks.
//!
//! The cursor is pure bookkeeping; the typed request layer maps each
//! block onto the wire (initial blocks carry the total transfer size in
//! the offset/size field, later blocks carry their byte offset).

/// One block of a large transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    /// Byte offset of this block within the full payload.
    pub offset: usize,
    /// Bytes carried by this block.
    pub len: usize,
    /// Set on the first block of the transfer.
    pub first: bool,
    /// Set on the block that exhausts the payload.
    pub last: bool,
}

/// Yields the block sequence for a payload of `total` bytes over a
/// window of `window` bytes. A zero-byte payload yields no blocks.
pub(crate) struct BlockCursor {
    total: usize,
    window: usize,
    offset: usize,
}

impl BlockCursor {
    pub fn new(total: usize, window: usize) -> Self {
        debug_assert!(window > 0);
        BlockCursor {
            total,
            window,
            offset: 0,
        }
    }

    /// Number of blocks the cursor will yield.
    pub fn block_count(&self) -> usize {
        self.total.div_ceil(self.window)
    }
}

impl Iterator for BlockCursor {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let remaining = self.total - self.offset;
        if remaining == 0 {
            return None;
        }
        let len = remaining.min(self.window);
        let block = Block {
            offset: self.offset,
            len,
            first: self.offset == 0,
            last: len == remaining,
        };
        self.offset += len;
        Some(block)
    }
}
