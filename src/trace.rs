// CLASSIFICATION: COMMUNITY
// Filename: trace.rs v0.2
// Date Modified: 2026-07-10
// Author: Lukas Bower

//! Drain of the firmware trace ring shared with the host.
//!
//! Each core owning a trace window lays it out as two little-endian
//! u32 cursors followed by the data area:
//!
//! ```text
//! [0..4) read cursor   [4..8) write cursor   [8..) data
//! ```
//!
//! The firmware is the only writer of data and the write cursor; the
//! host is the only writer of the read cursor. Cursors are byte offsets
//! into the data area.

use log::error;

/// Cursor header bytes ahead of the data area.
const CURSOR_BYTES: usize = 8;

/// Drain everything the firmware has written since the last drain.
///
/// Returns the drained bytes and advances the read cursor in place, or
/// None when the ring is empty or the cursors are out of range.
pub(crate) fn drain(window: &mut [u8]) -> Option<Vec<u8>> {
    if window.len() <= CURSOR_BYTES {
        error!("trace window too small: {} bytes", window.len());
        return None;
    }
    let read = u32::from_le_bytes([window[0], window[1], window[2], window[3]]) as usize;
    let write = u32::from_le_bytes([window[4], window[5], window[6], window[7]]) as usize;
    let data_len = window.len() - CURSOR_BYTES;
    if read >= data_len || write >= data_len {
        error!("trace cursors out of range: read={read} write={write} len={data_len}");
        return None;
    }
    if read == write {
        return None;
    }

    let data = &window[CURSOR_BYTES..];
    let mut out;
    if write > read {
        out = data[read..write].to_vec();
    } else {
        // Writer wrapped: tail of the ring, then the head up to the
        // write cursor.
        out = Vec::with_capacity(data_len - read + write);
        out.extend_from_slice(&data[read..]);
        out.extend_from_slice(&data[..write]);
    }
    window[0..4].copy_from_slice(&(write as u32).to_le_bytes());
    Some(out)
}
