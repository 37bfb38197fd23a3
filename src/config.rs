// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.2
// Date Modified: 2026-05-19
// Author: Lukas Bower

//! Runtime knobs for the IPC channel.

use std::time::Duration;

/// Configuration for an [`IpcChannel`](crate::IpcChannel).
#[derive(Debug, Clone, Copy)]
pub struct IpcConfig {
    /// How long a caller waits for a firmware reply before the channel
    /// declares the request lost and runs recovery.
    pub reply_timeout: Duration,
    /// Re-poll interval of the dispatch worker, covering interrupt
    /// edges that arrive while nothing is queued.
    pub poll_interval: Duration,
    /// Upper bound on payload bytes included in debug hex dumps.
    pub hex_dump_limit: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        IpcConfig {
            reply_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(20),
            hex_dump_limit: 64,
        }
    }
}
