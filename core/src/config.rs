// Runtime settings shared by the sender and receiver sides

use std::time::Duration;

use crate::patch::PatchConfig;

/// Edits must be idle this long before they are diffed and sent
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// A receiver with no complete frame for this long drops the connection
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a sender waits for the TCP handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest frame a receiver accepts by default (16 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Patch ratio threshold and growth slack
    pub patch: PatchConfig,
    /// Sender settle time and polling interval
    pub debounce: Duration,
    /// Receiver per-frame read timeout
    pub read_timeout: Duration,
    /// Sender connect timeout
    pub connect_timeout: Duration,
    /// Receiver cap on declared frame length; `None` reads whatever the peer declares
    pub max_frame_len: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            patch: PatchConfig::default(),
            debounce: DEFAULT_DEBOUNCE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_frame_len: Some(DEFAULT_MAX_FRAME_LEN),
        }
    }
}
