//! Wire format, error taxonomy, and buffer pool shared by the channel and
//! client crates. Contains no threading or I/O of its own.

pub mod error;
pub mod handle;
pub mod ops;
pub mod pool;
pub mod wire;

pub use error::{ErrorKind, Result};
pub use handle::{Capability, FileHandle};
pub use pool::{BufferPool, MessageBuffer};
pub use wire::{Decode, Decoder, Direction, Encode, Encoder, Status, DEFAULT_MAX_MESSAGE};

/// Tunables that affect wire compatibility and in-process behaviour. Not
/// environment- or file-driven: the core's non-goals exclude a
/// configuration-discovery surface beyond these in-process values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum message body size, header excluded.
    pub max_message: usize,
    /// Base per-call deadline.
    pub request_timeout: std::time::Duration,
    /// Added to `request_timeout` to derive the wait deadline.
    pub channel_timeout_slack: std::time::Duration,
    /// Size of the processing hash table.
    pub processing_buckets: u32,
    /// Maximum number of concurrently outstanding message buffers.
    pub pool_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_message: DEFAULT_MAX_MESSAGE,
            request_timeout: std::time::Duration::from_secs(30),
            channel_timeout_slack: std::time::Duration::from_secs(5),
            processing_buckets: 32,
            pool_capacity: 256,
        }
    }
}

impl Config {
    /// The wait deadline a caller blocks for: `request_timeout` plus slack.
    pub fn wait_deadline(&self) -> std::time::Duration {
        self.request_timeout + self.channel_timeout_slack
    }
}
