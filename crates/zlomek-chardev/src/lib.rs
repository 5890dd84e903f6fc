//! The external, device-facing half of the channel: a `DuplexChannel`
//! abstraction over "a byte sink/source with blocking read/write", a real
//! `CharDevice` and an in-process `LoopbackChannel`, and the daemon-side
//! pump loops that thread `ChannelEndpoint`'s two blocking operations over
//! either one.

mod pump;
mod transport;

pub use pump::{run_reader_loop, run_writer_loop};
pub use transport::{CharDevice, DuplexChannel, LoopbackChannel, DEFAULT_DEVICE_PATH, ZFS_CHARDEV_MAJOR};
