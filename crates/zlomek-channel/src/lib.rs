//! The shared channel state, the per-request lifecycle, and the four
//! daemon-facing operations (`open`, `close`, `read-next-request`,
//! `deliver-reply-or-oneway`). Contains no transport of its own: callers
//! supply byte sinks/sources (see `zlomek-chardev`) and the client-side
//! `call()` path lives in `zlomek-client`.

pub mod endpoint;
pub mod interrupt;
pub mod oneway;
pub mod request;
pub mod semaphore;
pub mod state;

pub use endpoint::{ChannelEndpoint, ReadRequest, ServerRequestHandler};
pub use interrupt::Interrupt;
pub use oneway::OneWayRegistry;
pub use request::{Request, RequestState, Wake};
pub use state::ChannelState;
