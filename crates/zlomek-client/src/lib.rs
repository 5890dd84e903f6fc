//! The kernel-side call machinery: `Client::call` plus one typed wrapper per
//! operation in `zlomek_protocol::ops`. Depends on
//! `zlomek-channel` for the shared state and `Request`/`Wake` it blocks on,
//! but knows nothing about how bytes actually cross the wire — that is
//! `zlomek-chardev`'s job.

mod call;
mod ops;

pub use call::Client;
