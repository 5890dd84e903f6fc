//! Daemon-side pump loops threading [`ChannelEndpoint`]'s two blocking
//! operations over a [`DuplexChannel`], each meant to run on its own
//! `std::thread`: the "reader threads" and "writer threads" roles of the
//! concurrency model.

use crate::transport::DuplexChannel;
use std::sync::Arc;
use tracing::{debug, warn};
use zlomek_channel::{ChannelEndpoint, Interrupt};
use zlomek_protocol::{ErrorKind, DEFAULT_MAX_MESSAGE};

/// Repeatedly reads the next pending request off `endpoint` and forwards
/// its encoded body to `transport`. Returns once the channel disconnects or
/// `interrupt` fires, or the transport refuses a write.
pub fn run_reader_loop(endpoint: Arc<ChannelEndpoint>, transport: Arc<dyn DuplexChannel>, interrupt: Arc<Interrupt>) {
    let mut sink = vec![0u8; DEFAULT_MAX_MESSAGE + 16];
    loop {
        match endpoint.read_next_request(&mut sink, &interrupt) {
            Ok(read) => {
                if let Err(e) = transport.send(&sink[..read.len]) {
                    warn!(error = %e, "reader loop: transport send failed, stopping");
                    return;
                }
            }
            Err(ErrorKind::IoError) => {
                debug!("reader loop: channel disconnected");
                return;
            }
            Err(ErrorKind::Interrupted) => {
                debug!("reader loop: interrupted");
                return;
            }
            Err(e) => {
                warn!(error = %e, "reader loop: unexpected error, stopping");
                return;
            }
        }
    }
}

/// Repeatedly reads one message off `transport` and delivers it to
/// `endpoint`. Returns once `transport` reports EOF (peer gone). A
/// server-request reply, if the message produced one, is written back onto
/// `transport`.
pub fn run_writer_loop(endpoint: Arc<ChannelEndpoint>, transport: Arc<dyn DuplexChannel>) {
    let mut buf = vec![0u8; DEFAULT_MAX_MESSAGE + 16];
    loop {
        let n = match transport.recv(&mut buf) {
            Ok(0) => {
                debug!("writer loop: transport closed");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "writer loop: transport recv failed, stopping");
                return;
            }
        };

        match endpoint.deliver_reply_or_oneway(&buf[..n]) {
            Ok(Some(reply)) => {
                if let Err(e) = transport.send(&reply) {
                    warn!(error = %e, "writer loop: failed to write server-request reply");
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "writer loop: message rejected");
            }
        }
    }
}
