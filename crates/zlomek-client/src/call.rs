//! The kernel-side call path: reserve an id, encode the request, enqueue it,
//! block for a reply, then react to whichever of replied/timed-out/
//! interrupted/disconnected woke the caller. Generic over the typed
//! argument/result shapes in `zlomek_protocol::ops`.

use std::sync::Arc;
use tracing::{debug, trace};
use zlomek_channel::{ChannelState, Interrupt, Request, Wake};
use zlomek_protocol::wire::{Decode, Decoder, Direction, Encode, Encoder, Status};
use zlomek_protocol::{ErrorKind, Result};

/// One call session bound to a [`ChannelState`]. Stateless beyond that
/// `Arc`: every `call()` creates its own `Request` and leaves no residue on
/// failure.
#[derive(Clone)]
pub struct Client {
    state: Arc<ChannelState>,
}

impl Client {
    pub fn new(state: Arc<ChannelState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ChannelState> {
        &self.state
    }

    /// Issues one call and blocks for its reply. `function_code` tags the
    /// request for D's dispatch; `args` and the return type carry the typed
    /// per-operation shapes from `zlomek_protocol::ops`.
    pub fn call<A, R>(&self, function_code: u32, args: &A, interrupt: &Interrupt) -> Result<R>
    where
        A: Encode,
        R: Decode,
    {
        // Step 1: reserve an id under the channel's connected check.
        if !self.state.is_connected() {
            return Err(ErrorKind::IoError);
        }
        let id = self.state.next_request_id();

        // Step 2: acquire a buffer and encode the header, function code and
        // args into it.
        let mut buf = self.state.pool.acquire()?;
        let mut enc = Encoder::new(std::mem::take(&mut buf.bytes));
        enc.header(Direction::Request, id);
        enc.u32(function_code);
        enc.encode(args);
        buf.bytes = enc.finish();

        // Step 3: a fresh Request, Pending, holding the encoded body.
        let req = Arc::new(Request::new(id));
        req.set_body(buf);

        // Step 4: re-check connected under the channel mutex and enqueue.
        if let Err(e) = self.state.enqueue_pending(req.clone()) {
            self.release_body(&req);
            return Err(e);
        }
        trace!(request_id = id, function_code, "call enqueued");

        // Step 5: block for reply, timeout, signal or disconnect.
        let wake = req.wait(self.state.config.wait_deadline(), interrupt);

        // Step 6: inspect the observed state and react.
        match wake {
            Wake::Replied => self.finish_replied(&req),
            Wake::Timeout => {
                self.reclaim(id, &req);
                debug!(request_id = id, "call timed out");
                Err(ErrorKind::Timeout)
            }
            Wake::Interrupted => {
                self.reclaim(id, &req);
                Err(ErrorKind::Interrupted)
            }
            Wake::Disconnected => {
                self.reclaim(id, &req);
                Err(ErrorKind::IoError)
            }
        }
    }

    /// Removes `req` from whichever container still references it
    /// (pending or processing — whichever it made it to before the caller
    /// gave up) and releases its body buffer, dropping its content.
    fn reclaim(&self, id: u32, req: &Request) {
        self.state.remove_pending(id);
        self.state.remove_processing(id);
        self.release_body(req);
    }

    fn release_body(&self, req: &Request) {
        let buf = req.take_reply();
        self.state.release_buffer(buf, true);
    }

    /// Decodes a reply buffer already owned by `req` into the typed result,
    /// releasing the buffer once decoding is done (success or failure).
    fn finish_replied<R: Decode>(&self, req: &Request) -> Result<R> {
        let mut buf = req
            .take_reply()
            .expect("a Replied request always carries its reply buffer");
        let body = std::mem::take(&mut buf.bytes).freeze();
        self.state.release_buffer(Some(buf), false);

        let mut dec = Decoder::new(body);
        let (_direction, _request_id) = dec.header()?;
        let status = Status::from_u32(dec.u32()?)?;
        if let Some(kind) = status.into_error_kind() {
            return Err(kind);
        }
        let result = dec.decode::<R>()?;
        dec.finish_decoding()?;
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use zlomek_channel::ChannelEndpoint;
    use zlomek_protocol::wire::HEADER_LEN;
    use zlomek_protocol::Config;

    fn new_pair() -> (Client, ChannelEndpoint) {
        let state = ChannelState::new(Config::default());
        let endpoint = ChannelEndpoint::new(state.clone(), zlomek_channel::OneWayRegistry::new(|_| {}));
        endpoint.open().unwrap();
        (Client::new(state), endpoint)
    }

    #[test]
    fn test_happy_path_round_trip() {
        let (client, endpoint) = new_pair();
        let interrupt = Interrupt::new();

        let client2 = client.clone();
        let handle = std::thread::spawn(move || client2.call::<(), u32>(1, &(), &interrupt));

        let mut sink = vec![0u8; 4096];
        let read = endpoint.read_next_request(&mut sink, &Interrupt::new()).unwrap();
        assert_eq!(read.request_id, 1);

        let mut enc = Encoder::new(bytes::BytesMut::new());
        enc.header(Direction::Reply, read.request_id);
        enc.u32(Status::Ok as u32);
        enc.u32(77);
        let reply = enc.finish().freeze();
        endpoint.deliver_reply_or_oneway(&reply).unwrap();

        assert_eq!(handle.join().unwrap().unwrap(), 77u32);
        assert_eq!(endpoint.state().pool.outstanding(), 0);
    }

    #[test]
    fn test_timeout_removes_from_pending_and_leaks_nothing() {
        let state = ChannelState::new(zlomek_protocol::Config {
            request_timeout: std::time::Duration::from_millis(20),
            channel_timeout_slack: std::time::Duration::from_millis(5),
            ..Default::default()
        });
        state.open().unwrap();
        let client = Client::new(state.clone());
        let interrupt = Interrupt::new();

        let result: Result<()> = client.call(1, &(), &interrupt);
        assert!(matches!(result, Err(ErrorKind::Timeout)));
        assert_eq!(state.pool.outstanding(), 0);
    }

    #[test]
    fn test_disconnect_mid_call_releases_body_without_underflow() {
        let state = ChannelState::new(Config::default());
        state.open().unwrap();
        let client = Client::new(state.clone());
        let interrupt = Interrupt::new();

        let client2 = client.clone();
        let handle = std::thread::spawn(move || client2.call::<(), u32>(1, &(), &interrupt));

        // Give the call time to enqueue its request before tearing the
        // channel down underneath it.
        std::thread::sleep(std::time::Duration::from_millis(20));
        state.close();

        assert!(matches!(handle.join().unwrap(), Err(ErrorKind::IoError)));
        // Reclaiming the body on the Disconnected path must not panic or
        // underflow the pool's allocation count now that `close` no longer
        // zeroes it out from under a still-referenced buffer.
        assert_eq!(state.pool.outstanding(), 0);
    }

    #[test]
    fn test_disconnected_channel_rejects_new_calls() {
        let state = ChannelState::new(Config::default());
        let client = Client::new(state);
        let interrupt = Interrupt::new();
        let result: Result<()> = client.call(1, &(), &interrupt);
        assert!(matches!(result, Err(ErrorKind::IoError)));
    }

    #[test]
    fn test_oversized_header_space_noop() {
        // Sanity: HEADER_LEN is what the client's encoder writes before the
        // function code, matching the wire codec's constant.
        assert_eq!(HEADER_LEN, 5);
    }
}
