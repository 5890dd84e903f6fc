use crate::interrupt::Interrupt;
use crate::oneway::OneWayRegistry;
use crate::semaphore::AcquireOutcome;
use crate::state::ChannelState;
use bytes::BufMut;
use std::sync::Arc;
use tracing::{debug, warn};
use zlomek_protocol::wire::{Decoder, Direction, Encoder, HEADER_LEN};
use zlomek_protocol::{ErrorKind, MessageBuffer};

/// The seam for D-initiated requests (`DIR_REQUEST` on write). The original
/// source carries a TODO here in every copy; this crate exposes it as a
/// trait so a server-side implementation can be plugged in without the
/// channel core depending on it. Absent a registered handler, requests
/// arriving this way are rejected with `ProtocolError`, matching the
/// original's silent drop.
pub trait ServerRequestHandler: Send + Sync {
    fn handle(&self, request_id: u32, dec: &mut Decoder) -> Result<Vec<u8>, ErrorKind>;
}

/// Outcome of `read_next_request`.
pub struct ReadRequest {
    pub request_id: u32,
    /// Actual number of body bytes copied into the caller's sink. May be
    /// less than the request's full encoded length if the sink was smaller.
    pub len: usize,
}

/// The four operations the daemon-side end of the channel exposes: `open`,
/// `close`, `read-next-request`, `deliver-reply-or-oneway`. Wraps a shared
/// [`ChannelState`] so it can coexist with a [`crate::Client`]-like caller
/// side operating on the same session.
pub struct ChannelEndpoint {
    state: Arc<ChannelState>,
    oneway: OneWayRegistry,
    server: Option<Arc<dyn ServerRequestHandler>>,
}

impl ChannelEndpoint {
    pub fn new(state: Arc<ChannelState>, oneway: OneWayRegistry) -> Self {
        Self {
            state,
            oneway,
            server: None,
        }
    }

    pub fn with_server_handler(mut self, handler: Arc<dyn ServerRequestHandler>) -> Self {
        self.server = Some(handler);
        self
    }

    pub fn state(&self) -> &Arc<ChannelState> {
        &self.state
    }

    pub fn open(&self) -> Result<(), ErrorKind> {
        self.state.open()
    }

    pub fn close(&self) {
        self.state.close();
    }

    /// Blocks until a request is available, copies its encoded body into
    /// `sink`, and moves it to its processing bucket. A thin, infallible
    /// wrapper over [`Self::read_next_request_fallible`] for the common
    /// case where the destination is a plain Rust slice and the copy
    /// itself cannot fail.
    pub fn read_next_request(&self, sink: &mut [u8], interrupt: &Interrupt) -> Result<ReadRequest, ErrorKind> {
        let capacity = sink.len();
        self.read_next_request_fallible(capacity, interrupt, move |body| {
            sink[..body.len()].copy_from_slice(body);
            Ok(())
        })
    }

    /// Blocks until a request is available and hands its (possibly
    /// truncated) encoded body to `copy`. Unlike [`Self::read_next_request`],
    /// `copy` can itself fail — modelling a kernel `copy_to_user` against a
    /// user-space address that turns out to be invalid even though the
    /// request was already claimed from the pending queue. On that failure
    /// the request is restored to the head of the pending queue exactly as
    /// `spec.md` §4.4 specifies for `Fault`, rather than being dropped.
    pub fn read_next_request_fallible(
        &self,
        sink_capacity: usize,
        interrupt: &Interrupt,
        mut copy: impl FnMut(&[u8]) -> Result<(), ErrorKind>,
    ) -> Result<ReadRequest, ErrorKind> {
        if sink_capacity == 0 {
            // A zero-length read reports what's next without consuming it:
            // no dequeue, no state change, matching a `read(fd, buf, 0)`
            // convention rather than the normal truncation path.
            return match self.state.wait_for_pending(interrupt) {
                AcquireOutcome::Disconnected => Err(ErrorKind::IoError),
                AcquireOutcome::Interrupted => Err(ErrorKind::Interrupted),
                AcquireOutcome::Acquired => {
                    let request_id = self.state.peek_pending_id().unwrap_or(0);
                    self.state.release_pending_token();
                    Ok(ReadRequest { request_id, len: 0 })
                }
            };
        }
        loop {
            match self.state.wait_for_pending(interrupt) {
                AcquireOutcome::Disconnected => return Err(ErrorKind::IoError),
                AcquireOutcome::Interrupted => return Err(ErrorKind::Interrupted),
                AcquireOutcome::Acquired => {}
            }

            let Some(req) = self.state.dequeue_for_reader() else {
                // Lost the try-lock race to a caller reclaiming this
                // request; the token was already returned. Retry.
                continue;
            };

            let buf = req.take_reply();
            let Some(buf) = buf else {
                // Invariant violation: a freshly-dequeued request must still
                // own its encoded body. Treat as a protocol fault rather
                // than panic the reader thread.
                warn!(request_id = req.id, "dequeued request had no body buffer");
                continue;
            };

            let body_len = buf.bytes.len();
            let copy_len = body_len.min(sink_capacity);
            if copy_len < body_len {
                warn!(
                    request_id = req.id,
                    body_len,
                    sink_capacity,
                    "truncating request body to caller-provided sink"
                );
            }

            match copy(&buf.bytes[..copy_len]) {
                Ok(()) => {
                    self.state.release_buffer(Some(buf), true);
                    debug!(request_id = req.id, len = copy_len, "read next request");
                    return Ok(ReadRequest {
                        request_id: req.id,
                        len: copy_len,
                    });
                }
                Err(e) => {
                    warn!(request_id = req.id, error = %e, "sink copy failed, requeuing request");
                    self.state.requeue_at_head(req, buf);
                    return Err(e);
                }
            }
        }
    }

    /// Decodes `msg` and either completes a waiting Request (Reply),
    /// dispatches to a registered one-way handler (OneWay), or routes to the
    /// server-request seam (Request, D-initiated). The D-initiated branch's
    /// reply, if any, is returned framed and ready to write back over the
    /// transport; the core does not write it itself.
    pub fn deliver_reply_or_oneway(&self, msg: &[u8]) -> Result<Option<Vec<u8>>, ErrorKind> {
        if msg.len() > self.state.config.max_message + HEADER_LEN {
            return Err(ErrorKind::InvalidArgument("message exceeds protocol maximum"));
        }

        let mut buf = self.state.pool.acquire()?;
        buf.bytes.clear();
        buf.bytes.put_slice(msg);
        self.decode_and_route(buf)
    }

    /// Decodes `buf`'s header and routes on its direction. `buf` is
    /// released back to the pool on every path except a matched Reply,
    /// where ownership transfers to the waiting Request instead — exactly
    /// one release (explicit or via that transfer) per message, never two.
    fn decode_and_route(&self, buf: MessageBuffer) -> Result<Option<Vec<u8>>, ErrorKind> {
        let mut dec = Decoder::new(buf.bytes.clone().freeze());
        let (direction, request_id) = match dec.header() {
            Ok(v) => v,
            Err(e) => {
                self.state.release_buffer(Some(buf), true);
                return Err(e);
            }
        };

        match direction {
            Direction::Reply => {
                let Some(req) = self.state.take_processing(request_id) else {
                    warn!(request_id, "reply orphaned: no matching request");
                    self.state.release_buffer(Some(buf), true);
                    return Ok(None);
                };
                req.deliver_reply(buf);
                Ok(None)
            }
            Direction::OneWay => {
                let code = match dec.u32() {
                    Ok(c) => c,
                    Err(e) => {
                        self.state.release_buffer(Some(buf), true);
                        return Err(e);
                    }
                };
                if let Err(e) = self.oneway.dispatch(code, &mut dec) {
                    warn!(request_id, code, error = %e, "one-way handler failed");
                }
                self.state.release_buffer(Some(buf), true);
                Ok(None)
            }
            Direction::Request => {
                let Some(server) = self.server.clone() else {
                    self.state.release_buffer(Some(buf), true);
                    return Err(ErrorKind::ProtocolError("no server-request handler registered"));
                };
                let reply_body = server.handle(request_id, &mut dec);
                self.state.release_buffer(Some(buf), true);
                let reply_body = reply_body?;
                let mut enc = Encoder::new(bytes::BytesMut::new());
                enc.header(Direction::Reply, request_id);
                for byte in reply_body {
                    enc.u8(byte);
                }
                Ok(Some(enc.finish().to_vec()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::request::{Request, RequestState};
    use bytes::BytesMut;
    use zlomek_protocol::wire::Encoder;
    use zlomek_protocol::Config;

    fn new_endpoint() -> ChannelEndpoint {
        let state = ChannelState::new(Config::default());
        ChannelEndpoint::new(state, OneWayRegistry::new(|_| {}))
    }

    #[test]
    fn test_read_next_request_moves_to_processing() {
        let endpoint = new_endpoint();
        endpoint.open().unwrap();

        let mut enc = Encoder::new(BytesMut::new());
        enc.header(Direction::Request, 1);
        enc.u32(7);
        let body = enc.finish().freeze();

        let req = Arc::new(Request::new(1));
        let mut buf = endpoint.state.pool.acquire().unwrap();
        buf.bytes.put_slice(&body);
        req.set_body(buf);
        endpoint.state.enqueue_pending(req.clone()).unwrap();

        let interrupt = Interrupt::new();
        let mut sink = vec![0u8; 64];
        let read = endpoint.read_next_request(&mut sink, &interrupt).unwrap();
        assert_eq!(read.request_id, 1);
        assert_eq!(&sink[..read.len], &body[..]);
    }

    #[test]
    fn test_oversized_message_is_invalid_argument() {
        let endpoint = new_endpoint();
        endpoint.open().unwrap();
        let msg = vec![0u8; endpoint.state.config.max_message + HEADER_LEN + 1];
        assert!(matches!(
            endpoint.deliver_reply_or_oneway(&msg),
            Err(ErrorKind::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_orphaned_reply_is_harmless() {
        let endpoint = new_endpoint();
        endpoint.open().unwrap();

        let mut enc = Encoder::new(BytesMut::new());
        enc.header(Direction::Reply, 999);
        enc.u32(0);
        let body = enc.finish().freeze();

        assert!(endpoint.deliver_reply_or_oneway(&body).is_ok());
        assert_eq!(endpoint.state.pool.outstanding(), 0);
    }

    #[test]
    fn test_matched_reply_transfers_single_buffer_no_leak() {
        let endpoint = new_endpoint();
        endpoint.open().unwrap();

        let req = Arc::new(Request::new(1));
        endpoint.state.enqueue_pending(req.clone()).unwrap();
        endpoint.state.dequeue_for_reader();

        let mut enc = Encoder::new(BytesMut::new());
        enc.header(Direction::Reply, 1);
        enc.u32(0);
        let body = enc.finish().freeze();

        assert!(endpoint.deliver_reply_or_oneway(&body).is_ok());
        // The request now owns the one buffer the reply acquired; the pool
        // itself should show it as outstanding exactly once, never twice.
        assert_eq!(endpoint.state.pool.outstanding(), 1);
        endpoint.state.pool.release(req.take_reply(), true);
        assert_eq!(endpoint.state.pool.outstanding(), 0);
    }

    #[test]
    fn test_sink_copy_failure_requeues_request_as_fault() {
        let endpoint = new_endpoint();
        endpoint.open().unwrap();

        let mut enc = Encoder::new(BytesMut::new());
        enc.header(Direction::Request, 9);
        enc.u32(3);
        let body = enc.finish().freeze();

        let req = Arc::new(Request::new(9));
        let mut buf = endpoint.state.pool.acquire().unwrap();
        buf.bytes.put_slice(&body);
        req.set_body(buf);
        endpoint.state.enqueue_pending(req.clone()).unwrap();

        let interrupt = Interrupt::new();
        let result = endpoint.read_next_request_fallible(64, &interrupt, |_| {
            Err(ErrorKind::Fault)
        });
        assert!(matches!(result, Err(ErrorKind::Fault)));

        // The request is back in the pending queue as Pending, still
        // carrying its body — a subsequent, successful read picks it up.
        assert_eq!(req.state(), RequestState::Pending);
        assert_eq!(endpoint.state.peek_pending_id(), Some(9));

        let mut sink = vec![0u8; 64];
        let read = endpoint.read_next_request(&mut sink, &interrupt).unwrap();
        assert_eq!(read.request_id, 9);
        assert_eq!(&sink[..read.len], &body[..]);
        assert_eq!(endpoint.state.pool.outstanding(), 0);
    }
}
