//! Scenario tests exercised directly against `ChannelEndpoint`/`ChannelState`
//! without a transport in between: truncated reads, disconnect mid-flight,
//! one-way dispatch, zero-length sinks, and the oversized-message boundary.

use bytes::{BufMut, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use zlomek_channel::{ChannelEndpoint, ChannelState, Interrupt, OneWayRegistry, Request};
use zlomek_protocol::wire::{Direction, Encoder, Status};
use zlomek_protocol::{Config, ErrorKind, FileHandle};

fn endpoint_with(config: Config) -> ChannelEndpoint {
    let state = ChannelState::new(config);
    let endpoint = ChannelEndpoint::new(state, OneWayRegistry::new(|_| {}));
    endpoint.open().unwrap();
    endpoint
}

fn enqueue_raw_request(endpoint: &ChannelEndpoint, id: u32, body_extra_bytes: usize) -> Arc<Request> {
    let req = Arc::new(Request::new(id));
    let mut buf = endpoint.state().pool.acquire().unwrap();
    let mut enc = Encoder::new(BytesMut::new());
    enc.header(Direction::Request, id);
    for _ in 0..body_extra_bytes {
        enc.u8(0xAB);
    }
    buf.bytes.put_slice(&enc.finish());
    req.set_body(buf);
    endpoint.state().enqueue_pending(req.clone()).unwrap();
    req
}

#[test]
fn scenario_truncated_read_does_not_reject_later_reply() {
    let endpoint = endpoint_with(Config::default());
    let req = enqueue_raw_request(&endpoint, 2, 200);

    let mut small_sink = vec![0u8; 100];
    let interrupt = Interrupt::new();
    let read = endpoint.read_next_request(&mut small_sink, &interrupt).unwrap();
    assert_eq!(read.request_id, 2);
    assert_eq!(read.len, 100);

    let mut enc = Encoder::new(BytesMut::new());
    enc.header(Direction::Reply, 2);
    enc.u32(Status::Ok as u32);
    let reply = enc.finish().freeze();
    endpoint.deliver_reply_or_oneway(&reply).unwrap();

    assert_eq!(req.state(), zlomek_channel::RequestState::Replied);
}

#[test]
fn scenario_disconnect_mid_flight_fails_pending_and_processing() {
    let endpoint = endpoint_with(Config::default());
    let interrupt = Interrupt::new();

    let req5 = enqueue_raw_request(&endpoint, 5, 0);
    let req6 = enqueue_raw_request(&endpoint, 6, 0);
    let req7 = enqueue_raw_request(&endpoint, 7, 0);

    let mut sink = vec![0u8; 64];
    let read = endpoint.read_next_request(&mut sink, &interrupt).unwrap();
    assert_eq!(read.request_id, 5);

    endpoint.close();

    assert_eq!(req5.wait(Duration::from_secs(1), &interrupt), zlomek_channel::Wake::Disconnected);
    assert_eq!(req6.wait(Duration::from_secs(1), &interrupt), zlomek_channel::Wake::Disconnected);
    assert_eq!(req7.wait(Duration::from_secs(1), &interrupt), zlomek_channel::Wake::Disconnected);

    // req5's body was already released back to the pool by the read above;
    // req6 and req7 never got that far and still own theirs. close() must
    // not drain the pool out from under those two live references.
    assert_eq!(endpoint.state().pool.outstanding(), 2);

    endpoint.state().release_buffer(req6.take_reply(), true);
    endpoint.state().release_buffer(req7.take_reply(), true);

    // The last release drains the pool now that nothing references it.
    assert_eq!(endpoint.state().pool.outstanding(), 0);
}

#[test]
fn scenario_one_way_invalidate_calls_handler_without_affecting_requests() {
    let state = ChannelState::new(Config::default());
    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen2 = seen.clone();
    let endpoint = ChannelEndpoint::new(
        state,
        OneWayRegistry::new(move |h: FileHandle| {
            *seen2.lock().unwrap() = Some(h);
        }),
    );
    endpoint.open().unwrap();

    let handle = FileHandle {
        site_id: 1,
        volume_id: 2,
        device: 3,
        inode: 4,
        generation: 5,
    };
    let mut enc = Encoder::new(BytesMut::new());
    enc.header(Direction::OneWay, 0);
    enc.u32(zlomek_protocol::ops::FunctionCode::Invalidate as u32);
    enc.encode(&handle);
    let msg = enc.finish().freeze();

    assert!(endpoint.deliver_reply_or_oneway(&msg).unwrap().is_none());
    assert_eq!(*seen.lock().unwrap(), Some(handle));
    assert_eq!(endpoint.state().pool.outstanding(), 0);
}

#[test]
fn scenario_read_with_zero_length_sink_does_not_dequeue() {
    let endpoint = endpoint_with(Config::default());
    let interrupt = Interrupt::new();
    enqueue_raw_request(&endpoint, 11, 0);

    let mut empty_sink: [u8; 0] = [];
    let read = endpoint.read_next_request(&mut empty_sink, &interrupt).unwrap();
    assert_eq!(read.request_id, 11);
    assert_eq!(read.len, 0);
    // Still sitting in the pending queue, unread: the zero-length read
    // reported the head without dequeuing it.
    assert_eq!(endpoint.state().peek_pending_id(), Some(11));

    // A normal read now picks it up exactly as if the zero-length read
    // never happened.
    let mut real_sink = vec![0u8; 64];
    let real_read = endpoint.read_next_request(&mut real_sink, &interrupt).unwrap();
    assert_eq!(real_read.request_id, 11);
}

#[test]
fn scenario_oversized_write_rejected_boundary() {
    let endpoint = endpoint_with(Config::default());
    let max = endpoint.state().config.max_message;

    let mut enc = Encoder::new(BytesMut::new());
    enc.header(Direction::Reply, 1);
    enc.u32(Status::Ok as u32);
    for _ in 0..(max - 4) {
        enc.u8(0);
    }
    let exactly_max = enc.finish().freeze();
    assert!(endpoint.deliver_reply_or_oneway(&exactly_max).is_ok());

    let mut too_big = BytesMut::from(&exactly_max[..]);
    too_big.put_u8(0);
    assert!(matches!(
        endpoint.deliver_reply_or_oneway(&too_big),
        Err(ErrorKind::InvalidArgument(_))
    ));
}
