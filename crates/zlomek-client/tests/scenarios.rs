//! Client-level scenarios: concurrent multiplexed calls and cancellation,
//! driven directly against a `ChannelEndpoint` in the same process (no
//! transport in between — see `zlomek-chardev`'s tests for the full stack).

use std::thread;
use zlomek_channel::{ChannelEndpoint, ChannelState, Interrupt, OneWayRegistry};
use zlomek_client::Client;
use zlomek_protocol::wire::{Direction, Encoder, Status};
use zlomek_protocol::{Config, ErrorKind};

#[test]
fn scenario_concurrent_calls_get_unique_ids_and_independent_replies() {
    let state = ChannelState::new(Config::default());
    let endpoint = ChannelEndpoint::new(state.clone(), OneWayRegistry::new(|_| {}));
    endpoint.open().unwrap();
    let client = Client::new(state);

    let callers: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            thread::spawn(move || {
                let interrupt = Interrupt::new();
                client.call::<u32, u32>(1, &i, &interrupt)
            })
        })
        .collect();

    // Drain all eight and answer each with its request id doubled, proving
    // replies land on the caller that sent the matching id regardless of
    // dispatch order.
    for _ in 0..8 {
        let mut sink = vec![0u8; 64];
        let read = endpoint
            .read_next_request(&mut sink, &Interrupt::new())
            .unwrap();
        let mut enc = Encoder::new(bytes::BytesMut::new());
        enc.header(Direction::Reply, read.request_id);
        enc.u32(Status::Ok as u32);
        enc.u32(read.request_id * 2);
        endpoint.deliver_reply_or_oneway(&enc.finish().freeze()).unwrap();
    }

    let mut seen_ids = Vec::new();
    for caller in callers {
        let result = caller.join().unwrap().unwrap();
        seen_ids.push(result);
    }
    seen_ids.sort();
    // Ids are assigned 1..=8 to this session's first eight calls; each
    // caller's result is exactly twice its own id.
    assert_eq!(seen_ids, vec![2, 4, 6, 8, 10, 12, 14, 16]);
    assert_eq!(endpoint.state().pool.outstanding(), 0);
}

#[test]
fn scenario_interrupted_call_is_orphaned_cleanly_if_reply_arrives_late() {
    let state = ChannelState::new(Config::default());
    let endpoint = ChannelEndpoint::new(state.clone(), OneWayRegistry::new(|_| {}));
    endpoint.open().unwrap();
    let client = Client::new(state);

    let interrupt = Interrupt::new();
    let client2 = client.clone();
    let interrupt2 = interrupt.clone();
    let handle = thread::spawn(move || client2.call::<(), ()>(1, &(), &interrupt2));

    let mut sink = vec![0u8; 64];
    let read = endpoint
        .read_next_request(&mut sink, &Interrupt::new())
        .unwrap();

    interrupt.raise();
    assert!(matches!(handle.join().unwrap(), Err(ErrorKind::Interrupted)));

    // The daemon didn't know the caller gave up; its late reply must be
    // harmlessly orphaned rather than panicking or leaking a buffer.
    let mut enc = Encoder::new(bytes::BytesMut::new());
    enc.header(Direction::Reply, read.request_id);
    enc.u32(Status::Ok as u32);
    assert!(endpoint.deliver_reply_or_oneway(&enc.finish().freeze()).is_ok());
    assert_eq!(endpoint.state().pool.outstanding(), 0);
}
