//! Exercises the full stack — `Client::call` on one side, `ChannelEndpoint`
//! plus the pump loops on the other — over a `LoopbackChannel` standing in
//! for the device node, the way a real daemon and its reader/writer threads
//! would be wired.

use std::sync::Arc;
use std::thread;
use zlomek_channel::{ChannelEndpoint, ChannelState, Interrupt, OneWayRegistry};
use zlomek_chardev::{run_reader_loop, run_writer_loop, DuplexChannel, LoopbackChannel};
use zlomek_client::Client;
use zlomek_protocol::wire::{Direction, Encoder, Status};
use zlomek_protocol::{Config, FileHandle};

#[test]
fn test_client_call_round_trips_over_loopback_transport() {
    let state = ChannelState::new(Config::default());
    let endpoint = Arc::new(ChannelEndpoint::new(state.clone(), OneWayRegistry::new(|_| {})));
    endpoint.open().unwrap();

    // `k_transport` is the core's end of the wire; the reader loop writes
    // pending requests onto it, the writer loop reads replies off it.
    // `d_side` is the fake daemon's end of the same wire.
    let (k_side, d_side) = LoopbackChannel::pair();
    let k_transport: Arc<dyn DuplexChannel> = Arc::new(k_side);

    thread::spawn({
        let endpoint = endpoint.clone();
        let transport = k_transport.clone();
        move || run_reader_loop(endpoint, transport, Interrupt::new())
    });
    thread::spawn({
        let endpoint = endpoint.clone();
        let transport = k_transport.clone();
        move || run_writer_loop(endpoint, transport)
    });

    let handle = FileHandle {
        site_id: 7,
        volume_id: 1,
        device: 2,
        inode: 3,
        generation: 0,
    };
    thread::spawn(move || {
        let mut buf = vec![0u8; 4096];
        let n = d_side.recv(&mut buf).expect("daemon recv failed");
        let request_id = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);

        let mut enc = Encoder::new(bytes::BytesMut::new());
        enc.header(Direction::Reply, request_id);
        enc.u32(Status::Ok as u32);
        enc.encode(&handle);
        d_side.send(&enc.finish()).expect("daemon reply send failed");
        let _ = n;
    });

    let client = Client::new(state);
    let interrupt = Interrupt::new();
    let result = client.root(&interrupt).unwrap();
    assert_eq!(result, handle);
}
