use crate::error::ErrorKind;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Maximum body size of a single message, header excluded. Tunable via
/// `Config::max_message`; 64 KiB is the long-standing default.
pub const DEFAULT_MAX_MESSAGE: usize = 64 * 1024;

/// Tag distinguishing the three message shapes that can cross the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Request = 0,
    Reply = 1,
    OneWay = 2,
}

impl Direction {
    fn from_u8(v: u8) -> Result<Self, ErrorKind> {
        match v {
            0 => Ok(Direction::Request),
            1 => Ok(Direction::Reply),
            2 => Ok(Direction::OneWay),
            _ => Err(ErrorKind::ProtocolError("unknown direction tag")),
        }
    }
}

/// A reply's status word. `Ok` carries no payload tag of its own; any other
/// value is a wire-level error kind and the reply carries no result fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    Ok = 0,
    Busy = 1,
    IoError = 2,
    Timeout = 3,
    Interrupted = 4,
    OutOfMemory = 5,
    InvalidArgument = 6,
    ProtocolError = 7,
    Fault = 8,
    Stale = 9,
}

impl Status {
    pub fn from_u32(v: u32) -> Result<Self, ErrorKind> {
        Ok(match v {
            0 => Status::Ok,
            1 => Status::Busy,
            2 => Status::IoError,
            3 => Status::Timeout,
            4 => Status::Interrupted,
            5 => Status::OutOfMemory,
            6 => Status::InvalidArgument,
            7 => Status::ProtocolError,
            8 => Status::Fault,
            9 => Status::Stale,
            _ => return Err(ErrorKind::ProtocolError("unknown status word")),
        })
    }

    /// Maps a non-`Ok` status to the error kind it denotes.
    pub fn into_error_kind(self) -> Option<ErrorKind> {
        match self {
            Status::Ok => None,
            Status::Busy => Some(ErrorKind::Busy),
            Status::IoError => Some(ErrorKind::IoError),
            Status::Timeout => Some(ErrorKind::Timeout),
            Status::Interrupted => Some(ErrorKind::Interrupted),
            Status::OutOfMemory => Some(ErrorKind::OutOfMemory),
            Status::InvalidArgument => Some(ErrorKind::InvalidArgument("rejected by daemon")),
            Status::ProtocolError => Some(ErrorKind::ProtocolError("rejected by daemon")),
            Status::Fault => Some(ErrorKind::Fault),
            Status::Stale => Some(ErrorKind::Stale),
        }
    }
}

/// The fixed header every message opens with: `[direction:1][request_id:4 LE]`.
pub const HEADER_LEN: usize = 5;

/// Appends typed fields to an outgoing message. Encoders never fail for
/// messages below `DEFAULT_MAX_MESSAGE`; callers are responsible for keeping
/// arguments within that bound.
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new(buf: BytesMut) -> Self {
        Self { buf }
    }

    pub fn header(&mut self, direction: Direction, request_id: u32) {
        self.buf.put_u8(direction as u8);
        self.buf.put_u32_le(request_id);
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    /// Length-prefixed byte string: `[len:4 LE][bytes...]`.
    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.put_u32_le(v.len() as u32);
        self.buf.put_slice(v);
    }

    pub fn str(&mut self, v: &str) {
        self.bytes(v.as_bytes());
    }

    pub fn encode<T: Encode>(&mut self, v: &T) {
        v.encode(self);
    }

    pub fn finish(self) -> BytesMut {
        self.buf
    }
}

/// Reads typed fields back out of an incoming message. Every primitive read
/// checks the remaining length first and returns `ProtocolError` rather than
/// panicking on a short buffer — the wire is untrusted input.
pub struct Decoder {
    buf: Bytes,
}

impl Decoder {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> Result<(), ErrorKind> {
        if self.buf.remaining() < n {
            Err(ErrorKind::ProtocolError("message truncated"))
        } else {
            Ok(())
        }
    }

    pub fn header(&mut self) -> Result<(Direction, u32), ErrorKind> {
        self.need(HEADER_LEN)?;
        let direction = Direction::from_u8(self.buf.get_u8())?;
        let request_id = self.buf.get_u32_le();
        Ok((direction, request_id))
    }

    pub fn u8(&mut self) -> Result<u8, ErrorKind> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u32(&mut self) -> Result<u32, ErrorKind> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64(&mut self) -> Result<u64, ErrorKind> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn i64(&mut self) -> Result<i64, ErrorKind> {
        self.need(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn bool(&mut self) -> Result<bool, ErrorKind> {
        Ok(self.u8()? != 0)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, ErrorKind> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn str(&mut self) -> Result<String, ErrorKind> {
        let raw = self.bytes()?;
        String::from_utf8(raw).map_err(|_| ErrorKind::ProtocolError("field is not valid utf-8"))
    }

    pub fn decode<T: Decode>(&mut self) -> Result<T, ErrorKind> {
        T::decode(self)
    }

    /// Asserts no trailing bytes remain. Must be called once a message's
    /// fields have all been read.
    pub fn finish_decoding(self) -> Result<(), ErrorKind> {
        if self.buf.has_remaining() {
            Err(ErrorKind::ProtocolError("trailing bytes after decode"))
        } else {
            Ok(())
        }
    }
}

/// Implemented by every type that appears as a wire field.
pub trait Encode {
    fn encode(&self, enc: &mut Encoder);
}

/// Implemented by every type that appears as a wire field.
pub trait Decode: Sized {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind>;
}

impl Encode for u32 {
    fn encode(&self, enc: &mut Encoder) {
        enc.u32(*self)
    }
}
impl Decode for u32 {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind> {
        dec.u32()
    }
}

impl Encode for u64 {
    fn encode(&self, enc: &mut Encoder) {
        enc.u64(*self)
    }
}
impl Decode for u64 {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind> {
        dec.u64()
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.str(self)
    }
}
impl Decode for String {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind> {
        dec.str()
    }
}

impl Encode for () {
    fn encode(&self, _enc: &mut Encoder) {}
}
impl Decode for () {
    fn decode(_dec: &mut Decoder) -> Result<Self, ErrorKind> {
        Ok(())
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, enc: &mut Encoder) {
        enc.bytes(self)
    }
}
impl Decode for Vec<u8> {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind> {
        dec.bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_round_trips() {
        let mut enc = Encoder::new(BytesMut::new());
        enc.header(Direction::Request, 42);
        enc.u32(7);
        enc.str("hello");
        let buf = enc.finish().freeze();

        let mut dec = Decoder::new(buf);
        let (direction, id) = dec.header().unwrap();
        assert_eq!(direction, Direction::Request);
        assert_eq!(id, 42);
        assert_eq!(dec.u32().unwrap(), 7);
        assert_eq!(dec.str().unwrap(), "hello");
        dec.finish_decoding().unwrap();
    }

    #[test]
    fn test_truncated_read_is_protocol_error() {
        let mut enc = Encoder::new(BytesMut::new());
        enc.header(Direction::Reply, 1);
        let buf = enc.finish().freeze();

        let mut dec = Decoder::new(buf);
        dec.header().unwrap();
        assert!(matches!(dec.u32(), Err(ErrorKind::ProtocolError(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut enc = Encoder::new(BytesMut::new());
        enc.u32(1);
        enc.u32(2);
        let buf = enc.finish().freeze();

        let mut dec = Decoder::new(buf);
        dec.u32().unwrap();
        assert!(matches!(dec.finish_decoding(), Err(ErrorKind::ProtocolError(_))));
    }
}
