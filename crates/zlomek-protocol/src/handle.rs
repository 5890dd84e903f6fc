use crate::error::ErrorKind;
use crate::wire::{Decode, Decoder, Encode, Encoder};

/// Opaque fixed-width identifier for a file on the distributed volume: site,
/// volume, device, inode and generation. Equality and hashing are by the
/// full tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub site_id: u32,
    pub volume_id: u32,
    pub device: u32,
    pub inode: u32,
    pub generation: u32,
}

impl Encode for FileHandle {
    fn encode(&self, enc: &mut Encoder) {
        enc.u32(self.site_id);
        enc.u32(self.volume_id);
        enc.u32(self.device);
        enc.u32(self.inode);
        enc.u32(self.generation);
    }
}

impl Decode for FileHandle {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind> {
        Ok(FileHandle {
            site_id: dec.u32()?,
            volume_id: dec.u32()?,
            device: dec.u32()?,
            inode: dec.u32()?,
            generation: dec.u32()?,
        })
    }
}

/// A capability over an already-`open`ed file: the handle plus the cookie D
/// assigned to this open instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub handle: FileHandle,
    pub cookie: i64,
}

impl Encode for Capability {
    fn encode(&self, enc: &mut Encoder) {
        enc.encode(&self.handle);
        enc.i64(self.cookie);
    }
}

impl Decode for Capability {
    fn decode(dec: &mut Decoder) -> Result<Self, ErrorKind> {
        Ok(Capability {
            handle: dec.decode()?,
            cookie: dec.i64()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_file_handle_round_trips() {
        let h = FileHandle {
            site_id: 1,
            volume_id: 2,
            device: 3,
            inode: 4,
            generation: 5,
        };
        let mut enc = Encoder::new(BytesMut::new());
        enc.encode(&h);
        let mut dec = Decoder::new(enc.finish().freeze());
        let decoded: FileHandle = dec.decode().unwrap();
        dec.finish_decoding().unwrap();
        assert_eq!(h, decoded);
    }
}
