//! Typed argument and result shapes for every operation the channel carries,
//! plus the function-code table. Covers the full `zfsd_*` extern list, not
//! just a representative subset.

use crate::error::ErrorKind;
use crate::handle::{Capability, FileHandle};
use crate::wire::{Decode, Decoder, Encode, Encoder};

/// Identifies which operation a Request or OneWay message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FunctionCode {
    Root = 1,
    GetAttr = 2,
    SetAttr = 3,
    Create = 4,
    Lookup = 5,
    Link = 6,
    Unlink = 7,
    Symlink = 8,
    Mkdir = 9,
    Rmdir = 10,
    Mknod = 11,
    Rename = 12,
    Readlink = 13,
    Open = 14,
    Close = 15,
    Readdir = 16,
    Read = 17,
    Write = 18,
    Readpage = 19,
    /// The one built-in one-way function; D uses it to tell K a cached
    /// handle is no longer valid.
    Invalidate = 100,
}

impl FunctionCode {
    pub fn from_u32(v: u32) -> Result<Self, ErrorKind> {
        Ok(match v {
            1 => FunctionCode::Root,
            2 => FunctionCode::GetAttr,
            3 => FunctionCode::SetAttr,
            4 => FunctionCode::Create,
            5 => FunctionCode::Lookup,
            6 => FunctionCode::Link,
            7 => FunctionCode::Unlink,
            8 => FunctionCode::Symlink,
            9 => FunctionCode::Mkdir,
            10 => FunctionCode::Rmdir,
            11 => FunctionCode::Mknod,
            12 => FunctionCode::Rename,
            13 => FunctionCode::Readlink,
            14 => FunctionCode::Open,
            15 => FunctionCode::Close,
            16 => FunctionCode::Readdir,
            17 => FunctionCode::Read,
            18 => FunctionCode::Write,
            19 => FunctionCode::Readpage,
            100 => FunctionCode::Invalidate,
            _ => return Err(ErrorKind::ProtocolError("unknown function code")),
        })
    }
}

/// POSIX file type, as carried in [`FileAttr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    Regular = 0,
    Directory = 1,
    Symlink = 2,
    BlockDevice = 3,
    CharDevice = 4,
    Fifo = 5,
    Socket = 6,
}

impl FileType {
    fn from_u8(v: u8) -> Result<Self, ErrorKind> {
        Ok(match v {
            0 => FileType::Regular,
            1 => FileType::Directory,
            2 => FileType::Symlink,
            3 => FileType::BlockDevice,
            4 => FileType::CharDevice,
            5 => FileType::Fifo,
            6 => FileType::Socket,
            _ => return Err(ErrorKind::ProtocolError("unknown file type")),
        })
    }
}

/// File metadata as returned by `getattr`, `setattr`, `create`, `lookup`,
/// `symlink`, `mkdir` and `mknod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub file_type: FileType,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blocks: u64,
    pub atime_sec: i64,
    pub mtime_sec: i64,
    pub ctime_sec: i64,
}

impl Encode for FileAttr {
    fn encode(&self, enc: &mut Encoder) {
        enc.u8(self.file_type as u8);
        enc.u32(self.mode);
        enc.u32(self.nlink);
        enc.u32(self.uid);
        enc.u32(self.gid);
        enc.u64(self.size);
        enc.u64(self.blocks);
        enc.i64(self.atime_sec);
        enc.i64(self.mtime_sec);
        enc.i64(self.ctime_sec);
    }
}

impl Decode for FileAttr {
    fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
        Ok(FileAttr {
            file_type: FileType::from_u8(dec.u8()?)?,
            mode: dec.u32()?,
            nlink: dec.u32()?,
            uid: dec.u32()?,
            gid: dec.u32()?,
            size: dec.u64()?,
            blocks: dec.u64()?,
            atime_sec: dec.i64()?,
            mtime_sec: dec.i64()?,
            ctime_sec: dec.i64()?,
        })
    }
}

macro_rules! bitmask_field {
    ($enc:expr, $mask:expr, $bit:expr, $value:expr, $write:expr) => {
        if $mask & $bit != 0 {
            $write($enc, $value);
        }
    };
}

const SATTR_MODE: u32 = 1 << 0;
const SATTR_UID: u32 = 1 << 1;
const SATTR_GID: u32 = 1 << 2;
const SATTR_SIZE: u32 = 1 << 3;
const SATTR_ATIME: u32 = 1 << 4;
const SATTR_MTIME: u32 = 1 << 5;

/// Sparse attribute update, as used by `setattr`. Only the fields present in
/// the bitmask are encoded, matching the original `sattr` struct's use of a
/// `valid` field to mark which members the caller actually set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetAttr {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime_sec: Option<i64>,
    pub mtime_sec: Option<i64>,
}

impl SetAttr {
    fn mask(&self) -> u32 {
        let mut m = 0;
        if self.mode.is_some() {
            m |= SATTR_MODE;
        }
        if self.uid.is_some() {
            m |= SATTR_UID;
        }
        if self.gid.is_some() {
            m |= SATTR_GID;
        }
        if self.size.is_some() {
            m |= SATTR_SIZE;
        }
        if self.atime_sec.is_some() {
            m |= SATTR_ATIME;
        }
        if self.mtime_sec.is_some() {
            m |= SATTR_MTIME;
        }
        m
    }
}

impl Encode for SetAttr {
    fn encode(&self, enc: &mut Encoder) {
        enc.u32(self.mask());
        bitmask_field!(enc, self.mask(), SATTR_MODE, self.mode.unwrap_or_default(), |e: &mut Encoder, v| e.u32(v));
        bitmask_field!(enc, self.mask(), SATTR_UID, self.uid.unwrap_or_default(), |e: &mut Encoder, v| e.u32(v));
        bitmask_field!(enc, self.mask(), SATTR_GID, self.gid.unwrap_or_default(), |e: &mut Encoder, v| e.u32(v));
        bitmask_field!(enc, self.mask(), SATTR_SIZE, self.size.unwrap_or_default(), |e: &mut Encoder, v| e.u64(v));
        bitmask_field!(enc, self.mask(), SATTR_ATIME, self.atime_sec.unwrap_or_default(), |e: &mut Encoder, v| e.i64(v));
        bitmask_field!(enc, self.mask(), SATTR_MTIME, self.mtime_sec.unwrap_or_default(), |e: &mut Encoder, v| e.i64(v));
    }
}

impl Decode for SetAttr {
    fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
        let mask = dec.u32()?;
        let mut out = SetAttr::default();
        if mask & SATTR_MODE != 0 {
            out.mode = Some(dec.u32()?);
        }
        if mask & SATTR_UID != 0 {
            out.uid = Some(dec.u32()?);
        }
        if mask & SATTR_GID != 0 {
            out.gid = Some(dec.u32()?);
        }
        if mask & SATTR_SIZE != 0 {
            out.size = Some(dec.u64()?);
        }
        if mask & SATTR_ATIME != 0 {
            out.atime_sec = Some(dec.i64()?);
        }
        if mask & SATTR_MTIME != 0 {
            out.mtime_sec = Some(dec.i64()?);
        }
        Ok(out)
    }
}

/// Common shape for operations that name a directory entry by parent handle
/// plus a path component: `lookup`, `unlink`, `rmdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirOpArgs {
    pub parent: FileHandle,
    pub name: String,
}

impl Encode for DirOpArgs {
    fn encode(&self, enc: &mut Encoder) {
        enc.encode(&self.parent);
        enc.str(&self.name);
    }
}

impl Decode for DirOpArgs {
    fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
        Ok(DirOpArgs {
            parent: dec.decode()?,
            name: dec.str()?,
        })
    }
}

/// Common result shape for operations that create or resolve a directory
/// entry: `lookup`, `symlink`, `mkdir`, `mknod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirOpResult {
    pub handle: FileHandle,
    pub attr: FileAttr,
}

impl Encode for DirOpResult {
    fn encode(&self, enc: &mut Encoder) {
        enc.encode(&self.handle);
        enc.encode(&self.attr);
    }
}

impl Decode for DirOpResult {
    fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
        Ok(DirOpResult {
            handle: dec.decode()?,
            attr: dec.decode()?,
        })
    }
}

pub mod root {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Args;

    impl Encode for Args {
        fn encode(&self, _enc: &mut Encoder) {}
    }
    impl Decode for Args {
        fn decode(_dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args)
        }
    }

    pub type Result = FileHandle;
}

pub mod getattr {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub handle: FileHandle,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.handle);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args { handle: dec.decode()? })
        }
    }

    pub type Result = FileAttr;
}

pub mod setattr {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub handle: FileHandle,
        pub attr: SetAttr,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.handle);
            enc.encode(&self.attr);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                handle: dec.decode()?,
                attr: dec.decode()?,
            })
        }
    }

    pub type Result = FileAttr;
}

pub mod create {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub parent: FileHandle,
        pub name: String,
        pub mode: u32,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.parent);
            enc.str(&self.name);
            enc.u32(self.mode);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                parent: dec.decode()?,
                name: dec.str()?,
                mode: dec.u32()?,
            })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Result {
        pub cap: Capability,
        pub attr: FileAttr,
    }
    impl Encode for Result {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.cap);
            enc.encode(&self.attr);
        }
    }
    impl Decode for Result {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Result {
                cap: dec.decode()?,
                attr: dec.decode()?,
            })
        }
    }
}

pub mod lookup {
    use super::*;
    pub type Args = DirOpArgs;
    pub type Result = DirOpResult;
}

pub mod link {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub target: FileHandle,
        pub new_parent: FileHandle,
        pub new_name: String,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.target);
            enc.encode(&self.new_parent);
            enc.str(&self.new_name);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                target: dec.decode()?,
                new_parent: dec.decode()?,
                new_name: dec.str()?,
            })
        }
    }

    pub type Result = ();
}

pub mod unlink {
    use super::*;
    pub type Args = DirOpArgs;
    pub type Result = ();
}

pub mod symlink {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub parent: FileHandle,
        pub name: String,
        pub target: String,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.parent);
            enc.str(&self.name);
            enc.str(&self.target);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                parent: dec.decode()?,
                name: dec.str()?,
                target: dec.str()?,
            })
        }
    }

    pub type Result = DirOpResult;
}

pub mod mkdir {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub parent: FileHandle,
        pub name: String,
        pub mode: u32,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.parent);
            enc.str(&self.name);
            enc.u32(self.mode);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                parent: dec.decode()?,
                name: dec.str()?,
                mode: dec.u32()?,
            })
        }
    }

    pub type Result = DirOpResult;
}

pub mod rmdir {
    use super::*;
    pub type Args = DirOpArgs;
    pub type Result = ();
}

pub mod mknod {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub parent: FileHandle,
        pub name: String,
        pub mode: u32,
        pub rdev: u32,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.parent);
            enc.str(&self.name);
            enc.u32(self.mode);
            enc.u32(self.rdev);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                parent: dec.decode()?,
                name: dec.str()?,
                mode: dec.u32()?,
                rdev: dec.u32()?,
            })
        }
    }

    pub type Result = DirOpResult;
}

pub mod rename {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub from_parent: FileHandle,
        pub from_name: String,
        pub to_parent: FileHandle,
        pub to_name: String,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.from_parent);
            enc.str(&self.from_name);
            enc.encode(&self.to_parent);
            enc.str(&self.to_name);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                from_parent: dec.decode()?,
                from_name: dec.str()?,
                to_parent: dec.decode()?,
                to_name: dec.str()?,
            })
        }
    }

    pub type Result = ();
}

pub mod readlink {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub handle: FileHandle,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.handle);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args { handle: dec.decode()? })
        }
    }

    pub type Result = String;
}

pub mod open {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub handle: FileHandle,
        pub flags: u32,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.handle);
            enc.u32(self.flags);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                handle: dec.decode()?,
                flags: dec.u32()?,
            })
        }
    }

    pub type Result = Capability;
}

pub mod close {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub cap: Capability,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.cap);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args { cap: dec.decode()? })
        }
    }

    pub type Result = ();
}

pub mod readdir {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub handle: FileHandle,
        pub cookie: u64,
        pub count: u32,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.handle);
            enc.u64(self.cookie);
            enc.u32(self.count);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                handle: dec.decode()?,
                cookie: dec.u64()?,
                count: dec.u32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Entry {
        pub name: String,
        pub handle: FileHandle,
        pub cookie: u64,
    }
    impl Encode for Entry {
        fn encode(&self, enc: &mut Encoder) {
            enc.str(&self.name);
            enc.encode(&self.handle);
            enc.u64(self.cookie);
        }
    }
    impl Decode for Entry {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Entry {
                name: dec.str()?,
                handle: dec.decode()?,
                cookie: dec.u64()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Result {
        pub entries: Vec<Entry>,
        pub eof: bool,
    }
    impl Encode for Result {
        fn encode(&self, enc: &mut Encoder) {
            enc.u32(self.entries.len() as u32);
            for entry in &self.entries {
                enc.encode(entry);
            }
            enc.bool(self.eof);
        }
    }
    impl Decode for Result {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            let count = dec.u32()? as usize;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push(dec.decode()?);
            }
            Ok(Result {
                entries,
                eof: dec.bool()?,
            })
        }
    }
}

pub mod read {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub cap: Capability,
        pub offset: u64,
        pub length: u32,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.cap);
            enc.u64(self.offset);
            enc.u32(self.length);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                cap: dec.decode()?,
                offset: dec.u64()?,
                length: dec.u32()?,
            })
        }
    }

    pub type Result = Vec<u8>;
}

pub mod write {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Args {
        pub cap: Capability,
        pub offset: u64,
        pub data: Vec<u8>,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.cap);
            enc.u64(self.offset);
            enc.bytes(&self.data);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args {
                cap: dec.decode()?,
                offset: dec.u64()?,
                data: dec.bytes()?,
            })
        }
    }

    pub type Result = u32;
}

pub mod readpage {
    use super::*;
    pub type Args = read::Args;
    pub type Result = Vec<u8>;
}

pub mod invalidate {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Args {
        pub handle: FileHandle,
    }
    impl Encode for Args {
        fn encode(&self, enc: &mut Encoder) {
            enc.encode(&self.handle);
        }
    }
    impl Decode for Args {
        fn decode(dec: &mut Decoder) -> std::result::Result<Self, ErrorKind> {
            Ok(Args { handle: dec.decode()? })
        }
    }
}
