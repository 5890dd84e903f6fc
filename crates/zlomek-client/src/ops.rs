//! One typed wrapper per operation in `zlomek_protocol::ops`'s function-code
//! list: each just encodes its typed arguments, calls [`Client::call`], and
//! decodes the typed result.

use crate::call::Client;
use zlomek_protocol::ops::*;
use zlomek_protocol::{Capability, FileHandle, Result};

impl Client {
    pub fn root(&self, interrupt: &zlomek_channel::Interrupt) -> Result<FileHandle> {
        self.call(FunctionCode::Root as u32, &root::Args, interrupt)
    }

    pub fn getattr(&self, handle: FileHandle, interrupt: &zlomek_channel::Interrupt) -> Result<FileAttr> {
        self.call(FunctionCode::GetAttr as u32, &getattr::Args { handle }, interrupt)
    }

    pub fn setattr(
        &self,
        handle: FileHandle,
        attr: SetAttr,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<FileAttr> {
        self.call(FunctionCode::SetAttr as u32, &setattr::Args { handle, attr }, interrupt)
    }

    pub fn create(
        &self,
        parent: FileHandle,
        name: String,
        mode: u32,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<create::Result> {
        self.call(FunctionCode::Create as u32, &create::Args { parent, name, mode }, interrupt)
    }

    pub fn lookup(
        &self,
        parent: FileHandle,
        name: String,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<DirOpResult> {
        self.call(FunctionCode::Lookup as u32, &DirOpArgs { parent, name }, interrupt)
    }

    pub fn link(
        &self,
        target: FileHandle,
        new_parent: FileHandle,
        new_name: String,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<()> {
        self.call(
            FunctionCode::Link as u32,
            &link::Args {
                target,
                new_parent,
                new_name,
            },
            interrupt,
        )
    }

    pub fn unlink(
        &self,
        parent: FileHandle,
        name: String,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<()> {
        self.call(FunctionCode::Unlink as u32, &DirOpArgs { parent, name }, interrupt)
    }

    pub fn symlink(
        &self,
        parent: FileHandle,
        name: String,
        target: String,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<DirOpResult> {
        self.call(
            FunctionCode::Symlink as u32,
            &symlink::Args { parent, name, target },
            interrupt,
        )
    }

    pub fn mkdir(
        &self,
        parent: FileHandle,
        name: String,
        mode: u32,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<DirOpResult> {
        self.call(FunctionCode::Mkdir as u32, &mkdir::Args { parent, name, mode }, interrupt)
    }

    pub fn rmdir(
        &self,
        parent: FileHandle,
        name: String,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<()> {
        self.call(FunctionCode::Rmdir as u32, &DirOpArgs { parent, name }, interrupt)
    }

    pub fn mknod(
        &self,
        parent: FileHandle,
        name: String,
        mode: u32,
        rdev: u32,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<DirOpResult> {
        self.call(
            FunctionCode::Mknod as u32,
            &mknod::Args { parent, name, mode, rdev },
            interrupt,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rename(
        &self,
        from_parent: FileHandle,
        from_name: String,
        to_parent: FileHandle,
        to_name: String,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<()> {
        self.call(
            FunctionCode::Rename as u32,
            &rename::Args {
                from_parent,
                from_name,
                to_parent,
                to_name,
            },
            interrupt,
        )
    }

    pub fn readlink(&self, handle: FileHandle, interrupt: &zlomek_channel::Interrupt) -> Result<String> {
        self.call(FunctionCode::Readlink as u32, &readlink::Args { handle }, interrupt)
    }

    pub fn open(&self, handle: FileHandle, flags: u32, interrupt: &zlomek_channel::Interrupt) -> Result<Capability> {
        self.call(FunctionCode::Open as u32, &open::Args { handle, flags }, interrupt)
    }

    pub fn close(&self, cap: Capability, interrupt: &zlomek_channel::Interrupt) -> Result<()> {
        self.call(FunctionCode::Close as u32, &close::Args { cap }, interrupt)
    }

    pub fn readdir(
        &self,
        handle: FileHandle,
        cookie: u64,
        count: u32,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<readdir::Result> {
        self.call(
            FunctionCode::Readdir as u32,
            &readdir::Args { handle, cookie, count },
            interrupt,
        )
    }

    pub fn read(
        &self,
        cap: Capability,
        offset: u64,
        length: u32,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<Vec<u8>> {
        self.call(FunctionCode::Read as u32, &read::Args { cap, offset, length }, interrupt)
    }

    pub fn write(
        &self,
        cap: Capability,
        offset: u64,
        data: Vec<u8>,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<u32> {
        self.call(FunctionCode::Write as u32, &write::Args { cap, offset, data }, interrupt)
    }

    pub fn readpage(
        &self,
        cap: Capability,
        offset: u64,
        length: u32,
        interrupt: &zlomek_channel::Interrupt,
    ) -> Result<Vec<u8>> {
        self.call(
            FunctionCode::Readpage as u32,
            &readpage::Args { cap, offset, length },
            interrupt,
        )
    }
}
