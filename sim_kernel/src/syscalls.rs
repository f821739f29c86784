//! File syscall handlers
//!
//! Every handler is a straight line of `?` steps. Descriptor-table locks
//! are dropped at the end of the statement that takes them; the open
//! file's own lock is taken inside [`OpenFile`] for the transfer; scratch
//! buffers and borrows are guards. An early return therefore releases
//! everything a handler acquired.

use crate::meld;
use crate::open_file::OpenFile;
use crate::process::Process;
use crate::SimulatedKernel;
use core_types::{Descriptor, OpenFlags, Whence};
use kernel_api::{FileError, FileSyscalls, UserMemory, UserPtr};
use std::sync::Arc;

/// Converts a raw descriptor argument
fn descriptor(fd: i32) -> Result<Descriptor, FileError> {
    Descriptor::from_raw(fd).ok_or(FileError::BadDescriptor)
}

/// Borrows the open file behind a raw descriptor
fn lookup(process: &Process, fd: i32) -> Result<(Descriptor, Arc<OpenFile>), FileError> {
    let fd = descriptor(fd)?;
    let file = process.table().get(fd)?;
    Ok((fd, file))
}

impl FileSyscalls for SimulatedKernel {
    type Process = Process;

    fn open(
        &self,
        process: &Process,
        path: UserPtr,
        flags: i32,
        mode: u32,
    ) -> Result<Descriptor, FileError> {
        let Some(flags) = OpenFlags::parse(flags) else {
            log::warn!("open: illegal flags {:#x} from {}", flags, process.pid());
            return Err(FileError::InvalidArgument);
        };
        if path.is_null() {
            log::warn!("open: null path from {}", process.pid());
            return Err(FileError::InvalidArgument);
        }
        let path = process.memory().copy_in_str(path, self.config().path_max)?;
        log::debug!("open({:?}, {:?}, {:o}) from {}", path, flags, mode, process.pid());

        let file = OpenFile::open(Arc::clone(self.vfs()), &path, flags, mode)?;
        let placed = process.table().place(file);
        let fd = placed.map_err(|(error, rejected)| {
            drop(rejected);
            error
        })?;
        log::debug!("open({:?}) -> {}", path, fd);
        Ok(fd)
    }

    fn read(
        &self,
        process: &Process,
        fd: i32,
        buf: UserPtr,
        size: usize,
    ) -> Result<usize, FileError> {
        let (fd, file) = lookup(process, fd)?;
        log::debug!("read({}, {}, {}) from {}", fd, buf, size, process.pid());
        if !file.access().readable() {
            return Err(FileError::BadDescriptor);
        }

        let mut scratch = self.scratch().acquire(size)?;
        let moved = file.read_with(&mut scratch, |bytes| {
            process.memory().copy_out(bytes, buf)
        })?;

        process.table().put(fd, file);
        Ok(moved)
    }

    fn write(
        &self,
        process: &Process,
        fd: i32,
        buf: UserPtr,
        size: usize,
    ) -> Result<usize, FileError> {
        let (fd, file) = lookup(process, fd)?;
        log::debug!("write({}, {}, {}) from {}", fd, buf, size, process.pid());

        let mut scratch = self.scratch().acquire(size)?;
        process.memory().copy_in(buf, &mut scratch)?;
        let moved = file.write(&scratch)?;

        process.table().put(fd, file);
        Ok(moved)
    }

    fn close(&self, process: &Process, fd: i32) -> Result<(), FileError> {
        let fd = descriptor(fd)?;
        let file = process.table().take(fd)?;
        log::debug!(
            "close({}) from {}: {} references before",
            fd,
            process.pid(),
            file.refcount()
        );
        drop(file);
        Ok(())
    }

    fn lseek(
        &self,
        process: &Process,
        fd: i32,
        pos: i64,
        whence: i32,
    ) -> Result<u64, FileError> {
        let (fd, file) = lookup(process, fd)?;
        let whence = Whence::from_raw(whence).ok_or(FileError::InvalidArgument)?;
        log::debug!("lseek({}, {}, {:?}) from {}", fd, pos, whence, process.pid());

        let offset = file.seek(pos, whence)?;
        process.table().put(fd, file);
        Ok(offset)
    }

    fn dup2(&self, process: &Process, old: i32, new: i32) -> Result<Descriptor, FileError> {
        let old = descriptor(old)?;
        let new = descriptor(new)?;
        log::debug!("dup2({}, {}) from {}", old, new, process.pid());

        let displaced = process.table().duplicate_into(old, new)?;
        drop(displaced);
        Ok(new)
    }

    fn meld(
        &self,
        process: &Process,
        path1: UserPtr,
        path2: UserPtr,
        merged_path: UserPtr,
    ) -> Result<u64, FileError> {
        meld::meld(self, process, path1, path2, merged_path)
    }
}
