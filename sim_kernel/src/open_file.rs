//! Shared open-file objects
//!
//! An [`OpenFile`] is what a descriptor slot points at: one VFS handle, the
//! access mode it was opened with, and the byte offset every holder shares.
//! Descriptors duplicated by `dup2` or inherited through fork refer to the
//! same object and therefore move the same offset.
//!
//! The reference count lives next to the offset under one mutex. A
//! [`FileRef`] is one counted reference: [`FileRef::share`] is the only way
//! to add one and dropping a `FileRef` is the only way to remove one. The
//! drop that takes the count to zero takes the handle out under the mutex
//! and gives it back to the VFS, so the handle is closed exactly once and
//! never while a transfer on the same object is still running.

use core_types::{AccessMode, OpenFileId, OpenFlags, Whence};
use kernel_api::FileError;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use vfs::{IoRequest, Vfs, Vnode};

/// Mutable part of an open file, guarded by the object's mutex
#[derive(Debug)]
struct OpenFileState {
    /// `None` once the last reference has been dropped
    vnode: Option<Vnode>,
    offset: u64,
    refcount: usize,
}

/// One open file, shared by every descriptor that refers to it
pub struct OpenFile {
    id: OpenFileId,
    access: AccessMode,
    append: bool,
    vfs: Arc<dyn Vfs>,
    state: Mutex<OpenFileState>,
}

impl OpenFile {
    /// Opens `path` through the VFS
    ///
    /// Returns the first counted reference. Flags that name no access mode
    /// are rejected before the VFS is consulted.
    pub fn open(
        vfs: Arc<dyn Vfs>,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<FileRef, FileError> {
        let access = flags.access_mode().ok_or(FileError::InvalidArgument)?;
        let vnode = vfs.open(path, flags, mode)?;

        let file = OpenFile {
            id: OpenFileId::new(),
            access,
            append: flags.contains(OpenFlags::APPEND),
            vfs,
            state: Mutex::new(OpenFileState {
                vnode: Some(vnode),
                offset: 0,
                refcount: 1,
            }),
        };
        log::trace!("{} opened {} ({:?})", file.id, path, access);
        Ok(FileRef(Arc::new(file)))
    }

    pub fn id(&self) -> OpenFileId {
        self.id
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    /// Current offset
    pub fn offset(&self) -> u64 {
        self.lock().offset
    }

    /// Number of counted references
    pub fn refcount(&self) -> usize {
        self.lock().refcount
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.lock().vnode.is_none()
    }

    /// Reads at the current offset into `buf`
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, FileError> {
        self.read_with(buf, |_| Ok(()))
    }

    /// Reads at the current offset and hands the bytes to `deliver`
    ///
    /// The offset only advances when both the transfer and `deliver`
    /// succeed; both run under the offset lock. Returns the number of bytes
    /// moved, 0 at end of file. Write-only files fail with `BadDescriptor`.
    pub fn read_with<F>(&self, buf: &mut [u8], deliver: F) -> Result<usize, FileError>
    where
        F: FnOnce(&[u8]) -> Result<(), FileError>,
    {
        if !self.access.readable() {
            return Err(FileError::BadDescriptor);
        }

        let mut state = self.lock();
        let vnode = state.vnode.as_ref().ok_or(FileError::BadDescriptor)?;
        let start = state.offset;
        let end = self.vfs.transfer(vnode, start, IoRequest::Read(&mut *buf))?;
        let moved = transferred(start, end, buf.len())?;

        deliver(&buf[..moved])?;
        state.offset = end;
        log::trace!("{} read {} bytes, offset {} -> {}", self.id, moved, start, end);
        Ok(moved)
    }

    /// Writes `buf` at the current offset, or at end of file in append mode
    ///
    /// Access is checked by the VFS: writing through a read-only open is
    /// refused there and surfaces as `Io`.
    pub fn write(&self, buf: &[u8]) -> Result<usize, FileError> {
        let mut state = self.lock();
        let vnode = state.vnode.as_ref().ok_or(FileError::BadDescriptor)?;
        let start = if self.append {
            self.vfs.size(vnode)?
        } else {
            state.offset
        };
        let end = self.vfs.transfer(vnode, start, IoRequest::Write(buf))?;
        let moved = transferred(start, end, buf.len())?;

        state.offset = end;
        log::trace!("{} wrote {} bytes, offset {} -> {}", self.id, moved, start, end);
        Ok(moved)
    }

    /// Moves the offset and returns its new value
    ///
    /// A result before the start of the file is `InvalidArgument`; seeking
    /// past the end is allowed.
    pub fn seek(&self, pos: i64, whence: Whence) -> Result<u64, FileError> {
        let mut state = self.lock();
        let vnode = state.vnode.as_ref().ok_or(FileError::BadDescriptor)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => state.offset,
            Whence::End => self.vfs.size(vnode)?,
        };
        let base = i64::try_from(base).map_err(|_| FileError::InvalidArgument)?;
        let target = base
            .checked_add(pos)
            .and_then(|target| u64::try_from(target).ok())
            .ok_or(FileError::InvalidArgument)?;

        log::trace!("{} seek {:?}{:+} -> {}", self.id, whence, pos, target);
        state.offset = target;
        Ok(target)
    }

    fn lock(&self) -> MutexGuard<'_, OpenFileState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bytes moved by a transfer that started at `start` and ended at `end`
fn transferred(start: u64, end: u64, requested: usize) -> Result<usize, FileError> {
    end.checked_sub(start)
        .and_then(|moved| usize::try_from(moved).ok())
        .filter(|moved| *moved <= requested)
        .ok_or(FileError::Io)
}

impl fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFile")
            .field("id", &self.id)
            .field("access", &self.access)
            .field("append", &self.append)
            .field("state", &*self.lock())
            .finish()
    }
}

/// One counted reference to an [`OpenFile`]
///
/// Descriptor slots hold `FileRef`s; so does meld for its private files.
/// Transient borrows for the length of one syscall are plain
/// `Arc<OpenFile>` clones obtained through [`FileRef::file`] and do not
/// count.
#[derive(Debug)]
pub struct FileRef(Arc<OpenFile>);

impl FileRef {
    /// Adds a counted reference to the same open file
    pub fn share(&self) -> FileRef {
        self.0.lock().refcount += 1;
        FileRef(Arc::clone(&self.0))
    }

    /// Returns an uncounted borrow of the open file
    pub fn file(&self) -> Arc<OpenFile> {
        Arc::clone(&self.0)
    }
}

impl Deref for FileRef {
    type Target = OpenFile;

    fn deref(&self) -> &OpenFile {
        &self.0
    }
}

impl Drop for FileRef {
    fn drop(&mut self) {
        let released = {
            let mut state = self.0.lock();
            state.refcount = state.refcount.saturating_sub(1);
            if state.refcount == 0 {
                state.vnode.take()
            } else {
                None
            }
        };

        if let Some(vnode) = released {
            log::trace!("{} released {}", self.0.id, vnode);
            self.0.vfs.close(vnode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::MemVfs;

    fn mem_vfs(files: &[(&str, &[u8])]) -> Arc<MemVfs> {
        let vfs = MemVfs::new();
        for (path, contents) in files {
            vfs.insert_file(path, contents);
        }
        Arc::new(vfs)
    }

    fn open(vfs: &Arc<MemVfs>, path: &str, flags: OpenFlags) -> FileRef {
        let vfs: Arc<dyn Vfs> = vfs.clone();
        OpenFile::open(vfs, path, flags, 0o664).unwrap()
    }

    #[test]
    fn test_open_starts_with_one_reference() {
        let vfs = mem_vfs(&[("a", b"abc")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);
        assert_eq!(file.refcount(), 1);
        assert_eq!(file.offset(), 0);
        assert_eq!(file.access(), AccessMode::ReadOnly);
        assert!(!file.is_append());
    }

    #[test]
    fn test_open_rejects_missing_access_mode() {
        let vfs: Arc<dyn Vfs> = mem_vfs(&[("a", b"")]);
        let flags = OpenFlags::from_bits_retain(3);
        assert_eq!(
            OpenFile::open(vfs, "a", flags, 0).unwrap_err(),
            FileError::InvalidArgument
        );
    }

    #[test]
    fn test_open_propagates_vfs_errors() {
        let vfs: Arc<dyn Vfs> = mem_vfs(&[]);
        assert_eq!(
            OpenFile::open(vfs, "missing", OpenFlags::RDONLY, 0).unwrap_err(),
            FileError::NotFound
        );
    }

    #[test]
    fn test_sequential_reads_advance_offset() {
        let vfs = mem_vfs(&[("a", b"abcdef")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);
        let mut buf = [0u8; 4];

        assert_eq!(file.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(file.offset(), 4);

        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(file.offset(), 6);

        assert_eq!(file.read(&mut buf).unwrap(), 0);
        assert_eq!(file.offset(), 6);
    }

    #[test]
    fn test_failed_delivery_keeps_offset() {
        let vfs = mem_vfs(&[("a", b"abcdef")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);
        let mut buf = [0u8; 4];

        let result = file.read_with(&mut buf, |_| Err(FileError::BadAddress));
        assert_eq!(result, Err(FileError::BadAddress));
        assert_eq!(file.offset(), 0);
    }

    #[test]
    fn test_read_on_write_only_file() {
        let vfs = mem_vfs(&[("a", b"abc")]);
        let file = open(&vfs, "a", OpenFlags::WRONLY);
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), Err(FileError::BadDescriptor));
    }

    #[test]
    fn test_write_on_read_only_file_is_io_error() {
        let vfs = mem_vfs(&[("a", b"abc")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);
        assert_eq!(file.write(b"x"), Err(FileError::Io));
        assert_eq!(file.offset(), 0);
    }

    #[test]
    fn test_writes_concatenate() {
        let vfs = mem_vfs(&[]);
        let file = open(&vfs, "out", OpenFlags::WRONLY | OpenFlags::CREAT);
        assert_eq!(file.write(b"hello ").unwrap(), 6);
        assert_eq!(file.write(b"world").unwrap(), 5);
        assert_eq!(file.offset(), 11);
        drop(file);
        assert_eq!(vfs.contents("out").unwrap(), b"hello world");
    }

    #[test]
    fn test_append_writes_at_end() {
        let vfs = mem_vfs(&[("log", b"one\n")]);
        let file = open(&vfs, "log", OpenFlags::WRONLY | OpenFlags::APPEND);
        assert!(file.is_append());
        file.write(b"two\n").unwrap();
        assert_eq!(file.offset(), 8);
        drop(file);
        assert_eq!(vfs.contents("log").unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn test_seek() {
        let vfs = mem_vfs(&[("a", b"0123456789")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);

        assert_eq!(file.seek(4, Whence::Set).unwrap(), 4);
        assert_eq!(file.seek(2, Whence::Current).unwrap(), 6);
        assert_eq!(file.seek(-3, Whence::End).unwrap(), 7);
        assert_eq!(file.seek(5, Whence::End).unwrap(), 15);

        let mut buf = [0u8; 2];
        file.seek(8, Whence::Set).unwrap();
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, b"89");
    }

    #[test]
    fn test_seek_before_start_is_rejected() {
        let vfs = mem_vfs(&[("a", b"abc")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);
        file.seek(2, Whence::Set).unwrap();
        assert_eq!(file.seek(-3, Whence::Current), Err(FileError::InvalidArgument));
        assert_eq!(file.seek(-4, Whence::End), Err(FileError::InvalidArgument));
        assert_eq!(file.offset(), 2);
    }

    #[test]
    fn test_share_and_drop_count_references() {
        let vfs = mem_vfs(&[("a", b"abc")]);
        let first = open(&vfs, "a", OpenFlags::RDONLY);
        let second = first.share();
        assert_eq!(first.refcount(), 2);
        assert_eq!(first.id(), second.id());

        drop(first);
        assert_eq!(second.refcount(), 1);
        assert_eq!(vfs.open_handles(), 1);

        drop(second);
        assert_eq!(vfs.open_handles(), 0);
        assert_eq!(vfs.closed_count(), 1);
    }

    #[test]
    fn test_borrows_do_not_count() {
        let vfs = mem_vfs(&[("a", b"abc")]);
        let file = open(&vfs, "a", OpenFlags::RDONLY);
        let borrow = file.file();
        assert_eq!(file.refcount(), 1);

        drop(file);
        assert!(borrow.is_released());
        assert_eq!(vfs.closed_count(), 1);

        let mut buf = [0u8; 1];
        assert_eq!(borrow.read(&mut buf), Err(FileError::BadDescriptor));
        assert_eq!(borrow.write(b"x"), Err(FileError::BadDescriptor));
        assert_eq!(borrow.seek(0, Whence::Set), Err(FileError::BadDescriptor));
    }

    #[test]
    fn test_shared_offset_moves_for_every_holder() {
        let vfs = mem_vfs(&[("a", b"abcdef")]);
        let first = open(&vfs, "a", OpenFlags::RDONLY);
        let second = first.share();
        let mut buf = [0u8; 3];

        first.read(&mut buf).unwrap();
        second.read(&mut buf).unwrap();
        assert_eq!(&buf, b"def");
        assert_eq!(first.offset(), 6);
    }
}
