//! Virtual file system abstraction
//!
//! Provides the minimal vnode API the file-descriptor layer needs: resolve a
//! path to a handle, move bytes at an explicit offset, query the size, and
//! release the handle. Offsets live in the open-file layer, never here.

use core_types::OpenFlags;
use std::fmt;
use std::sync::Arc;

use crate::VfsError;

/// Handle to an open file inside a file system
///
/// Not `Clone`: whoever holds the `Vnode` owns the handle, and giving it
/// back to [`Vfs::close`] consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Vnode {
    id: u64,
}

impl Vnode {
    /// Creates a handle with a file-system-assigned id
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Returns the file-system-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Vnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vnode#{}", self.id)
    }
}

/// Direction and buffer of a single transfer
#[derive(Debug)]
pub enum IoRequest<'a> {
    /// Fill the buffer from the file
    Read(&'a mut [u8]),
    /// Store the buffer into the file
    Write(&'a [u8]),
}

impl IoRequest<'_> {
    /// Number of bytes requested
    pub fn len(&self) -> usize {
        match self {
            IoRequest::Read(buf) => buf.len(),
            IoRequest::Write(buf) => buf.len(),
        }
    }

    /// Whether the request moves no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this request writes to the file
    pub fn is_write(&self) -> bool {
        matches!(self, IoRequest::Write(_))
    }
}

/// File system trait
///
/// Implementers resolve paths to [`Vnode`] handles and move bytes at
/// caller-supplied offsets. All methods take `&self`: a file system is
/// shared by every process and must serialize its own state.
pub trait Vfs: Send + Sync {
    /// Resolve `path` and open it
    ///
    /// # Arguments
    /// * `path` - Path to open
    /// * `flags` - Validated open flags (access mode, create, exclusive, truncate)
    /// * `mode` - Permission bits for a newly created file
    ///
    /// # Errors
    /// Returns `VfsError::NotFound` if the path does not exist and `CREAT` is absent
    /// Returns `VfsError::AlreadyExists` for `CREAT | EXCL` on an existing file
    /// Returns `VfsError::PermissionDenied` if the file forbids the access mode
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Vnode, VfsError>;

    /// Move bytes between `request`'s buffer and the file at `offset`
    ///
    /// Returns the offset just past the last byte moved. A read at or past
    /// end of file moves nothing and returns `offset` unchanged.
    ///
    /// # Errors
    /// Returns `VfsError::Io` on failure, or when the handle was not opened
    /// for the requested direction
    fn transfer(&self, vnode: &Vnode, offset: u64, request: IoRequest<'_>)
        -> Result<u64, VfsError>;

    /// Current size of the file in bytes
    fn size(&self, vnode: &Vnode) -> Result<u64, VfsError>;

    /// Release the handle
    ///
    /// Never fails observably.
    fn close(&self, vnode: Vnode);
}

impl<V: Vfs + ?Sized> Vfs for Arc<V> {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Vnode, VfsError> {
        (**self).open(path, flags, mode)
    }

    fn transfer(
        &self,
        vnode: &Vnode,
        offset: u64,
        request: IoRequest<'_>,
    ) -> Result<u64, VfsError> {
        (**self).transfer(vnode, offset, request)
    }

    fn size(&self, vnode: &Vnode) -> Result<u64, VfsError> {
        (**self).size(vnode)
    }

    fn close(&self, vnode: Vnode) {
        (**self).close(vnode)
    }
}
