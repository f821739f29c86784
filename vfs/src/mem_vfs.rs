//! In-memory file system
//!
//! Useful for testing and for volatile storage during development. Files are
//! flat byte vectors keyed by path; there are no directories.

use core_types::{AccessMode, OpenFlags};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{IoRequest, Vfs, VfsError, Vnode};

/// Largest size a file may grow to; writes ending beyond it fail with `Io`
pub const MAX_FILE_SIZE: usize = 1 << 30;

#[derive(Debug, Default)]
struct MemFile {
    data: Vec<u8>,
    read_only: bool,
}

#[derive(Debug)]
struct OpenHandle {
    path: String,
    access: AccessMode,
}

#[derive(Debug, Default)]
struct MemVfsState {
    files: HashMap<String, MemFile>,
    handles: HashMap<u64, OpenHandle>,
    next_handle: u64,
    opened: usize,
    closed: usize,
}

/// RAM-backed file system
///
/// Tracks every handle it gives out so tests can check that each one is
/// closed exactly once.
#[derive(Debug, Default)]
pub struct MemVfs {
    state: Mutex<MemVfsState>,
}

impl MemVfs {
    /// Creates an empty file system
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given contents
    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.insert_file(path, contents);
        self
    }

    /// Creates or replaces a writable file
    pub fn insert_file(&self, path: &str, contents: &[u8]) {
        self.insert(path, contents, false);
    }

    /// Creates or replaces a file that refuses write access
    pub fn insert_read_only(&self, path: &str, contents: &[u8]) {
        self.insert(path, contents, true);
    }

    fn insert(&self, path: &str, contents: &[u8], read_only: bool) {
        self.lock().files.insert(
            path.to_string(),
            MemFile {
                data: contents.to_vec(),
                read_only,
            },
        );
    }

    /// Returns a copy of a file's contents
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).map(|file| file.data.clone())
    }

    /// Whether a file exists at `path`
    pub fn exists(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.lock().handles.len()
    }

    /// Total handles ever opened
    pub fn opened_count(&self) -> usize {
        self.lock().opened
    }

    /// Total handles ever closed
    pub fn closed_count(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MemVfsState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Vfs for MemVfs {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Vnode, VfsError> {
        if path.is_empty() {
            return Err(VfsError::InvalidArgument);
        }
        let access = flags.access_mode().ok_or(VfsError::InvalidArgument)?;

        let mut guard = self.lock();
        let state = &mut *guard;
        match state.files.get_mut(path) {
            Some(_) if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) => {
                return Err(VfsError::AlreadyExists);
            }
            Some(file) => {
                if file.read_only && access.writable() {
                    return Err(VfsError::PermissionDenied);
                }
                if flags.contains(OpenFlags::TRUNC) && access.writable() {
                    file.data.clear();
                }
            }
            None if flags.contains(OpenFlags::CREAT) => {
                log::debug!("memvfs: creating {} (mode {:o})", path, mode);
                state.files.insert(
                    path.to_string(),
                    MemFile {
                        data: Vec::new(),
                        read_only: mode & 0o200 == 0,
                    },
                );
            }
            None => return Err(VfsError::NotFound),
        }

        let id = state.next_handle;
        state.next_handle += 1;
        state.opened += 1;
        state.handles.insert(
            id,
            OpenHandle {
                path: path.to_string(),
                access,
            },
        );
        Ok(Vnode::new(id))
    }

    fn transfer(
        &self,
        vnode: &Vnode,
        offset: u64,
        request: IoRequest<'_>,
    ) -> Result<u64, VfsError> {
        let mut state = self.lock();
        let state = &mut *state;
        let handle = state.handles.get(&vnode.id()).ok_or(VfsError::Io)?;
        let file = state.files.get_mut(&handle.path).ok_or(VfsError::Io)?;
        let start = usize::try_from(offset).map_err(|_| VfsError::Io)?;

        match request {
            IoRequest::Read(buf) => {
                if !handle.access.readable() {
                    return Err(VfsError::Io);
                }
                if start >= file.data.len() {
                    return Ok(offset);
                }
                let n = buf.len().min(file.data.len() - start);
                buf[..n].copy_from_slice(&file.data[start..start + n]);
                Ok(offset + n as u64)
            }
            IoRequest::Write(buf) => {
                if !handle.access.writable() {
                    return Err(VfsError::Io);
                }
                let end = start
                    .checked_add(buf.len())
                    .filter(|end| *end <= MAX_FILE_SIZE)
                    .ok_or(VfsError::Io)?;
                if file.data.len() < end {
                    file.data
                        .try_reserve_exact(end - file.data.len())
                        .map_err(|_| VfsError::Io)?;
                    file.data.resize(end, 0);
                }
                file.data[start..end].copy_from_slice(buf);
                Ok(end as u64)
            }
        }
    }

    fn size(&self, vnode: &Vnode) -> Result<u64, VfsError> {
        let state = self.lock();
        let handle = state.handles.get(&vnode.id()).ok_or(VfsError::Io)?;
        let file = state.files.get(&handle.path).ok_or(VfsError::Io)?;
        Ok(file.data.len() as u64)
    }

    fn close(&self, vnode: Vnode) {
        let mut state = self.lock();
        if state.handles.remove(&vnode.id()).is_some() {
            state.closed += 1;
        } else {
            log::warn!("memvfs: close of unknown {}", vnode);
        }
    }
}
