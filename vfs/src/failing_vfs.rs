//! # Failing VFS
//!
//! A `Vfs` wrapper that can simulate failures for testing error paths.
//! Useful for checking that offsets, handles and buffers survive a failed
//! transfer without needing a real faulty disk.

use core_types::OpenFlags;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{IoRequest, Vfs, VfsError, Vnode};

/// Policy for when failures should occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Never fail (passthrough)
    Never,
    /// Fail every transfer after N successful ones
    AfterTransfers(usize),
    /// Fail every write after N successful writes; reads pass through
    AfterWrites(usize),
    /// Fail transfers on handles opened at these paths
    OnPaths(Vec<String>),
    /// Fail opening these paths
    OpenOnPaths(Vec<String>),
}

#[derive(Debug)]
struct FailureState {
    policy: FailurePolicy,
    transfer_count: usize,
    write_count: usize,
    paths: HashMap<u64, String>,
}

/// Wrapper around a `Vfs` that can simulate failures
pub struct FailingVfs<V: Vfs> {
    inner: V,
    state: Mutex<FailureState>,
}

impl<V: Vfs> FailingVfs<V> {
    /// Create a new failing file system with the given policy
    pub fn new(inner: V, policy: FailurePolicy) -> Self {
        Self {
            inner,
            state: Mutex::new(FailureState {
                policy,
                transfer_count: 0,
                write_count: 0,
                paths: HashMap::new(),
            }),
        }
    }

    /// Get the underlying file system (for inspection)
    pub fn inner(&self) -> &V {
        &self.inner
    }

    /// Number of transfers that have been passed through
    pub fn transfer_count(&self) -> usize {
        self.lock().transfer_count
    }

    /// Reset the failure policy
    pub fn set_policy(&self, policy: FailurePolicy) {
        let mut state = self.lock();
        state.policy = policy;
        state.transfer_count = 0;
        state.write_count = 0;
    }

    fn lock(&self) -> MutexGuard<'_, FailureState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FailureState {
    /// Check if a transfer should fail based on policy
    fn should_fail(&self, vnode: &Vnode, is_write: bool) -> bool {
        match &self.policy {
            FailurePolicy::Never | FailurePolicy::OpenOnPaths(_) => false,
            FailurePolicy::AfterTransfers(n) => self.transfer_count >= *n,
            FailurePolicy::AfterWrites(n) => is_write && self.write_count >= *n,
            FailurePolicy::OnPaths(paths) => self
                .paths
                .get(&vnode.id())
                .is_some_and(|path| paths.contains(path)),
        }
    }
}

impl<V: Vfs> Vfs for FailingVfs<V> {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Vnode, VfsError> {
        if let FailurePolicy::OpenOnPaths(paths) = &self.lock().policy {
            if paths.iter().any(|p| p == path) {
                log::debug!("failing vfs: injected open failure on {}", path);
                return Err(VfsError::Io);
            }
        }

        let vnode = self.inner.open(path, flags, mode)?;
        self.lock().paths.insert(vnode.id(), path.to_string());
        Ok(vnode)
    }

    fn transfer(
        &self,
        vnode: &Vnode,
        offset: u64,
        request: IoRequest<'_>,
    ) -> Result<u64, VfsError> {
        let is_write = request.is_write();
        {
            let mut state = self.lock();
            if state.should_fail(vnode, is_write) {
                log::debug!("failing vfs: injected transfer failure on {}", vnode);
                return Err(VfsError::Io);
            }
            state.transfer_count += 1;
            if is_write {
                state.write_count += 1;
            }
        }
        self.inner.transfer(vnode, offset, request)
    }

    fn size(&self, vnode: &Vnode) -> Result<u64, VfsError> {
        self.inner.size(vnode)
    }

    fn close(&self, vnode: Vnode) {
        self.lock().paths.remove(&vnode.id());
        self.inner.close(vnode)
    }
}
