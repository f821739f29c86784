//! Kernel scratch buffers
//!
//! Every read and write stages its bytes in a kernel buffer. Buffers are
//! guards: dropping one, on any path out of a handler, returns it to the
//! pool's outstanding count.

use kernel_api::FileError;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of scratch buffers with a per-buffer size limit
#[derive(Debug)]
pub struct ScratchPool {
    limit: usize,
    outstanding: AtomicUsize,
}

impl ScratchPool {
    /// Creates a pool that refuses buffers larger than `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Number of buffers currently handed out
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Allocates a zeroed buffer of `size` bytes
    ///
    /// Fails with `NoMemory` above the pool limit or when the allocation
    /// itself fails.
    pub fn acquire(&self, size: usize) -> Result<ScratchBuffer<'_>, FileError> {
        if size > self.limit {
            log::warn!("scratch request of {} bytes over limit {}", size, self.limit);
            return Err(FileError::NoMemory);
        }
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| FileError::NoMemory)?;
        data.resize(size, 0);

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(ScratchBuffer { data, pool: self })
    }
}

/// A buffer on loan from a [`ScratchPool`]
#[derive(Debug)]
pub struct ScratchBuffer<'a> {
    data: Vec<u8>,
    pool: &'a ScratchPool,
}

impl Deref for ScratchBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for ScratchBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let pool = ScratchPool::new(64);
        {
            let buf = pool.acquire(16).unwrap();
            assert_eq!(buf.len(), 16);
            assert!(buf.iter().all(|b| *b == 0));
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_over_limit() {
        let pool = ScratchPool::new(8);
        assert_eq!(pool.acquire(9).unwrap_err(), FileError::NoMemory);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_zero_size_buffer() {
        let pool = ScratchPool::new(8);
        let buf = pool.acquire(0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_buffer_is_writable() {
        let pool = ScratchPool::new(8);
        let mut buf = pool.acquire(4).unwrap();
        buf.copy_from_slice(b"abcd");
        assert_eq!(&buf[..], b"abcd");
    }
}
