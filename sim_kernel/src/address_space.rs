//! Simulated user address spaces
//!
//! A process's user memory is a set of mapped regions. Anything outside a
//! region faults, so tests can hand the kernel bad pointers and watch the
//! copy primitives report `BadAddress`.

use kernel_api::{FileError, UserMemory, UserPtr};
use std::sync::{Mutex, MutexGuard};

/// First address handed out by [`UserAddressSpace::map`]
pub const USER_BASE: u64 = 0x0040_0000;

/// Unmapped gap left after every region
const GUARD_GAP: u64 = 0x1000;

#[derive(Debug, Clone)]
struct Region {
    base: u64,
    data: Vec<u8>,
}

impl Region {
    fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }
}

#[derive(Debug, Clone)]
struct SpaceState {
    regions: Vec<Region>,
    next_base: u64,
}

/// User memory of one simulated process
#[derive(Debug)]
pub struct UserAddressSpace {
    state: Mutex<SpaceState>,
}

impl UserAddressSpace {
    /// Creates an address space with nothing mapped
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SpaceState {
                regions: Vec::new(),
                next_base: USER_BASE,
            }),
        }
    }

    /// Maps `len` zeroed bytes and returns their address
    ///
    /// Regions never touch: an unmapped gap follows each one.
    pub fn map(&self, len: usize) -> UserPtr {
        self.map_data(vec![0; len])
    }

    /// Maps a copy of `bytes`
    pub fn map_bytes(&self, bytes: &[u8]) -> UserPtr {
        self.map_data(bytes.to_vec())
    }

    /// Maps `s` followed by a NUL terminator
    pub fn map_str(&self, s: &str) -> UserPtr {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.map_bytes(&bytes)
    }

    /// Reads `len` bytes at `ptr`
    pub fn read(&self, ptr: UserPtr, len: usize) -> Result<Vec<u8>, FileError> {
        let mut buf = vec![0; len];
        self.copy_in(ptr, &mut buf)?;
        Ok(buf)
    }

    /// Number of mapped regions
    pub fn region_count(&self) -> usize {
        self.lock().regions.len()
    }

    /// Creates an independent copy of every mapping, for fork
    pub fn duplicate(&self) -> Self {
        Self {
            state: Mutex::new(self.lock().clone()),
        }
    }

    fn map_data(&self, data: Vec<u8>) -> UserPtr {
        let mut state = self.lock();
        let base = state.next_base;
        state.next_base = base + data.len() as u64 + GUARD_GAP;
        state.regions.push(Region { base, data });
        UserPtr::new(base)
    }

    /// Runs `f` on the mapped bytes `[ptr, ptr + len)`
    ///
    /// The whole range must lie inside one region.
    fn with_range<R>(
        &self,
        ptr: UserPtr,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, FileError> {
        let end = ptr.offset(len as u64)?.addr();
        let mut state = self.lock();
        let region = state
            .regions
            .iter_mut()
            .find(|region| {
                region.contains(ptr.addr()) || (len == 0 && region.end() == ptr.addr())
            })
            .ok_or(FileError::BadAddress)?;
        if end > region.end() {
            return Err(FileError::BadAddress);
        }
        let start = (ptr.addr() - region.base) as usize;
        Ok(f(&mut region.data[start..start + len]))
    }

    fn lock(&self) -> MutexGuard<'_, SpaceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for UserAddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl UserMemory for UserAddressSpace {
    fn copy_in_str(&self, ptr: UserPtr, max: usize) -> Result<String, FileError> {
        let state = self.lock();
        let region = state
            .regions
            .iter()
            .find(|region| region.contains(ptr.addr()))
            .ok_or(FileError::BadAddress)?;
        let start = (ptr.addr() - region.base) as usize;
        let available = &region.data[start..];

        for (i, byte) in available.iter().take(max).enumerate() {
            if *byte == 0 {
                return String::from_utf8(available[..i].to_vec())
                    .map_err(|_| FileError::InvalidArgument);
            }
        }
        if available.len() < max {
            // Ran off the end of the mapping before the limit.
            Err(FileError::BadAddress)
        } else {
            Err(FileError::NameTooLong)
        }
    }

    fn copy_in(&self, ptr: UserPtr, dst: &mut [u8]) -> Result<(), FileError> {
        self.with_range(ptr, dst.len(), |range| dst.copy_from_slice(range))
    }

    fn copy_out(&self, src: &[u8], ptr: UserPtr) -> Result<(), FileError> {
        self.with_range(ptr, src.len(), |range| range.copy_from_slice(src))
    }
}
