//! User-space pointers and the copy-in / copy-out boundary

use crate::FileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An address in a process's user address space
///
/// The kernel never dereferences a `UserPtr` directly; every access goes
/// through [`UserMemory`], which reports unmapped addresses as
/// [`FileError::BadAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserPtr(u64);

impl UserPtr {
    /// The null pointer
    pub const NULL: UserPtr = UserPtr(0);

    /// Creates a pointer from a raw address
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw address
    pub const fn addr(self) -> u64 {
        self.0
    }

    /// Whether this is the null pointer
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the pointer `offset` bytes further on
    ///
    /// Fails with `BadAddress` on address overflow.
    pub fn offset(self, offset: u64) -> Result<Self, FileError> {
        self.0
            .checked_add(offset)
            .map(Self)
            .ok_or(FileError::BadAddress)
    }
}

impl fmt::Display for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Copy primitives between kernel buffers and a process's user memory
///
/// Implementations must be safe to call from several threads of the same
/// process at once.
pub trait UserMemory: Send + Sync {
    /// Copies a NUL-terminated string in from user memory
    ///
    /// Fails with `NameTooLong` when no terminator appears within `max`
    /// bytes, and with `BadAddress` when the string runs into unmapped
    /// memory first.
    fn copy_in_str(&self, ptr: UserPtr, max: usize) -> Result<String, FileError>;

    /// Fills `dst` from user memory starting at `ptr`
    fn copy_in(&self, ptr: UserPtr, dst: &mut [u8]) -> Result<(), FileError>;

    /// Copies `src` out to user memory starting at `ptr`
    fn copy_out(&self, src: &[u8], ptr: UserPtr) -> Result<(), FileError>;
}
