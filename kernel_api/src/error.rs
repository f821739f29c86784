//! File-layer error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the file-descriptor syscalls
///
/// Every variant maps onto exactly one errno value, which is what the
/// syscall gate hands back to user space (negated).
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileError {
    /// Illegal flags, null path, bad whence or a negative seek result
    #[error("Invalid argument")]
    InvalidArgument,

    /// Descriptor is out of range, not open, or not usable for the request
    #[error("Bad file descriptor")]
    BadDescriptor,

    /// The descriptor table has no free slot
    #[error("Too many open files")]
    ResourceExhausted,

    /// Exclusive create of a path that already exists
    #[error("File exists")]
    AlreadyExists,

    /// Path does not resolve
    #[error("No such file or directory")]
    NotFound,

    /// The file system refused access
    #[error("Permission denied")]
    PermissionDenied,

    /// The file system failed the transfer
    #[error("I/O error")]
    Io,

    /// A user pointer did not name mapped memory
    #[error("Bad address")]
    BadAddress,

    /// A path string had no terminator within the length limit
    #[error("File name too long")]
    NameTooLong,

    /// A kernel buffer could not be allocated
    #[error("Out of memory")]
    NoMemory,
}

impl FileError {
    /// Returns the errno value for this error
    pub fn errno(&self) -> i32 {
        match self {
            FileError::NotFound => errno::ENOENT,
            FileError::Io => errno::EIO,
            FileError::BadDescriptor => errno::EBADF,
            FileError::NoMemory => errno::ENOMEM,
            FileError::PermissionDenied => errno::EACCES,
            FileError::BadAddress => errno::EFAULT,
            FileError::AlreadyExists => errno::EEXIST,
            FileError::InvalidArgument => errno::EINVAL,
            FileError::ResourceExhausted => errno::EMFILE,
            FileError::NameTooLong => errno::ENAMETOOLONG,
        }
    }

    /// Returns the value a failed syscall hands back to user space
    pub fn as_retval(&self) -> i64 {
        -i64::from(self.errno())
    }

    /// Maps an errno value back onto an error
    pub fn from_errno(errno: i32) -> Option<Self> {
        let error = match errno {
            errno::ENOENT => FileError::NotFound,
            errno::EIO => FileError::Io,
            errno::EBADF => FileError::BadDescriptor,
            errno::ENOMEM => FileError::NoMemory,
            errno::EACCES => FileError::PermissionDenied,
            errno::EFAULT => FileError::BadAddress,
            errno::EEXIST => FileError::AlreadyExists,
            errno::EINVAL => FileError::InvalidArgument,
            errno::EMFILE => FileError::ResourceExhausted,
            errno::ENAMETOOLONG => FileError::NameTooLong,
            _ => return None,
        };
        Some(error)
    }
}

/// Errno values used by the file layer
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EBADF: i32 = 9;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EFAULT: i32 = 14;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const EMFILE: i32 = 24;
    pub const ENAMETOOLONG: i32 = 36;
}
