//! VFS error types

use kernel_api::FileError;
use thiserror::Error;

/// Errors reported by a file system
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum VfsError {
    /// Path does not resolve to a file
    #[error("no such file: path does not resolve")]
    NotFound,

    /// Exclusive create of an existing file
    #[error("file already exists")]
    AlreadyExists,

    /// The file's permissions forbid the requested access
    #[error("permission denied")]
    PermissionDenied,

    /// The request is malformed (empty path, bad flags)
    #[error("invalid argument")]
    InvalidArgument,

    /// The transfer failed, or the handle does not permit it
    #[error("I/O error")]
    Io,
}

impl From<VfsError> for FileError {
    fn from(error: VfsError) -> Self {
        match error {
            VfsError::NotFound => FileError::NotFound,
            VfsError::AlreadyExists => FileError::AlreadyExists,
            VfsError::PermissionDenied => FileError::PermissionDenied,
            VfsError::InvalidArgument => FileError::InvalidArgument,
            VfsError::Io => FileError::Io,
        }
    }
}
