//! File syscall trait

use crate::{FileError, UserPtr};
use core_types::Descriptor;

/// The file-descriptor syscall surface
///
/// Arguments arrive exactly as user space passed them: descriptors and
/// flag words are raw integers and strings are user pointers. Validating
/// them is part of each call's contract.
///
/// Implementations:
/// - Simulated kernel (in-process, for testing)
/// - Syscall gate (numbered dispatch with an audit log on top)
///
/// Every call receives the calling process explicitly; there is no
/// ambient "current process".
///
/// # Example
///
/// ```ignore
/// fn copy_header<K: FileSyscalls>(
///     kernel: &K,
///     process: &K::Process,
///     path: UserPtr,
///     buf: UserPtr,
/// ) -> Result<usize, FileError> {
///     let fd = kernel.open(process, path, 0, 0)?;
///     let n = kernel.read(process, fd.index() as i32, buf, 64)?;
///     kernel.close(process, fd.index() as i32)?;
///     Ok(n)
/// }
/// ```
pub trait FileSyscalls {
    /// Per-process context the calls operate on
    type Process;

    /// Opens `path` and places the new open file in the lowest free slot
    fn open(
        &self,
        process: &Self::Process,
        path: UserPtr,
        flags: i32,
        mode: u32,
    ) -> Result<Descriptor, FileError>;

    /// Reads up to `size` bytes at the file's offset into `buf`
    ///
    /// Returns the number of bytes moved; 0 at end of file.
    fn read(
        &self,
        process: &Self::Process,
        fd: i32,
        buf: UserPtr,
        size: usize,
    ) -> Result<usize, FileError>;

    /// Writes up to `size` bytes from `buf` at the file's offset
    fn write(
        &self,
        process: &Self::Process,
        fd: i32,
        buf: UserPtr,
        size: usize,
    ) -> Result<usize, FileError>;

    /// Clears the descriptor's slot and drops its reference
    fn close(&self, process: &Self::Process, fd: i32) -> Result<(), FileError>;

    /// Repositions the file's offset
    fn lseek(
        &self,
        process: &Self::Process,
        fd: i32,
        pos: i64,
        whence: i32,
    ) -> Result<u64, FileError>;

    /// Makes `new` refer to the same open file as `old`
    fn dup2(&self, process: &Self::Process, old: i32, new: i32) -> Result<Descriptor, FileError>;

    /// Interleaves two files, four bytes at a time, into a new third file
    ///
    /// Returns the number of bytes written to the merged file.
    fn meld(
        &self,
        process: &Self::Process,
        path1: UserPtr,
        path2: UserPtr,
        merged_path: UserPtr,
    ) -> Result<u64, FileError>;
}
