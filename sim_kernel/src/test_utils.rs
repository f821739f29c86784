//! Test utilities for file-layer testing
//!
//! Helpers that stage paths and buffers in a process's simulated user
//! memory and drive the syscalls with them, so tests read like the user
//! programs they stand in for.

use crate::{Process, SimulatedKernel};
use core_types::{Descriptor, OpenFlags};
use kernel_api::{FileError, FileSyscalls};
use std::sync::Arc;
use vfs::MemVfs;

/// Permission bits used when a helper creates a file
pub const TEST_MODE: u32 = 0o664;

/// Read size used by [`read_file`]
const READ_CHUNK: usize = 64;

/// Runs a test against a fresh kernel over an in-memory file system
///
/// # Example
///
/// ```
/// use sim_kernel::test_utils::{read_file, with_kernel};
///
/// with_kernel(&[("greeting", b"hello")], |kernel, _mem| {
///     let process = kernel.create_process();
///     assert_eq!(read_file(kernel, &process, "greeting").unwrap(), b"hello");
/// });
/// ```
pub fn with_kernel<F, R>(files: &[(&str, &[u8])], f: F) -> R
where
    F: FnOnce(&SimulatedKernel, &Arc<MemVfs>) -> R,
{
    let mem = MemVfs::new();
    for (path, contents) in files {
        mem.insert_file(path, contents);
    }
    let mem = Arc::new(mem);
    let kernel = SimulatedKernel::new(mem.clone());
    f(&kernel, &mem)
}

fn raw(fd: Descriptor) -> i32 {
    i32::try_from(fd.index()).unwrap_or(i32::MAX)
}

/// Opens `path` with `flags`
pub fn open_path(
    kernel: &SimulatedKernel,
    process: &Process,
    path: &str,
    flags: OpenFlags,
) -> Result<Descriptor, FileError> {
    let path = process.memory().map_str(path);
    kernel.open(process, path, flags.bits() as i32, TEST_MODE)
}

/// Reads up to `size` bytes from `fd`
pub fn read_bytes(
    kernel: &SimulatedKernel,
    process: &Process,
    fd: Descriptor,
    size: usize,
) -> Result<Vec<u8>, FileError> {
    let buf = process.memory().map(size);
    let n = kernel.read(process, raw(fd), buf, size)?;
    process.memory().read(buf, n)
}

/// Writes `bytes` to `fd`
pub fn write_bytes(
    kernel: &SimulatedKernel,
    process: &Process,
    fd: Descriptor,
    bytes: &[u8],
) -> Result<usize, FileError> {
    let buf = process.memory().map_bytes(bytes);
    kernel.write(process, raw(fd), buf, bytes.len())
}

/// Creates or truncates `path` and fills it with `contents`
pub fn write_file(
    kernel: &SimulatedKernel,
    process: &Process,
    path: &str,
    contents: &[u8],
) -> Result<(), FileError> {
    let fd = open_path(
        kernel,
        process,
        path,
        OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
    )?;
    let result = write_bytes(kernel, process, fd, contents);
    kernel.close(process, raw(fd))?;
    match result? {
        n if n == contents.len() => Ok(()),
        _ => Err(FileError::Io),
    }
}

/// Reads the whole of `path`
pub fn read_file(
    kernel: &SimulatedKernel,
    process: &Process,
    path: &str,
) -> Result<Vec<u8>, FileError> {
    let fd = open_path(kernel, process, path, OpenFlags::RDONLY)?;
    let mut contents = Vec::new();
    let result = loop {
        match read_bytes(kernel, process, fd, READ_CHUNK) {
            Ok(chunk) if chunk.is_empty() => break Ok(()),
            Ok(chunk) => contents.extend_from_slice(&chunk),
            Err(error) => break Err(error),
        }
    };
    kernel.close(process, raw(fd))?;
    result.map(|()| contents)
}

/// Melds `path1` and `path2` into `merged_path`
pub fn meld_paths(
    kernel: &SimulatedKernel,
    process: &Process,
    path1: &str,
    path2: &str,
    merged_path: &str,
) -> Result<u64, FileError> {
    let memory = process.memory();
    kernel.meld(
        process,
        memory.map_str(path1),
        memory.map_str(path2),
        memory.map_str(merged_path),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_kernel() {
        with_kernel(&[("a", b"abc")], |kernel, mem| {
            assert!(mem.exists("a"));
            assert_eq!(kernel.scratch_outstanding(), 0);
        });
    }

    #[test]
    fn test_write_then_read_file() {
        with_kernel(&[], |kernel, mem| {
            let process = kernel.create_process();
            write_file(kernel, &process, "f", b"line one\nline two\n").unwrap();
            assert_eq!(
                read_file(kernel, &process, "f").unwrap(),
                b"line one\nline two\n"
            );
            assert_eq!(process.open_count(), 0);
            assert_eq!(mem.open_handles(), 0);
        });
    }

    #[test]
    fn test_read_file_spanning_chunks() {
        let contents: Vec<u8> = (0..200u8).collect();
        with_kernel(&[("big", contents.as_slice())], |kernel, _| {
            let process = kernel.create_process();
            assert_eq!(read_file(kernel, &process, "big").unwrap(), contents);
        });
    }

    #[test]
    fn test_read_file_missing() {
        with_kernel(&[], |kernel, _| {
            let process = kernel.create_process();
            assert_eq!(
                read_file(kernel, &process, "missing"),
                Err(FileError::NotFound)
            );
        });
    }
}
