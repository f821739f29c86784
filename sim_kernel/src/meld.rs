//! Meld: interleave two files into a new third one
//!
//! Both sources are read four bytes at a time, alternately, and every chunk
//! is padded with spaces to four bytes before it is written, so the merged
//! file grows by exactly eight bytes per round. A source that has run dry
//! contributes four spaces per round until the other one runs dry too.
//!
//! ```text
//! "01238901" + "45672345"    -> "0123456789012345"
//! "abcdef"   + "0123456789"  -> "abcd0123ef  4567    89  "
//! ```
//!
//! The three files are opened privately and never enter the descriptor
//! table. They are released when [`meld`] returns, on every path. A failure
//! in the middle of the loop aborts the merge; whatever was already written
//! to the merged file stays there.

use crate::open_file::OpenFile;
use crate::process::Process;
use crate::SimulatedKernel;
use core_types::OpenFlags;
use kernel_api::{FileError, UserMemory, UserPtr};
use std::sync::Arc;

/// Bytes taken from each source per round
pub const CHUNK: usize = 4;

/// Fill byte for short chunks
pub const PAD: u8 = b' ';

/// Permission bits of the merged file
pub const MERGED_MODE: u32 = 0o664;

/// Runs the meld syscall
///
/// Returns the size of the merged file.
pub fn meld(
    kernel: &SimulatedKernel,
    process: &Process,
    path1: UserPtr,
    path2: UserPtr,
    merged_path: UserPtr,
) -> Result<u64, FileError> {
    if path1.is_null() || path2.is_null() || merged_path.is_null() {
        log::warn!("meld: null path from {}", process.pid());
        return Err(FileError::InvalidArgument);
    }

    let path_max = kernel.config().path_max;
    let path1 = process.memory().copy_in_str(path1, path_max)?;
    let path2 = process.memory().copy_in_str(path2, path_max)?;
    let merged_path = process.memory().copy_in_str(merged_path, path_max)?;
    log::debug!(
        "meld({:?}, {:?}, {:?}) from {}",
        path1,
        path2,
        merged_path,
        process.pid()
    );

    let vfs = kernel.vfs();
    let first = OpenFile::open(Arc::clone(vfs), &path1, OpenFlags::RDONLY, 0)?;
    let second = OpenFile::open(Arc::clone(vfs), &path2, OpenFlags::RDONLY, 0)?;
    let merged = OpenFile::open(
        Arc::clone(vfs),
        &merged_path,
        OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::EXCL,
        MERGED_MODE,
    )?;

    let mut chunks = kernel.scratch().acquire(2 * CHUNK)?;
    let written = merge(&first, &second, &merged, &mut chunks).map_err(|error| {
        log::warn!(
            "meld into {:?} aborted at {} bytes: {}",
            merged_path,
            merged.offset(),
            error
        );
        error
    })?;

    log::debug!("meld into {:?} wrote {} bytes", merged_path, written);
    Ok(written)
}

/// Runs the merge loop over three open files
///
/// `chunks` must hold at least two chunks. Returns the merged file's
/// offset once both sources are exhausted.
pub fn merge(
    first: &OpenFile,
    second: &OpenFile,
    merged: &OpenFile,
    chunks: &mut [u8],
) -> Result<u64, FileError> {
    let (chunk1, rest) = chunks.split_at_mut(CHUNK);
    let chunk2 = &mut rest[..CHUNK];

    loop {
        let n1 = first.read(chunk1)?;
        let n2 = second.read(chunk2)?;
        if n1 == 0 && n2 == 0 {
            break;
        }

        chunk1[n1..].fill(PAD);
        chunk2[n2..].fill(PAD);
        write_all(merged, chunk1)?;
        write_all(merged, chunk2)?;
    }

    Ok(merged.offset())
}

/// Writes all of `buf`, retrying short writes
fn write_all(file: &OpenFile, mut buf: &[u8]) -> Result<(), FileError> {
    while !buf.is_empty() {
        let n = file.write(buf)?;
        if n == 0 {
            return Err(FileError::Io);
        }
        buf = &buf[n..];
    }
    Ok(())
}
