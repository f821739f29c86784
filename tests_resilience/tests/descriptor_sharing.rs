//! Descriptor Sharing Tests
//!
//! Validates reference counting across dup2, fork and close: an open file
//! lives exactly as long as some descriptor refers to it, and its VFS handle
//! is closed exactly once.

use core_types::{Descriptor, OpenFlags};
use kernel_api::{FileError, FileSyscalls};
use sim_kernel::test_utils::{open_path, read_bytes, write_bytes};
use sim_kernel::{KernelConfig, SimulatedKernel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tests_resilience::{assert_quiescent, record_file, test_bootstrap};
use vfs::MemVfs;

fn raw(fd: Descriptor) -> i32 {
    fd.index() as i32
}

/// Test: dup2 shares the offset and defers the close
#[test]
fn test_dup2_shares_offset_until_last_close() {
    let (kernel, mem) = test_bootstrap(&[("data", b"abcdefgh")]);
    let process = kernel.create_process();
    let fd = open_path(&kernel, &process, "data", OpenFlags::RDONLY).expect("open");

    let copy = kernel.dup2(&process, raw(fd), 7).expect("dup2");
    assert_eq!(copy, Descriptor::new(7));
    assert_eq!(process.file(fd).expect("open").refcount(), 2);

    assert_eq!(read_bytes(&kernel, &process, fd, 3).expect("read"), b"abc");
    assert_eq!(read_bytes(&kernel, &process, copy, 3).expect("read"), b"def");

    kernel.close(&process, raw(fd)).expect("close original");
    assert_eq!(mem.open_handles(), 1);
    assert_eq!(read_bytes(&kernel, &process, copy, 8).expect("read"), b"gh");

    kernel.close(&process, raw(copy)).expect("close copy");
    assert_quiescent(&kernel, &mem);
}

/// Test: dup2 onto an open descriptor releases what it displaced
#[test]
fn test_dup2_over_open_descriptor() {
    let (kernel, mem) = test_bootstrap(&[("a", b"aaaa"), ("b", b"bbbb")]);
    let process = kernel.create_process();
    let a = open_path(&kernel, &process, "a", OpenFlags::RDONLY).expect("open a");
    let b = open_path(&kernel, &process, "b", OpenFlags::RDONLY).expect("open b");
    assert_eq!(mem.open_handles(), 2);

    kernel.dup2(&process, raw(a), raw(b)).expect("dup2");
    assert_eq!(mem.open_handles(), 1);
    assert_eq!(read_bytes(&kernel, &process, b, 4).expect("read"), b"aaaa");

    kernel.close(&process, raw(a)).expect("close a");
    kernel.close(&process, raw(b)).expect("close b");
    assert_quiescent(&kernel, &mem);
}

/// Test: dup2 onto itself changes nothing
#[test]
fn test_dup2_onto_itself() {
    let (kernel, mem) = test_bootstrap(&[("a", b"aaaa")]);
    let process = kernel.create_process();
    let fd = open_path(&kernel, &process, "a", OpenFlags::RDONLY).expect("open");

    assert_eq!(kernel.dup2(&process, raw(fd), raw(fd)), Ok(fd));
    assert_eq!(process.file(fd).expect("open").refcount(), 1);

    kernel.close(&process, raw(fd)).expect("close");
    assert_quiescent(&kernel, &mem);
}

/// Test: A forked child shares open files with its parent
#[test]
fn test_fork_shares_open_files() {
    let (kernel, mem) = test_bootstrap(&[]);
    let parent = kernel.create_process();
    let fd = open_path(
        &kernel,
        &parent,
        "shared",
        OpenFlags::WRONLY | OpenFlags::CREAT,
    )
    .expect("open");
    write_bytes(&kernel, &parent, fd, b"parent ").expect("write");

    let child = kernel.fork_process(&parent);
    assert_eq!(child.open_count(), 1);
    assert_eq!(parent.file(fd).expect("open").refcount(), 2);

    write_bytes(&kernel, &child, fd, b"child ").expect("write");
    write_bytes(&kernel, &parent, fd, b"parent").expect("write");
    assert_eq!(
        mem.contents("shared").expect("exists"),
        b"parent child parent"
    );

    // Dropping the child process drops its references
    drop(child);
    assert_eq!(parent.file(fd).expect("open").refcount(), 1);
    assert_eq!(mem.open_handles(), 1);

    kernel.close(&parent, raw(fd)).expect("close");
    assert_quiescent(&kernel, &mem);
}

/// Test: Closing in the parent leaves the child's descriptor working
#[test]
fn test_close_in_parent_keeps_child_open() {
    let (kernel, mem) = test_bootstrap(&[("data", b"0123456789")]);
    let parent = kernel.create_process();
    let fd = open_path(&kernel, &parent, "data", OpenFlags::RDONLY).expect("open");
    let child = kernel.fork_process(&parent);

    kernel.close(&parent, raw(fd)).expect("close parent");
    assert_eq!(
        read_bytes(&kernel, &parent, fd, 4),
        Err(FileError::BadDescriptor)
    );
    assert_eq!(read_bytes(&kernel, &child, fd, 4).expect("read"), b"0123");

    kernel.close(&child, raw(fd)).expect("close child");
    assert_quiescent(&kernel, &mem);
}

/// Test: Double close fails the second time
#[test]
fn test_double_close() {
    let (kernel, mem) = test_bootstrap(&[("a", b"")]);
    let process = kernel.create_process();
    let fd = open_path(&kernel, &process, "a", OpenFlags::RDONLY).expect("open");

    assert_eq!(kernel.close(&process, raw(fd)), Ok(()));
    assert_eq!(kernel.close(&process, raw(fd)), Err(FileError::BadDescriptor));
    assert_eq!(mem.closed_count(), 1);
    assert_quiescent(&kernel, &mem);
}

/// Test: Closing a descriptor while another thread transfers through it
///
/// The reader either completes each read or sees `BadDescriptor` once the
/// slot is gone; the handle is closed exactly once, after the last
/// in-flight transfer.
#[test]
fn test_close_during_concurrent_reads() {
    let contents = record_file(5000);
    let (kernel, mem) = test_bootstrap(&[("records", contents.as_slice())]);
    let process = Arc::new(kernel.create_process());
    let fd = open_path(&kernel, &process, "records", OpenFlags::RDONLY).expect("open");
    let started = Arc::new(AtomicBool::new(false));

    let reader = {
        let kernel = Arc::clone(&kernel);
        let process = Arc::clone(&process);
        let started = Arc::clone(&started);
        thread::spawn(move || loop {
            match read_bytes(&kernel, &process, fd, 4) {
                Ok(record) if record.is_empty() => return Ok(()),
                Ok(record) => {
                    assert_eq!(record.len(), 4);
                    started.store(true, Ordering::SeqCst);
                }
                Err(error) => return Err(error),
            }
        })
    };

    while !started.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    kernel.close(&process, raw(fd)).expect("close");

    match reader.join().expect("reader panicked") {
        Ok(()) | Err(FileError::BadDescriptor) => {}
        Err(other) => panic!("unexpected error {:?}", other),
    }
    assert_eq!(process.open_count(), 0);
    assert_quiescent(&kernel, &mem);
}

/// Test: Many threads duplicating and closing the same file
#[test]
fn test_concurrent_dup2_and_close() {
    let (kernel, mem) = test_bootstrap(&[("a", b"abcd")]);
    let process = Arc::new(kernel.create_process());
    let fd = open_path(&kernel, &process, "a", OpenFlags::RDONLY).expect("open");

    let handles: Vec<_> = (1..=8)
        .map(|slot| {
            let kernel = Arc::clone(&kernel);
            let process = Arc::clone(&process);
            thread::spawn(move || {
                let target = raw(fd) + slot * 10;
                for _ in 0..100 {
                    kernel.dup2(&process, raw(fd), target).expect("dup2");
                    kernel.close(&process, target).expect("close");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(process.file(fd).expect("open").refcount(), 1);
    assert_eq!(mem.opened_count(), 1);
    kernel.close(&process, raw(fd)).expect("close");
    assert_quiescent(&kernel, &mem);
}

/// Test: The table fills at its capacity and frees on close
#[test]
fn test_table_full() {
    let mem = Arc::new(MemVfs::new().with_file("a", b""));
    let kernel = SimulatedKernel::new(mem.clone())
        .with_config(KernelConfig::default().with_open_max(4));
    let process = kernel.create_process();

    let fds: Vec<_> = (0..4)
        .map(|_| open_path(&kernel, &process, "a", OpenFlags::RDONLY).expect("open"))
        .collect();
    assert_eq!(
        open_path(&kernel, &process, "a", OpenFlags::RDONLY),
        Err(FileError::ResourceExhausted)
    );
    assert_eq!(mem.open_handles(), 4);

    kernel.close(&process, raw(fds[2])).expect("close");
    assert_eq!(
        open_path(&kernel, &process, "a", OpenFlags::RDONLY),
        Ok(fds[2])
    );

    for fd in fds {
        kernel.close(&process, raw(fd)).expect("close");
    }
    assert_quiescent(&kernel, &mem);
}
