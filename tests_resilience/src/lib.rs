//! Resilience Test Utilities
//!
//! This crate provides shared utilities for resilience and integration tests.
//!
//! ## Test Philosophy
//!
//! - **Safety under concurrency**: Offsets and reference counts stay
//!   consistent when many threads share one open file
//! - **Deterministic failures**: All faults are reproducible via `FailurePolicy`
//! - **No handle leaks**: Every VFS handle is closed exactly once, on every path
//! - **No buffer leaks**: Scratch buffers are back in the pool after each call

use sim_kernel::SimulatedKernel;
use std::sync::Arc;
use vfs::{FailingVfs, FailurePolicy, MemVfs, Vfs};

/// Failing file system over an inspectable in-memory one
pub type FaultyVfs = FailingVfs<Arc<MemVfs>>;

/// Bootstrap helper for tests
///
/// Creates a kernel over an in-memory file system holding `files`. The
/// kernel is behind an `Arc` so tests can hand it to threads.
pub fn test_bootstrap(files: &[(&str, &[u8])]) -> (Arc<SimulatedKernel>, Arc<MemVfs>) {
    let mem = Arc::new(MemVfs::new());
    for (path, contents) in files {
        mem.insert_file(path, contents);
    }
    let kernel = Arc::new(SimulatedKernel::new(mem.clone()));
    (kernel, mem)
}

/// Bootstrap helper with fault injection
///
/// Returns the failing layer too, so tests can change the policy midway.
pub fn faulty_bootstrap(
    files: &[(&str, &[u8])],
    policy: FailurePolicy,
) -> (SimulatedKernel, Arc<MemVfs>, Arc<FaultyVfs>) {
    let mem = Arc::new(MemVfs::new());
    for (path, contents) in files {
        mem.insert_file(path, contents);
    }
    let failing = Arc::new(FailingVfs::new(mem.clone(), policy));
    let vfs: Arc<dyn Vfs> = failing.clone();
    (SimulatedKernel::new(vfs), mem, failing)
}

/// File made of `count` distinct four-byte records: `r000`, `r001`, ...
pub fn record_file(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| format!("r{:03}", i).into_bytes())
        .collect()
}

/// Asserts that nothing is left open or on loan
pub fn assert_quiescent(kernel: &SimulatedKernel, mem: &MemVfs) {
    assert_eq!(mem.open_handles(), 0, "VFS handles left open");
    assert_eq!(
        mem.opened_count(),
        mem.closed_count(),
        "every opened handle should be closed exactly once"
    );
    assert_eq!(kernel.scratch_outstanding(), 0, "scratch buffers on loan");
}
