//! # Simulated Kernel
//!
//! This crate provides a simulated implementation of the file-descriptor
//! layer of a kernel.
//!
//! ## Purpose
//!
//! The simulated kernel allows testing file syscalls without hardware:
//! - Runs under `cargo test`
//! - Real concurrency (handlers are `&self` and the kernel is `Send + Sync`)
//! - Fast (files live in memory behind the [`vfs::Vfs`] trait)
//! - Inspectable (offsets, reference counts and buffers are observable)
//!
//! ## Structure
//!
//! - [`open_file`]: shared open-file objects and counted references
//! - [`descriptor_table`]: per-process descriptor slots
//! - [`process`]: the per-process context every syscall receives
//! - [`syscalls`]: `open`, `read`, `write`, `close`, `lseek`, `dup2`
//! - [`meld`]: the four-byte interleaving merge
//! - [`syscall_gate`]: numbered dispatch with an audit log
//!
//! This is not a "toy" or "mock" - it's a full implementation of the
//! file syscall surface that happens to run in-process for testing.

pub mod address_space;
pub mod config;
pub mod descriptor_table;
pub mod meld;
pub mod open_file;
pub mod process;
pub mod scratch;
pub mod syscall_gate;
pub mod syscalls;
pub mod test_utils;

pub use address_space::UserAddressSpace;
pub use config::{ConfigError, KernelConfig};
pub use descriptor_table::{DescriptorTable, TableError};
pub use open_file::{FileRef, OpenFile};
pub use process::Process;
pub use scratch::{ScratchBuffer, ScratchPool};
pub use syscall_gate::{Syscall, SyscallAuditLog, SyscallEvent, SyscallGate, SyscallResult};

use std::sync::Arc;
use vfs::Vfs;

/// Simulated kernel state
///
/// Shared by every process and thread. All per-file state lives in the
/// open-file objects and all per-process state in [`Process`], so the
/// kernel itself only holds the file system, the limits and the scratch
/// pool.
pub struct SimulatedKernel {
    /// File system every path resolves against
    vfs: Arc<dyn Vfs>,
    /// Limits
    config: KernelConfig,
    /// Kernel buffers for reads and writes
    scratch: ScratchPool,
}

impl SimulatedKernel {
    /// Creates a kernel over `vfs` with default limits
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        let config = KernelConfig::default();
        Self {
            vfs,
            scratch: ScratchPool::new(config.max_transfer),
            config,
        }
    }

    /// Replaces the limits
    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.scratch = ScratchPool::new(config.max_transfer);
        self.config = config;
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn vfs(&self) -> &Arc<dyn Vfs> {
        &self.vfs
    }

    pub fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }

    /// Number of scratch buffers currently on loan
    ///
    /// Zero whenever no syscall is running.
    pub fn scratch_outstanding(&self) -> usize {
        self.scratch.outstanding()
    }

    /// Creates a process with an empty descriptor table
    pub fn create_process(&self) -> Process {
        let process = Process::new(self.config.open_max);
        log::debug!("created {}", process.pid());
        process
    }

    /// Creates a child of `parent`
    ///
    /// The child's table refers to the same open files as the parent's, so
    /// both move the same offsets and each file stays open until the last
    /// of them closes it.
    pub fn fork_process(&self, parent: &Process) -> Process {
        let child = parent.fork();
        log::debug!(
            "forked {} from {} ({} open files shared)",
            child.pid(),
            parent.pid(),
            child.open_count()
        );
        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::MemVfs;

    #[test]
    fn test_simulated_kernel_creation() {
        let kernel = SimulatedKernel::new(Arc::new(MemVfs::new()));
        assert_eq!(kernel.config(), &KernelConfig::default());
        assert_eq!(kernel.scratch_outstanding(), 0);
    }

    #[test]
    fn test_with_config() {
        let config = KernelConfig::default().with_open_max(3);
        let kernel = SimulatedKernel::new(Arc::new(MemVfs::new())).with_config(config);
        let process = kernel.create_process();
        assert_eq!(process.table().capacity(), 3);
    }

    #[test]
    fn test_kernel_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SimulatedKernel>();
        assert_send_sync::<Process>();
    }
}
