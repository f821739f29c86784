//! # Kernel API
//!
//! This crate defines the interface between user programs and the
//! file-descriptor layer of the kernel.
//!
//! ## Contents
//!
//! - [`FileSyscalls`]: the syscall surface (open, read, write, close,
//!   lseek, dup2, meld)
//! - [`FileError`]: the error taxonomy, with errno mapping
//! - [`UserPtr`] and [`UserMemory`]: the user/kernel copy boundary
//! - [`syscalls`]: syscall numbers
//!
//! ## Design Goals
//!
//! 1. **Testability**: every collaborator is a trait with a simulated
//!    implementation
//! 2. **Explicitness**: the calling process is always an argument
//! 3. **Type safety**: descriptors, flags and pointers are distinct types

pub mod error;
pub mod kernel;
pub mod syscalls;
pub mod user;

pub use error::{errno, FileError};
pub use kernel::FileSyscalls;
pub use user::{UserMemory, UserPtr};
