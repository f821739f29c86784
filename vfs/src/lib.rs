//! # Virtual File System
//!
//! This crate defines the file-system collaborator behind the
//! file-descriptor layer.
//!
//! ## Philosophy
//!
//! **The descriptor layer never touches storage directly.**
//!
//! Path resolution, permission checks and byte movement all sit behind the
//! [`Vfs`] trait. The descriptor layer only owns offsets and handles.
//!
//! ## Implementations
//!
//! 1. [`MemVfs`]: in-memory files, with handle accounting for tests
//! 2. [`FailingVfs`]: wraps another `Vfs` and injects failures by policy

pub mod error;
pub mod failing_vfs;
pub mod mem_vfs;
pub mod vfs;

pub use error::VfsError;
pub use failing_vfs::{FailingVfs, FailurePolicy};
pub use mem_vfs::{MemVfs, MAX_FILE_SIZE};
pub use vfs::{IoRequest, Vfs, Vnode};
