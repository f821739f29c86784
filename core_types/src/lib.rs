//! # Core Types
//!
//! This crate defines the fundamental types shared by the file-descriptor
//! layer and its collaborators.
//!
//! ## Key Types
//!
//! - [`Descriptor`]: A slot index in a per-process descriptor table
//! - [`OpenFlags`]: The legal `open` flag bits
//! - [`AccessMode`]: Read-only, write-only or read-write access
//! - [`Whence`]: Seek origin
//! - [`ProcessId`], [`OpenFileId`]: Identifiers used for auditing

pub mod descriptor;
pub mod ids;
pub mod open_flags;

pub use descriptor::Descriptor;
pub use ids::{OpenFileId, ProcessId};
pub use open_flags::{AccessMode, OpenFlags, Whence};
