//! # Meld Test Host
//!
//! Runs the user-level meld test against the simulated kernel.
//!
//! ## Philosophy
//!
//! - **User program, not kernel call**: The test traps through the syscall
//!   gate with raw numbers and registers
//! - **In-memory file system**: Every run starts from an empty tree
//! - **Checked output**: The merged file is compared against an independent
//!   interleaving of the sources
//!
//! ## Responsibilities
//!
//! The host:
//! - Creates both sources with `open`/`write`/`close`
//! - Melds them into the merged file
//! - Reads the merged file back and prints it
//! - Loads kernel limits and sources from a JSON configuration

pub mod logger;
pub mod runtime;

pub use logger::StderrLogger;
pub use runtime::{MeldReport, MeldTest, MeldTestConfig, MeldTestError};
