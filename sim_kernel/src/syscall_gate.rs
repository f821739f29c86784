//! Syscall gate for the user/kernel boundary.
//!
//! User programs trap with a syscall number and raw register arguments.
//! The gate decodes them into a typed [`Syscall`], runs it against a
//! [`FileSyscalls`] implementation and turns the outcome into the value
//! user space sees: the result on success, `-errno` on failure. Every call
//! is recorded in an audit log that tests can query.

use core_types::{Descriptor, ProcessId};
use kernel_api::syscalls::{
    SYS_CLOSE, SYS_DUP2, SYS_LSEEK, SYS_MELD, SYS_OPEN, SYS_READ, SYS_WRITE,
};
use kernel_api::{FileError, FileSyscalls, UserPtr};
use serde::{Deserialize, Serialize};

/// Complete file syscall set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Syscall {
    Open { path: UserPtr, flags: i32, mode: u32 },
    Read { fd: i32, buf: UserPtr, size: usize },
    Write { fd: i32, buf: UserPtr, size: usize },
    Close { fd: i32 },
    Lseek { fd: i32, pos: i64, whence: i32 },
    Dup2 { old: i32, new: i32 },
    Meld { path1: UserPtr, path2: UserPtr, merged_path: UserPtr },
}

impl Syscall {
    /// Decodes a trap: syscall number plus raw argument registers
    ///
    /// Registers are truncated to the width of each argument, as a real
    /// trap handler would. Unknown numbers are `InvalidArgument`.
    pub fn decode(number: usize, args: [u64; 4]) -> Result<Self, FileError> {
        let syscall = match number {
            SYS_OPEN => Syscall::Open {
                path: UserPtr::new(args[0]),
                flags: args[1] as i32,
                mode: args[2] as u32,
            },
            SYS_READ => Syscall::Read {
                fd: args[0] as i32,
                buf: UserPtr::new(args[1]),
                size: args[2] as usize,
            },
            SYS_WRITE => Syscall::Write {
                fd: args[0] as i32,
                buf: UserPtr::new(args[1]),
                size: args[2] as usize,
            },
            SYS_CLOSE => Syscall::Close { fd: args[0] as i32 },
            SYS_LSEEK => Syscall::Lseek {
                fd: args[0] as i32,
                pos: args[1] as i64,
                whence: args[2] as i32,
            },
            SYS_DUP2 => Syscall::Dup2 {
                old: args[0] as i32,
                new: args[1] as i32,
            },
            SYS_MELD => Syscall::Meld {
                path1: UserPtr::new(args[0]),
                path2: UserPtr::new(args[1]),
                merged_path: UserPtr::new(args[2]),
            },
            _ => return Err(FileError::InvalidArgument),
        };
        Ok(syscall)
    }

    /// The syscall number this call traps with
    pub fn number(&self) -> usize {
        match self {
            Syscall::Open { .. } => SYS_OPEN,
            Syscall::Read { .. } => SYS_READ,
            Syscall::Write { .. } => SYS_WRITE,
            Syscall::Close { .. } => SYS_CLOSE,
            Syscall::Lseek { .. } => SYS_LSEEK,
            Syscall::Dup2 { .. } => SYS_DUP2,
            Syscall::Meld { .. } => SYS_MELD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Syscall::Open { .. } => "Open",
            Syscall::Read { .. } => "Read",
            Syscall::Write { .. } => "Write",
            Syscall::Close { .. } => "Close",
            Syscall::Lseek { .. } => "Lseek",
            Syscall::Dup2 { .. } => "Dup2",
            Syscall::Meld { .. } => "Meld",
        }
    }
}

/// Syscall result from the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallResult {
    Ok,
    Descriptor(Descriptor),
    Bytes(usize),
    Offset(u64),
}

impl SyscallResult {
    /// The non-negative value handed back to user space
    pub fn retval(&self) -> i64 {
        match self {
            SyscallResult::Ok => 0,
            SyscallResult::Descriptor(fd) => fd.as_raw(),
            SyscallResult::Bytes(n) => *n as i64,
            SyscallResult::Offset(offset) => *offset as i64,
        }
    }
}

/// Syscall audit event (for testing and verification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyscallEvent {
    /// Syscall was invoked
    Invoked {
        caller: ProcessId,
        syscall_name: String,
        sequence: u64,
    },
    /// Syscall completed successfully
    Completed {
        caller: ProcessId,
        syscall_name: String,
        retval: i64,
        sequence: u64,
    },
    /// Syscall was rejected
    Rejected {
        caller: ProcessId,
        syscall_name: String,
        error: FileError,
        sequence: u64,
    },
    /// Trap with a number no syscall answers to
    UnknownSyscall {
        caller: ProcessId,
        number: usize,
        sequence: u64,
    },
}

/// Audit log for syscall operations.
#[derive(Debug, Clone, Default)]
pub struct SyscallAuditLog {
    events: Vec<SyscallEvent>,
}

impl SyscallAuditLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: SyscallEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SyscallEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&SyscallEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&SyscallEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

/// Syscall gate that enforces the user/kernel boundary.
///
/// One gate per calling thread: the gate owns its audit log, the kernel
/// behind it is shared.
#[derive(Debug, Default)]
pub struct SyscallGate {
    /// Audit log for syscall operations
    audit_log: SyscallAuditLog,
    /// Sequence number of the next recorded event
    sequence: u64,
}

impl SyscallGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the audit log (test-only)
    pub fn audit_log(&self) -> &SyscallAuditLog {
        &self.audit_log
    }

    /// Clears the audit log (test-only)
    pub fn clear_audit_log(&mut self) {
        self.audit_log.clear();
    }

    /// Executes a typed syscall on behalf of `caller`.
    pub fn execute<K>(
        &mut self,
        kernel: &K,
        process: &K::Process,
        caller: ProcessId,
        syscall: Syscall,
    ) -> Result<SyscallResult, FileError>
    where
        K: FileSyscalls + ?Sized,
    {
        let syscall_name = syscall.name().to_string();
        let sequence = self.next_sequence();
        self.audit_log.record(SyscallEvent::Invoked {
            caller,
            syscall_name: syscall_name.clone(),
            sequence,
        });

        let result = match syscall {
            Syscall::Open { path, flags, mode } => kernel
                .open(process, path, flags, mode)
                .map(SyscallResult::Descriptor),
            Syscall::Read { fd, buf, size } => {
                kernel.read(process, fd, buf, size).map(SyscallResult::Bytes)
            }
            Syscall::Write { fd, buf, size } => {
                kernel.write(process, fd, buf, size).map(SyscallResult::Bytes)
            }
            Syscall::Close { fd } => kernel.close(process, fd).map(|_| SyscallResult::Ok),
            Syscall::Lseek { fd, pos, whence } => kernel
                .lseek(process, fd, pos, whence)
                .map(SyscallResult::Offset),
            Syscall::Dup2 { old, new } => {
                kernel.dup2(process, old, new).map(SyscallResult::Descriptor)
            }
            Syscall::Meld {
                path1,
                path2,
                merged_path,
            } => kernel
                .meld(process, path1, path2, merged_path)
                .map(SyscallResult::Offset),
        };

        let sequence = self.next_sequence();
        match &result {
            Ok(value) => {
                self.audit_log.record(SyscallEvent::Completed {
                    caller,
                    syscall_name,
                    retval: value.retval(),
                    sequence,
                });
            }
            Err(error) => {
                log::warn!("{} rejected for {}: {}", syscall_name, caller, error);
                self.audit_log.record(SyscallEvent::Rejected {
                    caller,
                    syscall_name,
                    error: *error,
                    sequence,
                });
            }
        }

        result
    }

    /// Handles a raw trap and returns the user-visible value.
    ///
    /// Non-negative on success, `-errno` on failure.
    pub fn trap<K>(
        &mut self,
        kernel: &K,
        process: &K::Process,
        caller: ProcessId,
        number: usize,
        args: [u64; 4],
    ) -> i64
    where
        K: FileSyscalls + ?Sized,
    {
        let syscall = match Syscall::decode(number, args) {
            Ok(syscall) => syscall,
            Err(error) => {
                log::warn!("unknown syscall {} from {}", number, caller);
                let sequence = self.next_sequence();
                self.audit_log.record(SyscallEvent::UnknownSyscall {
                    caller,
                    number,
                    sequence,
                });
                return error.as_retval();
            }
        };

        match self.execute(kernel, process, caller, syscall) {
            Ok(result) => result.retval(),
            Err(error) => error.as_retval(),
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.sequence;
        self.sequence += 1;
        sequence
    }
}
