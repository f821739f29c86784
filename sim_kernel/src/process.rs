//! Process context handed to every file syscall

use crate::address_space::UserAddressSpace;
use crate::descriptor_table::{DescriptorTable, TableError};
use crate::open_file::OpenFile;
use core_types::{Descriptor, ProcessId};
use std::sync::{Arc, Mutex, MutexGuard};

/// A simulated process: its descriptor table and its user memory
///
/// Threads of one process share a `Process` by reference. The table lock
/// is only ever held for slot lookups and updates.
#[derive(Debug)]
pub struct Process {
    pid: ProcessId,
    table: Mutex<DescriptorTable>,
    memory: UserAddressSpace,
}

impl Process {
    /// Creates a process with an empty table of `open_max` slots
    pub fn new(open_max: usize) -> Self {
        Self {
            pid: ProcessId::new(),
            table: Mutex::new(DescriptorTable::new(open_max)),
            memory: UserAddressSpace::new(),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// The process's user memory
    pub fn memory(&self) -> &UserAddressSpace {
        &self.memory
    }

    /// Locks the descriptor table
    pub fn table(&self) -> MutexGuard<'_, DescriptorTable> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Borrows the open file behind `fd`, for inspection
    pub fn file(&self, fd: Descriptor) -> Result<Arc<OpenFile>, TableError> {
        self.table().get(fd)
    }

    /// Number of open descriptors
    pub fn open_count(&self) -> usize {
        self.table().open_count()
    }

    /// Creates a child sharing every open file, with a copy of user memory
    pub fn fork(&self) -> Process {
        let table = self.table().fork();
        Process {
            pid: ProcessId::new(),
            table: Mutex::new(table),
            memory: self.memory.duplicate(),
        }
    }
}
