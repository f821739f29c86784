//! Per-process descriptor tables
//!
//! A fixed array of slots, each empty or holding one counted reference to
//! an open file. Slot indices are the descriptor numbers user space sees.
//!
//! Operations that remove a reference from a slot hand it back to the
//! caller instead of dropping it. Dropping the last reference can wait on
//! an in-flight transfer, so callers drop outgoing references only after
//! releasing whatever lock guards the table.

use crate::open_file::{FileRef, OpenFile};
use core_types::Descriptor;
use kernel_api::FileError;
use std::sync::Arc;
use thiserror::Error;

/// Descriptor table errors
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("descriptor out of range")]
    InvalidDescriptor,

    #[error("descriptor not open")]
    NotOpen,

    #[error("descriptor table full")]
    Full,
}

impl From<TableError> for FileError {
    fn from(error: TableError) -> Self {
        match error {
            TableError::InvalidDescriptor | TableError::NotOpen => FileError::BadDescriptor,
            TableError::Full => FileError::ResourceExhausted,
        }
    }
}

/// Fixed-capacity mapping from descriptors to open files
#[derive(Debug)]
pub struct DescriptorTable {
    slots: Vec<Option<FileRef>>,
}

impl DescriptorTable {
    /// Creates an empty table with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Occupied descriptors, lowest first
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| Descriptor::new(index))
            .collect()
    }

    /// Stores `file` in the lowest free slot
    ///
    /// When the table is full the reference comes back with the error, for
    /// the caller to drop once the table lock is released.
    pub fn place(&mut self, file: FileRef) -> Result<Descriptor, (TableError, FileRef)> {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(file);
                Ok(Descriptor::new(index))
            }
            None => Err((TableError::Full, file)),
        }
    }

    /// Replaces the contents of one slot and returns what was there
    pub fn place_at(
        &mut self,
        file: Option<FileRef>,
        fd: Descriptor,
    ) -> Result<Option<FileRef>, TableError> {
        let slot = self
            .slots
            .get_mut(fd.index())
            .ok_or(TableError::InvalidDescriptor)?;
        Ok(std::mem::replace(slot, file))
    }

    /// Borrows the open file behind `fd` without counting a reference
    pub fn get(&self, fd: Descriptor) -> Result<Arc<OpenFile>, TableError> {
        self.slot(fd).map(FileRef::file)
    }

    /// Ends a borrow started by [`get`](Self::get)
    pub fn put(&self, fd: Descriptor, file: Arc<OpenFile>) {
        log::trace!("{} borrow of {} ended", fd, file.id());
        drop(file);
    }

    /// Empties the slot and returns its reference
    pub fn take(&mut self, fd: Descriptor) -> Result<FileRef, TableError> {
        self.place_at(None, fd)?.ok_or(TableError::NotOpen)
    }

    /// Makes `new` refer to the open file behind `old`
    ///
    /// Returns whatever `new` referred to before. When `old == new` the
    /// table is left as it is.
    pub fn duplicate_into(
        &mut self,
        old: Descriptor,
        new: Descriptor,
    ) -> Result<Option<FileRef>, TableError> {
        if new.index() >= self.capacity() {
            return Err(TableError::InvalidDescriptor);
        }
        let shared = self.slot(old)?.share();
        if old == new {
            return Ok(Some(shared));
        }
        self.place_at(Some(shared), new)
    }

    /// Creates a child table sharing every open file of this one
    pub fn fork(&self) -> DescriptorTable {
        DescriptorTable {
            slots: self
                .slots
                .iter()
                .map(|slot| slot.as_ref().map(FileRef::share))
                .collect(),
        }
    }

    fn slot(&self, fd: Descriptor) -> Result<&FileRef, TableError> {
        self.slots
            .get(fd.index())
            .ok_or(TableError::InvalidDescriptor)?
            .as_ref()
            .ok_or(TableError::NotOpen)
    }
}
