//! File descriptor numbers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A small non-negative integer naming one slot of a descriptor table
///
/// Descriptors arrive from user space as signed integers, so conversion
/// from `i32` is fallible: negative values never name a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Descriptor(usize);

impl Descriptor {
    /// Creates a descriptor for the given slot index
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Converts a raw syscall argument into a descriptor
    ///
    /// Returns `None` for negative values.
    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().map(Self)
    }

    /// Returns the slot index
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns the value handed back to user space
    pub fn as_raw(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_raw() {
        assert_eq!(Descriptor::from_raw(3), Some(Descriptor::new(3)));
        assert_eq!(Descriptor::from_raw(0), Some(Descriptor::new(0)));
        assert_eq!(Descriptor::from_raw(-1), None);
    }

    #[test]
    fn test_descriptor_ordering() {
        assert!(Descriptor::new(1) < Descriptor::new(2));
    }

    #[test]
    fn test_descriptor_display() {
        assert_eq!(format!("{}", Descriptor::new(7)), "fd7");
    }
}
