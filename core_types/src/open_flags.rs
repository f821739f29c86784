//! Open flags, access modes and seek origins
//!
//! The numeric values are the ones user programs pass to `open` and
//! `lseek`. Anything outside the legal combination is rejected at the
//! syscall boundary, before any file is touched.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Flags accepted by `open`
    ///
    /// Read-only access is the absence of both access bits, so it has no
    /// flag of its own; use [`AccessMode`] to interpret the low two bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OpenFlags: u32 {
        /// Open for writing only
        const WRONLY = 1;
        /// Open for reading and writing
        const RDWR = 2;
        /// Create the file if it does not exist
        const CREAT = 4;
        /// With `CREAT`, fail if the file already exists
        const EXCL = 8;
        /// Truncate the file to zero length
        const TRUNC = 16;
        /// Every write starts at end of file
        const APPEND = 32;
        /// Do not become the controlling terminal
        const NOCTTY = 64;
    }
}

impl OpenFlags {
    /// Mask selecting the access-mode bits
    pub const ACCMODE: u32 = 3;

    /// Read-only access: no access bits set
    pub const RDONLY: Self = Self::empty();

    /// Parses a raw `open` flag word
    ///
    /// Returns `None` for negative values, unknown bits, or the access-mode
    /// value 3 (both write bits), which names no access mode.
    pub fn parse(raw: i32) -> Option<Self> {
        let bits = u32::try_from(raw).ok()?;
        let flags = Self::from_bits(bits)?;
        AccessMode::from_flags(flags)?;
        Some(flags)
    }

    /// Returns the access mode encoded in the low bits
    ///
    /// Only `None` for flag words that `parse` would have rejected.
    pub fn access_mode(&self) -> Option<AccessMode> {
        AccessMode::from_flags(*self)
    }
}

/// How an open file may be accessed
///
/// Fixed when the file is opened and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    /// Extracts the access mode from open flags
    pub fn from_flags(flags: OpenFlags) -> Option<Self> {
        match flags.bits() & OpenFlags::ACCMODE {
            0 => Some(Self::ReadOnly),
            1 => Some(Self::WriteOnly),
            2 => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// Whether reads are permitted
    pub fn readable(&self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    /// Whether writes are permitted
    pub fn writable(&self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Origin for `lseek`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Whence {
    /// Relative to the start of the file
    Set,
    /// Relative to the current offset
    Current,
    /// Relative to the end of the file
    End,
}

impl Whence {
    /// Converts a raw `SEEK_*` value
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Set),
            1 => Some(Self::Current),
            2 => Some(Self::End),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_every_legal_bit() {
        let all = OpenFlags::RDWR
            | OpenFlags::CREAT
            | OpenFlags::EXCL
            | OpenFlags::TRUNC
            | OpenFlags::APPEND
            | OpenFlags::NOCTTY;
        assert_eq!(OpenFlags::parse(all.bits() as i32), Some(all));
        assert_eq!(OpenFlags::parse(0), Some(OpenFlags::RDONLY));
    }

    #[test]
    fn test_parse_rejects_illegal_words() {
        assert_eq!(OpenFlags::parse(-1), None);
        assert_eq!(OpenFlags::parse(128), None);
        assert_eq!(OpenFlags::parse(0x1000), None);
        // Both access bits set is not an access mode.
        assert_eq!(OpenFlags::parse(3), None);
    }

    #[test]
    fn test_access_mode_from_flags() {
        assert_eq!(
            AccessMode::from_flags(OpenFlags::RDONLY),
            Some(AccessMode::ReadOnly)
        );
        assert_eq!(
            AccessMode::from_flags(OpenFlags::WRONLY | OpenFlags::CREAT),
            Some(AccessMode::WriteOnly)
        );
        assert_eq!(
            AccessMode::from_flags(OpenFlags::RDWR | OpenFlags::TRUNC),
            Some(AccessMode::ReadWrite)
        );
    }

    #[test]
    fn test_access_mode_permissions() {
        assert!(AccessMode::ReadOnly.readable());
        assert!(!AccessMode::ReadOnly.writable());
        assert!(!AccessMode::WriteOnly.readable());
        assert!(AccessMode::WriteOnly.writable());
        assert!(AccessMode::ReadWrite.readable());
        assert!(AccessMode::ReadWrite.writable());
    }

    #[test]
    fn test_whence_from_raw() {
        assert_eq!(Whence::from_raw(0), Some(Whence::Set));
        assert_eq!(Whence::from_raw(1), Some(Whence::Current));
        assert_eq!(Whence::from_raw(2), Some(Whence::End));
        assert_eq!(Whence::from_raw(3), None);
    }

    #[test]
    fn test_open_flags_serialization() {
        let flags = OpenFlags::WRONLY | OpenFlags::CREAT;
        let json = serde_json::to_string(&flags).unwrap();
        let back: OpenFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
