//! File mode bits and open flags.

use std::fmt;
use std::ops::BitOr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// File type and permission bits.
///
/// Bit 31 is the directory bit; the low nine bits are the usual
/// owner/group/other `rwx` permissions. The record on disk is the raw
/// `u32`, so modes written by other tools round-trip unchanged.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(u32);

impl FileMode {
    /// The directory bit.
    pub const DIR: FileMode = FileMode(1 << 31);
    /// Mask of the permission bits.
    pub const PERM: FileMode = FileMode(0o777);
    /// Mask of the type bits (only the directory bit is modelled).
    pub const TYPE: FileMode = FileMode(1 << 31);

    pub const fn from_bits(bits: u32) -> Self {
        FileMode(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }

    pub const fn is_regular(self) -> bool {
        self.0 & Self::TYPE.0 == 0
    }

    /// Only the permission bits.
    pub const fn perm(self) -> FileMode {
        FileMode(self.0 & Self::PERM.0)
    }

    /// Only the type bits.
    pub const fn file_type(self) -> FileMode {
        FileMode(self.0 & Self::TYPE.0)
    }

    /// The same mode with the directory bit set.
    pub const fn with_dir(self) -> FileMode {
        FileMode(self.0 | Self::DIR.0)
    }
}

impl BitOr for FileMode {
    type Output = FileMode;

    fn bitor(self, rhs: FileMode) -> FileMode {
        FileMode(self.0 | rhs.0)
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        FileMode(bits)
    }
}

/// `ls -l` style: `drwxr-xr-x`, `-rw-r--r--`.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(10);
        out.push(if self.is_dir() { 'd' } else { '-' });
        const RWX: [char; 3] = ['r', 'w', 'x'];
        for shift in (0..9).rev() {
            let set = self.0 & (1 << shift) != 0;
            out.push(if set { RWX[2 - shift % 3] } else { '-' });
        }
        f.write_str(&out)
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMode({self} {:#o})", self.0 & !Self::DIR.0)
    }
}

bitflags! {
    /// Flags for [`StorageFs::open_file`](crate::StorageFs::open_file).
    ///
    /// With neither `WRITE_ONLY` nor `READ_WRITE` the handle is read-only.
    /// `READ_WRITE` wins if both access bits are given.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Open for writing only.
        const WRITE_ONLY = 1 << 0;
        /// Open for reading and writing.
        const READ_WRITE = 1 << 1;
        /// Every write goes to the end of the file.
        const APPEND = 1 << 2;
        /// Create the file if it does not exist.
        const CREATE = 1 << 3;
        /// With `CREATE`, fail if the path already exists.
        const EXCLUSIVE = 1 << 4;
        /// Discard existing content on open.
        const TRUNCATE = 1 << 5;
    }
}

impl OpenFlags {
    /// Open for reading only.
    pub const READ_ONLY: OpenFlags = OpenFlags::empty();

    /// Whether reads are permitted.
    pub fn can_read(self) -> bool {
        self.contains(OpenFlags::READ_WRITE) || !self.contains(OpenFlags::WRITE_ONLY)
    }

    /// Whether writes are permitted.
    pub fn can_write(self) -> bool {
        self.intersects(OpenFlags::WRITE_ONLY | OpenFlags::READ_WRITE)
    }

    /// Whether `sync`/`close` write the buffer back.
    pub fn has_write_intent(self) -> bool {
        self.can_write() || self.contains(OpenFlags::CREATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits() {
        let dir = FileMode::DIR | FileMode::from_bits(0o755);
        assert!(dir.is_dir());
        assert!(!dir.is_regular());
        assert_eq!(dir.perm().bits(), 0o755);
        assert_eq!(dir.file_type(), FileMode::DIR);

        let file = FileMode::from_bits(0o644);
        assert!(!file.is_dir());
        assert!(file.is_regular());
        assert_eq!(file.with_dir().bits(), (1 << 31) | 0o644);
    }

    #[test]
    fn mode_display() {
        assert_eq!(FileMode::from_bits(0o644).to_string(), "-rw-r--r--");
        assert_eq!((FileMode::DIR | FileMode::from(0o755)).to_string(), "drwxr-xr-x");
        assert_eq!(FileMode::from_bits(0).to_string(), "----------");
        assert_eq!(FileMode::from_bits(0o777).to_string(), "-rwxrwxrwx");
    }

    #[test]
    fn mode_serializes_as_raw_number() {
        let json = serde_json::to_string(&FileMode::from_bits(0o644)).unwrap();
        assert_eq!(json, "420");
        let back: FileMode = serde_json::from_str("2147484141").unwrap();
        assert!(back.is_dir());
        assert_eq!(back.perm().bits(), 0o755);
    }

    #[test]
    fn access_modes() {
        let ro = OpenFlags::READ_ONLY;
        assert!(ro.can_read() && !ro.can_write() && !ro.has_write_intent());

        let wo = OpenFlags::WRITE_ONLY;
        assert!(!wo.can_read() && wo.can_write());

        let rw = OpenFlags::READ_WRITE;
        assert!(rw.can_read() && rw.can_write());

        let both = OpenFlags::READ_WRITE | OpenFlags::WRITE_ONLY;
        assert!(both.can_read() && both.can_write());

        let ro_create = OpenFlags::CREATE;
        assert!(ro_create.can_read() && !ro_create.can_write());
        assert!(ro_create.has_write_intent());
    }
}
