//! Filesystem entry types and metadata records
//!
//! These types carry the portable subset of `lstat` data that the change
//! classifier compares, detached from any OS handle.

use std::ffi::OsString;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

/// Type of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryType {
    /// Regular file
    File = 0,
    /// Directory
    Directory = 1,
    /// Symbolic link
    Symlink = 2,
    /// Block device
    BlockDevice = 3,
    /// Character device
    CharDevice = 4,
    /// Named pipe (FIFO)
    Fifo = 5,
    /// Unix socket
    Socket = 6,
    /// Unknown type
    Unknown = 255,
}

impl EntryType {
    /// Convert from the `S_IFMT` bits of a mode
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o100000 => EntryType::File,
            0o040000 => EntryType::Directory,
            0o120000 => EntryType::Symlink,
            0o060000 => EntryType::BlockDevice,
            0o020000 => EntryType::CharDevice,
            0o010000 => EntryType::Fifo,
            0o140000 => EntryType::Socket,
            _ => EntryType::Unknown,
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryType::Directory
    }

    /// Check if this is a block or character special file
    pub fn is_device(&self) -> bool {
        matches!(self, EntryType::BlockDevice | EntryType::CharDevice)
    }
}

/// Modification time with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    /// Seconds since the Unix epoch (may be negative)
    pub secs: i64,
    /// Nanoseconds within the second
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

/// Portable stat snapshot of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatRecord {
    /// File size in bytes
    pub size: u64,

    /// File mode (type + permissions)
    pub mode: u32,

    /// User ID
    pub uid: u32,

    /// Group ID
    pub gid: u32,

    /// Device number of a block/char special file, zero for everything else
    pub rdev: u64,

    /// Last modification time
    pub mtime: Timestamp,

    /// Inode number at capture time
    pub inode: u64,

    /// Device holding the inode at capture time
    pub device: u64,
}

impl StatRecord {
    /// Build a record from `lstat` metadata
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mode = meta.mode();
        let rdev = if EntryType::from_mode(mode).is_device() {
            meta.rdev()
        } else {
            0
        };

        Self {
            size: meta.size(),
            mode,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev,
            mtime: Timestamp::new(meta.mtime(), meta.mtime_nsec() as u32),
            inode: meta.ino(),
            device: meta.dev(),
        }
    }

    /// Get the entry type from mode
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_mode(self.mode)
    }

    /// Check if this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.entry_type().is_dir()
    }

    /// Major device number (zero unless block/char special)
    pub fn major(&self) -> u32 {
        libc::major(self.rdev as libc::dev_t) as u32
    }

    /// Minor device number (zero unless block/char special)
    pub fn minor(&self) -> u32 {
        libc::minor(self.rdev as libc::dev_t) as u32
    }
}

/// A `(name, inode)` pair from one raw directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryRef {
    /// Entry name (not full path)
    pub name: OsString,

    /// Inode number reported by the directory
    pub inode: u64,
}

impl DirEntryRef {
    pub fn new(name: impl Into<OsString>, inode: u64) -> Self {
        Self {
            name: name.into(),
            inode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_from_mode() {
        assert_eq!(EntryType::from_mode(0o100644), EntryType::File);
        assert_eq!(EntryType::from_mode(0o040755), EntryType::Directory);
        assert_eq!(EntryType::from_mode(0o120777), EntryType::Symlink);
        assert_eq!(EntryType::from_mode(0o020666), EntryType::CharDevice);
        assert_eq!(EntryType::from_mode(0o060660), EntryType::BlockDevice);
        assert_eq!(EntryType::from_mode(0), EntryType::Unknown);
        assert!(EntryType::CharDevice.is_device());
        assert!(!EntryType::Fifo.is_device());
    }

    #[test]
    fn test_timestamp_order() {
        assert!(Timestamp::new(1, 1) > Timestamp::new(1, 0));
        assert!(Timestamp::new(-1, 999) < Timestamp::new(0, 0));
        assert_eq!(Timestamp::default(), Timestamp::new(0, 0));
    }

    #[test]
    fn test_stat_record_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, b"hello").unwrap();

        let meta = std::fs::symlink_metadata(&file).unwrap();
        let record = StatRecord::from_metadata(&meta);
        assert_eq!(record.size, 5);
        assert_eq!(record.entry_type(), EntryType::File);
        assert_eq!(record.rdev, 0);
        assert_eq!(record.major(), 0);
        assert_eq!(record.inode, meta.ino());

        let dir_record = StatRecord::from_metadata(&std::fs::symlink_metadata(dir.path()).unwrap());
        assert!(dir_record.is_dir());
    }

    #[test]
    fn test_char_device_keeps_rdev() {
        // /dev/null is 1:3 on Linux
        if let Ok(meta) = std::fs::symlink_metadata("/dev/null") {
            let record = StatRecord::from_metadata(&meta);
            assert_eq!(record.entry_type(), EntryType::CharDevice);
            assert_ne!(record.rdev, 0);
            assert_eq!(record.major(), 1);
            assert_eq!(record.minor(), 3);
        }
    }
}
