//! Raw directory reader
//!
//! Lists a directory with `getdents64` instead of `readdir`, keeping only
//! the `(name, inode)` pair of each record. The kernel fills a fixed-size
//! buffer with packed `linux_dirent64` records:
//!
//! ```text
//! offset  size  field
//! 0       8     d_ino
//! 8       8     d_off
//! 16      2     d_reclen   (length of this whole record, padded)
//! 18      1     d_type
//! 19      ..    d_name     (NUL-terminated, padded up to d_reclen)
//! ```
//!
//! Records are decoded with checked slicing only; a record length that
//! does not fit the buffer is reported as [`DirentError`].

use crate::error::{DiffError, DirentError, Result};
use crate::fs::types::DirEntryRef;
use std::ffi::OsStr;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::trace;

/// Default buffer handed to each `getdents64` call
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Size of the fixed part of a `linux_dirent64` record
pub const DIRENT64_HEADER_LEN: usize = 19;

/// Smallest buffer that holds one record with a 255-byte name
///
/// The kernel pads each record to 8 bytes and fails with `EINVAL` when
/// the next record does not fit.
pub const MIN_BUFFER_SIZE: usize = (DIRENT64_HEADER_LEN + 255 + 1 + 7) & !7;

const INO_OFFSET: usize = 0;
const RECLEN_OFFSET: usize = 16;

/// Decode every record in `buf`, appending named entries to `out`
///
/// Skips records with inode 0 and the `.`/`..` entries. Returns the number
/// of bytes consumed, which is always `buf.len()` on success.
pub fn parse_dirents(
    buf: &[u8],
    out: &mut Vec<DirEntryRef>,
) -> std::result::Result<usize, DirentError> {
    let mut offset = 0;

    while offset < buf.len() {
        let record = &buf[offset..];
        let remaining = record.len();

        let header = record
            .get(..DIRENT64_HEADER_LEN)
            .ok_or(DirentError::Truncated { offset, remaining })?;

        let truncated = DirentError::Truncated { offset, remaining };
        let inode = read_u64(header, INO_OFFSET).ok_or_else(|| truncated.clone())?;
        let reclen = read_u16(header, RECLEN_OFFSET).ok_or(truncated)? as usize;

        if reclen < DIRENT64_HEADER_LEN || reclen > remaining {
            return Err(DirentError::BadRecordLength {
                offset,
                reclen,
                remaining,
            });
        }

        let name_field = &record[DIRENT64_HEADER_LEN..reclen];
        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_field.len());
        let name = &name_field[..name_len];

        offset += reclen;

        // Deleted slot
        if inode == 0 || name.is_empty() {
            continue;
        }
        if name == b"." || name == b".." {
            continue;
        }

        out.push(DirEntryRef::new(OsStr::from_bytes(name), inode));
    }

    Ok(offset)
}

fn read_u64(buf: &[u8], at: usize) -> Option<u64> {
    let bytes: [u8; 8] = buf.get(at..at + 8)?.try_into().ok()?;
    Some(u64::from_ne_bytes(bytes))
}

fn read_u16(buf: &[u8], at: usize) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(at..at + 2)?.try_into().ok()?;
    Some(u16::from_ne_bytes(bytes))
}

/// Sort entries by raw name bytes
pub fn sort_entries(entries: &mut [DirEntryRef]) {
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
}

/// An open directory read through repeated `getdents64` calls
pub struct DirentReader {
    dir: File,
    buf: Vec<u8>,
}

impl DirentReader {
    /// Open a directory for raw listing
    pub fn open(path: &Path, buffer_size: usize) -> std::io::Result<Self> {
        use std::os::unix::fs::OpenOptionsExt;

        let dir = std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY | libc::O_CLOEXEC)
            .open(path)?;

        Ok(Self {
            dir,
            buf: vec![0u8; buffer_size.max(MIN_BUFFER_SIZE)],
        })
    }

    /// Refill the buffer, returning how many bytes the kernel wrote
    ///
    /// Zero means end of directory.
    #[cfg(target_os = "linux")]
    fn fill(&mut self) -> std::io::Result<usize> {
        use std::os::unix::io::AsRawFd;

        loop {
            // SAFETY: the pointer and length describe our own writable buffer;
            // the kernel writes at most `buf.len()` bytes into it.
            let n = unsafe {
                libc::syscall(
                    libc::SYS_getdents64,
                    self.dir.as_raw_fd(),
                    self.buf.as_mut_ptr(),
                    self.buf.len(),
                )
            };

            if n >= 0 {
                return Ok(n as usize);
            }

            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Read every entry until end of stream (unsorted)
    #[cfg(target_os = "linux")]
    pub fn read_all(mut self, path: &Path) -> Result<Vec<DirEntryRef>> {
        let mut entries = Vec::with_capacity(64);
        let mut refills = 0usize;

        loop {
            let filled = self
                .fill()
                .map_err(|e| DiffError::io("read directory", path, e))?;
            if filled == 0 {
                break;
            }
            refills += 1;

            parse_dirents(&self.buf[..filled], &mut entries).map_err(|source| {
                DiffError::MalformedDirent {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        }

        trace!(path = %path.display(), entries = entries.len(), refills, "getdents64 drained");
        Ok(entries)
    }

    /// Read every entry until end of stream (unsorted)
    #[cfg(not(target_os = "linux"))]
    pub fn read_all(self, path: &Path) -> Result<Vec<DirEntryRef>> {
        use std::os::unix::fs::DirEntryExt;

        drop(self);
        let mut entries = Vec::new();
        let iter = std::fs::read_dir(path).map_err(|e| DiffError::io("read directory", path, e))?;
        for entry in iter {
            let entry = entry.map_err(|e| DiffError::io("read directory", path, e))?;
            entries.push(DirEntryRef::new(entry.file_name(), entry.ino()));
        }
        Ok(entries)
    }
}

/// List a directory, sorted by name bytes; an empty directory is fine
pub fn read_sorted(path: &Path, buffer_size: usize) -> Result<Vec<DirEntryRef>> {
    let reader = DirentReader::open(path, buffer_size)
        .map_err(|e| DiffError::io("open directory", path, e))?;
    let mut entries = reader.read_all(path)?;
    sort_entries(&mut entries);
    Ok(entries)
}

/// List a directory that must contain at least one entry
pub fn read_sorted_nonempty(path: &Path, buffer_size: usize) -> Result<Vec<DirEntryRef>> {
    let entries = read_sorted(path, buffer_size)?;
    if entries.is_empty() {
        return Err(DiffError::EmptyListing {
            path: path.to_path_buf(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode one record the way the kernel lays it out (8-byte aligned)
    fn record(inode: u64, name: &[u8]) -> Vec<u8> {
        let unpadded = DIRENT64_HEADER_LEN + name.len() + 1;
        let reclen = (unpadded + 7) & !7;
        let mut buf = vec![0u8; reclen];
        buf[0..8].copy_from_slice(&inode.to_ne_bytes());
        buf[8..16].copy_from_slice(&0i64.to_ne_bytes());
        buf[16..18].copy_from_slice(&(reclen as u16).to_ne_bytes());
        buf[18] = libc::DT_REG;
        buf[19..19 + name.len()].copy_from_slice(name);
        buf
    }

    fn names(entries: &[DirEntryRef]) -> Vec<&[u8]> {
        entries.iter().map(|e| e.name.as_bytes()).collect()
    }

    #[test]
    fn test_parse_filters_dots_and_deleted() {
        let mut buf = Vec::new();
        buf.extend(record(2, b"."));
        buf.extend(record(1, b".."));
        buf.extend(record(0, b"deleted"));
        buf.extend(record(42, b"etc"));
        buf.extend(record(43, b"usr"));

        let mut out = Vec::new();
        let consumed = parse_dirents(&buf, &mut out).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(names(&out), vec![&b"etc"[..], &b"usr"[..]]);
        assert_eq!(out[0].inode, 42);
    }

    #[test]
    fn test_parse_appends_across_refills() {
        let mut out = Vec::new();
        parse_dirents(&record(10, b"a"), &mut out).unwrap();
        parse_dirents(&record(11, b"b"), &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], DirEntryRef::new("b", 11));
    }

    #[test]
    fn test_parse_rejects_truncated_header() {
        let mut buf = record(5, b"ok");
        let good_len = buf.len();
        buf.extend_from_slice(&[0u8; 7]);

        let mut out = Vec::new();
        let err = parse_dirents(&buf, &mut out).unwrap_err();
        assert_eq!(
            err,
            DirentError::Truncated {
                offset: good_len,
                remaining: 7
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_reclen() {
        let mut buf = record(5, b"name");
        buf[16..18].copy_from_slice(&4u16.to_ne_bytes());
        let mut out = Vec::new();
        assert!(matches!(
            parse_dirents(&buf, &mut out),
            Err(DirentError::BadRecordLength { reclen: 4, .. })
        ));

        let mut buf = record(5, b"name");
        buf[16..18].copy_from_slice(&512u16.to_ne_bytes());
        assert!(matches!(
            parse_dirents(&buf, &mut out),
            Err(DirentError::BadRecordLength { reclen: 512, .. })
        ));
    }

    #[test]
    fn test_parse_name_without_terminator() {
        // Name fills the padded record exactly with no NUL
        let mut buf = vec![0u8; 24];
        buf[0..8].copy_from_slice(&9u64.to_ne_bytes());
        buf[16..18].copy_from_slice(&24u16.to_ne_bytes());
        buf[19..24].copy_from_slice(b"abcde");

        let mut out = Vec::new();
        parse_dirents(&buf, &mut out).unwrap();
        assert_eq!(names(&out), vec![&b"abcde"[..]]);
    }

    #[test]
    fn test_sort_is_bytewise() {
        let mut entries = vec![
            DirEntryRef::new("b", 1),
            DirEntryRef::new("B", 2),
            DirEntryRef::new("a", 3),
            DirEntryRef::new("_", 4),
        ];
        sort_entries(&mut entries);
        assert_eq!(names(&entries), vec![&b"B"[..], &b"_"[..], &b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn test_read_sorted_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha", "Mid"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let entries = read_sorted(dir.path(), DEFAULT_BUFFER_SIZE).unwrap();
        assert_eq!(
            names(&entries),
            vec![&b"Mid"[..], &b"alpha"[..], &b"sub"[..], &b"zeta"[..]]
        );

        use std::os::unix::fs::MetadataExt;
        let ino = std::fs::symlink_metadata(dir.path().join("alpha")).unwrap().ino();
        assert_eq!(entries[1].inode, ino);
    }

    #[test]
    fn test_read_many_entries_with_small_buffer() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..500 {
            std::fs::write(dir.path().join(format!("file-{i:04}")), b"").unwrap();
        }

        let entries = read_sorted(dir.path(), 1024).unwrap();
        assert_eq!(entries.len(), 500);
        assert_eq!(entries[0].name, "file-0000");
        assert_eq!(entries[499].name, "file-0499");
    }

    #[test]
    fn test_tiny_buffer_fits_longest_name() {
        assert_eq!(MIN_BUFFER_SIZE, record(1, &[b'n'; 255]).len());

        let dir = tempfile::tempdir().unwrap();
        let long = "n".repeat(255);
        std::fs::write(dir.path().join(&long), b"").unwrap();
        std::fs::write(dir.path().join("short"), b"").unwrap();

        for size in [0, 1, DIRENT64_HEADER_LEN + 256] {
            let entries = read_sorted(dir.path(), size).unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].name, long.as_str());
        }
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_sorted(dir.path(), DEFAULT_BUFFER_SIZE).unwrap().is_empty());

        let err = read_sorted_nonempty(dir.path(), DEFAULT_BUFFER_SIZE).unwrap_err();
        assert!(matches!(err, DiffError::EmptyListing { .. }));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_sorted(&dir.path().join("nope"), DEFAULT_BUFFER_SIZE).unwrap_err();
        assert!(matches!(err, DiffError::Io { op: "open directory", .. }));
    }
}
