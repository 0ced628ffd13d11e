//! Metadata capture
//!
//! `lstat` plus a best-effort read of the `security.capability` extended
//! attribute. Symlinks are never followed: a layer diff has to see the
//! link itself.

use crate::error::{DiffError, Result};
use crate::fs::types::StatRecord;
use std::fs::Metadata;
use std::io;
use std::path::Path;
use tracing::trace;

/// Extended attribute holding Linux file capabilities
pub const CAPABILITY_XATTR: &str = "security.capability";

/// Stat record plus capability bytes for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub stat: StatRecord,
    pub capability: Option<Vec<u8>>,
}

/// `lstat` a path
pub fn lstat(path: &Path) -> Result<Metadata> {
    std::fs::symlink_metadata(path).map_err(|e| DiffError::io("stat", path, e))
}

/// `lstat` a path, treating "does not exist" as absence
pub fn lstat_if_exists(path: &Path) -> Result<Option<Metadata>> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DiffError::io("stat", path, e)),
    }
}

/// Capture stat and capability data for a path
pub fn capture(path: &Path) -> Result<Captured> {
    let meta = lstat(path)?;
    Ok(capture_from(path, &meta))
}

/// Capture from an already-obtained `lstat` result
pub fn capture_from(path: &Path, meta: &Metadata) -> Captured {
    Captured {
        stat: StatRecord::from_metadata(meta),
        capability: read_capability(path),
    }
}

/// Read `security.capability` without following symlinks
///
/// Every failure (no attribute, unsupported filesystem, entry gone)
/// comes back as `None`.
#[cfg(target_os = "linux")]
pub fn read_capability(path: &Path) -> Option<Vec<u8>> {
    match lgetxattr(path, CAPABILITY_XATTR) {
        Ok(value) => value,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "capability read failed");
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn read_capability(_path: &Path) -> Option<Vec<u8>> {
    None
}

/// Fetch one extended attribute, `Ok(None)` when it is not set
#[cfg(target_os = "linux")]
fn lgetxattr(path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let c_name = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"))?;

    loop {
        // SAFETY: both pointers are valid NUL-terminated strings; a null
        // buffer with size 0 asks only for the value length.
        let size = unsafe {
            libc::lgetxattr(c_path.as_ptr(), c_name.as_ptr(), std::ptr::null_mut(), 0)
        };
        if size < 0 {
            return absent_or_err(io::Error::last_os_error());
        }

        let mut value = vec![0u8; size as usize];
        if value.is_empty() {
            return Ok(Some(value));
        }

        // SAFETY: `value` is writable for exactly `value.len()` bytes.
        let read = unsafe {
            libc::lgetxattr(
                c_path.as_ptr(),
                c_name.as_ptr(),
                value.as_mut_ptr().cast(),
                value.len(),
            )
        };
        if read < 0 {
            let err = io::Error::last_os_error();
            // Attribute grew between the two calls
            if err.raw_os_error() == Some(libc::ERANGE) {
                continue;
            }
            return absent_or_err(err);
        }

        value.truncate(read as usize);
        return Ok(Some(value));
    }
}

#[cfg(target_os = "linux")]
fn absent_or_err(err: io::Error) -> io::Result<Option<Vec<u8>>> {
    if err.raw_os_error() == Some(libc::ENODATA) {
        Ok(None)
    } else {
        Err(err)
    }
}
