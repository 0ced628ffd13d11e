//! Local filesystem access: raw directory listings and metadata capture

pub mod dirent;
pub mod stat;
pub mod types;

pub use dirent::{read_sorted, read_sorted_nonempty, DirentReader, DEFAULT_BUFFER_SIZE};
pub use stat::{capture, capture_from, lstat, lstat_if_exists, read_capability, Captured};
pub use types::{DirEntryRef, EntryType, StatRecord, Timestamp};
