//! Paired walker - the per-directory step of a two-tree diff
//!
//! For one [`WorkItem`] the walker:
//! 1. records the entry in whichever output tree(s) it exists in
//! 2. stops if neither side is a directory
//! 3. lists each directory side with `getdents64`
//! 4. merge-joins the listings, pruning names whose inode matches
//! 5. `lstat`s the surviving children and returns them as new items
//!
//! Scheduling (recursion or a worker pool) is left to the caller.

use crate::error::{DiffError, Result};
use crate::fs::dirent::read_sorted;
use crate::fs::stat::{capture_from, lstat_if_exists};
use crate::fs::types::DirEntryRef;
use crate::tree::FileTree;
use crate::walker::merge::{merge_listings, MergedName};
use crate::walker::queue::WorkItem;
use parking_lot::Mutex;
use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Live counters for a running diff
#[derive(Debug, Default)]
pub struct DiffStats {
    /// Directories listed (each side counts once)
    pub dirs_listed: AtomicU64,

    /// Entries recorded into either tree
    pub entries_captured: AtomicU64,

    /// Names skipped because both sides share the inode
    pub pruned: AtomicU64,

    /// Listed entries that were gone by the time they were stat'd
    pub transient_absences: AtomicU64,

    /// Items processed inline because the queue was full
    pub inline_processed: AtomicU64,
}

impl DiffStats {
    fn record_listing(&self) {
        self.dirs_listed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_capture(&self) {
        self.entries_captured.fetch_add(1, Ordering::Relaxed);
    }

    fn record_pruned(&self, count: u64) {
        self.pruned.fetch_add(count, Ordering::Relaxed);
    }

    fn record_absence(&self) {
        self.transient_absences.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inline(&self) {
        self.inline_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
            entries_captured: self.entries_captured.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            transient_absences: self.transient_absences.load(Ordering::Relaxed),
            inline_processed: self.inline_processed.load(Ordering::Relaxed),
        }
    }
}

/// Final counter values of a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub dirs_listed: u64,
    pub entries_captured: u64,
    pub pruned: u64,
    pub transient_absences: u64,
    pub inline_processed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Shared state of one diff: both roots and both output trees
pub struct PairedWalker {
    left_root: PathBuf,
    right_root: PathBuf,
    left: Mutex<FileTree>,
    right: Mutex<FileTree>,
    buffer_size: usize,
    stats: Arc<DiffStats>,
}

impl PairedWalker {
    pub fn new(
        left_root: impl Into<PathBuf>,
        right_root: impl Into<PathBuf>,
        buffer_size: usize,
    ) -> Self {
        Self {
            left_root: left_root.into(),
            right_root: right_root.into(),
            left: Mutex::new(FileTree::new_root()),
            right: Mutex::new(FileTree::new_root()),
            buffer_size,
            stats: Arc::new(DiffStats::default()),
        }
    }

    /// Report into an externally owned counter set
    pub fn with_stats(mut self, stats: Arc<DiffStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &DiffStats {
        &self.stats
    }

    /// `lstat` both roots and build the synthetic root item
    pub fn root_item(&self) -> Result<WorkItem> {
        let left = stat_root(&self.left_root)?;
        let right = stat_root(&self.right_root)?;
        Ok(WorkItem::root(left, right))
    }

    /// Process one item, returning the child items to visit next
    pub fn visit(&self, item: &WorkItem) -> Result<Vec<WorkItem>> {
        if !item.is_root() {
            if let Some(meta) = &item.left {
                self.record(Side::Left, &item.path, meta)?;
            }
            if let Some(meta) = &item.right {
                self.record(Side::Right, &item.path, meta)?;
            }
        }

        let left_dir = item.left.as_ref().is_some_and(Metadata::is_dir);
        let right_dir = item.right.as_ref().is_some_and(Metadata::is_dir);

        // Leaves or absent on both sides
        if !left_dir && !right_dir {
            return Ok(Vec::new());
        }

        let left_names = if left_dir {
            self.list(Side::Left, &item.path)?
        } else {
            Vec::new()
        };
        let right_names = if right_dir {
            self.list(Side::Right, &item.path)?
        } else {
            Vec::new()
        };

        let same_device = match (&item.left, &item.right) {
            (Some(l), Some(r)) => left_dir && right_dir && l.dev() == r.dev(),
            _ => false,
        };

        let merged = merge_listings(&left_names, &right_names, same_device);
        if merged.pruned > 0 {
            self.stats.record_pruned(merged.pruned as u64);
            trace!(path = %item.path.display(), pruned = merged.pruned, "Pruned identical entries");
        }

        let mut children = Vec::with_capacity(merged.names.len());
        for name in &merged.names {
            if let Some(child) = self.child_item(&item.path, name)? {
                children.push(child);
            }
        }

        Ok(children)
    }

    /// Stat a merged name on the sides that listed it
    ///
    /// Returns `None` when it vanished from every side that listed it.
    fn child_item(&self, parent: &Path, name: &MergedName) -> Result<Option<WorkItem>> {
        let child = parent.join(&name.name);

        let left = if name.on_left {
            self.stat_child(Side::Left, &child)?
        } else {
            None
        };
        let right = if name.on_right {
            self.stat_child(Side::Right, &child)?
        } else {
            None
        };

        if left.is_none() && right.is_none() {
            return Ok(None);
        }
        Ok(Some(WorkItem::new(child, left, right)))
    }

    /// Hand back both trees once the walk is done
    pub fn into_trees(self) -> (FileTree, FileTree) {
        (self.left.into_inner(), self.right.into_inner())
    }

    fn root_dir(&self, side: Side) -> &Path {
        match side {
            Side::Left => &self.left_root,
            Side::Right => &self.right_root,
        }
    }

    fn tree(&self, side: Side) -> &Mutex<FileTree> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn list(&self, side: Side, rel: &Path) -> Result<Vec<DirEntryRef>> {
        let dir = host_path(self.root_dir(side), rel);
        let entries = read_sorted(&dir, self.buffer_size)?;
        self.stats.record_listing();
        debug!(side = ?side, path = %rel.display(), entries = entries.len(), "Listed directory");
        Ok(entries)
    }

    fn stat_child(&self, side: Side, rel: &Path) -> Result<Option<Metadata>> {
        let meta = lstat_if_exists(&host_path(self.root_dir(side), rel))?;
        if meta.is_none() {
            self.stats.record_absence();
            trace!(side = ?side, path = %rel.display(), "Entry vanished before stat");
        }
        Ok(meta)
    }

    fn record(&self, side: Side, rel: &Path, meta: &Metadata) -> Result<()> {
        let (parent_path, name) = match (rel.parent(), rel.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => {
                return Err(DiffError::MissingParent {
                    path: rel.to_path_buf(),
                })
            }
        };

        // Capability read happens outside the tree lock
        let captured = capture_from(&host_path(self.root_dir(side), rel), meta);

        let mut tree = self.tree(side).lock();
        let parent = tree
            .lookup(parent_path)
            .ok_or_else(|| DiffError::MissingParent {
                path: rel.to_path_buf(),
            })?;
        tree.insert_child(parent, name.to_os_string(), captured.stat, captured.capability)?;
        drop(tree);

        self.stats.record_capture();
        Ok(())
    }
}

/// Join a walk-relative path (`/a/b`) onto a root directory
fn host_path(root: &Path, rel: &Path) -> PathBuf {
    root.join(rel.strip_prefix("/").unwrap_or(rel))
}

fn stat_root(path: &Path) -> Result<Metadata> {
    std::fs::symlink_metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            DiffError::RootNotFound {
                path: path.to_path_buf(),
                source,
            }
        } else {
            DiffError::io("stat root", path, source)
        }
    })
}
