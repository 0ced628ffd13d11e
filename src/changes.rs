//! Change classification over two diffed trees
//!
//! Turns the `(old, new)` trees produced by the walker into an ordered
//! list of [`Change`]s. Entries only in `new` are additions, entries only
//! in `old` are deletions, and entries in both whose metadata differs are
//! modifications.

use crate::fs::types::StatRecord;
use crate::tree::{FileTree, NodeId};
use std::collections::BTreeMap;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Modify,
    Add,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            ChangeKind::Modify => "C",
            ChangeKind::Add => "A",
            ChangeKind::Delete => "D",
        };
        f.write_str(c)
    }
}

/// One changed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl Change {
    fn new(path: PathBuf, kind: ChangeKind) -> Self {
        Self { path, kind }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())
    }
}

/// Counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: u64,
    pub modified: u64,
    pub deleted: u64,
}

impl ChangeCounts {
    pub fn tally(changes: &[Change]) -> Self {
        let mut counts = Self::default();
        for change in changes {
            match change.kind {
                ChangeKind::Add => counts.added += 1,
                ChangeKind::Modify => counts.modified += 1,
                ChangeKind::Delete => counts.deleted += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.added + self.modified + self.deleted
    }
}

/// Classify the differences between `old` and `new`
///
/// Siblings are reported in name order. A directory with changes beneath
/// it is reported as modified (ahead of those changes) even when its own
/// metadata is unchanged, so its permissions can be restored on replay.
/// The root itself is never reported.
pub fn changes(old: &FileTree, new: &FileTree) -> Vec<Change> {
    let mut out = Vec::new();
    let ctx = Classifier { old, new };
    ctx.visit(new.root(), Some(old.root()), false, &mut out);
    out
}

struct Classifier<'a> {
    old: &'a FileTree,
    new: &'a FileTree,
}

impl Classifier<'_> {
    /// `reported` is true when `node` already has a record in `out`
    fn visit(
        &self,
        node: NodeId,
        old_node: Option<NodeId>,
        mut reported: bool,
        out: &mut Vec<Change>,
    ) {
        let Some(info) = self.new.get(node) else {
            return;
        };
        let entry_len = out.len();

        if old_node.is_none() {
            out.push(Change::new(self.new.path_of(node), ChangeKind::Add));
            reported = true;
        }

        // Old children only count when the new entry is still a directory
        let old_children: BTreeMap<&[u8], NodeId> = match old_node.and_then(|id| self.old.get(id)) {
            Some(old_info) if info.is_dir() => old_info
                .children()
                .map(|(name, id)| (name.as_bytes(), id))
                .collect(),
            _ => BTreeMap::new(),
        };

        let mut names: BTreeMap<&[u8], (Option<NodeId>, Option<NodeId>)> = BTreeMap::new();
        for (name, id) in info.children() {
            names.entry(name.as_bytes()).or_default().0 = Some(id);
        }
        for (name, id) in old_children {
            names.entry(name).or_default().1 = Some(id);
        }

        for (new_child, old_child) in names.into_values() {
            match (new_child, old_child) {
                (Some(new_child), old_child) => {
                    let mut child_reported = false;
                    if let Some(old_child) = old_child {
                        if self.modified(old_child, new_child) {
                            out.push(Change::new(self.new.path_of(new_child), ChangeKind::Modify));
                            child_reported = true;
                        }
                    }
                    self.visit(new_child, old_child, child_reported, out);
                }
                (None, Some(old_child)) => {
                    out.push(Change::new(self.old.path_of(old_child), ChangeKind::Delete));
                }
                (None, None) => {}
            }
        }

        let is_root = info.parent().is_none();
        if out.len() > entry_len && info.is_dir() && !reported && !is_root {
            out.insert(entry_len, Change::new(self.new.path_of(node), ChangeKind::Modify));
        }
    }

    fn modified(&self, old: NodeId, new: NodeId) -> bool {
        let (Some(old), Some(new)) = (self.old.get(old), self.new.get(new)) else {
            return false;
        };
        match (old.stat(), new.stat()) {
            (Some(a), Some(b)) => stat_differs(a, b) || old.capability() != new.capability(),
            _ => old.capability() != new.capability(),
        }
    }
}

/// Whether two entries differ in a way that matters for a layer
///
/// Inode, ctime and block counts are ignored since copying a file changes
/// them. Size and mtime are ignored for directories.
pub fn stat_differs(old: &StatRecord, new: &StatRecord) -> bool {
    if old.mode != new.mode || old.uid != new.uid || old.gid != new.gid || old.rdev != new.rdev {
        return true;
    }
    !old.is_dir() && (old.mtime != new.mtime || old.size != new.size)
}
