//! layer-diff - change-set between two directory trees
//!
//! Computes which filesystem entries differ between an old and a new
//! directory tree, such as a writable container layer and its parent, or
//! two snapshots of the same root.
//!
//! # Features
//!
//! - **Inode Pruning**: Subtrees whose entry has the same inode on both
//!   sides (same filesystem) are skipped without being read, so shared
//!   hard-linked or bind-mounted content costs one listing entry.
//!
//! - **Raw Directory Reads**: Listings come straight from `getdents64`
//!   with a bounds-checked record parser.
//!
//! - **Parallel Walking**: A bounded worker pool with inline processing
//!   under backpressure, or a plain sequential walk.
//!
//! - **Change Classification**: The two resulting trees are turned into
//!   an ordered Add / Modify / Delete list.
//!
//! # Architecture
//!
//! ```text
//!      OLD root                         NEW root
//!         │                                │
//!         └──────────────┬─────────────────┘
//!                        │ getdents64 + lstat
//!                        ▼
//!            ┌──────────────────────────┐
//!            │   Paired walker          │
//!            │  - merge-join listings   │
//!            │  - prune equal inodes    │
//!            └────────────┬─────────────┘
//!                         │
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!        old FileTree           new FileTree
//!              └──────────┬──────────┘
//!                         ▼
//!                  changes(old, new)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use layer_diff::{changes, diff_trees};
//! use std::path::Path;
//!
//! let (old, new) = diff_trees(Path::new("/layers/base"), Path::new("/layers/rw"))?;
//! for change in changes(&old, &new) {
//!     println!("{change}");
//! }
//! # Ok::<(), layer_diff::DiffError>(())
//! ```

pub mod changes;
pub mod config;
pub mod error;
pub mod fs;
pub mod progress;
pub mod tree;
pub mod walker;

pub use changes::{changes, Change, ChangeKind};
pub use config::{CliArgs, DiffConfig, Strategy};
pub use error::{DiffError, Result};
pub use tree::{FileNode, FileTree, NodeId};
pub use walker::{
    diff_trees, diff_trees_with, DiffOutcome, Schedule, Sequential, TreeDiffer, WorkerPool,
};
