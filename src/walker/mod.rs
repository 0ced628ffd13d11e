//! Paired tree walker
//!
//! Walks two directory trees in tandem and records every entry that is
//! not shared between them into two output [`FileTree`]s.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       TreeDiffer        │
//!                     │  - lstat both roots     │
//!                     │  - pick a Schedule      │
//!                     └───────────┬─────────────┘
//!                                 │
//!              ┌──────────────────┴──────────────────┐
//!              │                                     │
//!       ┌──────▼──────┐                       ┌──────▼──────┐
//!       │ Sequential  │                       │ WorkerPool  │
//!       │ (recursion) │                       │ (N threads) │
//!       └──────┬──────┘                       └──────┬──────┘
//!              └──────────────────┬──────────────────┘
//!                                 │  visit(item)
//!                     ┌───────────▼─────────────┐
//!                     │      PairedWalker       │
//!                     │  getdents64 + merge     │
//!                     │  lstat + capability     │
//!                     └─────────────────────────┘
//! ```

pub mod merge;
pub mod paired;
pub mod pool;
pub mod queue;
pub mod sequential;

pub use merge::{merge_listings, MergeResult, MergedName};
pub use paired::{DiffStats, DiffSummary, PairedWalker};
pub use pool::WorkerPool;
pub use queue::WorkItem;
pub use sequential::Sequential;

use crate::config::{DiffConfig, Strategy};
use crate::error::Result;
use crate::tree::FileTree;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Drives a [`PairedWalker`] from the root item until every reachable
/// item has been visited
pub trait Schedule {
    fn drive(&self, walker: &PairedWalker, root: WorkItem) -> Result<()>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Result of a completed diff
#[derive(Debug)]
pub struct DiffOutcome {
    /// Entries that exist only in, or differ in, the old tree
    pub old: FileTree,

    /// Entries that exist only in, or differ in, the new tree
    pub new: FileTree,

    pub stats: DiffSummary,
    pub duration: Duration,
}

/// Configured entry point for diffing two trees
pub struct TreeDiffer {
    config: DiffConfig,
    stats: Arc<DiffStats>,
}

impl TreeDiffer {
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            stats: Arc::new(DiffStats::default()),
        }
    }

    /// Live counters, readable while [`run`](Self::run) is in progress
    pub fn stats(&self) -> Arc<DiffStats> {
        Arc::clone(&self.stats)
    }

    /// Diff `old` against `new`
    ///
    /// Fails with [`DiffError::Config`](crate::DiffError::Config) before
    /// touching either root if the configuration is out of range.
    pub fn run(&self, old: &Path, new: &Path) -> Result<DiffOutcome> {
        self.config.validate()?;
        let start = Instant::now();

        let walker = PairedWalker::new(old, new, self.config.buffer_size)
            .with_stats(Arc::clone(&self.stats));
        let root = walker.root_item()?;

        let result = match self.config.strategy {
            Strategy::Sequential => execute(&Sequential, &walker, root),
            Strategy::WorkerPool => execute(
                &WorkerPool::new(self.config.worker_count, self.config.queue_size),
                &walker,
                root,
            ),
        };
        result?;

        let (old_tree, new_tree) = walker.into_trees();
        let stats = self.stats.summary();
        let duration = start.elapsed();

        info!(
            old_entries = old_tree.len() - 1,
            new_entries = new_tree.len() - 1,
            pruned = stats.pruned,
            dirs_listed = stats.dirs_listed,
            duration_ms = duration.as_millis() as u64,
            "Diff complete"
        );

        Ok(DiffOutcome {
            old: old_tree,
            new: new_tree,
            stats,
            duration,
        })
    }
}

fn execute<S: Schedule + ?Sized>(
    schedule: &S,
    walker: &PairedWalker,
    root: WorkItem,
) -> Result<()> {
    info!(schedule = schedule.name(), "Starting diff");
    schedule.drive(walker, root)
}

/// Diff two trees with the default configuration
///
/// Returns `(old, new)`: the entries that are not shared between the two
/// roots, as seen from each side.
pub fn diff_trees(old: &Path, new: &Path) -> Result<(FileTree, FileTree)> {
    let outcome = TreeDiffer::new(DiffConfig::default()).run(old, new)?;
    Ok((outcome.old, outcome.new))
}

/// Diff two trees with an explicit schedule and dirent buffer size
pub fn diff_trees_with<S: Schedule + ?Sized>(
    schedule: &S,
    old: &Path,
    new: &Path,
    buffer_size: usize,
) -> Result<(FileTree, FileTree)> {
    let walker = PairedWalker::new(old, new, buffer_size);
    let root = walker.root_item()?;
    execute(schedule, &walker, root)?;
    Ok(walker.into_trees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, DiffError};
    use crate::fs::DEFAULT_BUFFER_SIZE;
    use std::fs;

    #[test]
    fn test_differ_reports_stats() {
        let old = tempfile::tempdir().unwrap();
        let new = tempfile::tempdir().unwrap();
        fs::write(old.path().join("keep"), b"k").unwrap();
        fs::hard_link(old.path().join("keep"), new.path().join("keep")).unwrap();
        fs::write(new.path().join("added"), b"a").unwrap();

        let differ = TreeDiffer::new(DiffConfig::sequential());
        let outcome = differ.run(old.path(), new.path()).unwrap();

        assert_eq!(outcome.stats.pruned, 1);
        assert_eq!(outcome.stats.entries_captured, 1);
        assert_eq!(differ.stats().summary(), outcome.stats);
        assert!(outcome.old.is_empty());
        assert_eq!(outcome.new.len(), 2);
    }

    #[test]
    fn test_differ_rejects_invalid_config() {
        let config = DiffConfig {
            worker_count: 0,
            ..DiffConfig::default()
        };
        let differ = TreeDiffer::new(config);
        let err = differ
            .run(Path::new("/nonexistent-old"), Path::new("/nonexistent-new"))
            .unwrap_err();

        assert!(matches!(
            err,
            DiffError::Config(ConfigError::InvalidWorkerCount { count: 0, .. })
        ));
        assert_eq!(differ.stats().summary().dirs_listed, 0);
    }

    #[test]
    fn test_diff_trees_with_dyn_schedule() {
        let old = tempfile::tempdir().unwrap();
        let new = tempfile::tempdir().unwrap();
        fs::create_dir(new.path().join("d")).unwrap();

        let schedules: Vec<Box<dyn Schedule>> =
            vec![Box::new(Sequential), Box::new(WorkerPool::new(2, 16))];
        for schedule in &schedules {
            let (old_tree, new_tree) = diff_trees_with(
                schedule.as_ref(),
                old.path(),
                new.path(),
                DEFAULT_BUFFER_SIZE,
            )
            .unwrap();
            assert!(old_tree.is_empty(), "{}", schedule.name());
            assert!(new_tree.lookup(Path::new("/d")).is_some(), "{}", schedule.name());
        }
    }
}
