//! Configuration types for layer-diff
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::fs::DEFAULT_BUFFER_SIZE;
use crate::walker::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 256;

/// Minimum queue size
const MIN_QUEUE_SIZE: usize = 16;

/// Directory-entry buffer limits (bytes)
const MIN_BUFFER_SIZE: usize = 1024;
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Compute the change-set between two directory trees
#[derive(Parser, Debug, Clone)]
#[command(
    name = "layer-diff",
    version,
    about = "Compute the change-set between two directory trees",
    long_about = "Walks two directory trees in tandem, skipping subtrees that share the same \
                  inode on both sides, and prints what was added, changed or deleted.\n\n\
                  Directory entries are read with getdents64 and every differing entry is \
                  captured with lstat plus its security.capability attribute.\n\n\
                  The change list goes to stdout. Progress, the header and the summary \
                  go to stderr.",
    after_help = "EXAMPLES:\n    \
        layer-diff /var/lib/layers/base /var/lib/layers/rw\n    \
        layer-diff old/ new/ -w 8\n    \
        layer-diff old/ new/ --sequential --summary-only"
)]
pub struct CliArgs {
    /// Old (lower / parent) tree
    #[arg(value_name = "OLD")]
    pub old: PathBuf,

    /// New (upper / changed) tree
    #[arg(value_name = "NEW")]
    pub new: PathBuf,

    /// Number of worker threads
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Work queue size (items held before processing inline)
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_name = "NUM")]
    pub queue_size: usize,

    /// Directory-entry read buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE, value_name = "BYTES")]
    pub buffer_size: usize,

    /// Walk on the calling thread instead of a worker pool
    #[arg(long)]
    pub sequential: bool,

    /// Quiet mode - suppress progress, header and summary (all on stderr)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print only the summary, not the individual changes
    #[arg(long)]
    pub summary_only: bool,
}

/// How directory items are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Depth-first recursion on the calling thread
    Sequential,

    /// Bounded pool of worker threads
    WorkerPool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Number of worker threads (worker pool only)
    pub worker_count: usize,

    /// Work queue capacity
    pub queue_size: usize,

    /// getdents64 buffer size
    pub buffer_size: usize,

    /// Scheduling strategy
    pub strategy: Strategy,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,

    /// Skip the per-change listing
    pub summary_only: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_CAPACITY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            strategy: Strategy::WorkerPool,
            show_progress: false,
            verbose: false,
            summary_only: false,
        }
    }
}

impl DiffConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        validate_root(&args.old)?;
        validate_root(&args.new)?;

        let config = Self {
            worker_count: args.workers,
            queue_size: args.queue_size,
            buffer_size: args.buffer_size,
            strategy: if args.sequential {
                Strategy::Sequential
            } else {
                Strategy::WorkerPool
            },
            show_progress: !args.quiet,
            verbose: args.verbose,
            summary_only: args.summary_only,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        if self.queue_size < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: self.queue_size,
                min: MIN_QUEUE_SIZE,
            });
        }

        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(ConfigError::InvalidBufferSize {
                size: self.buffer_size,
                min: MIN_BUFFER_SIZE,
                max: MAX_BUFFER_SIZE,
            });
        }

        Ok(())
    }

    /// Config that walks on the calling thread
    pub fn sequential() -> Self {
        Self {
            strategy: Strategy::Sequential,
            ..Self::default()
        }
    }
}

// Existence is checked later by the walker, which reports RootNotFound
fn validate_root(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidRoot {
            path: path.to_path_buf(),
            reason: "path is empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["layer-diff", "/old", "/new"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = DiffConfig::from_args(&args(&[])).unwrap();
        assert_eq!(config.worker_count, DEFAULT_WORKERS);
        assert_eq!(config.queue_size, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.strategy, Strategy::WorkerPool);
        assert!(config.show_progress);
        assert!(!config.verbose);
        assert!(!config.summary_only);
    }

    #[test]
    fn test_flags() {
        let cli = args(&["--sequential", "-q", "-v", "-w", "8", "--summary-only"]);
        let config = DiffConfig::from_args(&cli).unwrap();
        assert_eq!(config.strategy, Strategy::Sequential);
        assert!(config.verbose);
        assert_eq!(config.worker_count, 8);
        assert!(!config.show_progress);
        assert!(config.summary_only);
    }

    #[test]
    fn test_invalid_workers() {
        let err = DiffConfig::from_args(&args(&["-w", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 0, .. }));

        let err = DiffConfig::from_args(&args(&["-w", "1000"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 1000, max: 256 }));
    }

    #[test]
    fn test_invalid_queue_and_buffer() {
        let err = DiffConfig::from_args(&args(&["--queue-size", "2"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQueueSize { size: 2, .. }));

        let err = DiffConfig::from_args(&args(&["--buffer-size", "512"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBufferSize { size: 512, .. }));
    }

    #[test]
    fn test_empty_root_rejected() {
        let mut cli = args(&[]);
        cli.old = PathBuf::new();
        let err = DiffConfig::from_args(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoot { .. }));
    }

    #[test]
    fn test_library_default_is_valid() {
        DiffConfig::default().validate().unwrap();
        assert_eq!(DiffConfig::sequential().strategy, Strategy::Sequential);
    }
}
