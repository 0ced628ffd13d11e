//! Error types for layer-diff
//!
//! This module defines the error hierarchy for a paired tree walk:
//! - Root resolution and filesystem I/O errors
//! - Raw directory-entry decoding errors
//! - Tree model invariant violations
//! - Configuration and worker pool errors
//!
//! An entry that vanishes between being listed and being stat'd is not an
//! error at all: the walker normalizes it to "absent on that side".

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a diff operation
#[derive(Error, Debug)]
pub enum DiffError {
    /// One of the two starting paths does not exist
    #[error("Root '{path}' not found: {source}")]
    RootNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A directory read or metadata capture failed
    #[error("Failed to {op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The caller required a non-empty listing and none was produced
    #[error("Directory '{path}' produced no entries")]
    EmptyListing { path: PathBuf },

    /// The kernel handed back a directory record we could not decode
    #[error("Malformed directory entry in '{path}': {source}")]
    MalformedDirent { path: PathBuf, source: DirentError },

    /// A child was reached before its parent was inserted
    #[error("No parent node for '{path}' - walk order violated")]
    MissingParent { path: PathBuf },

    /// Tree model errors
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

impl DiffError {
    /// Build an I/O error for the given operation and path
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DiffError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Path the error refers to, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            DiffError::RootNotFound { path, .. }
            | DiffError::Io { path, .. }
            | DiffError::EmptyListing { path }
            | DiffError::MalformedDirent { path, .. }
            | DiffError::MissingParent { path } => Some(path),
            _ => None,
        }
    }
}

/// Decoding errors for `linux_dirent64` record streams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirentError {
    /// Fewer bytes remain than a record header needs
    #[error("truncated record header at offset {offset} ({remaining} bytes left)")]
    Truncated { offset: usize, remaining: usize },

    /// d_reclen is smaller than the header or runs past the buffer
    #[error("invalid record length {reclen} at offset {offset} ({remaining} bytes left)")]
    BadRecordLength {
        offset: usize,
        reclen: usize,
        remaining: usize,
    },
}

/// Tree model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Node names must be a single non-empty path component
    #[error("Invalid node name '{name}'")]
    InvalidName { name: String },

    /// The parent id does not belong to this tree
    #[error("Unknown parent node {id}")]
    UnknownParent { id: usize },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Invalid directory-entry buffer size
    #[error("Invalid buffer size {size}: must be between {min} and {max} bytes")]
    InvalidBufferSize { size: usize, min: usize, max: usize },

    /// A root path argument is missing or empty
    #[error("Invalid root path '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be started
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Work queue send failed
    #[error("Failed to send work item: queue closed")]
    QueueSendFailed,
}

/// Result type alias for DiffError
pub type Result<T> = std::result::Result<T, DiffError>;
