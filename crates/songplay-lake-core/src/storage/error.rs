//! Errors raised by the storage layer.
//!
//! Every variant that touches the filesystem carries the absolute path it
//! was working on, so a failed run can be traced back to a single input file
//! or output partition.

use std::{error::Error, fmt, io};

use snafu::{Backtrace, prelude::*};

/// Raw failure reported by a backend, before path context is attached.
#[derive(Debug)]
pub enum BackendError {
    /// Local filesystem failure.
    Local(io::Error),
}

impl BackendError {
    /// `io::ErrorKind` of the underlying failure.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            BackendError::Local(e) => e.kind(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "filesystem: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Storage failures seen by ingestion and the Parquet sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// An input root, input file or staged directory is missing.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// Missing path.
        path: String,
        /// Backend failure.
        source: BackendError,
        /// Captured at the failure site.
        backtrace: Backtrace,
    },

    /// A staged table could not be moved into place because its target
    /// directory still exists.
    #[snafu(display("Path already exists: {path}"))]
    AlreadyExists {
        /// Occupied target.
        path: String,
        /// Captured at the failure site.
        backtrace: Backtrace,
    },

    /// Any other read, write, sync or rename failure.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// Path being read or written.
        path: String,
        /// Backend failure.
        source: BackendError,
        /// Captured at the failure site.
        backtrace: Backtrace,
    },

    /// An input glob does not compile.
    #[snafu(display("Invalid input pattern '{pattern}': {source}"))]
    InvalidPattern {
        /// Pattern after the escaped input root was prepended.
        pattern: String,
        /// Glob compiler error, including the offending position.
        source: glob::PatternError,
        /// Captured at the failure site.
        backtrace: Backtrace,
    },

    /// The location string names a backend this build cannot talk to.
    #[snafu(display("Unsupported storage location '{location}': {reason}"))]
    UnsupportedBackend {
        /// Location as supplied in config or on the command line.
        location: String,
        /// Why it was rejected.
        reason: String,
    },
}
