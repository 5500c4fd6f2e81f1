//! Storage backend abstraction.
//!
//! This module centralizes filesystem access for the pipelines: resolving
//! input globs under an input root, reading raw record files, committing
//! Parquet part files through a hidden in-progress name, and the directory moves
//! used to promote a fully staged table over its previous version.
//!
//! Only the local filesystem is supported. Callers always address data as a
//! [`StorageLocation`] plus a relative path so that an object-store backend
//! can be added without touching the pipelines.

use std::{
    io,
    path::{Path, PathBuf},
};

use snafu::{IntoError, prelude::*};
use tokio::fs;

pub mod error;
pub mod layout;
pub mod output;

pub use error::{BackendError, StorageError};
pub(crate) use error::{
    AlreadyExistsSnafu, InvalidPatternSnafu, NotFoundSnafu, OtherIoSnafu, UnsupportedBackendSnafu,
};
pub use output::{OutputSink, open_output_sink};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Root of a storage backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// A directory on the local filesystem.
    Local(PathBuf),
}

impl StorageLocation {
    /// Creates a new `StorageLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        StorageLocation::Local(root.into())
    }

    /// Parse a user-facing location string.
    ///
    /// Plain paths map to [`StorageLocation::Local`]. URL-style locations
    /// (`s3://...`, `s3a://...`, `gs://...`) are rejected because no remote
    /// backend is compiled in.
    pub fn parse(location: &str) -> StorageResult<Self> {
        let trimmed = location.trim();
        ensure!(
            !trimmed.is_empty(),
            UnsupportedBackendSnafu {
                location,
                reason: "location is empty",
            }
        );

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return UnsupportedBackendSnafu {
                location,
                reason: format!("no backend for scheme '{scheme}'"),
            }
            .fail();
        }

        Ok(StorageLocation::Local(PathBuf::from(trimmed)))
    }

    /// Location of `rel` under this root.
    pub fn child(&self, rel: impl AsRef<Path>) -> Self {
        match self {
            StorageLocation::Local(root) => StorageLocation::Local(root.join(rel)),
        }
    }

    /// Human-readable form of the root, for logs and reports.
    pub fn display(&self) -> String {
        match self {
            StorageLocation::Local(root) => root.display().to_string(),
        }
    }
}

/// Join a location with a relative path into an absolute local path.
pub(crate) fn join_local(location: &StorageLocation, rel: &Path) -> PathBuf {
    match location {
        StorageLocation::Local(root) => root.join(rel),
    }
}

pub(crate) async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

fn map_io(e: io::Error, path: &Path) -> StorageError {
    let path = path.display().to_string();
    if e.kind() == io::ErrorKind::NotFound {
        NotFoundSnafu { path }.into_error(BackendError::Local(e))
    } else {
        OtherIoSnafu { path }.into_error(BackendError::Local(e))
    }
}

/// Read the full contents of a file at `rel_path` within `location`.
///
/// Errors:
/// - If the file does not exist this returns `StorageError::NotFound`.
/// - On any other I/O error this returns `StorageError::OtherIo`.
pub async fn read_all_bytes(location: &StorageLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            fs::read(&abs).await.map_err(|e| map_io(e, &abs))
        }
    }
}

/// List files under `location` matching the glob `pattern`.
///
/// `pattern` is relative to the root (for example `log_data/*/*/*.json`).
/// Glob metacharacters in the root itself are escaped. Only regular files
/// are returned, as paths relative to the root, sorted lexicographically so
/// that the position of each file is stable for a given file set.
///
/// Hidden entries are skipped: wildcards never match a leading `.`, and any
/// path below the root with a component starting with `.` or `_` (for
/// example `_SUCCESS` or `.ipynb_checkpoints/`) is ignored.
pub async fn list_matching(location: &StorageLocation, pattern: &str) -> StorageResult<Vec<PathBuf>> {
    match location {
        StorageLocation::Local(root) => {
            let root = fs::canonicalize(root).await.map_err(|e| map_io(e, root))?;

            let full = format!(
                "{}/{}",
                glob::Pattern::escape(&root.to_string_lossy()),
                pattern.trim_start_matches('/')
            );
            let options = glob::MatchOptions {
                require_literal_leading_dot: true,
                ..glob::MatchOptions::new()
            };
            let paths = glob::glob_with(&full, options).context(InvalidPatternSnafu {
                pattern: full.clone(),
            })?;

            let mut out = Vec::new();
            for entry in paths {
                let path = entry.map_err(|e| {
                    let path = e.path().to_path_buf();
                    map_io(io::Error::from(e), &path)
                })?;
                if !path.is_file() {
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(&root) {
                    if !is_hidden(rel) {
                        out.push(rel.to_path_buf());
                    }
                }
            }
            out.sort();
            Ok(out)
        }
    }
}

fn is_hidden(rel: &Path) -> bool {
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name.starts_with('_'))
    })
}

/// Remove the directory at `rel_path` and everything below it.
///
/// A missing directory is not an error.
pub async fn remove_dir_all_if_exists(location: &StorageLocation, rel_path: &Path) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            match fs::remove_dir_all(&abs).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
                    path: abs.display().to_string(),
                }),
            }
        }
    }
}

/// Rename directory `from` to `to` (both relative to `location`).
///
/// The parent of `to` is created if needed; `to` itself must not exist
/// (`StorageError::AlreadyExists`).
pub async fn rename_dir(location: &StorageLocation, from: &Path, to: &Path) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let src = join_local(location, from);
            let dst = join_local(location, to);
            ensure!(
                !exists(location, to).await?,
                AlreadyExistsSnafu {
                    path: dst.display().to_string(),
                }
            );
            create_parent_dir(&dst).await?;
            fs::rename(&src, &dst).await.map_err(|e| map_io(e, &src))
        }
    }
}

/// Create the directory at `rel_path` and any missing parents.
pub async fn create_dir_all(location: &StorageLocation, rel_path: &Path) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            fs::create_dir_all(&abs)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: abs.display().to_string(),
                })
        }
    }
}

/// Remove the directory at `rel_path` if it exists and is empty.
///
/// Returns whether the directory was removed.
pub async fn remove_dir_if_empty(location: &StorageLocation, rel_path: &Path) -> StorageResult<bool> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            let mut entries = match fs::read_dir(&abs).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(map_io(e, &abs)),
            };
            if entries
                .next_entry()
                .await
                .map_err(|e| map_io(e, &abs))?
                .is_some()
            {
                return Ok(false);
            }
            fs::remove_dir(&abs).await.map_err(|e| map_io(e, &abs))?;
            Ok(true)
        }
    }
}

/// Whether anything exists at `rel_path`.
pub async fn exists(location: &StorageLocation, rel_path: &Path) -> StorageResult<bool> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            fs::try_exists(&abs)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: abs.display().to_string(),
                })
        }
    }
}
