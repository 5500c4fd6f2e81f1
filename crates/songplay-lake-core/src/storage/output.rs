//! Part-file output.
//!
//! The Parquet encoder needs a blocking [`Write`], so part files are written
//! through a buffered `std::fs::File`. Bytes land in a hidden
//! `.<file name>.inprogress` sibling of the target and only take the real
//! name once [`OutputSink::finish`] has flushed, synced and renamed them.
//! Readers that skip dot-files never see a half-written part.

use std::{
    ffi::OsString,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tokio::fs;

use crate::storage::{
    BackendError, OtherIoSnafu, StorageLocation, StorageResult, create_parent_dir, join_local,
};

const IN_PROGRESS_SUFFIX: &str = ".inprogress";

/// Hidden sibling used while `target` is being written.
fn in_progress_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(IN_PROGRESS_SUFFIX);
    target.with_file_name(name)
}

/// Deletes the in-progress file unless the part was committed.
struct InProgressFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for InProgressFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// `Write` adapter that counts bytes on their way to the file.
struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// An open part file.
///
/// Stream encoded bytes through [`OutputSink::writer`] and commit with
/// [`OutputSink::finish`]. A sink dropped before `finish` removes its
/// in-progress file and leaves nothing at the target path.
pub struct OutputSink {
    target: PathBuf,
    writer: CountingWriter<BufWriter<std::fs::File>>,
    file: InProgressFile,
}

impl OutputSink {
    /// Handle the encoder writes into.
    pub fn writer(&mut self) -> &mut (dyn Write + Send) {
        &mut self.writer
    }

    /// Flush and sync the bytes, then move them to the target path.
    ///
    /// Returns the number of bytes committed.
    pub async fn finish(mut self) -> StorageResult<u64> {
        let in_progress = self.file.path.display().to_string();
        self.writer
            .flush()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: in_progress.clone(),
            })?;
        self.writer
            .inner
            .get_ref()
            .sync_all()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu { path: in_progress })?;

        fs::rename(&self.file.path, &self.target)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.target.display().to_string(),
            })?;
        self.file.committed = true;
        Ok(self.writer.bytes)
    }
}

/// Open a part file at `rel_path` under `location`, creating parent
/// directories as needed.
pub async fn open_output_sink(
    location: &StorageLocation,
    rel_path: &Path,
) -> StorageResult<OutputSink> {
    match location {
        StorageLocation::Local(_) => {
            let target = join_local(location, rel_path);
            create_parent_dir(&target).await?;

            let path = in_progress_path(&target);
            let handle = std::fs::File::create(&path)
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: path.display().to_string(),
                })?;

            Ok(OutputSink {
                target,
                writer: CountingWriter {
                    inner: BufWriter::new(handle),
                    bytes: 0,
                },
                file: InProgressFile {
                    path,
                    committed: false,
                },
            })
        }
    }
}
