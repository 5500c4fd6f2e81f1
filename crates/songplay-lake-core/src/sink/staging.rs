//! Staged table replacement.
//!
//! A table is written in full under `_staging/<table>` and only then moved
//! over `<table>`. If the writer bails out early the [`StagedTable`] guard
//! deletes the staged directory, leaving the previous table untouched.

use std::path::PathBuf;

use tracing::debug;

use crate::storage::{self, StorageLocation, StorageResult, join_local, layout};

/// Staging area for one table under a run root.
#[derive(Debug)]
pub struct StagedTable {
    run_root: StorageLocation,
    table: &'static str,
    staged_rel: PathBuf,
    armed: bool,
}

impl StagedTable {
    /// Prepare an empty staging directory for `table`.
    ///
    /// Leftovers from an earlier failed run are removed first.
    pub async fn begin(run_root: &StorageLocation, table: &'static str) -> StorageResult<Self> {
        let staged_rel = layout::staging_rel_dir(table);
        storage::remove_dir_all_if_exists(run_root, &staged_rel).await?;
        storage::create_dir_all(run_root, &staged_rel).await?;
        Ok(Self {
            run_root: run_root.clone(),
            table,
            staged_rel,
            armed: true,
        })
    }

    /// Directory, relative to the run root, that files should be written to.
    pub fn staged_rel_dir(&self) -> &std::path::Path {
        &self.staged_rel
    }

    /// Replace `<table>` with the staged contents.
    ///
    /// The old table directory is removed, then the staged directory is
    /// renamed into place. An emptied `_staging` directory is cleaned up.
    pub async fn promote(mut self) -> StorageResult<()> {
        let table_rel = layout::table_rel_dir(self.table);
        storage::remove_dir_all_if_exists(&self.run_root, &table_rel).await?;
        storage::rename_dir(&self.run_root, &self.staged_rel, &table_rel).await?;
        self.armed = false;

        storage::remove_dir_if_empty(&self.run_root, std::path::Path::new(layout::STAGING_DIR_NAME))
            .await?;
        debug!(table = self.table, "promoted staged table");
        Ok(())
    }
}

impl Drop for StagedTable {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; the caller is already propagating an error.
            let abs = join_local(&self.run_root, &self.staged_rel);
            let _ = std::fs::remove_dir_all(abs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn promote_replaces_previous_table() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());
        std::fs::create_dir_all(tmp.path().join("users/old"))?;

        let staged = StagedTable::begin(&run_root, "users").await?;
        std::fs::write(tmp.path().join(staged.staged_rel_dir()).join("new.parquet"), b"x")?;
        staged.promote().await?;

        assert!(tmp.path().join("users/new.parquet").exists());
        assert!(!tmp.path().join("users/old").exists());
        assert!(!tmp.path().join(layout::STAGING_DIR_NAME).exists());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_stage_keeps_previous_table() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());
        std::fs::create_dir_all(tmp.path().join("songs/year=2000"))?;

        {
            let staged = StagedTable::begin(&run_root, "songs").await?;
            std::fs::write(tmp.path().join(staged.staged_rel_dir()).join("half.parquet"), b"x")?;
        }

        assert!(tmp.path().join("songs/year=2000").exists());
        assert!(!tmp.path().join(Path::new("_staging/songs")).exists());
        Ok(())
    }

    #[tokio::test]
    async fn begin_clears_stale_staging() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());
        std::fs::create_dir_all(tmp.path().join("_staging/time/year=1999"))?;

        let staged = StagedTable::begin(&run_root, "time").await?;
        let abs = tmp.path().join(staged.staged_rel_dir());
        assert!(abs.exists());
        assert_eq!(std::fs::read_dir(abs)?.count(), 0);
        Ok(())
    }
}
