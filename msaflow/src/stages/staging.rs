//! Directory stager stage.
//!
//! Copies the working tree into the shared mount so the engine and the
//! orchestrator see the same files. The copy merges into whatever is
//! already there, follows symbolic links, skips dangling ones, and skips
//! denylisted entry names at every depth.

use crate::config::StagingConfig;
use crate::errors::StagingError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Counters describing one staging pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingReport {
    /// Regular files copied (or overwritten).
    pub files_copied: u64,
    /// Directories visited in the destination, created or merged into.
    pub directories: u64,
    /// Entries skipped because their name is denylisted.
    pub excluded: u64,
    /// Symbolic links skipped because their target does not exist.
    pub dangling_links: u64,
}

/// Copies `source_root` into `destination`, honouring a name denylist.
#[derive(Debug, Clone)]
pub struct DirectoryStager {
    source_root: PathBuf,
    destination: PathBuf,
    denylist: HashSet<String>,
}

impl DirectoryStager {
    /// Creates a stager.
    #[must_use]
    pub fn new(
        source_root: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        denylist: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            destination: destination.into(),
            denylist: denylist.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a stager from configuration.
    #[must_use]
    pub fn from_config(config: &StagingConfig) -> Self {
        Self::new(
            config.source_root.clone(),
            config.shared_dir.clone(),
            config.denylist.iter().cloned(),
        )
    }

    /// Where the tree is staged to.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Whether an entry name is excluded.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.denylist.contains(name)
    }

    /// Stages the tree on the blocking thread pool.
    pub async fn stage(&self) -> Result<StagingReport, StagingError> {
        let stager = self.clone();
        tokio::task::spawn_blocking(move || stager.stage_blocking())
            .await
            .map_err(|err| StagingError::new(&self.destination, io::Error::other(err)))?
    }

    /// Stages the tree on the current thread.
    pub fn stage_blocking(&self) -> Result<StagingReport, StagingError> {
        info!(
            source = %self.source_root.display(),
            destination = %self.destination.display(),
            "Staging working directory"
        );

        fs::create_dir_all(&self.destination)
            .map_err(|err| StagingError::new(&self.destination, err))?;
        // Compared by canonical path so `a/../shared` or a link to the
        // destination is still recognised.
        let destination = fs::canonicalize(&self.destination)
            .map_err(|err| StagingError::new(&self.destination, err))?;

        let mut report = StagingReport {
            directories: 1,
            ..StagingReport::default()
        };
        let mut excluded = 0;

        let walker = WalkDir::new(&self.source_root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if self.is_excluded(&entry.file_name().to_string_lossy()) {
                    debug!(path = %entry.path().display(), "Excluded from staging");
                    excluded += 1;
                    return false;
                }
                !(entry.file_type().is_dir() && is_same_dir(entry.path(), &destination))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => match err.path().filter(|path| is_dangling_link(path, &err)) {
                    Some(path) => {
                        debug!(path = %path.display(), error = %err, "Skipping dangling symlink");
                        report.dangling_links += 1;
                        continue;
                    }
                    None => return Err(self.walk_error(err)),
                },
            };
            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.source_root) else {
                continue;
            };
            let target = self.destination.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|err| StagingError::new(&target, err))?;
                report.directories += 1;
            } else {
                fs::copy(entry.path(), &target)
                    .map_err(|err| StagingError::new(entry.path(), err))?;
                report.files_copied += 1;
            }
        }
        report.excluded = excluded;

        info!(
            files = report.files_copied,
            directories = report.directories,
            excluded = report.excluded,
            dangling_links = report.dangling_links,
            "Staged working directory"
        );
        Ok(report)
    }

    fn walk_error(&self, err: walkdir::Error) -> StagingError {
        let path = err
            .path()
            .map_or_else(|| self.source_root.clone(), Path::to_path_buf);
        StagingError::new(path, io::Error::from(err))
    }
}

fn is_same_dir(path: &Path, canonical: &Path) -> bool {
    fs::canonicalize(path).is_ok_and(|resolved| resolved == canonical)
}

fn is_dangling_link(path: &Path, err: &walkdir::Error) -> bool {
    err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound)
        && fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}
