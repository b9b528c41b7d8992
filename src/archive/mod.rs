//! App-owned directory holding captured images.
//!
//! Captures arrive as transient files and are moved (not copied) into the
//! archive under a unique `<prefix><millis>.<ext>` name.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ArchiveResult};

pub struct FileArchive {
    config: ArchiveConfig,
}

/// Last timestamp token handed out in this process.
static LAST_TOKEN: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds, bumped so that no two calls in the same
/// process ever return the same value.
fn next_token() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_TOKEN.load(Ordering::Relaxed);
    loop {
        let token = now.max(last + 1);
        match LAST_TOKEN.compare_exchange_weak(last, token, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return token,
            Err(current) => last = current,
        }
    }
}

impl FileArchive {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    /// Archive directory.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Create the archive directory and any missing parents.
    pub fn ensure_dir(&self) -> ArchiveResult<PathBuf> {
        fs::create_dir_all(&self.config.path).map_err(|source| ArchiveError::CreateDir {
            path: self.config.path.clone(),
            source,
        })?;
        Ok(self.config.path.clone())
    }

    fn file_name(&self, token: i64) -> String {
        if self.config.extension.is_empty() {
            format!("{}{}", self.config.prefix, token)
        } else {
            format!("{}{}.{}", self.config.prefix, token, self.config.extension)
        }
    }

    /// Claim a fresh destination by creating it empty with `create_new`, so
    /// a file that appears between picking the name and moving onto it is
    /// never overwritten. Names already taken are skipped over.
    fn reserve_destination(&self) -> ArchiveResult<PathBuf> {
        loop {
            let candidate = self.config.path.join(self.file_name(next_token()));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(ArchiveError::Reserve {
                        path: candidate,
                        source,
                    })
                }
            }
        }
    }

    /// Move a transient capture into the archive and return its durable path.
    ///
    /// On failure the transient file is left where it was.
    pub fn archive(&self, transient: &Path) -> ArchiveResult<PathBuf> {
        if !transient.is_file() {
            return Err(ArchiveError::SourceMissing(transient.to_path_buf()));
        }
        // Durable paths are stored as text
        if self.config.path.to_str().is_none() {
            return Err(ArchiveError::NonUtf8Path(self.config.path.clone()));
        }

        self.ensure_dir()?;
        let destination = self.reserve_destination()?;

        // Try rename first (fastest, same filesystem); it replaces the empty placeholder
        if fs::rename(transient, &destination).is_ok() {
            info!("Archived {:?} as {:?}", transient, destination);
            return Ok(destination);
        }

        debug!("Rename of {:?} failed, copying instead", transient);
        move_by_copy(transient, &destination)?;

        info!("Archived {:?} as {:?}", transient, destination);
        Ok(destination)
    }

    /// Files directly inside the archive directory, sorted by path.
    pub fn list_files(&self) -> ArchiveResult<Vec<PathBuf>> {
        if !self.config.path.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.config.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.map_err(|source| ArchiveError::List {
                path: self.config.path.clone(),
                source,
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Whether `path` names something directly inside the archive directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.parent() == Some(self.config.path.as_path())
    }

    /// Delete an archived file. A file that is already gone is not an error.
    pub fn remove(&self, path: &Path) -> ArchiveResult<()> {
        if !self.contains(path) {
            return Err(ArchiveError::OutsideArchive(path.to_path_buf()));
        }

        match fs::remove_file(path) {
            Ok(()) => {
                info!("Removed archived file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArchiveError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Copy then delete, for moves across filesystems. Any failure removes the
/// destination again so `from` stays the only copy.
fn move_by_copy(from: &Path, to: &Path) -> ArchiveResult<()> {
    let relocate_error = |source| ArchiveError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Err(source) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(relocate_error(source));
    }

    if let Err(source) = fs::remove_file(from) {
        if let Err(e) = fs::remove_file(to) {
            warn!("Failed to roll back partial archive copy {:?}: {}", to, e);
        }
        return Err(relocate_error(source));
    }

    Ok(())
}
