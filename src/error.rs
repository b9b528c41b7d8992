//! Error types for the record store, the file archive and the save pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the record store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("image uri must not be empty")]
    EmptyUri,

    #[error("location has a non-finite {0}")]
    NonFiniteLocation(&'static str),

    #[error("failed to serialize location: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("stored location for image {id} is not valid JSON: {source}")]
    CorruptLocation {
        id: i64,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure moving files into or out of the archive directory.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to create archive directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capture file {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("archive path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("failed to reserve archive file {path}: {source}")]
    Reserve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {from} to {to}: {source}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list archive directory {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{0} is not inside the archive directory")]
    OutsideArchive(PathBuf),
}

/// Failure of a gallery operation spanning both stores.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
