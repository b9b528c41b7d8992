//! Storage core for a geotagged photo gallery.
//!
//! Captured images are moved into an app-owned [`archive::FileArchive`] and
//! described by rows in the SQLite-backed [`db::Database`]. The
//! [`gallery::Gallery`] ties the two together and runs the save pipeline.

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod geo;
pub mod logging;

pub use archive::FileArchive;
pub use config::Config;
pub use db::{Database, ImageRecord, Location};
pub use error::{ArchiveError, GalleryError, StorageError};
pub use gallery::{AuditReport, Gallery, GalleryItem, SavedCapture};
pub use geo::{GeoError, LocationSource, Placemark, ReverseGeocoder};
