//! Gallery operations that span the record store and the file archive.
//!
//! The record store is the source of truth for what the gallery shows; the
//! archive directory is checked against it rather than listed on its own.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::archive::FileArchive;
use crate::db::{Database, ImageRecord, Location};
use crate::error::{ArchiveError, GalleryError, StorageError};
use crate::geo::{GeoError, LocationSource, ReverseGeocoder};

pub type Result<T> = std::result::Result<T, GalleryError>;

pub struct Gallery {
    db: Database,
    archive: FileArchive,
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCapture {
    pub id: i64,
    pub uri: PathBuf,
    pub location: Option<Location>,
    pub address: Option<String>,
}

/// A gallery entry plus whether its file is still on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryItem {
    pub record: ImageRecord,
    pub file_present: bool,
}

/// Disagreements between the archive directory and the record store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Archived files no record points at.
    pub orphaned_files: Vec<PathBuf>,
    /// Records whose file is missing.
    pub dangling_records: Vec<ImageRecord>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_files.is_empty() && self.dangling_records.is_empty()
    }
}

impl Gallery {
    /// Takes ownership of an initialized database.
    pub fn new(db: Database, archive: FileArchive) -> Self {
        Self { db, archive }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn archive(&self) -> &FileArchive {
        &self.archive
    }

    /// Locate, geocode, archive and record one capture.
    ///
    /// Missing location or address never fails the save; archive and storage
    /// failures do.
    pub fn save_capture(
        &self,
        transient: &Path,
        location_source: &dyn LocationSource,
        geocoder: Option<&dyn ReverseGeocoder>,
    ) -> Result<SavedCapture> {
        let location = match location_source.current_location() {
            Ok(location) => Some(location),
            Err(GeoError::PermissionDenied) => {
                info!("Location permission not granted, saving without location");
                None
            }
            Err(e) => {
                warn!("Error getting location: {}", e);
                None
            }
        };

        let address = match (&location, geocoder) {
            (Some(location), Some(geocoder)) => resolve_address(geocoder, location),
            _ => None,
        };

        self.save_with_metadata(transient, location, address)
    }

    /// Archive and record a capture whose metadata is already known.
    pub fn save_with_metadata(
        &self,
        transient: &Path,
        location: Option<Location>,
        address: Option<String>,
    ) -> Result<SavedCapture> {
        // Checked before moving anything so a rejected location leaves the capture in place
        if let Some(field) = location.as_ref().and_then(Location::non_finite_field) {
            return Err(StorageError::NonFiniteLocation(field).into());
        }

        let uri = self.archive.archive(transient).inspect_err(|e| {
            error!("Error saving image {:?}: {}", transient, e);
        })?;

        let uri_str = uri
            .to_str()
            .ok_or_else(|| ArchiveError::NonUtf8Path(uri.clone()))?;
        let id = self
            .db
            .create(uri_str, location.as_ref(), address.as_deref())
            .inspect_err(|e| {
                error!("Archived {:?} but failed to record it, file is orphaned: {}", uri, e);
            })?;

        info!("Image saved successfully at {:?} (id {})", uri, id);
        Ok(SavedCapture {
            id,
            uri,
            location,
            address,
        })
    }

    /// Every record, oldest first, with file presence checked.
    pub fn items(&self) -> Result<Vec<GalleryItem>> {
        let items = self
            .db
            .list_all()?
            .into_iter()
            .map(|record| {
                let file_present = Path::new(&record.uri).is_file();
                GalleryItem {
                    record,
                    file_present,
                }
            })
            .collect();
        Ok(items)
    }

    /// Delete a record. With `remove_file`, its archived file goes first; if
    /// that fails the record is kept so the delete can be retried.
    pub fn delete(&self, id: i64, remove_file: bool) -> Result<usize> {
        if remove_file {
            if let Some(record) = self.db.get(id)? {
                let path = Path::new(&record.uri);
                if self.archive.contains(path) {
                    self.archive.remove(path).inspect_err(|e| {
                        error!("Keeping image record {}: {}", id, e);
                    })?;
                } else {
                    warn!("Not removing {:?}: outside the archive directory", path);
                }
            }
        }

        let removed = self.db.delete_by_id(id)?;
        Ok(removed)
    }

    /// Compare archive contents with stored records. Changes nothing.
    pub fn audit(&self) -> Result<AuditReport> {
        let records = self.db.list_all()?;
        let files = self.archive.list_files()?;

        let referenced: HashSet<PathBuf> = records.iter().map(|r| PathBuf::from(&r.uri)).collect();

        let orphaned_files: Vec<PathBuf> = files
            .into_iter()
            .filter(|file| !referenced.contains(file))
            .collect();

        let dangling_records: Vec<ImageRecord> = records
            .into_iter()
            .filter(|r| !Path::new(&r.uri).is_file())
            .collect();

        if !orphaned_files.is_empty() || !dangling_records.is_empty() {
            warn!(
                "Gallery audit: {} orphaned file(s), {} dangling record(s)",
                orphaned_files.len(),
                dangling_records.len()
            );
        }

        Ok(AuditReport {
            orphaned_files,
            dangling_records,
        })
    }
}

fn resolve_address(geocoder: &dyn ReverseGeocoder, location: &Location) -> Option<String> {
    match geocoder.reverse_geocode(location.latitude, location.longitude) {
        Ok(Some(placemark)) => placemark.label(),
        Ok(None) => {
            info!("No address found for {}, {}", location.latitude, location.longitude);
            None
        }
        Err(e) => {
            warn!("Reverse geocoding via {} failed: {}", geocoder.name(), e);
            None
        }
    }
}
