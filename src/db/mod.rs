mod records;
mod schema;

use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, error};

pub use records::{ImageRecord, Location};
pub use schema::SCHEMA;

use crate::error::{StorageError, StorageResult};

/// SQLite-backed record store for saved captures.
///
/// Every operation is a single statement, so SQLite's autocommit makes each
/// call atomic on its own.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("Opened record store at {:?}", path);
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the `images` table if it does not exist. Safe to call on every start.
    pub fn initialize(&self) -> StorageResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert a record and return its newly assigned id.
    pub fn create(
        &self,
        uri: &str,
        location: Option<&Location>,
        address: Option<&str>,
    ) -> StorageResult<i64> {
        if uri.is_empty() {
            return Err(StorageError::EmptyUri);
        }

        if let Some(field) = location.and_then(Location::non_finite_field) {
            return Err(StorageError::NonFiniteLocation(field));
        }

        let location_json = location.map(Location::to_json).transpose()?;

        self.conn
            .execute(
                "INSERT INTO images (uri, location, address) VALUES (?, ?, ?)",
                rusqlite::params![uri, location_json, address],
            )
            .inspect_err(|e| error!("Failed to insert image record for {}: {}", uri, e))?;

        let id = self.conn.last_insert_rowid();
        debug!("Created image record {} for {}", id, uri);
        Ok(id)
    }

    /// All records in insertion order.
    pub fn list_all(&self) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, uri, location, address FROM images ORDER BY id")?;
        let rows = stmt
            .query_map([], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawRecord::decode).collect()
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<ImageRecord>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, uri, location, address FROM images WHERE id = ?",
                [id],
                raw_row,
            )
            .optional()?;

        raw.map(RawRecord::decode).transpose()
    }

    /// Delete a record by id, returning the number of rows removed.
    /// Deleting an id that does not exist is not an error.
    pub fn delete_by_id(&self, id: i64) -> StorageResult<usize> {
        let removed = self.conn.execute("DELETE FROM images WHERE id = ?", [id])?;
        debug!("Deleted {} image record(s) with id {}", removed, id);
        Ok(removed)
    }

    pub fn count(&self) -> StorageResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Row as stored, before the location JSON is decoded.
struct RawRecord {
    id: i64,
    uri: String,
    location: Option<String>,
    address: Option<String>,
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        uri: row.get(1)?,
        location: row.get(2)?,
        address: row.get(3)?,
    })
}

impl RawRecord {
    fn decode(self) -> StorageResult<ImageRecord> {
        let location = match self.location {
            Some(text) => Some(
                Location::from_json(&text)
                    .map_err(|source| StorageError::CorruptLocation { id: self.id, source })?,
            ),
            None => None,
        };

        Ok(ImageRecord {
            id: self.id,
            uri: self.uri,
            location,
            address: self.address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_create_and_list_round_trip() {
        let db = store();
        let location = Location::new(1.0, 2.0);

        let id = db
            .create("/tmp/a.jpg", Some(&location), Some("Main St, Springfield"))
            .unwrap();
        assert_eq!(id, 1);

        let records = db.list_all().unwrap();
        assert_eq!(
            records,
            vec![ImageRecord {
                id: 1,
                uri: "/tmp/a.jpg".to_string(),
                location: Some(location),
                address: Some("Main St, Springfield".to_string()),
            }]
        );
    }

    #[test]
    fn test_optional_fields_stay_absent() {
        let db = store();
        let id = db.create("/tmp/b.jpg", None, None).unwrap();

        let record = db.get(id).unwrap().unwrap();
        assert!(record.location.is_none());
        assert!(record.address.is_none());

        let (location, address): (Option<String>, Option<String>) = db
            .conn
            .query_row("SELECT location, address FROM images WHERE id = ?", [id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert!(location.is_none());
        assert!(address.is_none());
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let db = store();
        let first = db.create("/tmp/1.jpg", None, None).unwrap();
        let second = db.create("/tmp/2.jpg", None, None).unwrap();
        db.delete_by_id(second).unwrap();
        db.delete_by_id(first).unwrap();

        let third = db.create("/tmp/3.jpg", None, None).unwrap();
        assert!(third > second);
        assert_ne!(third, first);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let db = store();
        let id = db.create("/tmp/a.jpg", None, None).unwrap();

        assert_eq!(db.delete_by_id(id).unwrap(), 1);
        assert_eq!(db.delete_by_id(id).unwrap(), 0);
        assert!(db.list_all().unwrap().iter().all(|r| r.id != id));
    }

    #[test]
    fn test_delete_missing_on_empty_store() {
        let db = store();
        assert_eq!(db.delete_by_id(999).unwrap(), 0);
    }

    #[test]
    fn test_empty_uri_rejected() {
        let db = store();
        assert!(matches!(db.create("", None, None), Err(StorageError::EmptyUri)));
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_non_finite_location_rejected() {
        let db = store();
        db.create("/tmp/ok.jpg", Some(&Location::new(1.0, 2.0)), None).unwrap();

        let result = db.create("/tmp/nan.jpg", Some(&Location::new(f64::NAN, 2.0)), None);
        assert!(matches!(result, Err(StorageError::NonFiniteLocation("latitude"))));

        let mut location = Location::new(1.0, 2.0);
        location.altitude = Some(f64::INFINITY);
        assert!(db.create("/tmp/inf.jpg", Some(&location), None).is_err());

        let records = db.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uri, "/tmp/ok.jpg");
    }

    #[test]
    fn test_corrupt_location_reported() {
        let db = store();
        db.conn
            .execute(
                "INSERT INTO images (uri, location) VALUES ('/tmp/x.jpg', 'not json')",
                [],
            )
            .unwrap();

        match db.list_all() {
            Err(StorageError::CorruptLocation { id, .. }) => assert_eq!(id, 1),
            other => panic!("expected corrupt location error, got {:?}", other),
        }
    }

    #[test]
    fn test_create_without_table_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.create("/tmp/a.jpg", None, None),
            Err(StorageError::Sqlite(_))
        ));
    }

    #[test]
    fn test_initialize_twice_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/images.db");

        {
            let db = Database::open(&path).unwrap();
            db.initialize().unwrap();
            db.initialize().unwrap();
            db.create("/tmp/a.jpg", None, Some("Somewhere")).unwrap();
        }

        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        let records = db.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address.as_deref(), Some("Somewhere"));
    }
}
