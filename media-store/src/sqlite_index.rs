//! Media index backed by SQLite and a directory tree.
//!
//! Behaves like the platform index where the store depends on it: pending
//! rows are hidden from queries, relative paths are stored with a trailing
//! separator, scoped entries get their file path computed from the relative
//! path, and deleting a row deletes its file.

use crate::index::{image_id, image_uri, IndexError, MediaIndex};
use crate::layout::unique_name;
use crate::models::{IndexRow, NewEntry, QueryFilter};
use crate::schema::init_index_schema;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ROW_COLUMNS: &str = "_id, _display_name, relative_path, _data, mime_type, _size, date_added";

pub struct SqliteMediaIndex {
    conn: Mutex<Connection>,
    root: PathBuf,
}

impl SqliteMediaIndex {
    /// Opens (or creates) the index database at `db_path`; files live below `root`
    pub fn open(db_path: &Path, root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn, root)
    }

    pub fn open_in_memory(root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        Self::from_connection(Connection::open_in_memory()?, root)
    }

    pub fn from_connection(conn: Connection, root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        init_index_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of rows, pending ones included
    pub fn entry_count(&self) -> Result<usize, IndexError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn
            .lock()
            .map_err(|_| IndexError::Platform("media index lock poisoned".to_string()))
    }

    /// Returns the file path of an entry
    fn data_path(&self, uri: &str) -> Result<PathBuf, IndexError> {
        let id = image_id(uri).ok_or_else(|| IndexError::NotFound(uri.to_string()))?;
        let conn = self.conn()?;
        let data: Option<Option<String>> = conn
            .query_row(
                "SELECT _data FROM images WHERE _id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(Some(path)) => Ok(PathBuf::from(path)),
            Some(None) => Err(IndexError::NotFound(format!("{} has no data path", uri))),
            None => Err(IndexError::NotFound(uri.to_string())),
        }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<IndexRow> {
        let id: Option<i64> = row.get(0)?;
        Ok(IndexRow {
            uri: id.map(image_uri).unwrap_or_default(),
            id,
            display_name: row.get(1)?,
            relative_path: row.get(2)?,
            data: row.get(3)?,
            mime_type: row.get(4)?,
            size: row.get(5)?,
            date_added: row.get(6)?,
        })
    }
}

fn file_size(path: &Path) -> Option<i64> {
    std::fs::metadata(path).ok().map(|m| m.len() as i64)
}

/// Display names of every row in a collection, pending ones included
fn names_in_collection(
    conn: &Connection,
    relative_path: &str,
) -> Result<HashSet<String>, IndexError> {
    let mut stmt = conn.prepare(
        "SELECT _display_name FROM images WHERE relative_path = ?1 AND _display_name IS NOT NULL",
    )?;
    let names = stmt.query_map(params![relative_path], |row| row.get::<_, String>(0))?;
    Ok(names.collect::<Result<HashSet<_>, _>>()?)
}

fn normalize_relative_path(relative_path: &str) -> String {
    if relative_path.ends_with('/') {
        relative_path.to_string()
    } else {
        format!("{}/", relative_path)
    }
}

impl MediaIndex for SqliteMediaIndex {
    fn query(&self, filter: &QueryFilter) -> Result<Vec<IndexRow>, IndexError> {
        let conn = self.conn()?;
        let (sql, value) = match filter {
            QueryFilter::RelativePath(token) => (
                format!(
                    "SELECT {} FROM images
                     WHERE is_pending = 0 AND relative_path = ?1
                     ORDER BY date_added DESC, _id DESC",
                    ROW_COLUMNS
                ),
                token,
            ),
            QueryFilter::DataPrefix(prefix) => (
                format!(
                    "SELECT {} FROM images
                     WHERE is_pending = 0 AND substr(_data, 1, length(?1)) = ?1
                     ORDER BY date_added DESC, _id DESC",
                    ROW_COLUMNS
                ),
                prefix,
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value], Self::map_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert(&self, entry: &NewEntry) -> Result<String, IndexError> {
        let relative_path = entry.relative_path.as_deref().map(normalize_relative_path);

        // name check and insert happen under one lock, pending rows included
        let conn = self.conn()?;
        let (display_name, data) = match (&entry.data, &relative_path) {
            (Some(path), _) => (entry.display_name.clone(), path.clone()),
            (None, Some(rel)) => {
                let directory = self.root.join(rel);
                let taken = names_in_collection(&conn, rel)?;
                let name = unique_name(&entry.display_name, |name| {
                    taken.contains(name) || directory.join(name).exists()
                });
                if name != entry.display_name {
                    log::debug!("{} is taken, inserting as {}", entry.display_name, name);
                }
                let data = directory.join(&name);
                (name, data)
            }
            (None, None) => {
                return Err(IndexError::Platform(
                    "entry needs a relative path or a data path".to_string(),
                ))
            }
        };
        let size = if entry.pending { None } else { file_size(&data) };

        conn.execute(
            "INSERT INTO images (_display_name, relative_path, _data, mime_type, _size, date_added, is_pending)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &display_name,
                &relative_path,
                data.to_string_lossy().to_string(),
                &entry.mime_type,
                size,
                chrono::Utc::now().timestamp_millis(),
                entry.pending,
            ],
        )?;

        let uri = image_uri(conn.last_insert_rowid());
        log::debug!("Inserted index entry {} -> {}", uri, data.display());
        Ok(uri)
    }

    fn finish_pending(&self, uri: &str) -> Result<usize, IndexError> {
        let id = image_id(uri).ok_or_else(|| IndexError::NotFound(uri.to_string()))?;
        let size = self.data_path(uri).ok().and_then(|p| file_size(&p));
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE images SET is_pending = 0, _size = ?2 WHERE _id = ?1",
            params![id, size],
        )?;
        Ok(rows)
    }

    fn delete(&self, uri: &str) -> Result<usize, IndexError> {
        let id = match image_id(uri) {
            Some(id) => id,
            None => return Ok(0),
        };
        let data = self.data_path(uri).ok();

        let rows = {
            let conn = self.conn()?;
            conn.execute("DELETE FROM images WHERE _id = ?1", params![id])?
        };

        if rows > 0 {
            if let Some(path) = data {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("Could not remove {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(rows)
    }

    fn open_read(&self, uri: &str) -> Result<Box<dyn Read + Send>, IndexError> {
        let path = self.data_path(uri)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IndexError::NotFound(path.display().to_string()),
            _ => IndexError::from(e),
        })?;
        Ok(Box::new(file))
    }

    fn open_write(&self, uri: &str) -> Result<Box<dyn Write + Send>, IndexError> {
        let path = self.data_path(uri)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Box::new(File::create(&path)?))
    }

    fn scan_file(&self, path: &Path, mime_type: &str) -> Result<(), IndexError> {
        let size = file_size(path);
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE images SET _size = ?1, mime_type = COALESCE(mime_type, ?2) WHERE _data = ?3",
            params![size, mime_type, path.to_string_lossy().to_string()],
        )?;
        log::debug!("Scanned {} ({} rows)", path.display(), rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn scoped_entry(name: &str, pending: bool) -> NewEntry {
        NewEntry {
            display_name: name.to_string(),
            mime_type: "image/jpeg".to_string(),
            relative_path: Some("Pictures/Test".to_string()),
            data: None,
            pending,
        }
    }

    fn write_bytes(index: &SqliteMediaIndex, uri: &str, bytes: &[u8]) {
        let mut out = index.open_write(uri).unwrap();
        out.write_all(bytes).unwrap();
        out.flush().unwrap();
    }

    #[test]
    fn test_pending_rows_are_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let filter = QueryFilter::RelativePath("Pictures/Test/".to_string());

        let uri = index.insert(&scoped_entry("a.jpg", true)).unwrap();
        write_bytes(&index, &uri, b"abc");
        assert!(index.query(&filter).unwrap().is_empty());
        assert_eq!(index.entry_count().unwrap(), 1);

        assert_eq!(index.finish_pending(&uri).unwrap(), 1);
        let rows = index.query(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].uri, uri);
        assert_eq!(rows[0].size, Some(3));
    }

    #[test]
    fn test_relative_path_gets_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        index.insert(&scoped_entry("a.jpg", false)).unwrap();

        let without = QueryFilter::RelativePath("Pictures/Test".to_string());
        let with = QueryFilter::RelativePath("Pictures/Test/".to_string());
        assert!(index.query(&without).unwrap().is_empty());
        assert_eq!(index.query(&with).unwrap().len(), 1);
    }

    #[test]
    fn test_query_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let first = index.insert(&scoped_entry("a.jpg", false)).unwrap();
        let second = index.insert(&scoped_entry("b.jpg", false)).unwrap();

        let rows = index
            .query(&QueryFilter::RelativePath("Pictures/Test/".to_string()))
            .unwrap();
        let uris: Vec<_> = rows.iter().map(|r| r.uri.clone()).collect();
        assert_eq!(uris, vec![second, first]);
    }

    #[test]
    fn test_data_prefix_filter() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let owned = dir.path().join("Pictures/Test/a.jpg");
        let foreign = dir.path().join("Pictures/TestOther/b.jpg");
        for path in [&owned, &foreign] {
            index
                .insert(&NewEntry {
                    display_name: "x.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                    relative_path: None,
                    data: Some(path.clone()),
                    pending: false,
                })
                .unwrap();
        }

        let prefix = format!("{}/", dir.path().join("Pictures/Test").display());
        let rows = index.query(&QueryFilter::DataPrefix(prefix)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data.as_deref(), Some(&*owned.to_string_lossy()));
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let uri = index.insert(&scoped_entry("a.jpg", false)).unwrap();
        write_bytes(&index, &uri, b"abc");
        let path = dir.path().join("Pictures/Test/a.jpg");
        assert!(path.exists());

        assert_eq!(index.delete(&uri).unwrap(), 1);
        assert!(!path.exists());
        assert_eq!(index.delete(&uri).unwrap(), 0);
        assert!(matches!(index.open_read(&uri), Err(IndexError::NotFound(_))));
    }

    #[test]
    fn test_pending_rows_reserve_their_name() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();

        let first = index.insert(&scoped_entry("a.jpg", true)).unwrap();
        let second = index.insert(&scoped_entry("a.jpg", true)).unwrap();
        write_bytes(&index, &first, b"first");
        write_bytes(&index, &second, b"second");
        index.finish_pending(&first).unwrap();
        index.finish_pending(&second).unwrap();

        let rows = index
            .query(&QueryFilter::RelativePath("Pictures/Test/".to_string()))
            .unwrap();
        let mut names: Vec<_> = rows.iter().filter_map(|r| r.display_name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.jpg", "a_1.jpg"]);

        assert_eq!(index.delete(&first).unwrap(), 1);
        let mut rest = String::new();
        index
            .open_read(&second)
            .unwrap()
            .read_to_string(&mut rest)
            .unwrap();
        assert_eq!(rest, "second");
    }

    #[test]
    fn test_file_on_disk_reserves_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let stray = dir.path().join("Pictures/Test/a.jpg");
        std::fs::create_dir_all(stray.parent().unwrap()).unwrap();
        std::fs::write(&stray, b"not indexed").unwrap();

        let uri = index.insert(&scoped_entry("a.jpg", false)).unwrap();

        assert_eq!(
            index.data_path(&uri).unwrap(),
            dir.path().join("Pictures/Test/a_1.jpg")
        );
    }

    #[test]
    fn test_open_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let uri = index.insert(&scoped_entry("a.jpg", false)).unwrap();
        assert!(matches!(index.open_read(&uri), Err(IndexError::NotFound(_))));
    }

    #[test]
    fn test_scan_file_records_size() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteMediaIndex::open_in_memory(dir.path()).unwrap();
        let path = dir.path().join("a.jpg");
        let uri = index
            .insert(&NewEntry {
                display_name: "a.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                relative_path: None,
                data: Some(path.clone()),
                pending: false,
            })
            .unwrap();
        std::fs::write(&path, b"12345").unwrap();
        index.scan_file(&path, "image/jpeg").unwrap();

        let prefix = format!("{}/", dir.path().display());
        let rows = index.query(&QueryFilter::DataPrefix(prefix)).unwrap();
        assert_eq!(rows[0].uri, uri);
        assert_eq!(rows[0].size, Some(5));
    }
}
